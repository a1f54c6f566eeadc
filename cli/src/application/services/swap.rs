//! Application service: fleet swap workflow.
//!
//! Stops the freshly provisioned instance, rebuilds the group's image from
//! its disk, then deletes every running group member so the managed group
//! recreates them from the new image.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::application::ports::{ControlPlane, ProgressReporter};
use crate::application::services::poller::OperationPoller;
use crate::domain::{
    AsyncOperation, ControlPlaneError, InstanceRef, PollConfig, PollError, SwapError, SwapStep,
    SwapTarget, WaitSettings,
};

/// Result of an idempotent delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The target did not exist; treated as success.
    AlreadyAbsent,
}

/// What a completed swap did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapReport {
    /// `false` when there was no stale image to delete.
    pub stale_image_deleted: bool,
    pub members_deleted: Vec<String>,
    /// Members that vanished between listing and deletion.
    pub members_already_absent: Vec<String>,
}

/// Runs the swap workflow against an injected control plane.
pub struct FleetSwap<'a, C: ControlPlane, P: ProgressReporter> {
    control: &'a C,
    poll: PollConfig,
    reporter: &'a P,
}

impl<'a, C: ControlPlane, P: ProgressReporter> FleetSwap<'a, C, P> {
    pub fn new(control: &'a C, poll: PollConfig, reporter: &'a P) -> Self {
        Self {
            control,
            poll,
            reporter,
        }
    }

    /// Execute every step in order; each step's operation reaches `DONE`
    /// before the next starts. No rollback on failure.
    ///
    /// # Errors
    ///
    /// Returns a `SwapError` naming the failed step and its target.
    pub async fn run(&self, target: &SwapTarget) -> Result<SwapReport, SwapError> {
        let mut report = SwapReport::default();

        let instance = format!("instance {}", target.instance_name);
        self.reporter.step(&format!("stopping {instance}..."));
        self.stop_instance(target)
            .await
            .map_err(|source| fail(SwapStep::StopInstance, &instance, source))?;
        self.reporter.success(&format!("{instance} stopped"));

        let image = format!("image {}", target.image_name);
        self.reporter.step(&format!("deleting stale {image}..."));
        let outcome = self
            .delete_image(&target.project, &target.image_name)
            .await
            .map_err(|source| fail(SwapStep::DeleteStaleImage, &image, source))?;
        report.stale_image_deleted = outcome == DeleteOutcome::Deleted;
        match outcome {
            DeleteOutcome::Deleted => self.reporter.success(&format!("stale {image} deleted")),
            DeleteOutcome::AlreadyAbsent => {
                self.reporter.success(&format!("no stale {image}, skipped"));
            }
        }

        self.reporter
            .step(&format!("creating {image} from {}...", target.source_disk));
        self.create_image(target)
            .await
            .map_err(|source| fail(SwapStep::CreateImage, &image, source))?;
        self.reporter.success(&format!("{image} created"));

        let group = format!("group {}", target.instance_group);
        let members = self
            .list_members(target)
            .await
            .map_err(|source| fail(SwapStep::EnumerateGroupMembers, &group, source))?;
        info!(group = %target.instance_group, count = members.len(), "enumerated running group members");

        if members.is_empty() {
            self.reporter
                .warn(&format!("{group} has no running members to replace"));
            return Ok(report);
        }

        self.reporter.step(&format!(
            "deleting {} member(s) of {group}...",
            members.len()
        ));
        let results = join_all(members.iter().map(|m| {
            debug!(member = %m.name, link = %m.self_link, "deleting group member");
            self.delete_instance(&target.project, &target.zone, &m.name)
        }))
        .await;

        let mut first_failure = None;
        for (member, result) in members.iter().zip(results) {
            match result {
                Ok(DeleteOutcome::Deleted) => report.members_deleted.push(member.name.clone()),
                Ok(DeleteOutcome::AlreadyAbsent) => {
                    report.members_already_absent.push(member.name.clone());
                }
                Err(source) => {
                    warn!(member = %member.name, error = %source, "group member delete failed");
                    if first_failure.is_none() {
                        first_failure = Some(fail(
                            SwapStep::DeleteGroupMembers,
                            &format!("instance {}", member.name),
                            source,
                        ));
                    }
                }
            }
        }
        if let Some(err) = first_failure {
            return Err(err);
        }

        self.reporter.success(&format!(
            "{} member(s) of {group} deleted",
            report.members_deleted.len() + report.members_already_absent.len()
        ));
        Ok(report)
    }

    /// Stop the source instance. A missing instance is an error.
    ///
    /// # Errors
    ///
    /// Returns the request, poll, or operation failure.
    pub async fn stop_instance(&self, target: &SwapTarget) -> Result<(), PollError> {
        let op = self
            .control
            .stop_instance(&target.project, &target.zone, &target.instance_name)
            .await?;
        self.finish(op, self.poll.stop_instance).await
    }

    /// Delete an image; an absent image counts as success.
    ///
    /// # Errors
    ///
    /// Returns any failure other than the image being absent.
    pub async fn delete_image(&self, project: &str, name: &str) -> Result<DeleteOutcome, PollError> {
        match self.control.delete_image(project, name).await {
            Ok(op) => {
                self.finish(op, self.poll.delete_image).await?;
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                info!(image = name, reason = %e, "skipping delete, image does not exist");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create the target image from the source disk, replacing any image
    /// that appeared in the meantime.
    ///
    /// # Errors
    ///
    /// Returns the request, poll, or operation failure, including not-found.
    pub async fn create_image(&self, target: &SwapTarget) -> Result<(), PollError> {
        let op = self
            .control
            .create_image(&target.project, &target.image_name, &target.source_disk, true)
            .await?;
        self.finish(op, self.poll.create_image).await
    }

    /// Running members of the target group.
    ///
    /// # Errors
    ///
    /// Returns the control-plane failure.
    pub async fn list_members(&self, target: &SwapTarget) -> Result<Vec<InstanceRef>, PollError> {
        Ok(self
            .control
            .list_group_instances(&target.project, &target.zone, &target.instance_group, true)
            .await?)
    }

    /// Delete an instance; an absent instance counts as success.
    ///
    /// # Errors
    ///
    /// Returns any failure other than the instance being absent.
    pub async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<DeleteOutcome, PollError> {
        match self.control.delete_instance(project, zone, name).await {
            Ok(op) => {
                self.finish(op, self.poll.delete_instance).await?;
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                info!(instance = name, reason = %e, "skipping delete, instance does not exist");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn finish(&self, op: AsyncOperation, settings: WaitSettings) -> Result<(), PollError> {
        let done = OperationPoller::new(self.control)
            .wait_done(op, settings)
            .await?;
        match done.error {
            Some(message) => Err(ControlPlaneError::OperationFailed {
                operation: done.name,
                message,
            }
            .into()),
            None => Ok(()),
        }
    }
}

fn fail(step: SwapStep, target: &str, source: PollError) -> SwapError {
    SwapError {
        step,
        target: target.to_string(),
        source,
    }
}
