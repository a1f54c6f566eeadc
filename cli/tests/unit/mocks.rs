//! Recording port implementations for unit tests.
//!
//! Every mock appends to a shared [`Events`] log so tests can assert on the
//! interleaving of provisioning-tool runs and control-plane calls.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::process::Output;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use sprout_cli::application::ports::{
    CommandError, CommandRunner, ConfigSource, ControlPlane, ProgressReporter,
};
use sprout_cli::domain::{
    AsyncOperation, ControlPlaneError, InstanceRef, OperationStatus, SproutConfig,
};

use crate::helpers::ok_output;

/// Shared, ordered log of every call the mocks observed.
#[derive(Clone, Default)]
pub struct Events(Rc<RefCell<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Events that start with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Index of the first event equal to `event`.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == event)
    }
}

// ── Mock: CommandRunner ──────────────────────────────────────────────────────

/// Records `"<program> <args...>"` and replays scripted results, falling back
/// to a successful exit once the script runs out.
pub struct RecordingRunner {
    pub events: Events,
    script: RefCell<VecDeque<Result<Output, CommandError>>>,
}

impl RecordingRunner {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            script: RefCell::new(VecDeque::new()),
        }
    }

    /// Queue the result of the next run.
    #[must_use]
    pub fn then(self, result: Result<Output, CommandError>) -> Self {
        self.script.borrow_mut().push_back(result);
        self
    }

    /// Queue `n` timed-out runs.
    #[must_use]
    pub fn then_timeouts(self, n: usize) -> Self {
        for _ in 0..n {
            self.script.borrow_mut().push_back(Err(CommandError::TimedOut {
                program: "terraform".to_string(),
                timeout: Duration::from_secs(1800),
            }));
        }
        self
    }
}

impl CommandRunner for RecordingRunner {
    async fn run_in_dir(
        &self,
        program: &str,
        args: &[String],
        _work_dir: &Path,
        _timeout: Duration,
    ) -> Result<Output, CommandError> {
        self.events.push(format!("{program} {}", args.join(" ")));
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(ok_output()))
    }
}

// ── Mock: ControlPlane ───────────────────────────────────────────────────────

/// In-memory compute fleet.
///
/// Mutating calls return a `RUNNING` operation that reaches `DONE` after
/// `polls_to_done` refreshes. Resources listed in `missing` answer
/// `NotFound`; operation types in `failing` finish with an error payload.
pub struct FakeCloud {
    pub events: Events,
    pub members: Vec<String>,
    pub missing: HashSet<String>,
    pub failing: HashMap<String, String>,
    pub polls_to_done: usize,
    /// Transport failure injected into `list_group_instances`.
    pub list_error: Option<String>,
    polls: RefCell<HashMap<String, usize>>,
    pub mutations: Cell<usize>,
}

impl FakeCloud {
    pub fn new(events: Events, members: &[&str]) -> Self {
        Self {
            events,
            members: members.iter().map(|m| (*m).to_string()).collect(),
            missing: HashSet::new(),
            failing: HashMap::new(),
            polls_to_done: 1,
            list_error: None,
            polls: RefCell::new(HashMap::new()),
            mutations: Cell::new(0),
        }
    }

    /// Make `resource` (e.g. `"image img-1"`) answer `NotFound`.
    #[must_use]
    pub fn without(mut self, resource: &str) -> Self {
        self.missing.insert(resource.to_string());
        self
    }

    /// Make operations of `operation_type` finish with `message`.
    #[must_use]
    pub fn failing(mut self, operation_type: &str, message: &str) -> Self {
        self.failing
            .insert(operation_type.to_string(), message.to_string());
        self
    }

    fn start(&self, event: String, operation_type: &str, resource: &str) -> Result<AsyncOperation, ControlPlaneError> {
        self.events.push(event);
        self.mutations.set(self.mutations.get() + 1);
        if self.missing.contains(resource) {
            return Err(ControlPlaneError::NotFound(resource.to_string()));
        }
        let name = format!("op-{operation_type}-{}", resource.replace(' ', "-"));
        Ok(AsyncOperation {
            self_link: format!("https://compute.test/operations/{name}"),
            name,
            kind: "compute#operation".to_string(),
            operation_type: operation_type.to_string(),
            status: OperationStatus::Running,
            error: None,
        })
    }
}

impl ControlPlane for FakeCloud {
    async fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        self.start(
            format!("stop_instance {project}/{zone}/{name}"),
            "stop",
            &format!("instance {name}"),
        )
    }

    async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        self.start(
            format!("delete_instance {project}/{zone}/{name}"),
            "delete",
            &format!("instance {name}"),
        )
    }

    async fn create_image(
        &self,
        project: &str,
        name: &str,
        source_disk: &str,
        force: bool,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        self.start(
            format!("create_image {project}/{name} from {source_disk} force={force}"),
            "insert",
            &format!("disk {source_disk}"),
        )
    }

    async fn delete_image(
        &self,
        project: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        self.start(
            format!("delete_image {project}/{name}"),
            "delete",
            &format!("image {name}"),
        )
    }

    async fn list_group_instances(
        &self,
        project: &str,
        zone: &str,
        group: &str,
        running_only: bool,
    ) -> Result<Vec<InstanceRef>, ControlPlaneError> {
        self.events.push(format!(
            "list_group_instances {project}/{zone}/{group} running_only={running_only}"
        ));
        if let Some(message) = &self.list_error {
            return Err(ControlPlaneError::Transport(message.clone()));
        }
        Ok(self
            .members
            .iter()
            .map(|m| InstanceRef::from_url(&format!(
                "https://compute.test/projects/{project}/zones/{zone}/instances/{m}"
            )))
            .collect())
    }

    async fn operation_status(
        &self,
        operation: &AsyncOperation,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        self.events.push(format!("poll {}", operation.name));
        let mut polls = self.polls.borrow_mut();
        let seen = polls.entry(operation.name.clone()).or_default();
        *seen += 1;
        let mut refreshed = operation.clone();
        if *seen >= self.polls_to_done {
            refreshed.status = OperationStatus::Done;
            refreshed.error = self.failing.get(&operation.operation_type).cloned();
        }
        Ok(refreshed)
    }
}

// ── Mock: ProgressReporter ───────────────────────────────────────────────────

/// Collects reporter output instead of printing it.
#[derive(Default)]
pub struct CollectingReporter {
    pub lines: RefCell<Vec<String>>,
}

impl CollectingReporter {
    pub fn warnings(&self) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter_map(|l| l.strip_prefix("warn: ").map(String::from))
            .collect()
    }
}

impl ProgressReporter for CollectingReporter {
    fn step(&self, message: &str) {
        self.lines.borrow_mut().push(format!("step: {message}"));
    }
    fn success(&self, message: &str) {
        self.lines.borrow_mut().push(format!("success: {message}"));
    }
    fn warn(&self, message: &str) {
        self.lines.borrow_mut().push(format!("warn: {message}"));
    }
}

// ── Mock: ConfigSource ───────────────────────────────────────────────────────

/// Serves variable files from memory, keyed by file name.
#[derive(Default)]
pub struct MemoryConfigSource {
    pub files: HashMap<String, String>,
}

impl MemoryConfigSource {
    #[must_use]
    pub fn with_file(mut self, name: &str, content: &str) -> Self {
        self.files.insert(name.to_string(), content.to_string());
        self
    }
}

impl ConfigSource for MemoryConfigSource {
    fn load_config(&self, _path: &Path) -> Result<SproutConfig> {
        anyhow::bail!("not expected in this test")
    }

    fn read_var_file(&self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.files
            .get(&name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{} does not exist", path.display()))
    }
}
