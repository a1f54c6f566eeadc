//! Application service: waits for asynchronous control-plane operations.
//!
//! Fixed-interval polling: no backoff. Each call site picks its own timeout
//! and interval because operations differ widely in expected duration.

use std::time::Duration;

use tracing::debug;

use crate::application::ports::ControlPlane;
use crate::domain::{AsyncOperation, ConfigError, OperationStatus, PollError, WaitSettings};

/// Polls operations through a borrowed control plane.
pub struct OperationPoller<'a, C: ControlPlane> {
    control: &'a C,
}

impl<'a, C: ControlPlane> OperationPoller<'a, C> {
    pub fn new(control: &'a C) -> Self {
        Self { control }
    }

    /// Block until `operation` reports `expected_status`.
    ///
    /// Performs at most `timeout_secs / interval_secs` refreshes, sleeping
    /// `interval_secs` before each. Returns immediately, without sleeping, if
    /// the operation already has the expected status.
    ///
    /// # Errors
    ///
    /// - `PollError::Config` if `expected_status` is not `PENDING`, `RUNNING`
    ///   or `DONE`, or `interval_secs` is zero. Reported before any waiting.
    /// - `PollError::Timeout` once the refresh budget is spent.
    /// - `PollError::ControlPlane` if a refresh fails.
    pub async fn wait_for(
        &self,
        operation: AsyncOperation,
        expected_status: &str,
        timeout_secs: u64,
        interval_secs: u64,
    ) -> Result<AsyncOperation, PollError> {
        let expected: OperationStatus = expected_status.parse()?;
        if interval_secs == 0 {
            return Err(ConfigError::ZeroInterval.into());
        }
        let cycles = timeout_secs / interval_secs;
        let interval = Duration::from_secs(interval_secs);

        let mut operation = operation;
        let mut n = 0;
        loop {
            if operation.status == expected {
                debug!(
                    kind = %operation.kind,
                    operation_type = %operation.operation_type,
                    status = %operation.status,
                    "operation complete"
                );
                return Ok(operation);
            }
            if n >= cycles {
                return Err(PollError::Timeout {
                    kind: operation.kind,
                    operation_type: operation.operation_type,
                    waited: Duration::from_secs(n * interval_secs),
                });
            }
            tokio::time::sleep(interval).await;
            operation = self.control.operation_status(&operation).await?;
            n += 1;
            debug!(
                kind = %operation.kind,
                operation_type = %operation.operation_type,
                status = %operation.status,
                cycle = n,
                "waiting for operation"
            );
        }
    }

    /// Wait for `DONE` with the given budget.
    ///
    /// # Errors
    ///
    /// See [`OperationPoller::wait_for`].
    pub async fn wait_done(
        &self,
        operation: AsyncOperation,
        settings: WaitSettings,
    ) -> Result<AsyncOperation, PollError> {
        self.wait_for(
            operation,
            OperationStatus::Done.as_str(),
            settings.timeout_secs,
            settings.interval_secs,
        )
        .await
    }
}
