//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution with guaranteed timeout and kill on all platforms.

use std::path::Path;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::application::ports::{CommandError, CommandRunner};

/// How long to keep draining stdout/stderr after the child has exited.
/// Background descendants can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Production `CommandRunner`. Uses tokio for async process execution
/// with guaranteed timeout and kill on all platforms.
///
/// On Windows, `tokio::time::timeout` around `.output().await` does NOT kill
/// the child process when the timeout fires: the future is dropped but the
/// OS process keeps running. This implementation uses `tokio::select!` with
/// explicit `child.kill()` to guarantee the process is terminated.
///
/// The timeout applies to the child's own exit. Output is drained by
/// separate tasks so a descendant holding a pipe open cannot turn a finished
/// run into a timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    async fn run_in_dir(
        &self,
        program: &str,
        args: &[String],
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<Output, CommandError> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let (stdout_buf, mut stdout_task) = spawn_drain(child.stdout.take());
        let (stderr_buf, mut stderr_task) = spawn_drain(child.stderr.take());

        let status = tokio::select! {
            status = child.wait() => status.map_err(|source| CommandError::Wait {
                program: program.to_string(),
                source,
            })?,
            () = tokio::time::sleep(timeout) => {
                error!(program, timeout_secs = timeout.as_secs(), "process timed out, killing");
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(CommandError::TimedOut {
                    program: program.to_string(),
                    timeout,
                });
            }
        };

        for task in [&mut stdout_task, &mut stderr_task] {
            if tokio::time::timeout(DRAIN_GRACE, &mut *task).await.is_err() {
                warn!(program, "output pipe still open after exit, keeping partial output");
                task.abort();
            }
        }
        let stdout = std::mem::take(&mut *stdout_buf.lock().await);
        let stderr = std::mem::take(&mut *stderr_buf.lock().await);
        debug!(program, %status, stdout_bytes = stdout.len(), stderr_bytes = stderr.len(), "process exited");
        Ok(Output {
            status,
            stdout,
            stderr,
        })
    }
}

/// Copy `stream` into a shared buffer until EOF on a background task.
fn spawn_drain<R>(stream: Option<R>) -> (Arc<Mutex<Vec<u8>>>, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let task = tokio::spawn(async move {
        let Some(mut stream) = stream else {
            return;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
            }
        }
    });
    (buf, task)
}
