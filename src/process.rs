use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::runner::RunError;

#[derive(Debug)]
pub struct CapturedOutput {
    pub status: std::process::ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs `command` to completion with both streams captured. A deadline, when
/// given, kills the child and reports `TimedOut` instead of waiting forever.
pub fn run_command_capture(
    mut command: Command,
    display_command: &str,
    timeout: Option<Duration>,
) -> Result<CapturedOutput, RunError> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|source| RunError::LaunchFailed {
        command: display_command.to_string(),
        source,
    })?;

    let stdout_thread = spawn_capture_thread(child.stdout.take());
    let stderr_thread = spawn_capture_thread(child.stderr.take());

    let status = match timeout {
        None => child.wait().map_err(RunError::WaitFailed)?,
        Some(deadline) => {
            match ChildExt::wait_timeout(&mut child, deadline).map_err(RunError::WaitFailed)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = join_capture_thread(stdout_thread);
                    let _ = join_capture_thread(stderr_thread);
                    return Err(RunError::TimedOut {
                        command: display_command.to_string(),
                        timeout_ms: deadline.as_millis() as u64,
                    });
                }
            }
        }
    };

    let stdout = join_capture_thread(stdout_thread)?;
    let stderr = join_capture_thread(stderr_thread)?;
    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
    })
}

fn spawn_capture_thread(
    reader: Option<impl std::io::Read + Send + 'static>,
) -> Option<JoinHandle<Result<Vec<u8>, std::io::Error>>> {
    reader.map(|mut r| {
        std::thread::spawn(move || {
            let mut buf: Vec<u8> = vec![];
            r.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_capture_thread(
    handle: Option<JoinHandle<Result<Vec<u8>, std::io::Error>>>,
) -> Result<Vec<u8>, RunError> {
    let Some(handle) = handle else {
        return Ok(vec![]);
    };
    handle
        .join()
        .map_err(|_| RunError::Io(std::io::Error::other("capture thread panicked")))?
        .map_err(RunError::Io)
}
