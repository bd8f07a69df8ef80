use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum ExternalToolError {
    #[error("Failed to launch '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("'{tool}' exited with {status}: {stderr}")]
    NonZeroExit {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("'{tool}' did not finish within {timeout:?} and was killed")]
    Timeout { tool: String, timeout: Duration },
    #[error("'{tool}' produced no output at {path}")]
    MissingOutput { tool: String, path: PathBuf },
    #[error("Malformed output from '{tool}' on line {line}: {reason}")]
    MalformedOutput {
        tool: String,
        line: usize,
        reason: String,
    },
    #[error("Could not prepare input for '{tool}': {reason}")]
    Input { tool: String, reason: String },
    #[error("I/O error around external tool: {0}")]
    Io(#[from] io::Error),
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Display name of an executable, used in diagnostics.
pub fn tool_name(executable: &Path) -> String {
    executable
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("external tool")
        .to_string()
}

/// Runs `command` to completion, killing it once `timeout` elapses.
///
/// Standard output and error are redirected into files under `scratch` so a
/// chatty child can never block on a full pipe.
pub fn run_with_timeout(
    mut command: Command,
    tool: &str,
    timeout: Duration,
    scratch: &Path,
) -> Result<ToolOutput, ExternalToolError> {
    let stdout_path = scratch.join(format!("{tool}.stdout"));
    let stderr_path = scratch.join(format!("{tool}.stderr"));
    command
        .stdin(Stdio::null())
        .stdout(File::create(&stdout_path)?)
        .stderr(File::create(&stderr_path)?);

    debug!(tool, ?timeout, "Spawning external tool");
    let mut child = command.spawn().map_err(|source| ExternalToolError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    let started = Instant::now();
    let status: ExitStatus = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            warn!(tool, ?timeout, "External tool timed out; killing it");
            // The child may exit between try_wait and kill.
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExternalToolError::Timeout {
                tool: tool.to_string(),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = read_lossy(&stdout_path)?;
    let stderr = read_lossy(&stderr_path)?;
    debug!(tool, elapsed = ?started.elapsed(), %status, "External tool finished");

    if !status.success() {
        return Err(ExternalToolError::NonZeroExit {
            tool: tool.to_string(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(ToolOutput { stdout, stderr })
}

fn read_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Writes an executable shell script standing in for an external tool.
    pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::test_support::fake_tool;
    use super::*;

    #[test]
    fn captures_stdout_of_successful_run() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "echoer", "echo hello; echo oops >&2");
        let output = run_with_timeout(Command::new(&tool), "echoer", Duration::from_secs(5), dir.path()).unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "failer", "echo 'bad input' >&2; exit 3");
        let err = run_with_timeout(Command::new(&tool), "failer", Duration::from_secs(5), dir.path()).unwrap_err();
        match err {
            ExternalToolError::NonZeroExit { stderr, .. } => assert_eq!(stderr, "bad input"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn slow_tool_is_killed_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "sleeper", "sleep 5");
        let started = Instant::now();
        let err = run_with_timeout(Command::new(&tool), "sleeper", Duration::from_millis(200), dir.path()).unwrap_err();
        assert!(matches!(err, ExternalToolError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_with_timeout(
            Command::new(dir.path().join("does-not-exist")),
            "ghost",
            Duration::from_secs(1),
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, ExternalToolError::Spawn { .. }));
    }
}
