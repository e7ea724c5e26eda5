//! Running external programs.
//!
//! [`ExternalProcess`] describes one invocation: the program, its arguments,
//! the working directory and an optional bound on how long to wait. Running it
//! captures both output streams and classifies what went wrong, so callers never
//! have to inspect raw `io::Error`s.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("program '{program}' not found")]
    NotFound { program: String },

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `None` when the process was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn describe_status(&self) -> String {
        match self.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExternalProcess {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ExternalProcess {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Locate the executable on `PATH`.
    ///
    /// Programs given as a path are resolved against the working directory the
    /// process will run in.
    pub fn resolve_program(&self) -> Result<PathBuf, ProcessError> {
        let cwd = match &self.current_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?,
        };

        which::which_in(&self.program, std::env::var_os("PATH"), &cwd).map_err(|_| {
            ProcessError::NotFound {
                program: self.program.clone(),
            }
        })
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is not an error here; inspect [`ProcessOutput::success`].
    /// When the timeout elapses the child is killed.
    pub async fn run(&self) -> Result<ProcessOutput, ProcessError> {
        let executable = self.resolve_program()?;
        log::debug!(
            "Spawning {} {:?} in {}",
            executable.display(),
            self.args,
            self.current_dir
                .as_deref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| ".".to_string())
        );

        let mut command = Command::new(&executable);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let child = command.spawn().map_err(|source| {
            // ENOENT also covers a missing working directory, which is not a
            // missing program.
            let cwd_missing = self.current_dir.as_deref().is_some_and(|d| !d.is_dir());
            if source.kind() == std::io::ErrorKind::NotFound && !cwd_missing {
                ProcessError::NotFound {
                    program: self.program.clone(),
                }
            } else {
                ProcessError::Spawn {
                    program: self.program.clone(),
                    source,
                }
            }
        })?;

        // Dropping the future on timeout drops the child, which kills it.
        let wait = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ProcessError::TimedOut {
                        program: self.program.clone(),
                        timeout: limit,
                    })
                }
            },
            None => wait.await,
        }
        .map_err(|source| ProcessError::Wait {
            program: self.program.clone(),
            source,
        })?;

        Ok(ProcessOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_captures_streams_and_status() {
        let output = ExternalProcess::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 4")
            .run()
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.code(), Some(4));
        assert_eq!(output.describe_status(), "exit code 4");
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().canonicalize().unwrap();

        let output = ExternalProcess::new("sh")
            .args(["-c", "pwd -P"])
            .current_dir(&dir)
            .run()
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(PathBuf::from(output.stdout.trim()), dir);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = ExternalProcess::new("sphinx-prebuild-no-such-tool")
            .run()
            .await;
        assert!(matches!(result, Err(ProcessError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_working_directory_is_not_a_missing_program() {
        let temp_dir = TempDir::new().unwrap();
        let result = ExternalProcess::new("sh")
            .args(["-c", "true"])
            .current_dir(temp_dir.path().join("gone"))
            .run()
            .await;
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("finished");
        let started = Instant::now();

        let result = ExternalProcess::new("sh")
            .args(["-c", "sleep 1; touch \"$0\""])
            .arg(marker.as_os_str())
            .timeout(Some(Duration::from_millis(200)))
            .run()
            .await;

        assert!(matches!(result, Err(ProcessError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));

        // Past the point where a surviving shell would have written the marker.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }
}
