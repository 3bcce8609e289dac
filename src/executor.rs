//! Command execution with bounded risk.
//!
//! The [`ExecutionGate`] is the last stop before a command reaches the
//! operating system: it re-checks the command through the safety
//! classifier (an incomplete command can never run) and delegates to a
//! [`ProcessRunner`] with a hard timeout.
//!
//! A non-zero exit code and a timeout are both ordinary, reported
//! outcomes. The only hard failure is a command that could not be launched
//! at all.

use crate::error::{GateError, IncompleteCommandError, LaunchError};
use crate::safety::{self, RiskVerdict};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// What happened when a command ran.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Exit code of the process; `None` when it was killed by a signal or
    /// timed out before exiting.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

// =============================================================================
// Traits for Dependency Injection
// =============================================================================

/// Trait for running shell commands.
///
/// This abstraction enables testing the gate and the interactive flow
/// without spawning real processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs a command with a timeout, capturing stdout/stderr.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] only when the process cannot be started.
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, LaunchError>;
}

// =============================================================================
// Default Implementation
// =============================================================================

/// Process runner spawning `sh -c <command>`.
///
/// On unix the child gets its own process group so a timeout can take the
/// whole tree down, best-effort.
pub struct ShellRunner;

/// Commands the shell resolves itself; `which` lookups do not apply.
const SHELL_BUILTINS: [&str; 8] = ["cd", "echo", "test", "true", "false", "exit", "set", ":"];

fn first_token(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, LaunchError> {
        // `sh -c` would happily launch and fail with exit 127; resolving the
        // program up front turns a missing binary into a proper launch error.
        if let Some(program) = first_token(command) {
            if !program.contains('/')
                && !SHELL_BUILTINS.contains(&program)
                && which::which(program).is_err()
            {
                return Err(LaunchError::NotFound(program.to_string()));
            }
        }

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let child = cmd.spawn().map_err(|e| LaunchError::Spawn(e.to_string()))?;
        #[cfg(unix)]
        let pid = child.id();

        info!("Executing command with {}s timeout: {}", timeout.as_secs(), command);

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ExecutionOutcome {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                duration: start.elapsed(),
                timed_out: false,
            }),
            Ok(Err(e)) => Err(LaunchError::Spawn(e.to_string())),
            Err(_elapsed) => {
                warn!("Command timed out after {:?}: {}", timeout, command);
                // Dropping the wait future kills the direct child
                // (kill_on_drop); the group signal reaches any descendants.
                #[cfg(unix)]
                if let Some(pid) = pid {
                    unsafe {
                        libc::kill(-(pid as i32), libc::SIGKILL);
                    }
                }
                Ok(ExecutionOutcome {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: start.elapsed(),
                    timed_out: true,
                })
            }
        }
    }
}

// =============================================================================
// Execution Gate
// =============================================================================

/// Safety-gated command execution.
pub struct ExecutionGate<R: ProcessRunner> {
    runner: R,
}

impl ExecutionGate<ShellRunner> {
    pub fn new() -> Self {
        Self { runner: ShellRunner }
    }
}

impl Default for ExecutionGate<ShellRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRunner> ExecutionGate<R> {
    /// Creates a gate with an injected runner (for testing).
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Classifies a command without running it.
    ///
    /// Callers use this to decide whether confirmation is needed; a command
    /// with unresolved placeholders is refused here and in [`Self::execute`].
    pub fn preflight(&self, command: &str) -> Result<RiskVerdict, IncompleteCommandError> {
        safety::classify(command)
    }

    /// Runs a finalized command.
    ///
    /// Never fails for a non-zero exit code or a timeout; both are reported
    /// in the returned [`ExecutionOutcome`].
    ///
    /// # Errors
    ///
    /// * [`GateError::Incomplete`] - the command still has placeholder spans
    /// * [`GateError::Launch`] - the process could not be started
    pub async fn execute(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, GateError> {
        safety::classify(command)?;
        let outcome = self.runner.run(command, cwd, timeout).await?;

        if outcome.timed_out {
            info!("Command timed out after {:?}", outcome.duration);
        } else {
            info!("Command finished with exit code {:?}", outcome.exit_code);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cwd() -> PathBuf {
        std::env::temp_dir()
    }

    // =========================================================================
    // Mock runner
    // =========================================================================

    /// Mock process runner for testing the gate without real processes.
    pub struct MockRunner {
        outcome: ExecutionOutcome,
    }

    impl MockRunner {
        fn with_exit(exit_code: i32, stdout: &str, stderr: &str) -> Self {
            Self {
                outcome: ExecutionOutcome {
                    exit_code: Some(exit_code),
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                    duration: Duration::from_millis(1),
                    timed_out: false,
                },
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for MockRunner {
        async fn run(
            &self,
            _command: &str,
            _cwd: &Path,
            _timeout: Duration,
        ) -> Result<ExecutionOutcome, LaunchError> {
            Ok(self.outcome.clone())
        }
    }

    // =========================================================================
    // Gate behavior
    // =========================================================================

    #[tokio::test]
    async fn test_gate_refuses_incomplete_command() {
        let gate = ExecutionGate::with_runner(MockRunner::with_exit(0, "", ""));
        let err = gate
            .execute("cp {SOURCE} /tmp/dest", &cwd(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Incomplete(_)));
    }

    #[tokio::test]
    async fn test_gate_reports_nonzero_exit_as_outcome() {
        let gate = ExecutionGate::with_runner(MockRunner::with_exit(3, "", "boom"));
        let outcome = gate
            .execute("some-tool --flag", &cwd(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.success());
        assert_eq!(outcome.stderr, "boom");
    }

    #[test]
    fn test_preflight_classifies_without_running() {
        let gate = ExecutionGate::with_runner(MockRunner::with_exit(0, "", ""));
        let verdict = gate.preflight("rm -rf /").unwrap();
        assert!(verdict.is_dangerous());
    }

    // =========================================================================
    // Shell runner (uses real `sh`)
    // =========================================================================

    #[tokio::test]
    async fn test_shell_runner_captures_stdout_and_exit_code() {
        let gate = ExecutionGate::new();
        let outcome = gate
            .execute("echo hello", &cwd(), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout.trim(), "hello");
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_shell_runner_nonzero_exit_is_not_an_error() {
        let gate = ExecutionGate::new();
        let outcome = gate
            .execute("sh -c 'exit 7'", &cwd(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(7));
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn test_shell_runner_timeout_returns_within_grace() {
        let gate = ExecutionGate::new();
        let started = Instant::now();
        let outcome = gate
            .execute("sleep 30", &cwd(), Duration::from_millis(200))
            .await
            .unwrap();
        assert!(outcome.timed_out);
        assert!(outcome.exit_code.is_none());
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "timeout must not block anywhere near the sleep duration"
        );
    }

    #[tokio::test]
    async fn test_shell_runner_missing_binary_is_launch_error() {
        let gate = ExecutionGate::new();
        let err = gate
            .execute(
                "definitely-not-a-real-binary-3141 --help",
                &cwd(),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        match err {
            GateError::Launch(LaunchError::NotFound(program)) => {
                assert_eq!(program, "definitely-not-a-real-binary-3141");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
