//! Builder for executing external tool commands with timeout and
//! cancellation support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// The child is spawned with kill-on-drop, so when the timeout fires or the
/// cancellation token is triggered the external process is killed rather
/// than left running.
///
/// # Example
///
/// ```no_run
/// use sg_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> sg_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-show_entries", "format=duration"])
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    cancellation: Option<CancellationToken>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            cancellation: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Kill the process when `token` is cancelled.
    pub fn cancel_on(&mut self, token: CancellationToken) -> &mut Self {
        self.cancellation = Some(token);
        self
    }

    /// The argument list assembled so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// Non-empty stdout is logged at `info`, non-empty stderr at `error`.
    /// ffmpeg writes warnings to stderr even when it succeeds, so the exit
    /// status alone decides success.
    ///
    /// # Errors
    ///
    /// - Returns [`sg_core::Error::Tool`] if spawning the process fails.
    /// - Returns [`sg_core::Error::Tool`] if the process exits with a non-zero
    ///   status (message includes stderr).
    /// - Returns [`sg_core::Error::Tool`] if the process times out (message
    ///   starts with "timed out") or is cancelled (message is "cancelled").
    pub async fn execute(&self) -> sg_core::Result<ToolOutput> {
        let program_name = self.program_name();

        if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(sg_core::Error::tool(program_name, "cancelled"));
        }

        tracing::debug!(tool = %program_name, args = ?self.args, "spawning");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            sg_core::Error::tool(program_name.clone(), format!("failed to spawn: {e}"))
        })?;

        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        // Dropping `wait_with_output` drops the child, which kills it.
        let output = tokio::select! {
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => {
                match result {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        return Err(sg_core::Error::tool(
                            program_name,
                            format!("I/O error waiting for process: {e}"),
                        ));
                    }
                    Err(_elapsed) => {
                        tracing::error!(tool = %program_name, "timed out after {:?}", self.timeout);
                        return Err(sg_core::Error::tool(
                            program_name,
                            format!("timed out after {:?}", self.timeout),
                        ));
                    }
                }
            }
            _ = cancelled => {
                tracing::info!(tool = %program_name, "cancelled");
                return Err(sg_core::Error::tool(program_name, "cancelled"));
            }
        };

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        let stdout = tool_output.stdout.trim_end();
        if !stdout.is_empty() {
            tracing::info!(tool = %program_name, "{stdout}");
        }
        let stderr = tool_output.stderr.trim_end();
        if !stderr.is_empty() {
            tracing::error!(tool = %program_name, "{stderr}");
        }

        if !output.status.success() {
            return Err(sg_core::Error::tool(
                program_name,
                format!("exited with status {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(tool_output)
    }
}
