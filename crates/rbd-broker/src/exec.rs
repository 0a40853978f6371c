//! External command execution.
//!
//! Every interaction with the cluster goes through a [`CommandRunner`]. The
//! core components receive one at construction so tests can substitute a
//! scripted runner for the real process spawner.

use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use rbd_common::{BrokerError, BrokerResult};
use rustix::pipe::{PipeFlags, pipe_with};

/// Default upper bound on a single external invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of one external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output and standard error, interleaved as produced.
    pub output: String,
    /// Whether the process exited with status zero.
    pub success: bool,
}

impl CommandOutput {
    /// Successful output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }

    /// Failed output.
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
        }
    }
}

/// Executes external commands.
///
/// `Err` means the process could not be launched (or did not finish in time);
/// a process that ran and exited non-zero is reported through
/// [`CommandOutput::success`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and collect its combined output.
    async fn execute(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput>;
}

/// Broker steps, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `rbd create`.
    Create,
    /// `rbd map`.
    Map,
    /// `mkfs.*`.
    Format,
    /// `rbd unmap`.
    Unmap,
    /// `rbd remove`.
    Remove,
    /// `rbd list`.
    List,
    /// `rbd lock list`.
    LockList,
    /// `rbd lock remove`.
    LockRemove,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Map => write!(f, "map"),
            Self::Format => write!(f, "format"),
            Self::Unmap => write!(f, "unmap"),
            Self::Remove => write!(f, "remove"),
            Self::List => write!(f, "list"),
            Self::LockList => write!(f, "lock list"),
            Self::LockRemove => write!(f, "lock remove"),
        }
    }
}

/// Render a command line for logs and error messages.
#[must_use]
pub fn render(program: &Path, args: &[String]) -> String {
    if args.is_empty() {
        program.display().to_string()
    } else {
        format!("{} {}", program.display(), args.join(" "))
    }
}

/// Run one command, turning a launch failure into an execution error.
///
/// The output is returned whether or not the process succeeded; callers that
/// need to classify failures inspect it themselves.
pub(crate) async fn invoke(
    runner: &dyn CommandRunner,
    step: Step,
    program: &Path,
    args: Vec<String>,
) -> BrokerResult<CommandOutput> {
    let command = render(program, &args);
    tracing::debug!(%step, command = %command, "Executing");

    let output = runner.execute(program, &args).await.map_err(|e| {
        tracing::warn!(%step, command = %command, error = %e, "Failed to execute");
        BrokerError::execution(step.to_string(), format!("cannot execute {command}: {e}"))
    })?;

    tracing::debug!(%step, success = output.success, output = %output.output, "Command finished");
    Ok(output)
}

/// Run one command and require it to succeed.
///
/// `context` describes the operation for the error message, e.g.
/// `cannot map RBD image "vol1"`.
pub(crate) async fn invoke_checked(
    runner: &dyn CommandRunner,
    step: Step,
    program: &Path,
    args: Vec<String>,
    context: impl FnOnce() -> String,
) -> BrokerResult<CommandOutput> {
    let output = invoke(runner, step, program, args).await?;
    if output.success {
        return Ok(output);
    }
    Err(BrokerError::execution(
        step.to_string(),
        format!("{}: {}", context(), failure_detail(&output.output)),
    ))
}

fn failure_detail(output: &str) -> &str {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        "command exited with non-zero status"
    } else {
        trimmed
    }
}

/// Runs commands as child processes of the broker.
///
/// Stdout and stderr share one pipe so the captured text keeps the order the
/// tool wrote it in. Each invocation is bounded by a timeout; a command that
/// exceeds it is reported as failed but is left running.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    /// Create a runner with the default timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Set the per-command timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn execute(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        let program = program.to_path_buf();
        let args = args.to_vec();
        let task = tokio::task::spawn_blocking(move || run_combined(&program, &args));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined.map_err(io::Error::other)?,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("command did not finish within {:?}", self.timeout),
            )),
        }
    }
}

fn run_combined(program: &Path, args: &[String]) -> io::Result<CommandOutput> {
    let (reader, writer) = pipe_with(PipeFlags::CLOEXEC)?;
    let stderr = writer.try_clone()?;

    // The Command temporary owns the write ends; it is dropped at the end of
    // this statement so EOF arrives once the child exits.
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(stderr))
        .spawn()?;

    let mut raw = Vec::new();
    let read = std::fs::File::from(reader).read_to_end(&mut raw);
    let status = child.wait()?;
    read?;

    Ok(CommandOutput {
        output: String::from_utf8_lossy(&raw).into_owned(),
        success: status.success(),
    })
}
