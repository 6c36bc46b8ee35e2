use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::config::SessionConfig;
use crate::error::LaunchError;
use crate::output::OutputBuffer;
use crate::pump::StreamKind;
use crate::session::{ExitCode, ProcessSession};

/// Result of a non-interactive run, e.g. a compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub command: String,
    pub exit: ExitCode,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// The run hit its time limit and was terminated.
    pub timed_out: bool,
}

impl Completed {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit.success()
    }
}

/// Run `command` with its stdin closed and collect both output streams.
///
/// Both streams are pumped while the command runs, so a chatty compiler can
/// never fill a pipe and stall. With a `timeout` the command is terminated
/// once the limit passes.
pub fn run_to_completion(
    command: &str,
    config: &SessionConfig,
    timeout: Option<Duration>,
) -> Result<Completed, LaunchError> {
    let output = Arc::new(OutputBuffer::new());
    let session = ProcessSession::start(command, config, output.clone())?;
    session.close_input();

    let (exit, timed_out) = match timeout {
        None => (session.wait(), false),
        Some(limit) => match session.wait_timeout(limit) {
            Some(exit) => (exit, false),
            None => {
                warn!("`{}` exceeded {limit:?}, terminating", session.command());
                session.terminate();
                (session.wait(), true)
            }
        },
    };

    Ok(Completed {
        command: session.command().to_string(),
        exit,
        stdout: output.lines(StreamKind::Stdout),
        stderr: output.lines(StreamKind::Stderr),
        timed_out,
    })
}
