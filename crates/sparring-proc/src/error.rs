use std::fmt;
use std::io;

use thiserror::Error;

use crate::pump::StreamKind;

/// The child process could not be started. No session exists afterwards.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),
    #[error("failed to start session thread: {0}")]
    Thread(#[source] io::Error),
}

/// Errors from [`crate::InputChannel::send`].
#[derive(Debug, Error)]
pub enum InputError {
    /// The session is not running or its stdin was closed.
    #[error("input channel is closed")]
    Closed,
    #[error("failed to write to child stdin: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
}

/// Which of the child's three streams a fault was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultSource {
    Stdin,
    Output(StreamKind),
}

impl fmt::Display for FaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultSource::Stdin => f.write_str("stdin"),
            FaultSource::Output(kind) => write!(f, "{kind}"),
        }
    }
}

/// An unexpected read or write failure while the child was still alive.
///
/// Faults are recovered locally: the affected pump or channel stops and the
/// session is marked degraded, but keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stream} fault: {message}")]
pub struct StreamFault {
    pub stream: FaultSource,
    pub message: String,
}

impl StreamFault {
    pub fn new(stream: FaultSource, message: impl Into<String>) -> Self {
        Self {
            stream,
            message: message.into(),
        }
    }
}
