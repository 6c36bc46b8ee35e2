//! sparring-proc: interactive process harness for sparring.
//!
//! This crate sits between a front end (terminal console, editor plugin) and
//! the program under test. It spawns the program, pumps its stdout and stderr
//! into line events, forwards user input to its stdin, and tracks its
//! lifecycle until it exits.
//!
//! # Architecture
//!
//! - [`StreamPump`]: Turns one output stream into line callbacks with blocking reads.
//! - [`InputChannel`]: Writes input fragments to the child and keeps a transcript.
//! - [`ProcessSession`]: Owns one child process, its pumps and its input channel.
//! - [`OutputBuffer`]: Append-only record of received lines, shared with the checker.
//! - [`Harness`]: Front-end facade: one fresh session per run, shared subscribers.

pub mod command;
pub mod compile;
pub mod config;
pub mod error;
pub mod harness;
pub mod input;
pub mod output;
pub mod pump;
pub mod session;
mod signal;

pub use command::CommandLine;
pub use compile::{run_to_completion, Completed};
pub use config::SessionConfig;
pub use error::{FaultSource, InputError, LaunchError, StreamFault};
pub use harness::Harness;
pub use input::InputChannel;
pub use output::{ChannelObserver, Fragment, Observers, OutputBuffer, SessionEvent, SessionObserver};
pub use pump::{PumpExit, PumpOutcome, StreamKind, StreamPump};
pub use session::{ExitCode, Pid, ProcessSession, SessionState};
