use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::compile::{run_to_completion, Completed};
use crate::config::SessionConfig;
use crate::error::{InputError, LaunchError};
use crate::output::{Observers, SessionObserver};
use crate::session::{ExitCode, ProcessSession};

/// The interface a front end drives.
///
/// Holds the subscribers and at most one session. Every [`run`](Self::run)
/// creates a fresh session; a previous one is terminated and waited for
/// first, so two children of the same harness never run at once.
pub struct Harness {
    config: SessionConfig,
    observers: Observers,
    session: Option<ProcessSession>,
    runs: u64,
}

impl Harness {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            observers: Observers::new(),
            session: None,
            runs: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Register an observer for every future run.
    pub fn subscribe(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Start `command` in a new session.
    pub fn run(&mut self, command: &str) -> Result<&ProcessSession, LaunchError> {
        if let Some(previous) = self.session.take() {
            previous.terminate();
            let code = previous.wait();
            info!("Replaced session for `{}` ({code})", previous.command());
        }

        let session = ProcessSession::start(command, &self.config, Arc::new(self.observers.clone()))?;
        self.runs += 1;
        Ok(self.session.insert(session))
    }

    /// Run a build command to completion, outside the interactive session.
    pub fn compile(&self, command: &str, timeout: Option<Duration>) -> Result<Completed, LaunchError> {
        run_to_completion(command, &self.config, timeout)
    }

    pub fn session(&self) -> Option<&ProcessSession> {
        self.session.as_ref()
    }

    /// Forward input to the current session.
    pub fn send(&self, text: &str) -> Result<(), InputError> {
        self.session.as_ref().ok_or(InputError::Closed)?.send(text)
    }

    pub fn close_input(&self) -> bool {
        self.session.as_ref().is_some_and(ProcessSession::close_input)
    }

    pub fn terminate(&self) {
        if let Some(session) = &self.session {
            session.terminate();
        }
    }

    /// Wait for the current session to end. `None` if nothing was run.
    pub fn wait(&self) -> Option<ExitCode> {
        self.session.as_ref().map(ProcessSession::wait)
    }

    /// Number of sessions started so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
