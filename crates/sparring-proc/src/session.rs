use std::fmt;
use std::io;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, ExitStatus};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::command::CommandLine;
use crate::config::SessionConfig;
use crate::error::{FaultSource, InputError, LaunchError, StreamFault};
use crate::input::InputChannel;
use crate::output::SessionObserver;
use crate::pump::{PumpExit, PumpOutcome, StreamKind, StreamPump};
use crate::signal;

/// OS process id of a session's child.
pub type Pid = u32;

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Exited(i32),
    /// Killed by this signal number (unix only).
    Signaled(i32),
    Unknown,
}

impl ExitCode {
    pub fn code(self) -> Option<i32> {
        match self {
            ExitCode::Exited(code) => Some(code),
            _ => None,
        }
    }

    pub fn success(self) -> bool {
        self == ExitCode::Exited(0)
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitCode::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return ExitCode::Signaled(sig);
            }
        }
        ExitCode::Unknown
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Exited(code) => write!(f, "exit code {code}"),
            ExitCode::Signaled(sig) => write!(f, "signal {sig}"),
            ExitCode::Unknown => f.write_str("unknown status"),
        }
    }
}

/// Lifecycle of a session. Terminated is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Terminated(ExitCode),
}

impl SessionState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated(_))
    }

    pub fn exit_code(&self) -> Option<ExitCode> {
        match self {
            SessionState::Terminated(code) => Some(*code),
            _ => None,
        }
    }
}

struct Lifecycle {
    state: SessionState,
    /// The child has been reaped; its pid must not be signalled any more.
    exited: bool,
    terminating: bool,
    stdout_active: bool,
    stderr_active: bool,
    faults: Vec<StreamFault>,
}

impl Lifecycle {
    fn pump_active(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Stdout => self.stdout_active,
            StreamKind::Stderr => self.stderr_active,
        }
    }

    fn set_pump_active(&mut self, kind: StreamKind, active: bool) {
        match kind {
            StreamKind::Stdout => self.stdout_active = active,
            StreamKind::Stderr => self.stderr_active = active,
        }
    }

    fn draining(&self) -> bool {
        self.stdout_active || self.stderr_active
    }

    fn all_streams_faulted(&self) -> bool {
        [
            FaultSource::Stdin,
            FaultSource::Output(StreamKind::Stdout),
            FaultSource::Output(StreamKind::Stderr),
        ]
        .iter()
        .all(|source| self.faults.iter().any(|f| f.stream == *source))
    }
}

/// State shared between the session handle and its worker threads.
///
/// The lifecycle and input locks are never held at the same time, and no lock
/// is held while observers run.
struct Shared {
    pid: Pid,
    lifecycle: Mutex<Lifecycle>,
    changed: Condvar,
    input: Mutex<InputChannel<ChildStdin>>,
    observer: Arc<dyn SessionObserver>,
    grace_period: Duration,
    drain_timeout: Duration,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn input(&self) -> MutexGuard<'_, InputChannel<ChildStdin>> {
        self.input.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, state: SessionState) {
        self.lifecycle().state = state.clone();
        self.changed.notify_all();
        self.observer.on_state_change(&state);
    }

    fn report_fault(self: &Arc<Self>, fault: StreamFault) {
        let give_up = {
            let mut lc = self.lifecycle();
            lc.faults.push(fault.clone());
            lc.all_streams_faulted()
        };
        warn!("PID {}: {fault}", self.pid);
        self.observer.on_fault(&fault);

        if give_up {
            warn!("PID {}: every stream has faulted, terminating", self.pid);
            self.terminate();
        }
    }

    fn pump_finished(self: &Arc<Self>, exit: PumpExit) {
        let kind = exit.kind;
        let fault = match exit.outcome {
            PumpOutcome::Eof => {
                debug!("PID {}: {kind} closed after {} lines", self.pid, exit.lines);
                None
            }
            PumpOutcome::Stopped => {
                debug!("PID {}: {kind} pump stopped", self.pid);
                None
            }
            PumpOutcome::Failed(err) => {
                if self.lifecycle().exited {
                    debug!("PID {}: {kind} read failed after exit: {err}", self.pid);
                    None
                } else {
                    Some(StreamFault::new(FaultSource::Output(kind), err.to_string()))
                }
            }
        };

        self.lifecycle().set_pump_active(kind, false);
        self.changed.notify_all();

        if let Some(fault) = fault {
            self.report_fault(fault);
        }
    }

    /// SIGTERM now, SIGKILL after the grace period. Idempotent.
    fn terminate(self: &Arc<Self>) {
        {
            let mut lc = self.lifecycle();
            if lc.exited || lc.terminating {
                return;
            }
            lc.terminating = true;
            // Signalled under the lock so the waiter cannot reap in between.
            signal::request_stop(self.pid);
        }

        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("sparring-reaper-{}", self.pid))
            .spawn(move || shared.escalate());
        if let Err(e) = spawned {
            warn!("PID {}: no reaper thread ({e}), killing now", self.pid);
            self.force_kill();
        }
    }

    fn escalate(&self) {
        let lc = self.lifecycle();
        let (lc, _) = self
            .changed
            .wait_timeout_while(lc, self.grace_period, |lc| !lc.exited)
            .unwrap_or_else(PoisonError::into_inner);

        if !lc.exited {
            warn!(
                "PID {} still running {:?} after termination request, killing",
                self.pid, self.grace_period
            );
            signal::force_kill(self.pid);
        }
    }

    fn force_kill(&self) {
        let lc = self.lifecycle();
        if !lc.exited {
            signal::force_kill(self.pid);
        }
    }

    /// Body of the waiter thread: reap, release stdin, drain, publish.
    fn wait_for_exit(&self, mut child: Child, stops: [mpsc::Sender<()>; 2]) {
        let code = match child.wait() {
            Ok(status) => ExitCode::from(status),
            Err(e) => {
                warn!("PID {}: wait failed: {e}", self.pid);
                ExitCode::Unknown
            }
        };
        self.lifecycle().exited = true;
        self.changed.notify_all();
        info!("PID {} exited with {code}", self.pid);

        self.input().close();

        let drained = {
            let lc = self.lifecycle();
            let (lc, _) = self
                .changed
                .wait_timeout_while(lc, self.drain_timeout, |lc| lc.draining())
                .unwrap_or_else(PoisonError::into_inner);
            !lc.draining()
        };
        if !drained {
            // Something the child spawned still holds the pipes open.
            warn!("PID {}: output still open after exit, detaching pumps", self.pid);
            for stop in &stops {
                let _ = stop.try_send(());
            }
        }

        self.transition(SessionState::Terminated(code));
    }
}

/// One run of an external program.
///
/// Owns the child, two pump threads (stdout, stderr), a waiter thread and the
/// stdin channel. Every pipe is owned by exactly one of them and closed when
/// that owner is dropped. Dropping a session whose child is still alive
/// requests termination.
pub struct ProcessSession {
    command: CommandLine,
    shared: Arc<Shared>,
}

impl ProcessSession {
    /// Launch `command` and start pumping its output into `observer`.
    ///
    /// Fails with [`LaunchError`] if the command is blank or cannot be
    /// spawned; in that case nothing is left running.
    pub fn start(
        command: &str,
        config: &SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, LaunchError> {
        let line = CommandLine::parse(command, config.shell)?;
        let mut child = line
            .to_command(config)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: line.to_string(),
                source,
            })?;
        let pid = child.id();

        let (stdin, stdout, stderr) = match take_pipes(&mut child) {
            Ok(pipes) => pipes,
            Err(e) => {
                discard(&mut child);
                return Err(e);
            }
        };
        info!("Spawned `{line}` (PID: {pid})");

        let shared = Arc::new(Shared {
            pid,
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Starting,
                exited: false,
                terminating: false,
                stdout_active: true,
                stderr_active: true,
                faults: Vec::new(),
            }),
            changed: Condvar::new(),
            input: Mutex::new(InputChannel::new(stdin)),
            observer,
            grace_period: config.grace_period(),
            drain_timeout: config.drain_timeout(),
        });
        shared.transition(SessionState::Running);

        let (stdout_stop_tx, stdout_stop_rx) = mpsc::channel::<()>(1);
        let (stderr_stop_tx, stderr_stop_rx) = mpsc::channel::<()>(1);

        let pumps = start_pump_thread(
            &shared,
            StreamPump::new(StreamKind::Stdout, stdout).with_stop(stdout_stop_rx),
        )
        .and_then(|()| {
            start_pump_thread(
                &shared,
                StreamPump::new(StreamKind::Stderr, stderr).with_stop(stderr_stop_rx),
            )
        });
        if let Err(e) = pumps {
            discard(&mut child);
            shared.lifecycle().exited = true;
            shared.input().close();
            shared.transition(SessionState::Terminated(ExitCode::Unknown));
            return Err(LaunchError::Thread(e));
        }

        let waiter = Arc::clone(&shared);
        let stops = [stdout_stop_tx, stderr_stop_tx];
        if let Err(e) = thread::Builder::new()
            .name(format!("sparring-wait-{pid}"))
            .spawn(move || waiter.wait_for_exit(child, stops))
        {
            // The child went down with the closure; it can only be reached by pid.
            shared.force_kill();
            shared.lifecycle().exited = true;
            shared.input().close();
            shared.transition(SessionState::Terminated(ExitCode::Unknown));
            return Err(LaunchError::Thread(e));
        }

        Ok(Self {
            command: line,
            shared,
        })
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn pid(&self) -> Pid {
        self.shared.pid
    }

    pub fn state(&self) -> SessionState {
        self.shared.lifecycle().state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lifecycle().state == SessionState::Running
    }

    /// Whether any stream has faulted while the child was alive.
    pub fn is_degraded(&self) -> bool {
        !self.shared.lifecycle().faults.is_empty()
    }

    pub fn faults(&self) -> Vec<StreamFault> {
        self.shared.lifecycle().faults.clone()
    }

    pub fn pump_active(&self, kind: StreamKind) -> bool {
        self.shared.lifecycle().pump_active(kind)
    }

    /// Everything sent to the child so far.
    pub fn transcript(&self) -> String {
        self.shared.input().transcript().to_string()
    }

    /// Write `text` to the child's stdin and flush it.
    ///
    /// Rejected with [`InputError::Closed`] unless the session is running and
    /// its stdin is still open. A write failure is also reported to the
    /// observers as a stdin fault.
    pub fn send(&self, text: &str) -> Result<(), InputError> {
        if !self.is_running() {
            return Err(InputError::Closed);
        }
        let result = self.shared.input().send(text);
        if let Err(InputError::Write { source }) = &result {
            self.shared
                .report_fault(StreamFault::new(FaultSource::Stdin, source.to_string()));
        }
        result
    }

    /// Close the child's stdin so it sees end-of-input. Returns `false` if it
    /// was already closed.
    pub fn close_input(&self) -> bool {
        let closed = self.shared.input().close();
        if closed {
            debug!("PID {}: stdin closed", self.shared.pid);
        }
        closed
    }

    /// Block until the session is terminated and all output was delivered.
    ///
    /// Any number of threads may wait at once. Do not call this from a thread
    /// that has to stay responsive.
    pub fn wait(&self) -> ExitCode {
        let lc = self.shared.lifecycle();
        let lc = self
            .shared
            .changed
            .wait_while(lc, |lc| !lc.state.is_terminated())
            .unwrap_or_else(PoisonError::into_inner);
        lc.state.exit_code().unwrap_or(ExitCode::Unknown)
    }

    /// Like [`wait`](Self::wait), giving up after `limit`.
    pub fn wait_timeout(&self, limit: Duration) -> Option<ExitCode> {
        let lc = self.shared.lifecycle();
        let (lc, _) = self
            .shared
            .changed
            .wait_timeout_while(lc, limit, |lc| !lc.state.is_terminated())
            .unwrap_or_else(PoisonError::into_inner);
        lc.state.exit_code()
    }

    /// Ask the child (and its process group) to stop.
    ///
    /// Sends SIGTERM and escalates to SIGKILL if the child is still alive
    /// after the configured grace period. Does nothing once the child has
    /// exited or a termination is already under way. Never blocks.
    pub fn terminate(&self) {
        self.shared.terminate();
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        self.shared.terminate();
    }
}

impl fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSession")
            .field("command", &self.command.to_string())
            .field("pid", &self.shared.pid)
            .field("state", &self.state())
            .finish()
    }
}

fn take_pipes(child: &mut Child) -> Result<(ChildStdin, ChildStdout, ChildStderr), LaunchError> {
    let stdin = child.stdin.take().ok_or(LaunchError::MissingPipe("stdin"))?;
    let stdout = child.stdout.take().ok_or(LaunchError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(LaunchError::MissingPipe("stderr"))?;
    Ok((stdin, stdout, stderr))
}

/// Kill and reap a child that never became a session.
fn discard(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill PID {}: {e}", child.id());
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap PID {}: {e}", child.id());
    }
}

/// Run a pump on its own OS thread; reads there block without holding any
/// session lock.
fn start_pump_thread<R>(shared: &Arc<Shared>, pump: StreamPump<R>) -> io::Result<()>
where
    R: io::Read + Send + 'static,
{
    let kind = pump.kind();
    let shared = Arc::clone(shared);
    thread::Builder::new()
        .name(format!("sparring-{kind}-{}", shared.pid))
        .spawn(move || {
            let exit = pump.run(|line| shared.observer.on_line(kind, line));
            shared.pump_finished(exit);
        })
        .map(|_| ())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::output::OutputBuffer;
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<SessionState>>,
        faults: Mutex<Vec<StreamFault>>,
    }

    impl SessionObserver for Recorder {
        fn on_state_change(&self, state: &SessionState) {
            self.states.lock().unwrap().push(state.clone());
        }

        fn on_fault(&self, fault: &StreamFault) {
            self.faults.lock().unwrap().push(fault.clone());
        }
    }

    fn shell() -> SessionConfig {
        SessionConfig::default().with_shell(true)
    }

    fn start(command: &str) -> (ProcessSession, Arc<OutputBuffer>) {
        let output = Arc::new(OutputBuffer::new());
        let session = ProcessSession::start(command, &shell(), output.clone())
            .unwrap_or_else(|e| panic!("failed to start `{command}`: {e}"));
        (session, output)
    }

    fn wait_for_line(output: &OutputBuffer, kind: StreamKind, line: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if output.lines(kind).iter().any(|l| l == line) {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("never saw {line:?} on {kind}");
    }

    fn tokens(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn test_exit_code_is_reported() {
        let (session, _) = start("exit 3");
        assert_eq!(session.wait(), ExitCode::Exited(3));
        assert_eq!(session.state(), SessionState::Terminated(ExitCode::Exited(3)));
        assert!(!session.is_running());
    }

    #[test]
    fn test_blank_command_creates_no_session() {
        let result = ProcessSession::start("   ", &SessionConfig::default(), Arc::new(OutputBuffer::new()));
        assert!(matches!(result, Err(LaunchError::EmptyCommand)));
    }

    #[test]
    fn test_missing_executable_is_a_launch_error() {
        let result = ProcessSession::start(
            "/definitely/not/a/real/program --flag",
            &SessionConfig::default(),
            Arc::new(OutputBuffer::new()),
        );
        match result {
            Err(LaunchError::Spawn { command, source }) => {
                assert!(command.starts_with("/definitely/not/a/real/program"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[test]
    fn test_shell_mode_reports_missing_program_as_exit_status() {
        let (session, _) = start("/definitely/not/a/real/program");
        assert_eq!(session.wait(), ExitCode::Exited(127));
    }

    #[test]
    fn test_echo_child_output_matches_transcript() {
        let (session, output) = start("cat");
        assert!(session.is_running());

        session.send("3\n").unwrap();
        session.send("10 20 ").unwrap();
        session.send("30\n").unwrap();
        assert!(session.close_input());
        assert!(!session.close_input());

        assert_eq!(session.wait(), ExitCode::Exited(0));
        assert_eq!(session.transcript(), "3\n10 20 30\n");
        assert_eq!(
            tokens(&output.stream_text(StreamKind::Stdout)),
            tokens(&session.transcript())
        );
    }

    #[test]
    fn test_interactive_round_trip() {
        let (session, output) = start("while read n; do echo $((n * 2)); done");

        session.send("21\n").unwrap();
        wait_for_line(&output, StreamKind::Stdout, "42");

        session.send("5\n").unwrap();
        wait_for_line(&output, StreamKind::Stdout, "10");

        session.close_input();
        assert_eq!(session.wait(), ExitCode::Exited(0));
        assert_eq!(output.lines(StreamKind::Stdout), ["42", "10"]);
    }

    #[test]
    fn test_stderr_is_captured_separately() {
        let (session, output) = start("echo out; echo err 1>&2; printf tail");
        session.wait();

        assert_eq!(output.lines(StreamKind::Stdout), ["out", "tail"]);
        assert_eq!(output.lines(StreamKind::Stderr), ["err"]);
    }

    #[test]
    fn test_output_is_drained_before_terminated() {
        let (session, output) = start("seq 1 2000");
        session.wait();

        let lines = output.lines(StreamKind::Stdout);
        assert_eq!(lines.len(), 2000);
        assert_eq!(lines.last().map(String::as_str), Some("2000"));
        assert!(!session.pump_active(StreamKind::Stdout));
        assert!(!session.pump_active(StreamKind::Stderr));
    }

    #[test]
    fn test_state_changes_are_published_in_order() {
        let recorder = Arc::new(Recorder::default());
        let session =
            ProcessSession::start("true", &SessionConfig::default(), recorder.clone()).unwrap();
        session.wait();

        let states = recorder.states.lock().unwrap().clone();
        assert_eq!(
            states,
            [
                SessionState::Running,
                SessionState::Terminated(ExitCode::Exited(0))
            ]
        );
    }

    #[test]
    fn test_send_after_exit_is_rejected() {
        let (session, _) = start("true");
        session.wait();
        assert!(matches!(session.send("late\n"), Err(InputError::Closed)));
        assert_eq!(session.transcript(), "");
    }

    #[test]
    fn test_terminate_stops_sleeping_child() {
        let (session, _) = start("sleep 30");
        session.terminate();
        session.terminate();

        let code = session
            .wait_timeout(Duration::from_secs(5))
            .expect("terminate should end the child");
        assert_eq!(code, ExitCode::Signaled(nix::libc::SIGTERM));

        // Already terminated: ignored.
        session.terminate();
        assert_eq!(session.wait(), code);
    }

    #[test]
    fn test_terminate_escalates_when_sigterm_is_ignored() {
        let output = Arc::new(OutputBuffer::new());
        let config = shell().with_grace_period(Duration::from_millis(300));
        let session = ProcessSession::start(
            "trap '' TERM; echo ready; while :; do sleep 1; done",
            &config,
            output.clone(),
        )
        .unwrap();
        wait_for_line(&output, StreamKind::Stdout, "ready");

        let started = Instant::now();
        session.terminate();
        let code = session
            .wait_timeout(Duration::from_secs(10))
            .expect("escalation should kill the child");

        assert_eq!(code, ExitCode::Signaled(nix::libc::SIGKILL));
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_wait_from_many_threads() {
        let (session, _) = start("sleep 0.2; exit 7");
        let session = Arc::new(session);

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let session = Arc::clone(&session);
                thread::spawn(move || session.wait())
            })
            .collect();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), ExitCode::Exited(7));
        }
    }

    #[test]
    fn test_write_to_closed_stdin_is_a_fault() {
        let recorder = Arc::new(Recorder::default());
        let session = ProcessSession::start(
            "exec 0<&-; echo closed; sleep 5",
            &shell(),
            recorder.clone(),
        )
        .unwrap();

        // The child closed its stdin; writes fail with EPIPE once it has.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut result = Ok(());
        while Instant::now() < deadline {
            result = session.send("ping\n");
            if result.is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        assert!(matches!(result, Err(InputError::Write { .. })));
        assert!(session.is_degraded());
        assert!(session.is_running(), "a stdin fault alone must not end the session");
        assert_eq!(
            recorder.faults.lock().unwrap()[0].stream,
            FaultSource::Stdin
        );
        assert!(matches!(session.send("again\n"), Err(InputError::Closed)));
        session.terminate();
        session.wait();
    }

    fn read_failure(kind: StreamKind) -> PumpExit {
        PumpExit {
            kind,
            lines: 0,
            outcome: PumpOutcome::Failed(io::Error::other("read failed")),
        }
    }

    #[test]
    fn test_all_streams_faulted_needs_every_stream() {
        let mut lc = Lifecycle {
            state: SessionState::Running,
            exited: false,
            terminating: false,
            stdout_active: true,
            stderr_active: true,
            faults: Vec::new(),
        };
        assert!(!lc.all_streams_faulted());

        lc.faults.push(StreamFault::new(FaultSource::Output(StreamKind::Stdout), "x"));
        lc.faults.push(StreamFault::new(FaultSource::Output(StreamKind::Stdout), "again"));
        lc.faults.push(StreamFault::new(FaultSource::Output(StreamKind::Stderr), "x"));
        assert!(!lc.all_streams_faulted());

        lc.faults.push(StreamFault::new(FaultSource::Stdin, "x"));
        assert!(lc.all_streams_faulted());
    }

    #[test]
    fn test_read_error_while_running_degrades_session() {
        let recorder = Arc::new(Recorder::default());
        let session =
            ProcessSession::start("sleep 30", &SessionConfig::default(), recorder.clone()).unwrap();
        assert!(!session.is_degraded());

        session.shared.pump_finished(read_failure(StreamKind::Stdout));

        assert!(session.is_degraded());
        assert!(session.is_running());
        assert!(!session.pump_active(StreamKind::Stdout));
        assert!(session.pump_active(StreamKind::Stderr));
        let faults = recorder.faults.lock().unwrap().clone();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].stream, FaultSource::Output(StreamKind::Stdout));
        assert_eq!(session.faults(), faults);

        session.terminate();
        session.wait();
    }

    #[test]
    fn test_read_error_after_exit_is_silent() {
        let recorder = Arc::new(Recorder::default());
        let session =
            ProcessSession::start("true", &SessionConfig::default(), recorder.clone()).unwrap();
        session.wait();

        session.shared.pump_finished(read_failure(StreamKind::Stderr));

        assert!(!session.is_degraded());
        assert!(recorder.faults.lock().unwrap().is_empty());
    }

    #[test]
    fn test_child_is_terminated_only_when_every_stream_faulted() {
        let recorder = Arc::new(Recorder::default());
        let session =
            ProcessSession::start("sleep 30", &SessionConfig::default(), recorder.clone()).unwrap();

        session.shared.pump_finished(read_failure(StreamKind::Stdout));
        session.shared.pump_finished(read_failure(StreamKind::Stderr));
        assert_eq!(session.wait_timeout(Duration::from_millis(200)), None);
        assert!(session.is_running());

        session
            .shared
            .report_fault(StreamFault::new(FaultSource::Stdin, "broken pipe"));
        let code = session
            .wait_timeout(Duration::from_secs(5))
            .expect("the last fault should end the child");
        assert_eq!(code, ExitCode::Signaled(nix::libc::SIGTERM));
        assert_eq!(recorder.faults.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_lingering_grandchild_does_not_block_wait() {
        // The backgrounded sleep keeps both pipes open after the shell exits.
        let (session, output) = start("sleep 4 & echo hi");

        let started = Instant::now();
        let code = session
            .wait_timeout(Duration::from_secs(3))
            .expect("drain timeout should release the waiter");

        assert_eq!(code, ExitCode::Exited(0));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(output.lines(StreamKind::Stdout), ["hi"]);
    }

    #[test]
    fn test_drop_terminates_child() {
        let (session, _) = start("sleep 30");
        let pid = session.pid();
        drop(session);

        let target = nix::unistd::Pid::from_raw(pid as i32);
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            // Reaped children vanish; ESRCH means it is gone.
            if nix::sys::signal::kill(target, None).is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("child {pid} survived its session");
    }
}
