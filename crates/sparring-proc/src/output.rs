//! Subscription side of a session: observers, the output buffer, and the
//! channel adapter used by front ends that want events instead of callbacks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::error::StreamFault;
use crate::pump::StreamKind;
use crate::session::SessionState;

/// Receives session events.
///
/// Callbacks run on the session's worker threads (pump threads for lines,
/// the waiter thread for most state changes), so implementations must be
/// quick and must not block on the session itself.
pub trait SessionObserver: Send + Sync {
    fn on_line(&self, _stream: StreamKind, _text: &str) {}

    fn on_state_change(&self, _state: &SessionState) {}

    fn on_fault(&self, _fault: &StreamFault) {}
}

/// Fans every event out to a list of observers, in registration order.
#[derive(Clone, Default)]
pub struct Observers {
    inner: Vec<Arc<dyn SessionObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn SessionObserver>) {
        self.inner.push(observer);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SessionObserver for Observers {
    fn on_line(&self, stream: StreamKind, text: &str) {
        for observer in &self.inner {
            observer.on_line(stream, text);
        }
    }

    fn on_state_change(&self, state: &SessionState) {
        for observer in &self.inner {
            observer.on_state_change(state);
        }
    }

    fn on_fault(&self, fault: &StreamFault) {
        for observer in &self.inner {
            observer.on_fault(fault);
        }
    }
}

/// One line received from the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub stream: StreamKind,
    pub text: String,
}

/// Append-only record of everything the child printed.
///
/// Both pumps append concurrently; each append is atomic. Order is FIFO per
/// stream, but nothing is promised about stdout versus stderr.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    fragments: Mutex<Vec<Fragment>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, stream: StreamKind, text: &str) {
        self.lock().push(Fragment {
            stream,
            text: text.to_string(),
        });
    }

    /// Snapshot of all fragments received so far.
    pub fn fragments(&self) -> Vec<Fragment> {
        self.lock().clone()
    }

    /// Lines of a single stream, in arrival order.
    pub fn lines(&self, stream: StreamKind) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|f| f.stream == stream)
            .map(|f| f.text.clone())
            .collect()
    }

    /// A single stream rendered back to text, one line per fragment.
    pub fn stream_text(&self, stream: StreamKind) -> String {
        render(self.lock().iter().filter(|f| f.stream == stream))
    }

    /// Both streams rendered in arrival order.
    pub fn text(&self) -> String {
        render(self.lock().iter())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Fragment>> {
        self.fragments.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn render<'a>(fragments: impl Iterator<Item = &'a Fragment>) -> String {
    let mut text = String::new();
    for fragment in fragments {
        text.push_str(&fragment.text);
        text.push('\n');
    }
    text
}

impl SessionObserver for OutputBuffer {
    fn on_line(&self, stream: StreamKind, text: &str) {
        self.append(stream, text);
    }
}

/// Channel form of the observer callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Line { stream: StreamKind, text: String },
    State(SessionState),
    Fault(StreamFault),
}

/// Forwards every callback into an unbounded tokio channel.
///
/// The receiving side may live on any thread; `blocking_recv` works outside
/// a runtime. Events are dropped once the receiver is gone.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn on_line(&self, stream: StreamKind, text: &str) {
        let _ = self.tx.send(SessionEvent::Line {
            stream,
            text: text.to_string(),
        });
    }

    fn on_state_change(&self, state: &SessionState) {
        let _ = self.tx.send(SessionEvent::State(state.clone()));
    }

    fn on_fault(&self, fault: &StreamFault) {
        let _ = self.tx.send(SessionEvent::Fault(fault.clone()));
    }
}
