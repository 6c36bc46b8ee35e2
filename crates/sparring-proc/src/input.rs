use std::io::Write;

use crate::error::InputError;

/// Forwards input fragments to the child's stdin.
///
/// Each fragment is written and flushed before `send` returns; nothing is
/// batched across calls. Everything that reached the child is kept in the
/// transcript. Once closed (explicitly, by a write failure, or because the
/// session ended) the channel rejects further input.
pub struct InputChannel<W> {
    sink: Option<W>,
    transcript: String,
}

impl<W: Write> InputChannel<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Some(sink),
            transcript: String::new(),
        }
    }

    /// Write `text` verbatim and flush it.
    ///
    /// A failed write closes the channel, releasing the sink.
    pub fn send(&mut self, text: &str) -> Result<(), InputError> {
        let sink = self.sink.as_mut().ok_or(InputError::Closed)?;

        match sink.write_all(text.as_bytes()).and_then(|()| sink.flush()) {
            Ok(()) => {
                self.transcript.push_str(text);
                Ok(())
            }
            Err(source) => {
                self.sink = None;
                Err(InputError::Write { source })
            }
        }
    }

    /// Drop the sink so the child sees end-of-input. Returns `false` if the
    /// channel was already closed.
    pub fn close(&mut self) -> bool {
        self.sink.take().is_some()
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Everything successfully sent so far, in order.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }
}
