use std::fmt;
use std::io::{self, BufRead, BufReader, Read};

use tokio::sync::mpsc;

/// Which output stream of the child a pump reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpOutcome {
    /// The stream reported end-of-input.
    Eof,
    /// A stop signal arrived (or its sender went away).
    Stopped,
    Failed(io::Error),
}

/// Summary returned by [`StreamPump::run`].
#[derive(Debug)]
pub struct PumpExit {
    pub kind: StreamKind,
    pub lines: usize,
    pub outcome: PumpOutcome,
}

/// Reads one stream sequentially and hands each completed line to a callback.
///
/// Every read blocks until data or end-of-stream arrives, so an idle child
/// costs nothing. Run it on a dedicated thread.
pub struct StreamPump<R> {
    kind: StreamKind,
    reader: BufReader<R>,
    stop_rx: Option<mpsc::Receiver<()>>,
}

impl<R: Read> StreamPump<R> {
    pub fn new(kind: StreamKind, reader: R) -> Self {
        Self {
            kind,
            reader: BufReader::new(reader),
            stop_rx: None,
        }
    }

    /// Attach a stop signal. It is checked around every read; a pump blocked
    /// in a read notices it once the read returns.
    pub fn with_stop(mut self, stop_rx: mpsc::Receiver<()>) -> Self {
        self.stop_rx = Some(stop_rx);
        self
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Pump until end-of-stream, a read error, or a stop signal.
    ///
    /// A line ends at `\n` (a preceding `\r` is dropped). Bytes left without a
    /// newline when the stream closes are delivered as a final line.
    pub fn run<F>(mut self, mut on_line: F) -> PumpExit
    where
        F: FnMut(&str),
    {
        let mut buf = Vec::with_capacity(1024);
        let mut lines = 0;

        let outcome = loop {
            if self.stop_requested() {
                break PumpOutcome::Stopped;
            }

            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => break PumpOutcome::Eof,
                Ok(_) => {
                    // The read may have blocked for a long time.
                    if self.stop_requested() {
                        break PumpOutcome::Stopped;
                    }
                    on_line(decode_line(&buf).as_str());
                    lines += 1;
                }
                Err(err) => break PumpOutcome::Failed(err),
            }
        };

        PumpExit {
            kind: self.kind,
            lines,
            outcome,
        }
    }

    fn stop_requested(&mut self) -> bool {
        match self.stop_rx.as_mut() {
            None => false,
            Some(rx) => match rx.try_recv() {
                Ok(()) => true,
                Err(mpsc::error::TryRecvError::Disconnected) => true,
                Err(mpsc::error::TryRecvError::Empty) => false,
            },
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(input: &[u8]) -> (Vec<String>, PumpExit) {
        let mut lines = Vec::new();
        let exit = StreamPump::new(StreamKind::Stdout, Cursor::new(input.to_vec()))
            .run(|line| lines.push(line.to_string()));
        (lines, exit)
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn test_trailing_fragment_is_delivered_last() {
        let (lines, exit) = collect(b"one\ntwo\nthree");
        assert_eq!(lines, ["one", "two", "three"]);
        assert_eq!(exit.lines, 3);
        assert!(matches!(exit.outcome, PumpOutcome::Eof));
    }

    #[test]
    fn test_terminated_input_has_no_extra_line() {
        let (lines, exit) = collect(b"a\nb\n");
        assert_eq!(lines, ["a", "b"]);
        assert_eq!(exit.lines, 2);
    }

    #[test]
    fn test_empty_stream() {
        let (lines, exit) = collect(b"");
        assert!(lines.is_empty());
        assert_eq!(exit.lines, 0);
        assert!(matches!(exit.outcome, PumpOutcome::Eof));
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let (lines, _) = collect(b"\r\n\nx\r\ny");
        assert_eq!(lines, ["", "", "x", "y"]);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let (lines, _) = collect(b"ok \xff\n");
        assert_eq!(lines, ["ok \u{fffd}"]);
    }

    #[test]
    fn test_long_line_spanning_buffer_refills() {
        let long = "x".repeat(64 * 1024);
        let input = format!("{long}\nshort");
        let (lines, _) = collect(input.as_bytes());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), long.len());
        assert_eq!(lines[1], "short");
    }

    #[test]
    fn test_stop_signal_halts_delivery() {
        let (tx, rx) = mpsc::channel(1);
        tx.try_send(()).unwrap();

        let mut count = 0;
        let exit = StreamPump::new(StreamKind::Stderr, Cursor::new(b"a\nb\n".to_vec()))
            .with_stop(rx)
            .run(|_| count += 1);

        assert_eq!(count, 0);
        assert_eq!(exit.kind, StreamKind::Stderr);
        assert!(matches!(exit.outcome, PumpOutcome::Stopped));
    }

    #[test]
    fn test_dropped_stop_sender_stops_pump() {
        let (tx, rx) = mpsc::channel::<()>(1);
        drop(tx);
        let exit = StreamPump::new(StreamKind::Stdout, Cursor::new(b"a\n".to_vec()))
            .with_stop(rx)
            .run(|_| {});
        assert!(matches!(exit.outcome, PumpOutcome::Stopped));
    }

    #[test]
    fn test_read_error_is_reported() {
        let exit = StreamPump::new(StreamKind::Stdout, BrokenReader).run(|_| {});
        match exit.outcome {
            PumpOutcome::Failed(err) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_pumps_live_child_output() {
        use std::process::{Command, Stdio};

        let mut child = Command::new("/bin/sh")
            .args(["-c", "printf 'first\\n'; sleep 0.2; printf 'second'"])
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();

        let mut lines = Vec::new();
        let exit = StreamPump::new(StreamKind::Stdout, stdout).run(|l| lines.push(l.to_string()));
        child.wait().unwrap();

        assert_eq!(lines, ["first", "second"]);
        assert!(matches!(exit.outcome, PumpOutcome::Eof));
    }
}
