//! Terminal input for an interactive run.
//!
//! Reading the terminal blocks, so it happens on a dedicated OS thread that
//! hands each line to the event loop over a channel. Plain lines are program
//! input; lines starting with the directive prefix control the run.

use std::io::{self, BufRead};
use std::path::PathBuf;

use log::warn;
use tokio::sync::mpsc;

/// A console command for the harness itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Check stdout so far against this file, or the run's expected file.
    Check(Option<PathBuf>),
    /// Close the program's stdin.
    Eof,
    Kill,
    Transcript,
    Help,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Text for the program, newline included.
    Text(String),
    Directive(Directive),
}

const DIRECTIVES: &[(&str, &str)] = &[
    ("check [FILE]", "compare output so far with FILE (default: --expected)"),
    ("eof", "close the program's stdin"),
    ("kill", "terminate the program"),
    ("transcript", "show everything sent so far"),
    ("help", "show this list"),
];

/// Directive list as the user has to type it, prefix included.
pub fn help(prefix: &str) -> String {
    let mut text = String::from("directives:");
    for (usage, summary) in DIRECTIVES {
        let usage = format!("{prefix}{usage}");
        text.push_str(&format!("\n  {usage:<16}{summary}"));
    }
    text
}

/// Classify one raw console line.
pub fn parse_line(line: &str, prefix: &str) -> ConsoleInput {
    let Some(rest) = line.strip_prefix(prefix).filter(|_| !prefix.is_empty()) else {
        return ConsoleInput::Text(line.to_string());
    };

    let mut words = rest.split_whitespace();
    let directive = match words.next() {
        Some("check") => Directive::Check(words.next().map(PathBuf::from)),
        Some("eof") => Directive::Eof,
        Some("kill") => Directive::Kill,
        Some("transcript") => Directive::Transcript,
        Some("help") | None => Directive::Help,
        Some(other) => Directive::Unknown(other.to_string()),
    };
    ConsoleInput::Directive(directive)
}

/// Read terminal lines on a dedicated thread until end-of-input.
///
/// The sender is dropped at end-of-input, which the receiver sees as `None`.
pub fn start_console_thread(
    prefix: String,
    tx: mpsc::UnboundedSender<ConsoleInput>,
) -> io::Result<()> {
    std::thread::Builder::new()
        .name("sparring-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            console_loop(stdin.lock(), &prefix, &tx);
        })
        .map(|_| ())
}

fn console_loop<R: BufRead>(mut reader: R, prefix: &str, tx: &mpsc::UnboundedSender<ConsoleInput>) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                if tx.send(parse_line(&line, prefix)).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Console read failed: {e}");
                return;
            }
        }
    }
}
