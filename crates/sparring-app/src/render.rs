//! Text output for the terminal front end.

use std::io::{self, Write};

use sparring_check::{Mismatch, Verdict};
use sparring_proc::{Completed, ExitCode};

/// Prefix for lines written by sparring itself rather than the program.
pub const TAG: &str = "[sparring]";

pub fn notice(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{TAG} {message}")
}

pub fn exit(out: &mut impl Write, code: ExitCode) -> io::Result<()> {
    notice(out, &format!("program stopped ({code})"))
}

/// A titled block of captured lines, the way the compile and run reports
/// show each stream.
pub fn section(out: &mut impl Write, title: &str, lines: &[String]) -> io::Result<()> {
    writeln!(out, "---{title}---")?;
    for line in lines {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "{}", "-".repeat(title.len() + 6))
}

pub fn describe_mismatch(mismatch: &Mismatch) -> String {
    let quote = |token: &Option<String>| match token {
        Some(t) => format!("{t:?}"),
        None => "end of output".to_string(),
    };
    format!(
        "token {}: expected {}, got {}",
        mismatch.index + 1,
        quote(&mismatch.expected),
        quote(&mismatch.actual)
    )
}

pub fn verdict(out: &mut impl Write, verdict: &Verdict) -> io::Result<()> {
    match verdict {
        Verdict::Accepted => notice(out, verdict.code()),
        Verdict::WrongAnswer(mismatch) => notice(
            out,
            &format!("{} ({})", verdict.code(), describe_mismatch(mismatch)),
        ),
    }
}

pub fn compile_report(out: &mut impl Write, done: &Completed) -> io::Result<()> {
    section(out, "Standard Output", &done.stdout)?;
    section(out, "Standard Error", &done.stderr)?;
    if done.timed_out {
        notice(out, &format!("`{}` timed out", done.command))?;
    }
    notice(out, &format!("`{}` finished ({})", done.command, done.exit))
}
