//! `sparring check`: compare two files token by token.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode as ProcessExit;

use sparring_check::{judge, Verdict};

use crate::commands::run::{exit_for, read_expected};
use crate::render;

pub fn execute(actual: &Path, expected: &Path, json: bool) -> anyhow::Result<ProcessExit> {
    let verdict = judge_files(actual, expected)?;

    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &verdict)?;
        writeln!(out)?;
    } else {
        render::verdict(&mut out, &verdict)?;
    }
    Ok(exit_for(&verdict))
}

fn judge_files(actual: &Path, expected: &Path) -> anyhow::Result<Verdict> {
    let actual = read_expected(actual)?;
    let expected = read_expected(expected)?;
    Ok(judge(&actual, &expected))
}
