//! `sparring compile`: run a build command to completion and report both
//! output streams.

use std::io;
use std::process::ExitCode as ProcessExit;
use std::time::Duration;

use anyhow::Context;
use sparring_proc::Harness;

use crate::render;
use crate::settings::Settings;

pub fn execute(settings: &Settings, command: &str, timeout: Option<Duration>) -> anyhow::Result<ProcessExit> {
    let harness = Harness::new(settings.session.clone());
    let timeout = timeout.or_else(|| settings.compile_timeout());

    let done = harness
        .compile(command, timeout)
        .with_context(|| format!("could not start `{command}`"))?;
    render::compile_report(&mut io::stdout().lock(), &done)?;

    Ok(if done.success() {
        ProcessExit::SUCCESS
    } else {
        ProcessExit::FAILURE
    })
}
