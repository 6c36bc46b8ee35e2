//! `sparring run`: interactive execution.
//!
//! The harness owns the program's threads; this command only subscribes.
//! A single-threaded tokio loop multiplexes session events with console
//! input, so printing never waits on the program and vice versa.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode as ProcessExit;
use std::sync::Arc;

use anyhow::Context;
use log::debug;
use sparring_check::{judge, Verdict};
use sparring_proc::{
    ChannelObserver, ExitCode, Harness, InputError, OutputBuffer, SessionEvent, SessionState,
    StreamKind,
};
use tokio::sync::mpsc;

use crate::console::{self, ConsoleInput, Directive};
use crate::render;
use crate::settings::Settings;

struct RunContext {
    harness: Harness,
    output: Arc<OutputBuffer>,
    expected: Option<PathBuf>,
    prefix: String,
}

pub fn execute(settings: &Settings, command: &str, expected: Option<PathBuf>) -> anyhow::Result<ProcessExit> {
    if let Some(path) = &expected {
        // Fail before starting anything if the answer file is unusable.
        read_expected(path)?;
    }

    let output = Arc::new(OutputBuffer::new());
    let (events, events_rx) = ChannelObserver::channel();
    let mut harness = Harness::new(settings.session.clone());
    harness.subscribe(output.clone());
    harness.subscribe(Arc::new(events));

    let pid = harness
        .run(command)
        .with_context(|| format!("could not start `{command}`"))?
        .pid();
    debug!("Interactive run of `{command}` as PID {pid}");

    let (console_tx, console_rx) = mpsc::unbounded_channel();
    console::start_console_thread(settings.console.directive_prefix.clone(), console_tx)
        .context("could not start console thread")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("could not start event loop")?;

    let ctx = RunContext {
        harness,
        output,
        expected,
        prefix: settings.console.directive_prefix.clone(),
    };
    let code = runtime.block_on(event_loop(&ctx, events_rx, console_rx))?;
    finish(&ctx, code)
}

async fn event_loop(
    ctx: &RunContext,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    mut console: mpsc::UnboundedReceiver<ConsoleInput>,
) -> io::Result<ExitCode> {
    let mut console_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Line { stream: StreamKind::Stdout, text }) => {
                    let mut out = io::stdout().lock();
                    writeln!(out, "{text}")?;
                    out.flush()?;
                }
                // Collected in the output buffer and shown once the program stops.
                Some(SessionEvent::Line { stream: StreamKind::Stderr, .. }) => {}
                Some(SessionEvent::Fault(fault)) => {
                    render::notice(&mut io::stderr(), &format!("warning: {fault}"))?;
                }
                Some(SessionEvent::State(SessionState::Terminated(code))) => return Ok(code),
                Some(SessionEvent::State(_)) => {}
                None => return Ok(ExitCode::Unknown),
            },
            input = console.recv(), if console_open => match input {
                Some(ConsoleInput::Text(text)) => send(ctx, &text)?,
                Some(ConsoleInput::Directive(directive)) => directive_command(ctx, directive)?,
                None => {
                    // Terminal input is exhausted; pass the end-of-input on.
                    console_open = false;
                    ctx.harness.close_input();
                }
            },
        }
    }
}

fn send(ctx: &RunContext, text: &str) -> io::Result<()> {
    match ctx.harness.send(text) {
        Ok(()) => Ok(()),
        Err(InputError::Closed) => render::notice(
            &mut io::stderr(),
            "program is not accepting input (stdin closed or program stopped)",
        ),
        Err(err) => render::notice(&mut io::stderr(), &format!("input not delivered: {err}")),
    }
}

fn directive_command(ctx: &RunContext, directive: Directive) -> io::Result<()> {
    let mut err = io::stderr();
    match directive {
        Directive::Check(path) => match path.as_deref().or(ctx.expected.as_deref()) {
            None => render::notice(
                &mut err,
                &format!("no expected file: use `{}check FILE` or --expected", ctx.prefix),
            ),
            Some(path) => match read_expected(path) {
                Ok(expected) => {
                    let actual = ctx.output.stream_text(StreamKind::Stdout);
                    render::verdict(&mut err, &judge(&actual, &expected))
                }
                Err(e) => render::notice(&mut err, &format!("{e:#}")),
            },
        },
        Directive::Eof => {
            if ctx.harness.close_input() {
                render::notice(&mut err, "stdin closed")
            } else {
                render::notice(&mut err, "stdin was already closed")
            }
        }
        Directive::Kill => {
            ctx.harness.terminate();
            render::notice(&mut err, "termination requested")
        }
        Directive::Transcript => {
            let transcript = ctx
                .harness
                .session()
                .map(|s| s.transcript())
                .unwrap_or_default();
            render::section(&mut err, "Sent", &transcript.lines().map(str::to_string).collect::<Vec<_>>())
        }
        Directive::Help => writeln!(err, "{}", console::help(&ctx.prefix)),
        Directive::Unknown(name) => render::notice(
            &mut err,
            &format!("unknown directive `{name}`, try `{}help`", ctx.prefix),
        ),
    }
}

/// Report after the program stopped: exit status, captured stderr, verdict.
fn finish(ctx: &RunContext, code: ExitCode) -> anyhow::Result<ProcessExit> {
    let mut err = io::stderr().lock();
    render::exit(&mut err, code)?;
    render::section(&mut err, "Standard Error", &ctx.output.lines(StreamKind::Stderr))?;

    let Some(path) = &ctx.expected else {
        return Ok(ProcessExit::SUCCESS);
    };
    let expected = read_expected(path)?;
    let verdict = judge(&ctx.output.stream_text(StreamKind::Stdout), &expected);
    render::verdict(&mut err, &verdict)?;
    Ok(exit_for(&verdict))
}

pub(crate) fn exit_for(verdict: &Verdict) -> ProcessExit {
    if verdict.is_accepted() {
        ProcessExit::SUCCESS
    } else {
        ProcessExit::FAILURE
    }
}

pub(crate) fn read_expected(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("could not read expected output {}", path.display()))
}
