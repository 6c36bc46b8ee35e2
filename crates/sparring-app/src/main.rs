mod commands;
mod console;
mod render;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use settings::Settings;

/// Run a program against interactive input and check its answer.
#[derive(Parser)]
#[command(name = "sparring", version)]
struct Cli {
    /// Settings file (defaults to ./sparring.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a program and forward terminal input to it
    Run {
        /// Answer file to check the program's output against when it stops
        #[arg(short, long)]
        expected: Option<PathBuf>,

        /// Hand the command to the platform shell instead of splitting it on
        /// whitespace
        #[arg(long)]
        shell: bool,

        /// Launch command
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Run a build command to completion and show its output
    Compile {
        /// Terminate the build after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Hand the command to the platform shell
        #[arg(long)]
        shell: bool,

        /// Build command
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Compare an output file with an answer file, ignoring whitespace
    Check {
        actual: PathBuf,
        expected: PathBuf,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("sparring: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = Settings::load(cli.config.as_deref()).context("could not load settings")?;

    match cli.command {
        Commands::Run {
            expected,
            shell,
            command,
        } => {
            if shell {
                settings.session.shell = true;
            }
            commands::run::execute(&settings, &command.join(" "), expected)
        }
        Commands::Compile {
            timeout_ms,
            shell,
            command,
        } => {
            if shell {
                settings.session.shell = true;
            }
            commands::compile::execute(
                &settings,
                &command.join(" "),
                timeout_ms.map(Duration::from_millis),
            )
        }
        Commands::Check {
            actual,
            expected,
            json,
        } => commands::check::execute(&actual, &expected, json),
    }
}
