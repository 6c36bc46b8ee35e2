use std::fmt;
use std::process::{Command, Stdio};

use crate::config::SessionConfig;
use crate::error::LaunchError;

/// A parsed launch command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    source: String,
}

impl CommandLine {
    /// Parse a user-entered command string.
    ///
    /// With `shell` set the whole string is passed to the platform shell
    /// (`/bin/sh -c` or `cmd /C`). Otherwise it is split on whitespace, the
    /// first token naming the program; quoting is not interpreted.
    pub fn parse(command: &str, shell: bool) -> Result<Self, LaunchError> {
        let source = command.trim();
        if source.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }

        if shell {
            let (program, flag) = shell_program();
            return Ok(Self {
                program: program.to_string(),
                args: vec![flag.to_string(), source.to_string()],
                source: source.to_string(),
            });
        }

        let mut tokens = source.split_whitespace().map(str::to_string);
        let program = tokens.next().ok_or(LaunchError::EmptyCommand)?;
        Ok(Self {
            program,
            args: tokens.collect(),
            source: source.to_string(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Build a `Command` with all three standard streams piped.
    ///
    /// On unix the child becomes the leader of a new process group so that
    /// termination reaches everything it spawns.
    pub fn to_command(&self, config: &SessionConfig) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.envs(&config.env);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(unix)]
fn shell_program() -> (&'static str, &'static str) {
    ("/bin/sh", "-c")
}

#[cfg(windows)]
fn shell_program() -> (&'static str, &'static str) {
    ("cmd", "/C")
}
