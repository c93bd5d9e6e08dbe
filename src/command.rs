//! External command execution, with and without elevated rights.

use std::{
    fmt,
    path::PathBuf,
    process::{Command, Output, Stdio},
};

use which::which;

use crate::error::{Error, ExitInfo, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status and combined stdout/stderr of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: ExitInfo,
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == ExitInfo::Code(0)
    }
}

impl From<Output> for CommandOutput {
    fn from(out: Output) -> Self {
        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Self {
            status: out.status.code().map_or(ExitInfo::Signal, ExitInfo::Code),
            output,
        }
    }
}

/// Runs external programs. Everything that shells out goes through this so
/// that the command sequences can be exercised without touching the system.
pub trait Runner {
    /// Resolves a program on `PATH`.
    fn lookup(&self, program: &str) -> Option<PathBuf>;

    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Runs with administrator rights, showing `prompt` where the platform
    /// lets us. A cancelled or failed authorization is
    /// [`Error::ElevationDeclined`].
    fn run_elevated(&self, invocation: &Invocation, prompt: &str) -> Result<CommandOutput>;
}

/// Runs the command and turns a non-zero exit into [`Error::ToolFailure`].
pub fn run_checked(runner: &dyn Runner, invocation: &Invocation) -> Result<CommandOutput> {
    checked(invocation, runner.run(invocation)?)
}

pub fn run_elevated_checked(
    runner: &dyn Runner,
    invocation: &Invocation,
    prompt: &str,
) -> Result<CommandOutput> {
    checked(invocation, runner.run_elevated(invocation, prompt)?)
}

fn checked(invocation: &Invocation, out: CommandOutput) -> Result<CommandOutput> {
    if out.success() {
        Ok(out)
    } else {
        Err(Error::ToolFailure {
            command: invocation.to_string(),
            status: out.status,
            output: out.output,
        })
    }
}

/// Spawns real processes. Commands block until they exit; there is no
/// timeout.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    fn spawn(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        log::debug!("Executing {} {:?}", program, args);

        Ok(Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?
            .into())
    }
}

impl Runner for SystemRunner {
    fn lookup(&self, program: &str) -> Option<PathBuf> {
        which(program).ok()
    }

    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.spawn(&invocation.program, &invocation.args)
    }

    #[cfg(target_os = "macos")]
    fn run_elevated(&self, invocation: &Invocation, prompt: &str) -> Result<CommandOutput> {
        let script = apple_script(invocation, prompt);
        let out = self.spawn("osascript", &["-e".to_string(), script])?;

        // -128 is userCanceledErr
        if !out.success() && out.output.contains("(-128)") {
            return Err(Error::ElevationDeclined {
                command: invocation.to_string(),
                output: out.output,
            });
        }

        Ok(out)
    }

    #[cfg(not(target_os = "macos"))]
    fn run_elevated(&self, invocation: &Invocation, prompt: &str) -> Result<CommandOutput> {
        log::info!("{}", prompt);

        let mut args = vec![invocation.program.clone()];
        args.extend(invocation.args.iter().cloned());
        let out = self.spawn("pkexec", &args)?;

        // pkexec: 126 = dialog dismissed, 127 = not authorized
        match out.status {
            ExitInfo::Code(126) | ExitInfo::Code(127) => Err(Error::ElevationDeclined {
                command: invocation.to_string(),
                output: out.output,
            }),
            _ => Ok(out),
        }
    }
}

/// Single-quotes `arg` for `/bin/sh`.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn apple_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', r"\\").replace('"', "\\\""))
}

/// `do shell script` statement that runs `invocation` as administrator.
pub fn apple_script(invocation: &Invocation, prompt: &str) -> String {
    let mut line = shell_quote(&invocation.program);
    for arg in &invocation.args {
        line.push(' ');
        line.push_str(&shell_quote(arg));
    }

    format!(
        "do shell script {} with administrator privileges with prompt {}",
        apple_string(&line),
        apple_string(prompt)
    )
}
