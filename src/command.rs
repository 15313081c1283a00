use std::fmt;

use secrecy::SecretString;

use crate::error::{DeployError, DeployResult};

/// Stderr fragments docker prints when a container is already gone.
pub const NO_SUCH_CONTAINER: &[&str] = &["No such container", "No such object"];

/// Stderr fragments docker prints when an image is already gone.
pub const NO_SUCH_IMAGE: &[&str] = &["No such image"];

/// Stderr fragments systemd prints for units that do not exist.
pub const NO_SUCH_UNIT: &[&str] = &["not loaded", "not found", "could not be found"];

/// What counts as success for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Exit status zero.
    Success,
    /// Exit status zero, or a failure whose stderr says the target
    /// is already absent.
    Absent(&'static [&'static str]),
    /// Any exit status; the caller inspects the output itself.
    Any,
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    #[must_use]
    pub fn new(code: Option<i32>, stdout: &str, stderr: &str) -> Self {
        Self {
            code,
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
        }
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Last non-empty stderr line, the part worth putting in an
    /// error message.
    #[must_use]
    pub fn cause(&self) -> String {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no error output")
            .to_string()
    }
}

/// A command descriptor: program, arguments and how to judge the
/// result. Executed through a [`Transport`], locally or over SSH.
#[derive(Debug)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    pub env: Vec<(String, String)>,
    /// Only ever passed to local child processes.
    pub secret_env: Vec<(String, SecretString)>,
    pub stdin: Option<String>,
    /// Run with root privileges on the remote host.
    pub privileged: bool,
    pub expect: Expect,
}

impl Command {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            secret_env: Vec::new(),
            stdin: None,
            privileged: false,
            expect: Expect::Success,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn secret_env(mut self, key: &str, value: SecretString) -> Self {
        self.secret_env.push((key.to_string(), value));
        self
    }

    #[must_use]
    pub fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    #[must_use]
    pub const fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    #[must_use]
    pub const fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    /// Whether `output` satisfies this command's expectation.
    #[must_use]
    pub fn accepts(&self, output: &Output) -> bool {
        match self.expect {
            Expect::Success => output.success(),
            Expect::Absent(patterns) => {
                output.success() || patterns.iter().any(|p| output.stderr.contains(p))
            }
            Expect::Any => true,
        }
    }

    /// Render as a single shell command line for a remote login
    /// shell. `sudo` is prepended to privileged commands when
    /// `elevate` is set.
    #[must_use]
    pub fn to_shell(&self, elevate: bool) -> String {
        let mut parts = Vec::new();
        if self.privileged && elevate {
            parts.push("sudo -n".to_string());
        }
        if !self.env.is_empty() {
            parts.push("env".to_string());
            parts.extend(
                self.env
                    .iter()
                    .map(|(k, v)| format!("{k}={}", shell_quote(v))),
            );
        }
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|a| shell_quote(a)));

        let line = parts.join(" ");
        match &self.cwd {
            Some(dir) => format!("cd {} && {line}", shell_quote(dir)),
            None => line,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Executes [`Command`] descriptors somewhere: on this machine or on
/// a remote host.
pub trait Transport {
    /// Run the command and capture its output. Errors only when the
    /// command could not be started at all.
    fn execute(&self, command: &Command) -> DeployResult<Output>;

    /// Run the command and enforce its expectation.
    fn run(&self, command: &Command) -> DeployResult<Output> {
        tracing::debug!(command = %command, "exec");
        let output = self.execute(command)?;
        if command.accepts(&output) {
            Ok(output)
        } else {
            Err(DeployError::CommandFailed {
                command: command.to_string(),
                code: output.code,
                stderr: output.cause(),
            })
        }
    }

    /// True when the command ran and exited zero.
    fn probe(&self, command: &Command) -> bool {
        tracing::debug!(command = %command, "probe");
        self.execute(command).is_ok_and(|o| o.success())
    }
}

/// Quote a word for a POSIX shell. Words made only of safe
/// characters are left alone.
#[must_use]
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}
