use std::io::Write;
use std::process::{Command as Process, Stdio};

use secrecy::ExposeSecret;

use crate::command::{Command, Output, Transport};
use crate::error::{DeployError, DeployResult};

/// Runs commands on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Local;

impl Transport for Local {
    fn execute(&self, command: &Command) -> DeployResult<Output> {
        spawn(
            &command.program,
            &command.args,
            |process| {
                if let Some(dir) = &command.cwd {
                    process.current_dir(dir);
                }
                for (key, value) in &command.env {
                    process.env(key, value);
                }
                for (key, value) in &command.secret_env {
                    process.env(key, value.expose_secret());
                }
            },
            command.stdin.as_deref(),
        )
    }
}

/// Spawn `program`, feed it `stdin_data` if any, and capture its
/// output. `configure` can adjust the process before it starts.
pub fn spawn(
    program: &str,
    args: &[String],
    configure: impl FnOnce(&mut Process),
    stdin_data: Option<&str>,
) -> DeployResult<Output> {
    let mut process = Process::new(program);
    process
        .args(args)
        .stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    configure(&mut process);

    let mut child = process.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DeployError::CommandNotFound(program.to_string())
        } else {
            DeployError::Io(e)
        }
    })?;

    if let (Some(data), Some(mut stdin)) = (stdin_data, child.stdin.take()) {
        stdin.write_all(data.as_bytes())?;
    }

    let output = child.wait_with_output()?;

    Ok(Output::new(
        output.status.code(),
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
    ))
}
