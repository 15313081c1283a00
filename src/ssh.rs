use std::process::Stdio;

use tempfile::TempDir;

use crate::cmd;
use crate::command::{Command, Output, Transport, shell_quote};
use crate::error::{DeployError, DeployResult};

/// A host reached over SSH: a [`Transport`] that can also prove it
/// is reachable and lend its connection to rsync.
pub trait RemoteHost: Transport {
    /// One bounded, non-interactive round trip.
    fn check_connectivity(&self) -> DeployResult<()>;

    /// `user@host` as rsync and ssh expect it.
    fn destination(&self) -> String;

    /// Remote shell command for `rsync -e`.
    fn remote_shell(&self) -> String;

    fn as_transport(&self) -> &dyn Transport;
}

/// SSH session to the deployment host.
///
/// All commands of a run go through one OpenSSH control master, so
/// the host authenticates once and later commands (and rsync) reuse
/// the live connection. The master is shut down on drop.
pub struct SshSession {
    host: String,
    user: String,
    key: Option<String>,
    connect_timeout: u32,
    control_dir: Option<TempDir>,
}

impl SshSession {
    #[must_use]
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            key: None,
            connect_timeout: 10,
            control_dir: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key_path: &str) -> Self {
        self.key = Some(key_path.to_string());
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, seconds: u32) -> Self {
        self.connect_timeout = seconds;
        self
    }

    /// Share one connection between all commands of this session.
    pub fn multiplexed(mut self) -> DeployResult<Self> {
        self.control_dir = Some(tempfile::Builder::new().prefix("hoist-ssh-").tempdir()?);
        Ok(self)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Commands marked privileged need `sudo` unless we log in as
    /// root.
    #[must_use]
    pub fn needs_sudo(&self) -> bool {
        self.user != "root"
    }

    /// Options common to every `ssh` call of this session.
    #[must_use]
    pub fn ssh_options(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "PasswordAuthentication=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout),
        ];
        if let Some(dir) = &self.control_dir {
            args.push("-o".to_string());
            args.push("ControlMaster=auto".to_string());
            args.push("-o".to_string());
            args.push(format!(
                "ControlPath={}/cm-%C",
                dir.path().to_string_lossy()
            ));
            args.push("-o".to_string());
            args.push("ControlPersist=120".to_string());
        }
        if let Some(key) = &self.key {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.ssh_options();
        args.push(self.destination());
        args.push(command.to_string());
        args
    }
}

impl Transport for SshSession {
    fn execute(&self, command: &Command) -> DeployResult<Output> {
        if !command.secret_env.is_empty() {
            return Err(DeployError::InvalidParameter {
                field: "command",
                reason: format!("refusing to forward secrets to {}", self.host),
            });
        }
        let args = self.build_ssh_args(&command.to_shell(self.needs_sudo()));
        cmd::spawn("ssh", &args, |_| {}, command.stdin.as_deref())
    }
}

impl RemoteHost for SshSession {
    /// Proves the host is reachable and accepts our key before
    /// anything remote is changed. No password fallback.
    fn check_connectivity(&self) -> DeployResult<()> {
        let unreachable = |cause: String| DeployError::RemoteUnreachable {
            host: self.host.clone(),
            cause,
        };

        let output = self
            .execute(&Command::new("true"))
            .map_err(|e| unreachable(e.to_string()))?;
        if output.success() {
            Ok(())
        } else {
            Err(unreachable(output.cause()))
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Shares this session's control socket.
    fn remote_shell(&self) -> String {
        let mut parts = vec!["ssh".to_string()];
        parts.extend(self.ssh_options().iter().map(|o| shell_quote(o)));
        parts.join(" ")
    }

    fn as_transport(&self) -> &dyn Transport {
        self
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        let Some(dir) = &self.control_dir else {
            return;
        };
        let _ = std::process::Command::new("ssh")
            .args(["-o", &format!("ControlPath={}/cm-%C", dir.path().to_string_lossy())])
            .args(["-O", "exit", &self.destination()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}
