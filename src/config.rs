use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{DeployError, DeployResult};
use crate::params::RawParameters;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_PUBLIC_PORT: u16 = 80;

/// Non-secret run settings, from the command line or a YAML file.
///
/// The credential has no field here: it comes from the command line
/// or the environment only, so it never sits in a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub key: Option<String>,
    pub port: Option<u16>,
    pub public_port: Option<u16>,
    pub workdir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: &Path) -> DeployResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> DeployResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Fields set in `self` win; the rest come from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            repo: self.repo.or(fallback.repo),
            branch: self.branch.or(fallback.branch),
            user: self.user.or(fallback.user),
            host: self.host.or(fallback.host),
            key: self.key.or(fallback.key),
            port: self.port.or(fallback.port),
            public_port: self.public_port.or(fallback.public_port),
            workdir: self.workdir.or(fallback.workdir),
            log_dir: self.log_dir.or(fallback.log_dir),
        }
    }

    #[must_use]
    pub fn with_defaults(self) -> Self {
        self.or(Self {
            branch: Some(DEFAULT_BRANCH.to_string()),
            user: Some(DEFAULT_USER.to_string()),
            public_port: Some(DEFAULT_PUBLIC_PORT),
            workdir: Some(PathBuf::from(".")),
            log_dir: Some(PathBuf::from(".")),
            ..Self::default()
        })
    }

    /// Ask for each required field that is still unset.
    pub fn fill_missing(mut self, prompt: &mut dyn Prompt) -> DeployResult<Self> {
        if self.repo.is_none() {
            self.repo = prompt.ask("Repository (URL or org/name)")?;
        }
        if self.host.is_none() {
            self.host = prompt.ask("Remote host")?;
        }
        if self.key.is_none() {
            self.key = prompt.ask("SSH private key path")?;
        }
        if self.port.is_none() {
            self.port = prompt
                .ask("Application port")?
                .map(|raw| {
                    raw.parse().map_err(|_| DeployError::InvalidParameter {
                        field: "application port",
                        reason: format!("'{raw}' is not a port number"),
                    })
                })
                .transpose()?;
        }
        Ok(self)
    }

    #[must_use]
    pub fn into_raw(self, token: Option<SecretString>) -> RawParameters {
        RawParameters {
            repository: self.repo,
            token,
            branch: self.branch,
            ssh_user: self.user,
            host: self.host,
            ssh_key: self.key,
            app_port: self.port,
            public_port: self.public_port,
        }
    }
}

/// Source of interactively entered values.
pub trait Prompt {
    /// `None` when the answer is empty.
    fn ask(&mut self, label: &str) -> DeployResult<Option<String>>;
}

/// Prompts on stderr and reads one line from stdin.
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, label: &str) -> DeployResult<Option<String>> {
        let mut stderr = io::stderr();
        write!(stderr, "{label}: ")?;
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let line = line.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}
