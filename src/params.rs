use std::fmt;

use secrecy::SecretString;

use crate::error::{DeployError, DeployResult};

/// Everything a run needs to know, validated up front.
///
/// Fields are private: the only way to obtain a value is through
/// [`DeploymentParameters::new`], which rejects empty fields, so
/// every stage can rely on them being present.
pub struct DeploymentParameters {
    repository: String,
    token: SecretString,
    branch: String,
    ssh_user: String,
    host: String,
    ssh_key: String,
    app_port: u16,
    public_port: u16,
}

/// Unvalidated input for [`DeploymentParameters::new`].
#[derive(Default)]
pub struct RawParameters {
    pub repository: Option<String>,
    pub token: Option<SecretString>,
    pub branch: Option<String>,
    pub ssh_user: Option<String>,
    pub host: Option<String>,
    pub ssh_key: Option<String>,
    pub app_port: Option<u16>,
    pub public_port: Option<u16>,
}

impl DeploymentParameters {
    pub fn new(raw: RawParameters) -> DeployResult<Self> {
        Ok(Self {
            repository: required("repository", raw.repository)?,
            token: required_secret(raw.token)?,
            branch: required("branch", raw.branch)?,
            ssh_user: required("ssh user", raw.ssh_user)?,
            host: required("host", raw.host)?,
            ssh_key: required("ssh key", raw.ssh_key)?,
            app_port: port("application port", raw.app_port)?,
            public_port: port("public port", raw.public_port.or(Some(80)))?,
        })
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    #[must_use]
    pub fn ssh_user(&self) -> &str {
        &self.ssh_user
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn ssh_key(&self) -> &str {
        &self.ssh_key
    }

    #[must_use]
    pub const fn app_port(&self) -> u16 {
        self.app_port
    }

    #[must_use]
    pub const fn public_port(&self) -> u16 {
        self.public_port
    }
}

impl fmt::Debug for DeploymentParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentParameters")
            .field("repository", &self.repository)
            .field("token", &"[REDACTED]")
            .field("branch", &self.branch)
            .field("ssh_user", &self.ssh_user)
            .field("host", &self.host)
            .field("ssh_key", &self.ssh_key)
            .field("app_port", &self.app_port)
            .field("public_port", &self.public_port)
            .finish()
    }
}

fn required(field: &'static str, value: Option<String>) -> DeployResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DeployError::InvalidParameter {
            field,
            reason: "a value is required".into(),
        }),
    }
}

fn required_secret(value: Option<SecretString>) -> DeployResult<SecretString> {
    use secrecy::ExposeSecret;

    match value {
        Some(v) if !v.expose_secret().trim().is_empty() => Ok(v),
        _ => Err(DeployError::InvalidParameter {
            field: "token",
            reason: "a value is required (set HOIST_GIT_TOKEN)".into(),
        }),
    }
}

fn port(field: &'static str, value: Option<u16>) -> DeployResult<u16> {
    match value {
        Some(p) if p > 0 => Ok(p),
        Some(_) => Err(DeployError::InvalidParameter {
            field,
            reason: "port must be between 1 and 65535".into(),
        }),
        None => Err(DeployError::InvalidParameter {
            field,
            reason: "a value is required".into(),
        }),
    }
}
