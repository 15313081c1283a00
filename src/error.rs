use std::fmt;

pub type DeployResult<T> = Result<T, DeployError>;

/// Runtime component checked by the health validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Engine,
    Container,
    Proxy,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Engine => "container engine",
            Self::Container => "container",
            Self::Proxy => "reverse proxy",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("command failed: {command} (exit {status}): {stderr}", status = display_code(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("invalid parameter '{field}': {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("source acquisition failed for {repository}: {cause}")]
    SourceAcquisitionFailed { repository: String, cause: String },

    #[error("no Dockerfile or compose file found in {0}")]
    NoBuildDescriptor(String),

    #[error("remote host {host} unreachable: {cause}")]
    RemoteUnreachable { host: String, cause: String },

    #[error("provisioning {dependency} failed: {cause}")]
    ProvisionFailed { dependency: String, cause: String },

    #[error("file sync failed: {0}")]
    SyncFailed(String),

    #[error("local working tree missing: {0}")]
    SourceMissingLocally(String),

    #[error("deployment failed while {phase}: {cause}")]
    DeployFailed { phase: String, cause: String },

    #[error("no running container matching '{0}' after start")]
    DeployVerificationFailed(String),

    #[error("proxy configuration rejected: {0}")]
    ProxyConfigInvalid(String),

    #[error("{component} unhealthy: {cause}")]
    RuntimeUnhealthy { component: Component, cause: String },

    #[error("endpoint {url} unreachable after {attempts} attempts: {cause}")]
    EndpointUnreachable {
        url: String,
        attempts: u32,
        cause: String,
    },

    #[error("teardown failed: {0}")]
    TeardownFailed(String),

    #[error("cannot enter working directory {path}: {cause}")]
    DirectoryContextFailed { path: String, cause: String },

    #[error("config file: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// Process exit code for this failure. Every abort point maps to
    /// its own non-zero value.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed { .. }
            | Self::CommandNotFound(_)
            | Self::Config(_)
            | Self::Io(_) => 1,
            Self::InvalidParameter { .. } => 2,
            Self::SourceAcquisitionFailed { .. } => 10,
            Self::NoBuildDescriptor(_) => 11,
            Self::RemoteUnreachable { .. } => 12,
            Self::ProvisionFailed { .. } => 13,
            Self::SyncFailed(_) => 14,
            Self::SourceMissingLocally(_) => 15,
            Self::DeployFailed { .. } => 16,
            Self::DeployVerificationFailed(_) => 17,
            Self::ProxyConfigInvalid(_) => 18,
            Self::RuntimeUnhealthy { component, .. } => match component {
                Component::Engine => 19,
                Component::Container => 20,
                Component::Proxy => 21,
            },
            Self::EndpointUnreachable { .. } => 22,
            Self::TeardownFailed(_) => 23,
            Self::DirectoryContextFailed { .. } => 24,
        }
    }
}

#[allow(clippy::ref_option)]
fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}
