use std::fmt;

use tracing::info;

use crate::command::{Command, Transport};
use crate::error::{DeployError, DeployResult};
use crate::source::RepositoryHandle;
use crate::ssh::RemoteHost;

/// Directory under the remote login directory holding all
/// deployments.
pub const REMOTE_ROOT: &str = "deployment";

/// Paths never sent to the host: git internals and run logs.
pub const EXCLUDES: [&str; 2] = [".git", "deploy_*.log"];

/// `~/deployment/<repository-name>` on the remote host.
///
/// Kept relative to the login directory so commands need no `~`
/// expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDeploymentPath(String);

impl RemoteDeploymentPath {
    #[must_use]
    pub fn for_repository(handle: &RepositoryHandle) -> Self {
        Self(format!("{REMOTE_ROOT}/{}", handle.name()))
    }

    /// Path relative to the remote home directory.
    #[must_use]
    pub fn relative(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteDeploymentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~/{}", self.0)
    }
}

/// rsync invocation copying the tree at `handle` into `target`.
/// Only changed bytes travel; files deleted locally are deleted
/// remotely.
#[must_use]
pub fn rsync_command(
    handle: &RepositoryHandle,
    remote: &dyn RemoteHost,
    target: &RemoteDeploymentPath,
) -> Command {
    let mut cmd = Command::new("rsync").args(["-az", "--delete"]);
    for pattern in EXCLUDES {
        cmd = cmd.arg("--exclude").arg(pattern);
    }
    cmd.arg("-e")
        .arg(remote.remote_shell())
        .arg(format!("{}/", handle.path().display()))
        .arg(format!("{}:{}/", remote.destination(), target.relative()))
}

/// Replicate the local working tree to the remote deployment path.
pub fn synchronize(
    local: &dyn Transport,
    remote: &dyn RemoteHost,
    handle: &RepositoryHandle,
) -> DeployResult<RemoteDeploymentPath> {
    if !handle.path().is_dir() {
        return Err(DeployError::SourceMissingLocally(
            handle.path().display().to_string(),
        ));
    }

    let target = RemoteDeploymentPath::for_repository(handle);
    info!(target = %target, "synchronizing files");

    remote
        .run(&Command::new("mkdir").args(["-p", target.relative()]))
        .map_err(|e| DeployError::SyncFailed(e.to_string()))?;

    local
        .run(&rsync_command(handle, remote, &target))
        .map_err(|e| DeployError::SyncFailed(e.to_string()))?;

    info!(target = %target, "files synchronized");
    Ok(target)
}
