use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tempfile::TempDir;
use tracing::info;

use crate::command::{Command, Transport};
use crate::error::{DeployError, DeployResult};

/// Environment variable the askpass helper reads the credential from.
/// Only ever set on the git child process.
const TOKEN_VAR: &str = "HOIST_ASKPASS_TOKEN";

const ASKPASS_SCRIPT: &str = "#!/bin/sh\n\
case \"$1\" in\n\
  Username*) echo x-access-token ;;\n\
  *) printf '%s\\n' \"$HOIST_ASKPASS_TOKEN\" ;;\n\
esac\n";

/// The repository being deployed: its derived name and where its
/// working tree lives locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    name: String,
    path: PathBuf,
}

impl RepositoryHandle {
    /// Derive the handle for `locator`, checked out under `workdir`.
    pub fn derive(locator: &str, workdir: &Path) -> DeployResult<Self> {
        let name = repository_name(locator).ok_or_else(|| DeployError::InvalidParameter {
            field: "repository",
            reason: format!("cannot derive a repository name from '{locator}'"),
        })?;
        let path = workdir.join(&name);
        Ok(Self { name, path })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// How the working tree is brought to the branch tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkout {
    /// Nothing local yet: clone at the branch.
    Fresh,
    /// A tree exists: fetch, switch, fast-forward.
    Update,
}

/// Repository name from a locator: last path segment without a
/// trailing `.git`.
///
/// ```
/// use hoist::source::repository_name;
///
/// assert_eq!(repository_name("https://github.com/org/app.git").as_deref(), Some("app"));
/// assert_eq!(repository_name("git@github.com:org/app.git").as_deref(), Some("app"));
/// assert_eq!(repository_name("org/app").as_deref(), Some("app"));
/// assert_eq!(repository_name(""), None);
/// ```
#[must_use]
pub fn repository_name(locator: &str) -> Option<String> {
    let trimmed = locator.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// URL handed to git. `org/app` shorthand means GitHub over HTTPS.
#[must_use]
pub fn clone_url(locator: &str) -> String {
    let locator = locator.trim();
    let is_shorthand = !locator.contains("://")
        && !locator.contains('@')
        && !locator.starts_with('/')
        && !locator.starts_with('.')
        && locator.matches('/').count() == 1;
    if is_shorthand {
        let path = locator.strip_suffix(".git").unwrap_or(locator);
        format!("https://github.com/{path}.git")
    } else {
        locator.to_string()
    }
}

/// Update when the derived path already exists, clone otherwise.
#[must_use]
pub fn plan(handle: &RepositoryHandle) -> Checkout {
    if handle.path().exists() {
        Checkout::Update
    } else {
        Checkout::Fresh
    }
}

/// Git commands for `checkout`, without authentication attached.
#[must_use]
pub fn checkout_commands(
    checkout: Checkout,
    url: &str,
    branch: &str,
    handle: &RepositoryHandle,
) -> Vec<Command> {
    let path = handle.path().to_string_lossy().to_string();
    match checkout {
        Checkout::Fresh => vec![
            Command::new("git").args(["clone", "--branch", branch, url, path.as_str()]),
        ],
        Checkout::Update => vec![
            Command::new("git").args(["fetch", "origin"]).cwd(path.as_str()),
            Command::new("git").args(["checkout", branch]).cwd(path.as_str()),
            Command::new("git")
                .args(["pull", "--ff-only", "origin", branch])
                .cwd(path.as_str()),
        ],
    }
}

/// Make the working tree for `handle` available at the tip of
/// `branch`. The credential reaches git only through a throwaway
/// askpass helper and an environment variable scoped to the git
/// process; it is never in argv or in `.git/config`.
pub fn acquire(
    local: &dyn Transport,
    locator: &str,
    branch: &str,
    token: &SecretString,
    handle: &RepositoryHandle,
) -> DeployResult<Checkout> {
    let failed = |cause: String| DeployError::SourceAcquisitionFailed {
        repository: handle.name().to_string(),
        cause,
    };

    let checkout = plan(handle);
    let url = clone_url(locator);
    info!(
        repository = handle.name(),
        branch,
        path = %handle.path().display(),
        ?checkout,
        "acquiring source"
    );

    let askpass = Askpass::create().map_err(|e| failed(e.to_string()))?;

    for command in checkout_commands(checkout, &url, branch, handle) {
        let command = command
            .env("GIT_ASKPASS", &askpass.path.to_string_lossy())
            .env("GIT_TERMINAL_PROMPT", "0")
            .secret_env(
                TOKEN_VAR,
                SecretString::from(token.expose_secret().to_string()),
            );
        local.run(&command).map_err(|e| failed(e.to_string()))?;
    }

    info!(repository = handle.name(), "source ready");
    Ok(checkout)
}

/// Executable askpass script in a private temp dir. Deleted with
/// the value.
struct Askpass {
    _dir: TempDir,
    path: PathBuf,
}

impl Askpass {
    fn create() -> DeployResult<Self> {
        let dir = tempfile::Builder::new().prefix("hoist-askpass-").tempdir()?;
        let path = dir.path().join("askpass.sh");
        fs::write(&path, ASKPASS_SCRIPT)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self { _dir: dir, path })
    }
}
