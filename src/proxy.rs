use tracing::{info, warn};

use crate::command::{Command, Expect, Transport};
use crate::error::{Component, DeployError, DeployResult};
use crate::nginx;
use crate::provision::systemctl;

/// File name of the one site this tool manages.
pub const SITE_NAME: &str = "hoist";
pub const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
pub const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";

/// Reload failures that mean there is nothing to reload.
const NOTHING_TO_RELOAD: &[&str] = &[
    "not loaded",
    "not found",
    "could not be found",
    "is not active",
];

/// A reverse-proxy rule forwarding a public port to the app.
///
/// # Example
///
/// ```
/// use hoist::ProxyRule;
///
/// let rule = ProxyRule::new("localhost:8080").listen(8081);
///
/// assert_eq!(rule.listen, 8081);
/// assert_eq!(rule.upstream, "localhost:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
    pub listen: u16,
    pub upstream: String,
}

impl ProxyRule {
    #[must_use]
    pub fn new(upstream: &str) -> Self {
        Self {
            listen: 80,
            upstream: upstream.to_string(),
        }
    }

    #[must_use]
    pub const fn listen(mut self, port: u16) -> Self {
        self.listen = port;
        self
    }
}

#[must_use]
pub fn available_path() -> String {
    format!("{SITES_AVAILABLE}/{SITE_NAME}")
}

#[must_use]
pub fn enabled_path() -> String {
    format!("{SITES_ENABLED}/{SITE_NAME}")
}

fn backup_path() -> String {
    format!("{SITES_AVAILABLE}/{SITE_NAME}.previous")
}

/// Install `rule` as the active site, replacing any earlier version
/// of it.
///
/// The configuration is syntax-checked before nginx is reloaded. If
/// the check fails the previous rule file is put back and nginx keeps
/// serving the old configuration.
pub fn apply(remote: &dyn Transport, rule: &ProxyRule) -> DeployResult<()> {
    let invalid = |e: DeployError| DeployError::ProxyConfigInvalid(e.to_string());
    let available = available_path();
    let enabled = enabled_path();
    let backup = backup_path();

    let had_previous = remote.probe(&Command::new("test").args(["-f", available.as_str()]));
    if had_previous {
        remote
            .run(&root("cp", &["-f", &available, &backup]))
            .map_err(invalid)?;
    }

    info!(path = %available, listen = rule.listen, upstream = %rule.upstream, "writing proxy rule");
    remote
        .run(&root("tee", &[&available]).stdin(nginx::render(rule)))
        .map_err(invalid)?;
    remote
        .run(&root("ln", &["-sfn", &available, &enabled]))
        .map_err(invalid)?;

    let check = remote
        .run(&root("nginx", &["-t"]).expect(Expect::Any))
        .map_err(invalid)?;
    if !check.success() {
        warn!(cause = %check.cause(), "nginx rejected the new rule, restoring");
        let restore = if had_previous {
            root("mv", &["-f", &backup, &available])
        } else {
            root("rm", &["-f", &available, &enabled])
        };
        if let Err(e) = remote.run(&restore) {
            warn!(error = %e, "could not restore previous proxy rule");
        }
        return Err(DeployError::ProxyConfigInvalid(check.cause()));
    }

    remote
        .run(&root("rm", &["-f", &backup, &format!("{SITES_ENABLED}/default")]))
        .map_err(invalid)?;
    remote
        .run(&systemctl("reload", "nginx"))
        .map_err(|e| DeployError::RuntimeUnhealthy {
            component: Component::Proxy,
            cause: e.to_string(),
        })?;

    info!("proxy rule active");
    Ok(())
}

/// Delete the rule from both site directories and reload nginx.
/// Succeeds when the rule or nginx itself is already gone.
pub fn remove(remote: &dyn Transport) -> DeployResult<()> {
    remote.run(&root(
        "rm",
        &["-f", &enabled_path(), &available_path(), &backup_path()],
    ))?;
    remote.run(&systemctl("reload", "nginx").expect(Expect::Absent(NOTHING_TO_RELOAD)))?;
    info!("proxy rule removed");
    Ok(())
}

fn root(program: &str, args: &[&str]) -> Command {
    Command::new(program)
        .args(args.iter().copied())
        .privileged()
}
