use tracing::{info, warn};

use crate::command::{Command, Transport};
use crate::error::{DeployError, DeployResult};

/// A runtime dependency of the deployment host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: &'static str,
    /// Prints the version; exits non-zero when not installed.
    pub version: &'static [&'static str],
    pub privileged: bool,
    pub package: String,
    /// systemd unit to enable and start, if the dependency runs as
    /// a service.
    pub service: Option<&'static str>,
}

impl Dependency {
    fn version_command(&self) -> Command {
        let cmd = Command::new(self.version[0]).args(self.version[1..].iter().copied());
        if self.privileged { cmd.privileged() } else { cmd }
    }
}

/// What a provisioning pass changed. Empty on an already prepared
/// host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub installed: Vec<&'static str>,
    pub enabled: Vec<&'static str>,
    pub started: Vec<&'static str>,
}

/// Installs and starts docker, the compose plugin and nginx with
/// apt and systemd.
#[derive(Debug, Clone)]
pub struct Provisioner {
    pub docker_package: String,
    pub compose_package: String,
    pub nginx_package: String,
}

impl Provisioner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            docker_package: "docker.io".to_string(),
            compose_package: "docker-compose-v2".to_string(),
            nginx_package: "nginx".to_string(),
        }
    }

    #[must_use]
    pub fn docker_package(mut self, package: &str) -> Self {
        self.docker_package = package.to_string();
        self
    }

    #[must_use]
    pub fn compose_package(mut self, package: &str) -> Self {
        self.compose_package = package.to_string();
        self
    }

    #[must_use]
    pub fn nginx_package(mut self, package: &str) -> Self {
        self.nginx_package = package.to_string();
        self
    }

    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency {
                name: "docker",
                version: &["docker", "--version"],
                privileged: false,
                package: self.docker_package.clone(),
                service: Some("docker"),
            },
            Dependency {
                name: "docker compose",
                version: &["docker", "compose", "version"],
                privileged: false,
                package: self.compose_package.clone(),
                service: None,
            },
            Dependency {
                name: "nginx",
                version: &["nginx", "-v"],
                privileged: true,
                package: self.nginx_package.clone(),
                service: Some("nginx"),
            },
        ]
    }

    /// Bring the host to the required state. Every step checks
    /// before it acts, so a second pass changes nothing.
    pub fn provision(&self, remote: &dyn Transport, user: &str) -> DeployResult<ProvisionReport> {
        let deps = self.dependencies();
        let mut report = ProvisionReport::default();

        let missing: Vec<&Dependency> = deps
            .iter()
            .filter(|d| {
                let present = remote.probe(&d.version_command());
                info!(dependency = d.name, present, "checked dependency");
                !present
            })
            .collect();

        if let Some(first) = missing.first() {
            remote
                .run(&apt(&["update"]))
                .map_err(|e| failed(first.name, &e))?;
            for dep in &missing {
                info!(dependency = dep.name, package = %dep.package, "installing");
                remote
                    .run(&apt(&["install", "-y", &dep.package]))
                    .map_err(|e| failed(dep.name, &e))?;
                report.installed.push(dep.name);
            }
        }

        if user != "root" {
            remote
                .run(&Command::new("usermod").args(["-aG", "docker", user]).privileged())
                .map_err(|e| failed("docker", &e))?;
        }

        for dep in &deps {
            let Some(unit) = dep.service else { continue };

            if !remote.probe(&systemctl("is-enabled", unit)) {
                remote
                    .run(&systemctl("enable", unit))
                    .map_err(|e| failed(dep.name, &e))?;
                report.enabled.push(dep.name);
            }
            if !remote.probe(&systemctl("is-active", unit)) {
                remote
                    .run(&systemctl("start", unit))
                    .map_err(|e| failed(dep.name, &e))?;
                report.started.push(dep.name);
            }
        }

        for dep in &deps {
            match remote.run(&dep.version_command()) {
                Ok(out) => {
                    let version = if out.stdout.is_empty() { &out.stderr } else { &out.stdout };
                    info!(dependency = dep.name, %version, "ready");
                }
                Err(e) => warn!(dependency = dep.name, error = %e, "version check failed"),
            }
        }

        Ok(report)
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new()
    }
}

/// `systemctl <verb> <unit>` as root.
#[must_use]
pub fn systemctl(verb: &str, unit: &str) -> Command {
    Command::new("systemctl").args([verb, unit]).privileged()
}

fn apt(args: &[&str]) -> Command {
    Command::new("apt-get")
        .args(args.iter().copied())
        .env("DEBIAN_FRONTEND", "noninteractive")
        .privileged()
}

fn failed(dependency: &str, cause: &DeployError) -> DeployError {
    DeployError::ProvisionFailed {
        dependency: dependency.to_string(),
        cause: cause.to_string(),
    }
}
