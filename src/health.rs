use std::time::Duration;

use tracing::{info, warn};

use crate::app::App;
use crate::command::{Command, Transport};
use crate::deploy::running_containers;
use crate::error::{Component, DeployError, DeployResult};
use crate::provision::systemctl;
use crate::wait::Sleep;

/// Attempts made against the public endpoint before giving up.
pub const HTTP_ATTEMPTS: u32 = 3;

/// Reports health status when the image declares a health check,
/// the plain run state otherwise.
const STATUS_FORMAT: &str =
    "{{if .State.Health}}{{.State.Health.Status}}{{else}}{{.State.Status}}{{end}}";

/// Pause after failed attempt `attempt` (1-based): 2s, 4s, 6s.
#[must_use]
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(2 * u64::from(attempt))
}

/// Public URL of the deployment.
#[must_use]
pub fn public_url(host: &str, port: u16) -> String {
    if port == 80 {
        format!("http://{host}/")
    } else {
        format!("http://{host}:{port}/")
    }
}

/// Issues one HTTP request.
pub trait Probe {
    /// `Ok` when the endpoint answered with a success or redirect
    /// status.
    fn get(&self, url: &str) -> Result<(), String>;
}

/// Blocking HTTP GET with a per-request timeout.
#[derive(Debug, Clone, Copy)]
pub struct HttpProbe {
    timeout: Duration,
}

impl HttpProbe {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Probe for HttpProbe {
    fn get(&self, url: &str) -> Result<(), String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| format!("building HTTP client: {e}"))?;
        let response = client.get(url).send().map_err(|e| e.to_string())?;
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(format!("HTTP {status}"))
        }
    }
}

/// Post-deployment checks: services, containers, then the public
/// endpoint.
pub struct HealthValidator<'a> {
    remote: &'a dyn Transport,
    probe: &'a dyn Probe,
    sleeper: &'a dyn Sleep,
}

impl<'a> HealthValidator<'a> {
    #[must_use]
    pub fn new(remote: &'a dyn Transport, probe: &'a dyn Probe, sleeper: &'a dyn Sleep) -> Self {
        Self {
            remote,
            probe,
            sleeper,
        }
    }

    pub fn validate(&self, app: &App, url: &str) -> DeployResult<()> {
        self.check_service("docker", Component::Engine)?;
        self.check_service("nginx", Component::Proxy)?;
        self.check_containers(app)?;
        self.check_endpoint(url)?;
        Ok(())
    }

    /// Immediate: an inactive unit is reported without retrying.
    pub fn check_service(&self, unit: &str, component: Component) -> DeployResult<()> {
        if self.remote.probe(&systemctl("is-active", unit)) {
            info!(unit, "service active");
            Ok(())
        } else {
            Err(DeployError::RuntimeUnhealthy {
                component,
                cause: format!("{unit} is not active"),
            })
        }
    }

    /// Every running container of `app` must be `healthy`, or
    /// `running` when it has no health check.
    pub fn check_containers(&self, app: &App) -> DeployResult<Vec<String>> {
        let unhealthy = |cause: String| DeployError::RuntimeUnhealthy {
            component: Component::Container,
            cause,
        };

        let names =
            running_containers(self.remote, &app.name).map_err(|e| unhealthy(e.to_string()))?;
        if names.is_empty() {
            return Err(unhealthy(format!("no running container matches '{}'", app.name)));
        }

        for name in &names {
            let out = self
                .remote
                .run(
                    &Command::new("docker")
                        .args(["inspect", "--format", STATUS_FORMAT, name.as_str()])
                        .privileged(),
                )
                .map_err(|e| unhealthy(e.to_string()))?;
            let status = out.stdout.trim();
            if status != "healthy" && status != "running" {
                return Err(unhealthy(format!("{name} is {status}")));
            }
            info!(container = %name, status, "container ok");
        }
        Ok(names)
    }

    /// Up to [`HTTP_ATTEMPTS`] requests, waiting [`backoff`] after each
    /// failure. Returns the attempt that succeeded.
    pub fn check_endpoint(&self, url: &str) -> DeployResult<u32> {
        let mut last_error = String::new();
        for attempt in 1..=HTTP_ATTEMPTS {
            match self.probe.get(url) {
                Ok(()) => {
                    info!(url, attempt, "endpoint reachable");
                    return Ok(attempt);
                }
                Err(e) => {
                    let delay = backoff(attempt);
                    warn!(url, attempt, error = %e, retry_in = ?delay, "endpoint not reachable");
                    last_error = e;
                    self.sleeper.sleep(delay);
                }
            }
        }

        Err(DeployError::EndpointUnreachable {
            url: url.to_string(),
            attempts: HTTP_ATTEMPTS,
            cause: last_error,
        })
    }
}
