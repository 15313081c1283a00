pub mod compose;
pub mod docker_run;

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::App;
use crate::command::{Command, Expect, NO_SUCH_CONTAINER, Transport};
use crate::error::{DeployError, DeployResult};
use crate::preflight::BuildDescriptor;
use crate::sync::RemoteDeploymentPath;
use crate::wait::Sleep;

pub use compose::ComposeDeploy;
pub use docker_run::DockerRun;

/// Time allowed between start and the running-state check.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Where the controller is in replacing the running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Idle,
    StoppingPrevious,
    RemovingPrevious,
    Building,
    Starting,
    Running,
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::StoppingPrevious => "stopping previous instance",
            Self::RemovingPrevious => "removing previous instance",
            Self::Building => "building",
            Self::Starting => "starting",
            Self::Running => "running",
        })
    }
}

/// A way of building and running the application on the host.
///
/// Stop and remove must succeed when there is nothing to stop or
/// remove.
pub trait Deployer {
    fn stop_previous(&self, remote: &dyn Transport, app: &App, dir: &RemoteDeploymentPath)
    -> DeployResult<()>;

    fn remove_previous(&self, remote: &dyn Transport, app: &App, dir: &RemoteDeploymentPath)
    -> DeployResult<()>;

    fn build(&self, remote: &dyn Transport, app: &App, dir: &RemoteDeploymentPath)
    -> DeployResult<()>;

    fn start(&self, remote: &dyn Transport, app: &App, dir: &RemoteDeploymentPath)
    -> DeployResult<()>;
}

/// Compose when the tree has a compose file, plain docker otherwise.
#[must_use]
pub fn deployer_for(descriptor: &BuildDescriptor) -> Box<dyn Deployer> {
    match descriptor {
        BuildDescriptor::Compose(file) => Box::new(ComposeDeploy::new(&file.file)),
        BuildDescriptor::Dockerfile => Box::new(DockerRun::new()),
    }
}

/// Replaces whatever instance of the app is running with a fresh
/// one, keeping at most one current instance.
pub struct Controller<'a> {
    remote: &'a dyn Transport,
    sleeper: &'a dyn Sleep,
    grace: Duration,
    state: DeployState,
    history: Vec<DeployState>,
}

impl<'a> Controller<'a> {
    #[must_use]
    pub fn new(remote: &'a dyn Transport, sleeper: &'a dyn Sleep) -> Self {
        Self {
            remote,
            sleeper,
            grace: GRACE_PERIOD,
            state: DeployState::Idle,
            history: vec![DeployState::Idle],
        }
    }

    #[must_use]
    pub const fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[must_use]
    pub const fn state(&self) -> DeployState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[DeployState] {
        &self.history
    }

    pub fn deploy(
        &mut self,
        deployer: &dyn Deployer,
        app: &App,
        dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        let remote = self.remote;

        self.enter(DeployState::StoppingPrevious);
        deployer
            .stop_previous(remote, app, dir)
            .map_err(|e| self.failed(&e))?;

        self.enter(DeployState::RemovingPrevious);
        deployer
            .remove_previous(remote, app, dir)
            .map_err(|e| self.failed(&e))?;

        self.enter(DeployState::Building);
        deployer.build(remote, app, dir).map_err(|e| self.failed(&e))?;

        self.enter(DeployState::Starting);
        deployer.start(remote, app, dir).map_err(|e| self.failed(&e))?;

        self.sleeper.sleep(self.grace);
        let running = running_containers(remote, &app.name).map_err(|e| self.failed(&e))?;
        if running.is_empty() {
            warn!(app = %app.name, "nothing running after start");
            return Err(DeployError::DeployVerificationFailed(app.name.clone()));
        }

        self.enter(DeployState::Running);
        info!(app = %app.name, containers = ?running, "application running");
        Ok(())
    }

    fn enter(&mut self, state: DeployState) {
        info!(from = %self.state, to = %state, "deploy state");
        self.state = state;
        self.history.push(state);
    }

    fn failed(&self, cause: &DeployError) -> DeployError {
        DeployError::DeployFailed {
            phase: self.state.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Label compose puts on every container of a project.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// `docker ps` filters selecting exactly the containers of `name`:
/// the single container called `name`, and every container of the
/// compose project `name`. Docker ANDs filters with different keys,
/// so each needs its own listing.
#[must_use]
pub fn instance_filters(name: &str) -> [String; 2] {
    [
        format!("name=^{name}$"),
        format!("label={COMPOSE_PROJECT_LABEL}={name}"),
    ]
}

/// Containers belonging to the app `name`, running ones only unless
/// `all` is set.
pub fn instance_containers(
    remote: &dyn Transport,
    name: &str,
    all: bool,
) -> DeployResult<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for filter in instance_filters(name) {
        let mut cmd = Command::new("docker").arg("ps").privileged();
        if all {
            cmd = cmd.arg("-a");
        }
        let cmd = cmd.args(["--filter", filter.as_str(), "--format", "{{.Names}}"]);
        let out = remote.run(&cmd)?;
        for line in out.stdout.lines().map(str::trim) {
            if !line.is_empty() && !names.iter().any(|n| n == line) {
                names.push(line.to_string());
            }
        }
    }
    Ok(names)
}

/// Running containers of the app `name`.
pub fn running_containers(remote: &dyn Transport, name: &str) -> DeployResult<Vec<String>> {
    instance_containers(remote, name, false)
}

/// Force-remove every container of the app `name`, stopped or not,
/// whether it came from `docker run` or from compose. Returns the
/// names removed.
pub fn remove_instances(remote: &dyn Transport, name: &str) -> DeployResult<Vec<String>> {
    let containers = instance_containers(remote, name, true)?;
    if !containers.is_empty() {
        info!(?containers, "removing containers");
        remote.run(
            &Command::new("docker")
                .args(["rm", "-f"])
                .args(containers.iter().map(String::as_str))
                .privileged()
                .expect(Expect::Absent(NO_SUCH_CONTAINER)),
        )?;
    }
    Ok(containers)
}

/// `docker stop <name>`; a missing container counts as stopped.
#[must_use]
pub fn stop_container(name: &str) -> Command {
    Command::new("docker")
        .args(["stop", name])
        .privileged()
        .expect(Expect::Absent(NO_SUCH_CONTAINER))
}

/// `docker rm -f <name>`; a missing container counts as removed.
#[must_use]
pub fn remove_container(name: &str) -> Command {
    Command::new("docker")
        .args(["rm", "-f", name])
        .privileged()
        .expect(Expect::Absent(NO_SUCH_CONTAINER))
}
