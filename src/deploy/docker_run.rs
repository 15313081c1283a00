use tracing::info;

use crate::app::App;
use crate::command::{Command, Transport};
use crate::deploy::{Deployer, remove_instances, stop_container};
use crate::error::DeployResult;
use crate::sync::RemoteDeploymentPath;

/// Restart policy of the deployed container.
pub const RESTART_POLICY: &str = "unless-stopped";

/// Build one image from the Dockerfile and run one container under
/// the app's name, publishing the app port.
pub struct DockerRun;

impl DockerRun {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for DockerRun {
    fn default() -> Self {
        Self::new()
    }
}

/// `docker build` for `app`, run from the deployment dir.
#[must_use]
pub fn build_command(app: &App, dir: &RemoteDeploymentPath) -> Command {
    Command::new("docker")
        .args(["build", "-t", app.image().as_str(), "."])
        .cwd(dir.relative())
        .privileged()
}

/// `docker run` arguments for `app`.
#[must_use]
pub fn run_command(app: &App) -> Command {
    let publish = format!("{0}:{0}", app.port);
    Command::new("docker")
        .args(["run", "-d", "--name", app.name.as_str()])
        .args(["--restart", RESTART_POLICY, "-p", publish.as_str()])
        .arg(app.image())
        .privileged()
}

impl Deployer for DockerRun {
    fn stop_previous(
        &self,
        remote: &dyn Transport,
        app: &App,
        _dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        remote.run(&stop_container(&app.name))?;
        Ok(())
    }

    /// Also clears the containers of an earlier compose deployment of
    /// the same app, which would otherwise hold on to the port.
    fn remove_previous(
        &self,
        remote: &dyn Transport,
        app: &App,
        _dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        remove_instances(remote, &app.name)?;
        Ok(())
    }

    fn build(
        &self,
        remote: &dyn Transport,
        app: &App,
        dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        info!(image = %app.image(), "building image");
        remote.run(&build_command(app, dir))?;
        Ok(())
    }

    fn start(
        &self,
        remote: &dyn Transport,
        app: &App,
        _dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        info!(container = %app.name, port = app.port, "starting container");
        remote.run(&run_command(app))?;
        Ok(())
    }
}
