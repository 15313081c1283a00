use tracing::info;

use crate::app::App;
use crate::command::{Command, Transport};
use crate::deploy::{Deployer, remove_container};
use crate::error::DeployResult;
use crate::sync::RemoteDeploymentPath;

/// Deploy with `docker compose`, using the app name as project name
/// so every service container carries it.
///
/// Services are always recreated: a plain `up` skips services whose
/// inputs did not change, which would make redeploying the same
/// commit a no-op.
pub struct ComposeDeploy {
    file: String,
}

impl ComposeDeploy {
    #[must_use]
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
        }
    }

    fn compose(&self, app: &App, dir: &RemoteDeploymentPath) -> Command {
        Command::new("docker")
            .args(["compose", "-p", app.name.as_str(), "-f", self.file.as_str()])
            .cwd(dir.relative())
            .privileged()
    }
}

impl Deployer for ComposeDeploy {
    fn stop_previous(
        &self,
        remote: &dyn Transport,
        app: &App,
        dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        // `down` on a project with no containers exits zero.
        remote.run(&self.compose(app, dir).args(["down", "--remove-orphans"]))?;
        Ok(())
    }

    fn remove_previous(
        &self,
        remote: &dyn Transport,
        app: &App,
        _dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        // A single-container deployment of the same app may predate
        // the compose file.
        remote.run(&remove_container(&app.name))?;
        Ok(())
    }

    fn build(
        &self,
        remote: &dyn Transport,
        app: &App,
        dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        info!(file = %self.file, "building compose services");
        remote.run(&self.compose(app, dir).arg("build"))?;
        Ok(())
    }

    fn start(
        &self,
        remote: &dyn Transport,
        app: &App,
        dir: &RemoteDeploymentPath,
    ) -> DeployResult<()> {
        remote.run(
            &self
                .compose(app, dir)
                .args(["up", "-d", "--build", "--force-recreate", "--remove-orphans"]),
        )?;
        Ok(())
    }
}
