use tracing::info;

use crate::app::App;
use crate::command::{Command, Expect, NO_SUCH_IMAGE, Transport};
use crate::deploy;
use crate::error::{DeployError, DeployResult};
use crate::proxy;
use crate::sync::RemoteDeploymentPath;

/// What a teardown removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub containers: Vec<String>,
}

/// Remove every trace of `app` from the host: its containers, its
/// image, the proxy rule and the synchronized files.
///
/// Each removal succeeds when its target is already gone, so running
/// teardown twice is harmless. A host without docker has no
/// containers or images to remove.
pub fn teardown(
    remote: &dyn Transport,
    app: &App,
    dir: &RemoteDeploymentPath,
) -> DeployResult<TeardownReport> {
    let failed = |e: DeployError| DeployError::TeardownFailed(e.to_string());

    let engine = remote.probe(&Command::new("docker").arg("--version"));
    let containers = if engine {
        let containers = deploy::remove_instances(remote, &app.name).map_err(failed)?;

        info!(image = %app.image(), "removing image");
        remote
            .run(
                &Command::new("docker")
                    .args(["image", "rm", app.image().as_str()])
                    .privileged()
                    .expect(Expect::Absent(NO_SUCH_IMAGE)),
            )
            .map_err(failed)?;
        containers
    } else {
        info!("no container engine on the host, nothing to remove");
        Vec::new()
    };

    proxy::remove(remote).map_err(failed)?;

    info!(path = %dir, "removing deployment files");
    remote
        .run(&Command::new("rm").args(["-rf", dir.relative()]))
        .map_err(failed)?;

    Ok(TeardownReport { containers })
}
