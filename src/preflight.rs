use tracing::{info, warn};

use crate::compose::{self, ComposeFile};
use crate::error::{DeployError, DeployResult};
use crate::source::RepositoryHandle;

/// Build file name for single-container deployments.
pub const DOCKERFILE: &str = "Dockerfile";

/// How the application declares its containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildDescriptor {
    /// Multi-service composition; takes precedence over a Dockerfile.
    Compose(ComposeFile),
    /// One image built from `Dockerfile`, run as one container.
    Dockerfile,
}

/// Confirm the working tree declares how to build the application.
/// Runs before anything remote is touched.
pub fn validate(handle: &RepositoryHandle) -> DeployResult<BuildDescriptor> {
    let root = handle.path();

    if let Some(file) = compose::find(root) {
        match compose::load(root, file) {
            Ok(parsed) => {
                info!(file, services = ?parsed.services, "found compose file");
                return Ok(BuildDescriptor::Compose(parsed));
            }
            Err(e) => warn!(file, error = %e, "ignoring unusable compose file"),
        }
    }

    if root.join(DOCKERFILE).is_file() {
        info!("found {DOCKERFILE}");
        return Ok(BuildDescriptor::Dockerfile);
    }

    Err(DeployError::NoBuildDescriptor(root.display().to_string()))
}
