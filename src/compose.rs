use std::fs;
use std::path::Path;

use docker_compose_types::Compose;

use crate::error::{DeployError, DeployResult};

/// Compose file names docker recognises, in lookup order.
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// A parsed multi-service composition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeFile {
    /// File name relative to the working tree root.
    pub file: String,
    /// Declared service names, in file order.
    pub services: Vec<String>,
}

/// First compose file present in `dir`, if any.
#[must_use]
pub fn find(dir: &Path) -> Option<&'static str> {
    COMPOSE_FILES
        .into_iter()
        .find(|name| dir.join(name).is_file())
}

/// Read and parse the compose file `file` inside `dir`.
pub fn load(dir: &Path, file: &str) -> DeployResult<ComposeFile> {
    let content = fs::read_to_string(dir.join(file))?;
    let services = service_names(&content)?;
    if services.is_empty() {
        return Err(DeployError::NoBuildDescriptor(format!(
            "{file} declares no services"
        )));
    }
    Ok(ComposeFile {
        file: file.to_string(),
        services,
    })
}

/// Service names declared in compose YAML.
pub fn service_names(content: &str) -> DeployResult<Vec<String>> {
    let compose: Compose = serde_yaml::from_str(content)?;
    Ok(compose.services.0.keys().cloned().collect())
}
