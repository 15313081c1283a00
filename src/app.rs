use crate::source::RepositoryHandle;

/// The container instance being deployed: its fixed logical name
/// and the port it listens on.
///
/// # Example
///
/// ```
/// use hoist::App;
///
/// let app = App::new("My.Service", 8080);
///
/// assert_eq!(app.name, "my-service");
/// assert_eq!(app.image(), "my-service:latest");
/// assert_eq!(app.upstream(), "localhost:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub name: String,
    pub port: u16,
}

impl App {
    /// `name` is normalized into something docker accepts both as a
    /// container name and as a compose project name.
    #[must_use]
    pub fn new(name: &str, port: u16) -> Self {
        Self {
            name: logical_name(name),
            port,
        }
    }

    #[must_use]
    pub fn for_repository(handle: &RepositoryHandle, port: u16) -> Self {
        Self::new(handle.name(), port)
    }

    #[must_use]
    pub fn image(&self) -> String {
        format!("{}:latest", self.name)
    }

    /// Address the reverse proxy forwards to.
    #[must_use]
    pub fn upstream(&self) -> String {
        format!("localhost:{}", self.port)
    }
}

/// Lowercase, with anything outside `[a-z0-9_-]` replaced by `-`.
fn logical_name(name: &str) -> String {
    let mapped: String = name
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches(|c| c == '-' || c == '_');
    if trimmed.is_empty() {
        "app".to_string()
    } else {
        trimmed.to_string()
    }
}
