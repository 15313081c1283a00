//! Deploy a Git repository to a remote host as containers behind
//! nginx, in one command.
//!
//! hoist clones (or updates) a repository, checks that it declares a
//! `Dockerfile` or a compose file, prepares the host over SSH
//! (docker, the compose plugin, nginx), ships the tree with rsync,
//! replaces the running instance, points nginx at it and confirms the
//! application answers on its public port.
//!
//! # Overview
//!
//! A run is a [`Pipeline`] built from validated
//! [`DeploymentParameters`]. The stages, in order:
//!
//! 1. **Acquire** - clone or fast-forward the working tree
//!    ([`source`])
//! 2. **Preflight** - find the build descriptor ([`preflight`])
//! 3. **Connect** - batch-mode SSH round trip ([`ssh`])
//! 4. **Provision** - install and start what the host lacks
//!    ([`provision`])
//! 5. **Sync** - rsync the tree to `~/deployment/<name>` ([`sync`])
//! 6. **Deploy** - stop, remove, build, start, verify ([`deploy`])
//! 7. **Proxy** - write, test and activate the nginx site ([`proxy`])
//! 8. **Health** - services, containers, then HTTP ([`health`])
//!
//! The first failing stage ends the run; its [`DeployError`] decides
//! the process exit code. [`Pipeline::teardown`] removes everything
//! a deployment created.
//!
//! Every command goes through the [`Transport`] trait, locally or on
//! the host, as a [`Command`](command::Command) descriptor that also
//! states whether "already absent" counts as success.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use hoist::{DeploymentParameters, Pipeline, RawParameters};
//!
//! fn main() -> anyhow::Result<()> {
//!     let params = DeploymentParameters::new(RawParameters {
//!         repository: Some("org/app".into()),
//!         token: Some(std::env::var("HOIST_GIT_TOKEN")?.into()),
//!         branch: Some("main".into()),
//!         ssh_user: Some("ubuntu".into()),
//!         host: Some("203.0.113.7".into()),
//!         ssh_key: Some("/home/me/.ssh/id_ed25519".into()),
//!         app_port: Some(8080),
//!         public_port: None,
//!     })?;
//!
//!     let report = Pipeline::new(params, Path::new(".")).run();
//!     std::process::exit(report.exit_code());
//! }
//! ```

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod app;
pub mod cmd;
pub mod command;
pub mod compose;
pub mod config;
pub mod deploy;
pub mod error;
pub mod health;
pub mod logging;
pub mod nginx;
pub mod params;
pub mod pipeline;
pub mod preflight;
pub mod provision;
pub mod proxy;
pub mod source;
pub mod ssh;
pub mod sync;
pub mod teardown;
pub mod wait;

pub use app::App;
pub use command::Transport;
pub use error::{DeployError, DeployResult};
pub use params::{DeploymentParameters, RawParameters};
pub use pipeline::{Pipeline, RunReport, Stage, StageOutcome};
pub use provision::Provisioner;
pub use proxy::ProxyRule;
pub use ssh::{RemoteHost, SshSession};
