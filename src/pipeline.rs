use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info};

use crate::app::App;
use crate::cmd::Local;
use crate::command::Transport;
use crate::deploy::{self, Controller, GRACE_PERIOD};
use crate::error::{DeployError, DeployResult};
use crate::health::{self, HealthValidator, HttpProbe, Probe};
use crate::params::DeploymentParameters;
use crate::preflight;
use crate::provision::Provisioner;
use crate::proxy::{self, ProxyRule};
use crate::source::{self, RepositoryHandle};
use crate::ssh::{RemoteHost, SshSession};
use crate::sync::{self, RemoteDeploymentPath};
use crate::teardown;
use crate::wait::{Sleep, ThreadSleep};

/// Opens the session to the deployment host.
pub type Connector = Box<dyn Fn(&DeploymentParameters) -> DeployResult<Box<dyn RemoteHost>>>;

/// One step of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquire,
    Preflight,
    Connect,
    Provision,
    Sync,
    Deploy,
    Proxy,
    Health,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Acquire => "source acquisition",
            Self::Preflight => "preflight",
            Self::Connect => "connectivity",
            Self::Provision => "provisioning",
            Self::Sync => "file sync",
            Self::Deploy => "deployment",
            Self::Proxy => "proxy configuration",
            Self::Health => "health validation",
            Self::Teardown => "teardown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: Stage,
    pub success: bool,
    pub exit_code: i32,
}

/// Stages attempted by a run, in order. Only the last one can have
/// failed.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<StageOutcome>,
    pub error: Option<DeployError>,
}

impl RunReport {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or(0, DeployError::exit_code)
    }

    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.outcomes.iter().map(|o| o.stage).collect()
    }

    fn record<T>(&mut self, stage: Stage, f: impl FnOnce() -> DeployResult<T>) -> DeployResult<T> {
        info!(%stage, "stage started");
        let result = f();
        let outcome = match &result {
            Ok(_) => {
                info!(%stage, "stage succeeded");
                StageOutcome {
                    stage,
                    success: true,
                    exit_code: 0,
                }
            }
            Err(e) => {
                error!(%stage, error = %e, exit_code = e.exit_code(), "stage failed");
                StageOutcome {
                    stage,
                    success: false,
                    exit_code: e.exit_code(),
                }
            }
        };
        self.outcomes.push(outcome);
        result
    }
}

/// Deployment pipeline: acquire the source, check it can be built,
/// prepare the host, ship the files, replace the running instance,
/// route traffic to it and confirm it answers.
///
/// Stages run strictly in order and the first failure ends the run.
/// Every stage converges, so running the pipeline again with the same
/// parameters leaves the host in the same state.
pub struct Pipeline {
    params: DeploymentParameters,
    workdir: PathBuf,
    local: Box<dyn Transport>,
    connector: Connector,
    probe: Box<dyn Probe>,
    sleeper: Box<dyn Sleep>,
    provisioner: Provisioner,
    grace: Duration,
}

impl Pipeline {
    #[must_use]
    pub fn new(params: DeploymentParameters, workdir: &Path) -> Self {
        Self {
            params,
            workdir: workdir.to_path_buf(),
            local: Box::new(Local),
            connector: Box::new(ssh_connect),
            probe: Box::new(HttpProbe::default()),
            sleeper: Box::new(ThreadSleep),
            provisioner: Provisioner::new(),
            grace: GRACE_PERIOD,
        }
    }

    /// Runs git and rsync through `local` instead of this machine.
    #[must_use]
    pub fn local(mut self, local: impl Transport + 'static) -> Self {
        self.local = Box::new(local);
        self
    }

    #[must_use]
    pub fn connector(
        mut self,
        connect: impl Fn(&DeploymentParameters) -> DeployResult<Box<dyn RemoteHost>> + 'static,
    ) -> Self {
        self.connector = Box::new(connect);
        self
    }

    #[must_use]
    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[must_use]
    pub fn sleeper(mut self, sleeper: impl Sleep + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    #[must_use]
    pub fn provisioner(mut self, provisioner: Provisioner) -> Self {
        self.provisioner = provisioner;
        self
    }

    #[must_use]
    pub const fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[must_use]
    pub const fn params(&self) -> &DeploymentParameters {
        &self.params
    }

    /// Deploy the configured branch and report every stage attempted.
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::default();
        match self.deploy(&mut report) {
            Ok(url) => info!(%url, "deployment complete"),
            Err(e) => report.error = Some(e),
        }
        report
    }

    /// Remove the deployment from the host.
    pub fn teardown(&self) -> RunReport {
        let mut report = RunReport::default();
        match self.remove(&mut report) {
            Ok(()) => info!(repository = self.params.repository(), "teardown complete"),
            Err(e) => report.error = Some(e),
        }
        report
    }

    fn deploy(&self, report: &mut RunReport) -> DeployResult<String> {
        let params = &self.params;

        let handle = report.record(Stage::Acquire, || {
            let workdir = prepare_workdir(&self.workdir)?;
            let handle = RepositoryHandle::derive(params.repository(), &workdir)?;
            source::acquire(
                self.local.as_ref(),
                params.repository(),
                params.branch(),
                params.token(),
                &handle,
            )?;
            Ok(handle)
        })?;

        let descriptor = report.record(Stage::Preflight, || preflight::validate(&handle))?;
        let remote = report.record(Stage::Connect, || self.connect())?;
        let host = remote.as_transport();

        report.record(Stage::Provision, || {
            self.provisioner.provision(host, params.ssh_user())
        })?;

        let dir = report.record(Stage::Sync, || {
            sync::synchronize(self.local.as_ref(), &*remote, &handle)
        })?;

        let app = App::for_repository(&handle, params.app_port());
        report.record(Stage::Deploy, || {
            let deployer = deploy::deployer_for(&descriptor);
            Controller::new(host, self.sleeper.as_ref())
                .grace(self.grace)
                .deploy(deployer.as_ref(), &app, &dir)
        })?;

        report.record(Stage::Proxy, || {
            let rule = ProxyRule::new(&app.upstream()).listen(params.public_port());
            proxy::apply(host, &rule)
        })?;

        let url = health::public_url(params.host(), params.public_port());
        report.record(Stage::Health, || {
            HealthValidator::new(host, self.probe.as_ref(), self.sleeper.as_ref())
                .validate(&app, &url)
        })?;

        Ok(url)
    }

    fn remove(&self, report: &mut RunReport) -> DeployResult<()> {
        let handle = RepositoryHandle::derive(self.params.repository(), &self.workdir)?;
        let remote = report.record(Stage::Connect, || self.connect())?;

        report.record(Stage::Teardown, || {
            let app = App::for_repository(&handle, self.params.app_port());
            let dir = RemoteDeploymentPath::for_repository(&handle);
            let removed = teardown::teardown(remote.as_transport(), &app, &dir)?;
            info!(containers = ?removed.containers, "removed");
            Ok(())
        })
    }

    fn connect(&self) -> DeployResult<Box<dyn RemoteHost>> {
        let remote = (self.connector)(&self.params)?;
        remote.check_connectivity()?;
        info!(host = %remote.destination(), "host reachable");
        Ok(remote)
    }
}

/// One multiplexed SSH session per run.
fn ssh_connect(params: &DeploymentParameters) -> DeployResult<Box<dyn RemoteHost>> {
    let session = SshSession::new(params.host(), params.ssh_user())
        .with_key(params.ssh_key())
        .multiplexed()?;
    Ok(Box::new(session))
}

/// Resolve `dir` to an absolute path, creating it when missing.
pub fn prepare_workdir(dir: &Path) -> DeployResult<PathBuf> {
    let failed = |e: std::io::Error| DeployError::DirectoryContextFailed {
        path: dir.display().to_string(),
        cause: e.to_string(),
    };
    fs::create_dir_all(dir).map_err(failed)?;
    dir.canonicalize().map_err(failed)
}
