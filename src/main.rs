use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tracing::{error, info};

use hoist::config::{Settings, StdinPrompt};
use hoist::{DeployError, DeploymentParameters, Pipeline, logging};

#[derive(Parser)]
#[command(name = "hoist")]
#[command(version, about = "Deploy a Git repository to a remote host behind nginx")]
struct Cli {
    /// Repository URL or `org/name` shorthand
    #[arg(long, env = "HOIST_REPO")]
    repo: Option<String>,

    /// Access token for cloning private repositories
    #[arg(long, env = "HOIST_GIT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Branch to deploy [default: main]
    #[arg(long, env = "HOIST_BRANCH")]
    branch: Option<String>,

    /// SSH login on the remote host [default: root]
    #[arg(long, env = "HOIST_SSH_USER")]
    user: Option<String>,

    /// Remote hostname or IP address
    #[arg(long, env = "HOIST_HOST")]
    host: Option<String>,

    /// SSH private key path
    #[arg(long, env = "HOIST_SSH_KEY")]
    key: Option<String>,

    /// Port the application listens on
    #[arg(long, env = "HOIST_APP_PORT")]
    port: Option<u16>,

    /// Port nginx listens on [default: 80]
    #[arg(long, env = "HOIST_PUBLIC_PORT")]
    public_port: Option<u16>,

    /// Directory holding the local working copy [default: .]
    #[arg(long, env = "HOIST_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Directory for the run log [default: .]
    #[arg(long, env = "HOIST_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// YAML file with default values for the options above
    #[arg(long, env = "HOIST_CONFIG")]
    config: Option<PathBuf>,

    /// Remove the deployment from the host instead of deploying
    #[arg(long)]
    cleanup: bool,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            user: self.user.clone(),
            host: self.host.clone(),
            key: self.key.clone(),
            port: self.port,
            public_port: self.public_port,
            workdir: self.workdir.clone(),
            log_dir: self.log_dir.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            let code = e
                .downcast_ref::<DeployError>()
                .map_or(1, DeployError::exit_code);
            eprintln!("Error: {e:#}");
            exit_code(code)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let file = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("reading config file {}", path.display()))?,
        None => Settings::default(),
    };

    let mut settings = cli.settings().or(file).with_defaults();
    if std::io::stdin().is_terminal() {
        settings = settings.fill_missing(&mut StdinPrompt)?;
    }

    let log_dir = settings.log_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let workdir = settings.workdir.clone().unwrap_or_else(|| PathBuf::from("."));
    let token = cli.token.map(SecretString::from);
    let params = DeploymentParameters::new(settings.into_raw(token))?;

    let (_guard, log_file) = logging::init(&log_dir, cli.verbose)?;
    info!(log = %log_file.display(), ?params, "starting");

    let pipeline = Pipeline::new(params, &workdir);
    let report = if cli.cleanup {
        pipeline.teardown()
    } else {
        pipeline.run()
    };

    if let Some(e) = &report.error {
        error!(error = %e, exit_code = e.exit_code(), "run failed");
    }
    Ok(exit_code(report.exit_code()))
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
