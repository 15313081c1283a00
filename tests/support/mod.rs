//! In-memory deployment host for integration tests.
//!
//! `FakeHost` interprets the command descriptors the crate sends to a
//! remote host (apt, systemctl, docker, nginx, coreutils) against a
//! small model of the machine. `FakeLocal` stands in for git and
//! rsync on the local side and writes real files into a temp dir.

#![allow(dead_code)]

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use hoist::command::{Command, Output};
use hoist::health::Probe;
use hoist::wait::Sleep;
use hoist::{
    DeployError, DeployResult, DeploymentParameters, Pipeline, RawParameters, RemoteHost,
    Transport,
};
use secrecy::ExposeSecret;

pub const HOST: &str = "203.0.113.7";
pub const TOKEN: &str = "ghp_test_token";
pub const AVAILABLE: &str = "/etc/nginx/sites-available/hoist";
pub const ENABLED: &str = "/etc/nginx/sites-enabled/hoist";
const DEFAULT_AVAILABLE: &str = "/etc/nginx/sites-available/default";
const DEFAULT_ENABLED: &str = "/etc/nginx/sites-enabled/default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub image: String,
    pub project: Option<String>,
    pub running: bool,
}

/// Everything on the host a deployment can change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Machine {
    pub packages: BTreeSet<String>,
    pub enabled: BTreeSet<String>,
    pub active: BTreeSet<String>,
    pub containers: BTreeMap<String, Container>,
    pub images: BTreeSet<String>,
    pub files: BTreeMap<String, String>,
    pub links: BTreeMap<String, String>,
    pub dirs: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct HostState {
    pub machine: Machine,
    pub unreachable: bool,
    /// `nginx -t` fails while an enabled site contains this text.
    pub reject_config: Option<String>,
    /// What `docker inspect` reports for running containers.
    pub health: Option<String>,
    pub fail_build: bool,
    /// Containers exit right after starting.
    pub fail_start: bool,
    pub fail_install: bool,
    pub commands: Vec<String>,
    pub connectivity_checks: u32,
    pub apt_updates: u32,
    pub installs: Vec<String>,
    pub reloads: u32,
}

#[derive(Clone, Default)]
pub struct FakeHost {
    state: Rc<RefCell<HostState>>,
}

impl FakeHost {
    /// A host with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A host where docker, compose and nginx are installed, enabled
    /// and running.
    pub fn provisioned() -> Self {
        let host = Self::new();
        {
            let mut s = host.state_mut();
            for package in ["docker.io", "docker-compose-v2", "nginx"] {
                s.add_package(package);
            }
            for unit in ["docker", "nginx"] {
                s.machine.enabled.insert(unit.to_string());
                s.machine.active.insert(unit.to_string());
            }
        }
        host
    }

    pub fn state(&self) -> Ref<'_, HostState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, HostState> {
        self.state.borrow_mut()
    }

    pub fn machine(&self) -> Machine {
        self.state().machine.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    /// Commands starting with `prefix`.
    pub fn ran(&self, prefix: &str) -> usize {
        self.state()
            .commands
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn site(&self) -> Option<String> {
        self.state().machine.files.get(AVAILABLE).cloned()
    }

    pub fn running(&self) -> Vec<String> {
        self.state()
            .machine
            .containers
            .iter()
            .filter(|(_, c)| c.running)
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Copy the local tree `src/` into `dest` (`user@host:dir/`).
    pub fn rsync(&self, args: &[String]) -> Output {
        let [.., src, dest] = args else {
            return fail(1, "rsync: missing arguments");
        };
        let Some((_, dir)) = dest.split_once(':') else {
            return fail(1, "rsync: destination is not remote");
        };
        let dir = dir.trim_end_matches('/').to_string();

        let mut s = self.state_mut();
        if s.unreachable {
            return fail(255, "ssh: connect to host port 22: Connection timed out");
        }
        if !s.machine.dirs.contains(&dir) {
            return fail(3, "rsync: change_dir failed: No such file or directory (2)");
        }

        let prefix = format!("{dir}/");
        s.machine.files.retain(|p, _| !p.starts_with(&prefix));
        let mut found = Vec::new();
        collect_files(Path::new(src.trim_end_matches('/')), Path::new(""), &mut found);
        for (rel, content) in found {
            s.machine.files.insert(format!("{dir}/{rel}"), content);
        }
        ok("")
    }
}

impl Transport for FakeHost {
    fn execute(&self, command: &Command) -> DeployResult<Output> {
        let mut s = self.state_mut();
        if s.unreachable {
            return Err(DeployError::RemoteUnreachable {
                host: HOST.into(),
                cause: "Connection timed out".into(),
            });
        }
        s.commands.push(command.to_string());
        Ok(s.execute(command))
    }
}

impl RemoteHost for FakeHost {
    fn check_connectivity(&self) -> DeployResult<()> {
        let mut s = self.state_mut();
        s.connectivity_checks += 1;
        if s.unreachable {
            Err(DeployError::RemoteUnreachable {
                host: HOST.into(),
                cause: "ssh: connect to host port 22: Connection timed out".into(),
            })
        } else {
            Ok(())
        }
    }

    fn destination(&self) -> String {
        format!("deploy@{HOST}")
    }

    fn remote_shell(&self) -> String {
        "ssh -o BatchMode=yes".to_string()
    }

    fn as_transport(&self) -> &dyn Transport {
        self
    }
}

impl HostState {
    fn has(&self, package: &str) -> bool {
        self.machine.packages.contains(package)
    }

    fn add_package(&mut self, package: &str) {
        self.machine.packages.insert(package.to_string());
        if package == "nginx" {
            self.machine
                .files
                .insert(DEFAULT_AVAILABLE.into(), "server { listen 80 default_server; }".into());
            self.machine
                .links
                .insert(DEFAULT_ENABLED.into(), DEFAULT_AVAILABLE.into());
        }
    }

    fn execute(&mut self, c: &Command) -> Output {
        let args: Vec<&str> = c.args.iter().map(String::as_str).collect();
        let cwd = c.cwd.as_deref();

        match (c.program.as_str(), args.as_slice()) {
            ("true" | "usermod", _) => ok(""),
            ("apt-get", ["update"]) => {
                self.apt_updates += 1;
                ok("")
            }
            ("apt-get", ["install", "-y", package]) => self.install(package),
            ("systemctl", [verb, unit]) => self.systemctl(verb, unit),
            ("nginx", _) if !self.has("nginx") => not_installed("nginx"),
            ("nginx", ["-v"]) => Output::new(Some(0), "", "nginx version: nginx/1.24.0"),
            ("nginx", ["-t"]) => self.nginx_test(),
            ("docker", _) if !self.has("docker.io") => not_installed("docker"),
            ("docker", ["--version"]) => ok("Docker version 24.0.7, build 24.0.7"),
            ("docker", ["compose", ..]) if !self.has("docker-compose-v2") => {
                fail(125, "docker: 'compose' is not a docker command.")
            }
            ("docker", ["compose", "version"]) => ok("Docker Compose version 2.24.6"),
            ("docker", _) if !self.machine.active.contains("docker") => fail(
                1,
                "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. \
                 Is the docker daemon running?",
            ),
            ("docker", ["compose", "-p", project, "-f", file, rest @ ..]) => {
                self.compose(cwd, project, file, rest)
            }
            ("docker", ["ps", rest @ ..]) => self.ps(rest),
            ("docker", ["stop", name]) => match self.machine.containers.get_mut(*name) {
                Some(container) => {
                    container.running = false;
                    ok(name)
                }
                None => no_such_container(name),
            },
            ("docker", ["rm", rest @ ..]) => self.remove_containers(rest),
            ("docker", ["build", rest @ ..]) => self.build(cwd, rest),
            ("docker", ["run", rest @ ..]) => self.run(rest),
            ("docker", ["inspect", "--format", _, name]) => {
                match self.machine.containers.get(*name) {
                    Some(c) if !c.running => ok("exited"),
                    Some(_) => ok(self.health.as_deref().unwrap_or("running")),
                    None => fail(1, &format!("Error: No such object: {name}")),
                }
            }
            ("docker", ["image", "rm", image]) => {
                if self.machine.images.remove(*image) {
                    ok(&format!("Untagged: {image}"))
                } else {
                    fail(1, &format!("Error response from daemon: No such image: {image}"))
                }
            }
            ("mkdir", ["-p", path]) => {
                self.machine.dirs.insert((*path).to_string());
                ok("")
            }
            ("rm", [flags, paths @ ..]) if flags.starts_with('-') => {
                for path in paths {
                    self.remove_path(path);
                }
                ok("")
            }
            ("test", ["-f", path]) => {
                if self.machine.files.contains_key(*path) {
                    ok("")
                } else {
                    fail(1, "")
                }
            }
            ("cp", ["-f", from, to]) => match self.machine.files.get(*from).cloned() {
                Some(content) => {
                    self.machine.files.insert((*to).to_string(), content);
                    ok("")
                }
                None => fail(1, &format!("cp: cannot stat '{from}': No such file or directory")),
            },
            ("mv", ["-f", from, to]) => match self.machine.files.remove(*from) {
                Some(content) => {
                    self.machine.files.insert((*to).to_string(), content);
                    ok("")
                }
                None => fail(1, &format!("mv: cannot stat '{from}': No such file or directory")),
            },
            ("tee", [path]) => {
                let content = c.stdin.clone().unwrap_or_default();
                self.machine.files.insert((*path).to_string(), content.clone());
                ok(&content)
            }
            ("ln", ["-sfn", target, link]) => {
                self.machine
                    .links
                    .insert((*link).to_string(), (*target).to_string());
                ok("")
            }
            (program, _) => fail(127, &format!("bash: {program}: command not found")),
        }
    }

    fn install(&mut self, package: &str) -> Output {
        if self.fail_install {
            return fail(100, &format!("E: Unable to locate package {package}"));
        }
        self.add_package(package);
        self.installs.push(package.to_string());
        ok(&format!("Setting up {package} ..."))
    }

    fn unit_known(&self, unit: &str) -> bool {
        match unit {
            "docker" => self.has("docker.io"),
            "nginx" => self.has("nginx"),
            _ => false,
        }
    }

    fn systemctl(&mut self, verb: &str, unit: &str) -> Output {
        if !self.unit_known(unit) {
            let code = if verb == "is-active" { 3 } else { 5 };
            return fail(code, &format!("Unit {unit}.service could not be found."));
        }
        match verb {
            "is-enabled" if self.machine.enabled.contains(unit) => ok("enabled"),
            "is-enabled" => Output::new(Some(1), "disabled", ""),
            "enable" => {
                self.machine.enabled.insert(unit.to_string());
                ok("")
            }
            "is-active" if self.machine.active.contains(unit) => ok("active"),
            "is-active" => Output::new(Some(3), "inactive", ""),
            "start" => {
                self.machine.active.insert(unit.to_string());
                ok("")
            }
            "reload" if self.machine.active.contains(unit) => {
                self.reloads += 1;
                ok("")
            }
            "reload" => fail(1, &format!("{unit}.service is not active, cannot reload.")),
            _ => fail(1, &format!("Unknown command verb {verb}.")),
        }
    }

    fn nginx_test(&self) -> Output {
        for (link, target) in &self.machine.links {
            if !link.starts_with("/etc/nginx/sites-enabled/") {
                continue;
            }
            let Some(content) = self.machine.files.get(target) else {
                return fail(
                    1,
                    &format!(
                        "nginx: [emerg] open() \"{link}\" failed (2: No such file or directory)"
                    ),
                );
            };
            if let Some(marker) = &self.reject_config {
                if content.contains(marker.as_str()) {
                    return fail(
                        1,
                        &format!(
                            "nginx: [emerg] invalid parameter in {link}:2\n\
                             nginx: configuration file /etc/nginx/nginx.conf test failed"
                        ),
                    );
                }
            }
        }
        Output::new(
            Some(0),
            "",
            "nginx: the configuration file /etc/nginx/nginx.conf syntax is ok\n\
             nginx: configuration file /etc/nginx/nginx.conf test is successful",
        )
    }

    fn remove_path(&mut self, path: &str) {
        let prefix = format!("{path}/");
        self.machine.files.remove(path);
        self.machine.links.remove(path);
        self.machine.files.retain(|p, _| !p.starts_with(&prefix));
        self.machine
            .dirs
            .retain(|d| d != path && !d.starts_with(&prefix));
    }

    /// `docker ps` with `name=` (substring, or exact when anchored as
    /// `^name$`) and compose project `label=` filters, ANDed like
    /// docker does for different keys.
    fn ps(&self, args: &[&str]) -> Output {
        let mut all = false;
        let mut filters = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match *arg {
                "-a" => all = true,
                "--filter" => filters.extend(iter.next().copied()),
                "--format" => {
                    iter.next();
                }
                _ => {}
            }
        }

        let names: Vec<&str> = self
            .machine
            .containers
            .iter()
            .filter(|(n, c)| (all || c.running) && filters.iter().all(|f| filter_matches(f, n, c)))
            .map(|(n, _)| n.as_str())
            .collect();
        ok(&names.join("\n"))
    }

    fn remove_containers(&mut self, args: &[&str]) -> Output {
        let force = args.first() == Some(&"-f");
        let names = if force { &args[1..] } else { args };
        let mut missing = None;
        for name in names {
            match self.machine.containers.get(*name).map(|c| c.running) {
                None => missing = Some(*name),
                Some(true) if !force => {
                    return fail(
                        1,
                        &format!(
                            "Error response from daemon: cannot remove container \"/{name}\": \
                             container is running: stop the container before removing or force remove"
                        ),
                    );
                }
                Some(_) => {
                    self.machine.containers.remove(*name);
                }
            }
        }
        match missing {
            Some(name) => no_such_container(name),
            None => ok(""),
        }
    }

    fn build(&mut self, cwd: Option<&str>, args: &[&str]) -> Output {
        if self.fail_build {
            return fail(
                1,
                "ERROR: failed to solve: process \"/bin/sh -c cargo build\" did not complete successfully: exit code: 101",
            );
        }
        let dockerfile = value_after(args, "-f").unwrap_or("Dockerfile");
        let Some(tag) = value_after(args, "-t") else {
            return fail(1, "docker build: missing tag");
        };
        if !self.machine.files.contains_key(&join(cwd, dockerfile)) {
            return fail(
                1,
                "ERROR: failed to solve: failed to read dockerfile: open Dockerfile: no such file or directory",
            );
        }
        self.machine.images.insert(tag.to_string());
        ok(&format!("naming to docker.io/library/{tag} done"))
    }

    fn run(&mut self, args: &[&str]) -> Output {
        let Some(name) = value_after(args, "--name") else {
            return fail(125, "docker run: missing name");
        };
        let Some(image) = args.last() else {
            return fail(125, "docker run: missing image");
        };
        if self.machine.containers.contains_key(name) {
            return fail(
                125,
                &format!(
                    "docker: Error response from daemon: Conflict. The container name \"/{name}\" is already in use"
                ),
            );
        }
        if !self.machine.images.contains(*image) {
            return fail(125, &format!("Unable to find image '{image}' locally"));
        }
        self.machine.containers.insert(
            name.to_string(),
            Container {
                image: (*image).to_string(),
                project: None,
                running: !self.fail_start,
            },
        );
        ok("3f1c0e9a7b2d")
    }

    fn compose(&mut self, cwd: Option<&str>, project: &str, file: &str, args: &[&str]) -> Output {
        let path = join(cwd, file);
        let Some(content) = self.machine.files.get(&path) else {
            return fail(14, &format!("open {path}: no such file or directory"));
        };
        let services = compose_services(content);

        match args.first().copied() {
            Some("down") => {
                self.machine
                    .containers
                    .retain(|_, c| c.project.as_deref() != Some(project));
                ok("")
            }
            Some("build") if self.fail_build => fail(17, "failed to solve: exit code: 1"),
            Some("build") => {
                for service in &services {
                    self.machine.images.insert(format!("{project}-{service}"));
                }
                ok("")
            }
            Some("up") => {
                self.machine
                    .containers
                    .retain(|_, c| c.project.as_deref() != Some(project));
                for service in &services {
                    let image = format!("{project}-{service}");
                    self.machine.images.insert(image.clone());
                    self.machine.containers.insert(
                        format!("{project}-{service}-1"),
                        Container {
                            image,
                            project: Some(project.to_string()),
                            running: !self.fail_start,
                        },
                    );
                }
                ok("")
            }
            _ => fail(1, "unknown docker compose command"),
        }
    }
}

/// Stands in for git and rsync on the machine running the tool.
#[derive(Clone)]
pub struct FakeLocal {
    host: FakeHost,
    repo: Rc<RefCell<Repo>>,
}

/// The upstream repository and what git was asked to do.
#[derive(Debug, Default)]
pub struct Repo {
    pub files: BTreeMap<String, String>,
    pub missing: bool,
    pub commands: Vec<String>,
    pub args: Vec<Vec<String>>,
    /// Whether `GIT_ASKPASS` pointed at an existing file, per git call.
    pub askpass_present: Vec<bool>,
    pub secrets: Vec<String>,
}

impl FakeLocal {
    pub fn new(host: FakeHost) -> Self {
        Self {
            host,
            repo: Rc::default(),
        }
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.repo
            .borrow_mut()
            .files
            .insert(path.to_string(), content.to_string());
        self
    }

    pub fn repo(&self) -> Ref<'_, Repo> {
        self.repo.borrow()
    }

    pub fn repo_mut(&self) -> RefMut<'_, Repo> {
        self.repo.borrow_mut()
    }

    pub fn git_commands(&self) -> Vec<String> {
        self.repo()
            .commands
            .iter()
            .filter(|c| c.starts_with("git "))
            .cloned()
            .collect()
    }
}

impl Transport for FakeLocal {
    fn execute(&self, command: &Command) -> DeployResult<Output> {
        self.repo.borrow_mut().commands.push(command.to_string());
        match command.program.as_str() {
            "git" => Ok(self.repo.borrow_mut().git(command)),
            "rsync" => Ok(self.host.rsync(&command.args)),
            other => Err(DeployError::CommandNotFound(other.to_string())),
        }
    }
}

impl Repo {
    fn git(&mut self, c: &Command) -> Output {
        self.args.push(c.args.clone());
        self.askpass_present.push(
            c.env
                .iter()
                .any(|(k, v)| k == "GIT_ASKPASS" && Path::new(v).is_file()),
        );
        self.secrets
            .extend(c.secret_env.iter().map(|(_, v)| v.expose_secret().to_string()));

        if self.missing {
            return fail(
                128,
                "remote: Repository not found.\nfatal: repository 'https://github.com/org/app.git/' not found",
            );
        }

        let args: Vec<&str> = c.args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["clone", "--branch", _, _, path] => {
                self.write_tree(Path::new(path));
                fs::create_dir_all(Path::new(path).join(".git")).expect("git dir");
                ok("")
            }
            ["fetch", "origin"] | ["checkout", _] => ok(""),
            ["pull", "--ff-only", "origin", _] => {
                if let Some(dir) = &c.cwd {
                    self.write_tree(Path::new(dir));
                }
                ok("Already up to date.")
            }
            _ => fail(1, "git: unexpected invocation"),
        }
    }

    fn write_tree(&self, root: &Path) {
        for (rel, content) in &self.files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("tree dir");
            }
            fs::write(path, content).expect("tree file");
        }
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingSleeper(Rc<RefCell<Vec<Duration>>>);

impl RecordingSleeper {
    pub fn seconds(&self) -> Vec<u64> {
        self.0.borrow().iter().map(Duration::as_secs).collect()
    }
}

impl Sleep for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

/// Fails the first `n` requests, then succeeds.
#[derive(Clone, Default)]
pub struct FakeProbe {
    failures_left: Rc<Cell<u32>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeProbe {
    pub fn failing(n: u32) -> Self {
        let probe = Self::default();
        probe.failures_left.set(n);
        probe
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Probe for FakeProbe {
    fn get(&self, url: &str) -> Result<(), String> {
        self.calls.borrow_mut().push(url.to_string());
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            Err("error sending request: connection refused".to_string())
        } else {
            Ok(())
        }
    }
}

/// A pipeline wired to fakes, with a scratch working directory.
pub struct Harness {
    pub host: FakeHost,
    pub local: FakeLocal,
    pub sleeper: RecordingSleeper,
    pub probe: FakeProbe,
    pub connections: Rc<Cell<u32>>,
    pub workdir: tempfile::TempDir,
}

impl Harness {
    /// `host` serving the `org/app` repository, which holds a
    /// Dockerfile.
    pub fn new(host: FakeHost) -> Self {
        let local = FakeLocal::new(host.clone())
            .with_file("Dockerfile", "FROM nginx:alpine\nEXPOSE 8080\n")
            .with_file("src/index.html", "<h1>hello</h1>\n");
        Self {
            host,
            local,
            sleeper: RecordingSleeper::default(),
            probe: FakeProbe::default(),
            connections: Rc::default(),
            workdir: tempfile::tempdir().expect("workdir"),
        }
    }

    pub fn raw(&self) -> RawParameters {
        RawParameters {
            repository: Some("org/app".into()),
            token: Some(TOKEN.to_string().into()),
            branch: Some("main".into()),
            ssh_user: Some("root".into()),
            host: Some(HOST.into()),
            ssh_key: Some("/home/me/.ssh/id_ed25519".into()),
            app_port: Some(8080),
            public_port: None,
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline_with(self.raw())
    }

    pub fn pipeline_with(&self, raw: RawParameters) -> Pipeline {
        let host = self.host.clone();
        let connections = Rc::clone(&self.connections);
        Pipeline::new(
            DeploymentParameters::new(raw).expect("parameters"),
            self.workdir.path(),
        )
        .local(self.local.clone())
        .connector(move |_| {
            connections.set(connections.get() + 1);
            Ok(Box::new(host.clone()) as Box<dyn RemoteHost>)
        })
        .probe(self.probe.clone())
        .sleeper(self.sleeper.clone())
    }

    /// Local working tree of `org/app`.
    pub fn tree(&self) -> PathBuf {
        self.workdir.path().join("app")
    }
}

pub fn ok(stdout: &str) -> Output {
    Output::new(Some(0), stdout, "")
}

pub fn fail(code: i32, stderr: &str) -> Output {
    Output::new(Some(code), "", stderr)
}

fn not_installed(program: &str) -> Output {
    fail(127, &format!("bash: {program}: command not found"))
}

fn no_such_container(name: &str) -> Output {
    fail(1, &format!("Error response from daemon: No such container: {name}"))
}

fn filter_matches(filter: &str, name: &str, container: &Container) -> bool {
    if let Some(pattern) = filter.strip_prefix("name=") {
        match pattern.strip_prefix('^').and_then(|p| p.strip_suffix('$')) {
            Some(exact) => name == exact,
            None => name.contains(pattern),
        }
    } else if let Some(project) = filter.strip_prefix("label=com.docker.compose.project=") {
        container.project.as_deref() == Some(project)
    } else if let Some(status) = filter.strip_prefix("status=") {
        (status == "running") == container.running
    } else {
        false
    }
}

fn value_after<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| *a == flag)
        .and_then(|i| args.get(i + 1))
        .copied()
}

fn join(cwd: Option<&str>, path: &str) -> String {
    match cwd {
        Some(dir) if !path.starts_with('/') => format!("{dir}/{path}"),
        _ => path.to_string(),
    }
}

/// Top-level service keys under `services:`.
fn compose_services(content: &str) -> Vec<String> {
    let mut in_services = false;
    let mut services = Vec::new();
    for line in content.lines() {
        if line.trim_end() == "services:" {
            in_services = true;
            continue;
        }
        if !in_services || line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(' ') {
            in_services = false;
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        if indent == 2 {
            if let Some(name) = line.trim().strip_suffix(':') {
                services.push(name.to_string());
            }
        }
    }
    services
}

fn collect_files(root: &Path, rel: &Path, out: &mut Vec<(String, String)>) {
    let Ok(entries) = fs::read_dir(root.join(rel)) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == ".git" || (name.starts_with("deploy_") && name.ends_with(".log")) {
            continue;
        }
        let child = rel.join(&name);
        if entry.path().is_dir() {
            collect_files(root, &child, out);
        } else {
            let content = fs::read_to_string(entry.path()).unwrap_or_default();
            out.push((child.to_string_lossy().to_string(), content));
        }
    }
}
