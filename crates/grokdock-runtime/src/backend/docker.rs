//! Docker CLI backend.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use grokdock_common::error::{CiError, Result};
use grokdock_common::types::{ContainerId, ImageRef};

use super::{ContainerRuntime, ImageRegistry, RunSpec};
use crate::exec::ExecOutput;
use crate::process::{CommandSpec, ProcessRunner, SystemRunner, check_status};

/// Name of the Docker client binary.
pub const DOCKER_BINARY: &str = "docker";

/// Backend that drives the container engine through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli<R = SystemRunner> {
    runner: R,
    binary: String,
}

impl DockerCli<SystemRunner> {
    /// Creates a backend that spawns the real `docker` binary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for DockerCli<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRunner> DockerCli<R> {
    /// Creates a backend that issues commands through the given runner.
    #[must_use]
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            binary: DOCKER_BINARY.to_string(),
        }
    }

    /// Overrides the client binary, e.g. `podman`.
    #[must_use]
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.binary)
    }

    fn run(&self, spec: &CommandSpec) -> Result<ExecOutput> {
        self.runner.run(spec)
    }

    fn run_checked(&self, spec: &CommandSpec) -> Result<ExecOutput> {
        let output = self.run(spec)?;
        check_status(spec, output)
    }

    /// Removes a container that a failed `docker run` may have left in the
    /// created state. A missing container is not an error.
    fn discard_created(&self, name: &str) {
        match self.run(&self.command().args(["rm", "-f", name])) {
            Ok(output) if output.success() => {
                tracing::info!(name, "removed container left by failed start");
            }
            Ok(output) if output.stderr.contains("No such container") => {}
            Ok(output) => {
                tracing::warn!(name, stderr = output.stderr.trim(), "failed to remove created container");
            }
            Err(e) => tracing::warn!(name, error = %e, "failed to remove created container"),
        }
    }
}

impl<R: ProcessRunner> ContainerRuntime for DockerCli<R> {
    fn start(&self, spec: &RunSpec) -> Result<ContainerId> {
        let mut cmd = self.command().args(["run", "-d", "--name", spec.name.as_str()]);
        for mount in &spec.mounts {
            cmd = cmd.arg("-v").arg(mount.to_string());
        }
        for port in &spec.ports {
            cmd = cmd.arg("-p").arg(format!("127.0.0.1::{port}"));
        }
        cmd = cmd.arg(spec.image.to_string());

        tracing::info!(name = %spec.name, image = %spec.image, "starting container");
        let output = self.run(&cmd)?;
        if !output.success() {
            self.discard_created(&spec.name);
            return Err(CiError::ContainerStart {
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(ContainerId::new(output.stdout_trimmed()))
    }

    fn is_running(&self, id: &ContainerId) -> Result<bool> {
        let cmd = self
            .command()
            .args(["inspect", "-f", "{{.State.Running}}", id.as_str()]);
        let output = self.run(&cmd)?;
        Ok(output.success() && output.stdout_trimmed() == "true")
    }

    fn logs(&self, id: &ContainerId) -> Result<String> {
        let cmd = self.command().args(["logs", id.as_str()]);
        Ok(self.run_checked(&cmd)?.combined())
    }

    fn exec(&self, id: &ContainerId, cmd: &[&str]) -> Result<ExecOutput> {
        if cmd.is_empty() {
            return Err(CiError::Config {
                message: "exec command is empty".into(),
            });
        }
        tracing::debug!(id = %id.short(), cmd = ?cmd, "exec into container");
        let spec = self
            .command()
            .args(["exec", id.as_str()])
            .args(cmd.iter().copied());
        self.run(&spec)
    }

    fn published_port(&self, id: &ContainerId, port: u16) -> Result<Option<SocketAddr>> {
        let cmd = self
            .command()
            .args(["port", id.as_str(), &format!("{port}/tcp")]);
        let output = self.run(&cmd)?;
        if !output.success() {
            return Ok(None);
        }
        Ok(parse_port_mapping(&output.stdout))
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        tracing::info!(id = %id.short(), "stopping container");
        let _ = self.run_checked(&self.command().args(["stop", id.as_str()]))?;
        Ok(())
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        tracing::info!(id = %id.short(), "removing container");
        let _ = self.run_checked(&self.command().args(["rm", "-f", id.as_str()]))?;
        Ok(())
    }
}

impl<R: ProcessRunner> ImageRegistry for DockerCli<R> {
    fn build(&self, dockerfile: &Path, context: &Path, tags: &[ImageRef]) -> Result<()> {
        let mut cmd = self
            .command()
            .args(["build", "-f"])
            .arg(dockerfile.display().to_string());
        for tag in tags {
            cmd = cmd.arg("-t").arg(tag.to_string());
        }
        cmd = cmd.arg(context.display().to_string());

        tracing::info!(dockerfile = %dockerfile.display(), tags = tags.len(), "building image");
        let _ = self.run_checked(&cmd)?;
        Ok(())
    }

    fn login(&self, registry: Option<&str>, username: &str, token: &str) -> Result<()> {
        let mut cmd = self
            .command()
            .args(["login", "-u", username, "--password-stdin"])
            .stdin(token.as_bytes());
        if let Some(registry) = registry {
            cmd = cmd.arg(registry);
        }
        tracing::info!(username, registry = registry.unwrap_or("default"), "registry login");
        let _ = self.run_checked(&cmd)?;
        Ok(())
    }

    fn push(&self, image: &ImageRef) -> Result<()> {
        tracing::info!(image = %image, "pushing image");
        let _ = self.run_checked(&self.command().args(["push".to_string(), image.to_string()]))?;
        Ok(())
    }
}

/// Parses `docker port` output, preferring IPv4 and mapping wildcard binds
/// to loopback.
fn parse_port_mapping(output: &str) -> Option<SocketAddr> {
    let mut addrs: Vec<SocketAddr> = output
        .lines()
        .filter_map(|line| line.trim().parse::<SocketAddr>().ok())
        .collect();
    addrs.sort_by_key(SocketAddr::is_ipv6);
    addrs.into_iter().next().map(|mut addr| {
        if addr.ip().is_unspecified() {
            addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        addr
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use grokdock_common::types::BindMount;

    use super::*;
    use crate::fakes::RecordingRunner;

    fn docker(runner: &RecordingRunner) -> DockerCli<&RecordingRunner> {
        DockerCli::with_runner(runner)
    }

    #[test]
    fn start_passes_mounts_and_loopback_ports() {
        let runner = RecordingRunner::new();
        runner.respond("docker run", ExecOutput::ok("abc123\n"));
        let spec = RunSpec {
            name: "grokdock-1".into(),
            image: ImageRef::new("opengrok/docker", "master"),
            mounts: vec![
                BindMount::new("/tmp/src", "/opengrok/src"),
                BindMount::new("/tmp/data", "/opengrok/data"),
            ],
            ports: vec![8080, 5000],
        };

        let id = docker(&runner).start(&spec).expect("start");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(
            runner.command_lines(),
            ["docker run -d --name grokdock-1 -v /tmp/src:/opengrok/src -v /tmp/data:/opengrok/data \
              -p 127.0.0.1::8080 -p 127.0.0.1::5000 opengrok/docker:master"]
        );
    }

    #[test]
    fn start_failure_maps_to_container_start_error() {
        let runner = RecordingRunner::new();
        runner.respond("docker run", ExecOutput::failed(125, "no such image\n"));
        let spec = RunSpec {
            name: "n".into(),
            image: ImageRef::new("missing", "x"),
            mounts: vec![],
            ports: vec![],
        };
        let err = docker(&runner).start(&spec).unwrap_err();
        assert!(matches!(err, CiError::ContainerStart { message } if message == "no such image"));
    }

    #[test]
    fn failed_start_removes_container_by_name() {
        let runner = RecordingRunner::new();
        runner.respond(
            "docker run",
            ExecOutput::failed(125, "Bind for 127.0.0.1:8080 failed: port is already allocated\n"),
        );
        let spec = RunSpec {
            name: "grokdock-created".into(),
            image: ImageRef::new("opengrok/docker", "master"),
            mounts: vec![],
            ports: vec![8080],
        };
        assert!(docker(&runner).start(&spec).is_err());
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "docker rm -f grokdock-created");
    }

    #[test]
    fn failed_cleanup_after_failed_start_keeps_start_error() {
        let runner = RecordingRunner::new();
        runner.respond("docker run", ExecOutput::failed(125, "invalid mount\n"));
        runner.respond("docker rm", ExecOutput::failed(1, "Error: No such container: n"));
        let spec = RunSpec {
            name: "n".into(),
            image: ImageRef::new("opengrok/docker", "master"),
            mounts: vec![],
            ports: vec![],
        };
        let err = docker(&runner).start(&spec).unwrap_err();
        assert!(matches!(err, CiError::ContainerStart { message } if message == "invalid mount"));
    }

    #[test]
    fn is_running_reads_inspect_state() {
        let runner = RecordingRunner::new();
        runner.respond("docker inspect", ExecOutput::ok("true\n"));
        assert!(docker(&runner).is_running(&ContainerId::new("c")).expect("inspect"));

        let runner = RecordingRunner::new();
        runner.respond("docker inspect", ExecOutput::ok("false\n"));
        assert!(!docker(&runner).is_running(&ContainerId::new("c")).expect("inspect"));
    }

    #[test]
    fn is_running_treats_unknown_container_as_stopped() {
        let runner = RecordingRunner::new();
        runner.respond("docker inspect", ExecOutput::failed(1, "No such object: c"));
        assert!(!docker(&runner).is_running(&ContainerId::new("c")).expect("inspect"));
    }

    #[test]
    fn logs_combine_both_streams() {
        let runner = RecordingRunner::new();
        runner.respond(
            "docker logs",
            ExecOutput {
                stdout: "Server startup in 1234 ms\n".into(),
                stderr: "SEVERE: listener\n".into(),
                exit_code: 0,
            },
        );
        let logs = docker(&runner).logs(&ContainerId::new("c")).expect("logs");
        assert!(logs.contains("Server startup in"));
        assert!(logs.contains("SEVERE: listener"));
    }

    #[test]
    fn exec_returns_non_zero_exit_without_error() {
        let runner = RecordingRunner::new();
        runner.respond("docker exec", ExecOutput::failed(1, ""));
        let out = docker(&runner)
            .exec(&ContainerId::new("c"), &["test", "-w", "/opengrok/src"])
            .expect("exec");
        assert_eq!(out.exit_code, 1);
        assert_eq!(runner.command_lines(), ["docker exec c test -w /opengrok/src"]);
    }

    #[test]
    fn exec_rejects_empty_command() {
        let runner = RecordingRunner::new();
        assert!(docker(&runner).exec(&ContainerId::new("c"), &[]).is_err());
        assert!(runner.command_lines().is_empty());
    }

    #[test]
    fn published_port_maps_wildcard_to_loopback() {
        let runner = RecordingRunner::new();
        runner.respond("docker port", ExecOutput::ok("[::]:49154\n0.0.0.0:49153\n"));
        let addr = docker(&runner)
            .published_port(&ContainerId::new("c"), 8080)
            .expect("port")
            .expect("mapped");
        assert_eq!(addr, "127.0.0.1:49153".parse().unwrap());
    }

    #[test]
    fn published_port_absent_when_not_published() {
        let runner = RecordingRunner::new();
        runner.respond("docker port", ExecOutput::failed(1, "no public port"));
        assert!(docker(&runner)
            .published_port(&ContainerId::new("c"), 5000)
            .expect("port")
            .is_none());
    }

    #[test]
    fn build_adds_one_tag_flag_per_reference() {
        let runner = RecordingRunner::new();
        let tags = [
            ImageRef::new("opengrok/docker", "1.13.2"),
            ImageRef::new("opengrok/docker", "1.13"),
            ImageRef::new("opengrok/docker", "latest"),
        ];
        docker(&runner)
            .build(&PathBuf::from("Dockerfile"), &PathBuf::from("."), &tags)
            .expect("build");
        assert_eq!(
            runner.command_lines(),
            ["docker build -f Dockerfile -t opengrok/docker:1.13.2 -t opengrok/docker:1.13 \
              -t opengrok/docker:latest ."]
        );
    }

    #[test]
    fn login_pipes_token_on_stdin() {
        let runner = RecordingRunner::new();
        docker(&runner).login(None, "ci-bot", "t0ken").expect("login");
        let calls = runner.calls();
        assert_eq!(calls[0].command_line(), "docker login -u ci-bot --password-stdin");
        assert_eq!(calls[0].stdin.as_deref(), Some(b"t0ken".as_slice()));
    }

    #[test]
    fn push_failure_is_command_failed() {
        let runner = RecordingRunner::new();
        runner.respond("docker push", ExecOutput::failed(1, "denied"));
        let err = docker(&runner)
            .push(&ImageRef::new("opengrok/docker", "master"))
            .unwrap_err();
        assert!(matches!(err, CiError::CommandFailed { .. }));
    }

    #[test]
    fn alternate_binary_is_used() {
        let runner = RecordingRunner::new();
        let cli = docker(&runner).binary("podman");
        cli.stop(&ContainerId::new("c")).expect("stop");
        assert_eq!(runner.command_lines(), ["podman stop c"]);
    }
}
