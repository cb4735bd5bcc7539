//! Container runtime abstraction.
//!
//! The pipeline talks to the container engine only through these traits.
//! [`docker::DockerCli`] implements them over the `docker` command line.

pub mod docker;

use std::net::SocketAddr;
use std::path::Path;

use grokdock_common::error::Result;
use grokdock_common::types::{BindMount, ContainerId, ImageRef};

use crate::exec::ExecOutput;

/// Configuration for starting a container.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Container name, unique per run.
    pub name: String,
    /// Image to run.
    pub image: ImageRef,
    /// Host directories bound into the container.
    pub mounts: Vec<BindMount>,
    /// Container ports published on a loopback host port.
    pub ports: Vec<u16>,
}

/// Lifecycle operations on a single container.
pub trait ContainerRuntime: Send + Sync {
    /// Starts a detached container and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns `CiError::ContainerStart` if the engine refuses the container.
    fn start(&self, spec: &RunSpec) -> Result<ContainerId>;

    /// Returns whether the container is currently running.
    ///
    /// A container the engine no longer knows about is reported as not running.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried at all.
    fn is_running(&self, id: &ContainerId) -> Result<bool>;

    /// Returns the container's combined stdout and stderr log.
    ///
    /// # Errors
    ///
    /// Returns an error if the logs cannot be retrieved.
    fn logs(&self, id: &ContainerId) -> Result<String>;

    /// Runs a command inside the container, capturing its output.
    ///
    /// A non-zero exit code is reported in the output, not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be issued.
    fn exec(&self, id: &ContainerId, cmd: &[&str]) -> Result<ExecOutput>;

    /// Returns the host address a container port is published on.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn published_port(&self, id: &ContainerId, port: u16) -> Result<Option<SocketAddr>>;

    /// Stops the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped, including when it
    /// is already gone.
    fn stop(&self, id: &ContainerId) -> Result<()>;

    /// Removes the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed, including when it
    /// is already gone.
    fn remove(&self, id: &ContainerId) -> Result<()>;
}

/// Image build and registry operations.
pub trait ImageRegistry: Send + Sync {
    /// Builds an image from a Dockerfile, tagging it with every reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the build fails.
    fn build(&self, dockerfile: &Path, context: &Path, tags: &[ImageRef]) -> Result<()>;

    /// Authenticates against a registry with the secret piped on stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    fn login(&self, registry: Option<&str>, username: &str, token: &str) -> Result<()>;

    /// Pushes one image reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the push fails.
    fn push(&self, image: &ImageRef) -> Result<()>;
}

/// Returns whether a `docker` binary is on `PATH`.
#[must_use]
pub fn docker_available() -> bool {
    which::which(docker::DOCKER_BINARY).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_spec_can_be_constructed() {
        let spec = RunSpec {
            name: "grokdock-test".into(),
            image: ImageRef::new("opengrok/docker", "master"),
            mounts: vec![BindMount::new("/tmp/src", "/opengrok/src")],
            ports: vec![8080, 5000],
        };
        assert_eq!(spec.image.to_string(), "opengrok/docker:master");
        assert_eq!(spec.ports.len(), 2);
    }
}
