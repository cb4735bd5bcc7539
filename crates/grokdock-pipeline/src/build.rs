//! Dockerfile lint and image build.

use std::path::{Path, PathBuf};

use grokdock_common::config::CiConfig;
use grokdock_common::constants::HADOLINT_IMAGE;
use grokdock_common::error::{CiError, Result};
use grokdock_common::types::{ImageRef, TagSet};
use grokdock_runtime::backend::ImageRegistry;
use grokdock_runtime::backend::docker::DOCKER_BINARY;
use grokdock_runtime::process::{CommandSpec, ProcessRunner};

/// Name of the linter binary looked up on `PATH`.
pub const HADOLINT_BINARY: &str = "hadolint";

/// How the Dockerfile linter is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linter {
    /// A local `hadolint` binary.
    Local(PathBuf),
    /// The linter image, run through the container engine.
    Container {
        /// Container engine binary.
        engine: String,
        /// Linter image.
        image: String,
    },
}

impl Linter {
    /// Prefers a local binary and falls back to the linter image.
    #[must_use]
    pub fn discover() -> Self {
        which::which(HADOLINT_BINARY).map_or_else(
            |_| Self::Container {
                engine: DOCKER_BINARY.to_string(),
                image: HADOLINT_IMAGE.to_string(),
            },
            Self::Local,
        )
    }

    /// Command that reads a Dockerfile from stdin.
    #[must_use]
    pub fn command(&self) -> CommandSpec {
        match self {
            Self::Local(path) => CommandSpec::new(path.display().to_string()).arg("-"),
            Self::Container { engine, image } => {
                CommandSpec::new(engine).args(["run", "--rm", "-i"]).arg(image)
            }
        }
    }
}

/// Pipes `dockerfile` to the linter.
///
/// # Errors
///
/// Returns `CiError::Io` if the Dockerfile cannot be read, `CiError::Spawn`
/// if the linter cannot be launched, and `CiError::LintFailed` if it
/// reports findings.
pub fn lint(runner: &dyn ProcessRunner, linter: &Linter, dockerfile: &Path) -> Result<()> {
    let contents = std::fs::read(dockerfile).map_err(|e| CiError::Io {
        path: dockerfile.to_path_buf(),
        source: e,
    })?;

    let cmd = linter.command().stdin(contents);
    tracing::info!(dockerfile = %dockerfile.display(), linter = %cmd.program, "linting Dockerfile");
    let output = runner.run(&cmd)?;
    if !output.success() {
        return Err(CiError::LintFailed {
            path: dockerfile.to_path_buf(),
            output: output.combined(),
        });
    }
    tracing::info!("Dockerfile lint passed");
    Ok(())
}

/// Builds the image once with every tag of `tags`.
///
/// # Errors
///
/// Returns `CiError::Io` if the Dockerfile is missing, or the build failure.
pub fn build_image(
    registry: &dyn ImageRegistry,
    config: &CiConfig,
    tags: &TagSet,
) -> Result<Vec<ImageRef>> {
    if !config.dockerfile.is_file() {
        return Err(CiError::Io {
            path: config.dockerfile.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "Dockerfile not found"),
        });
    }
    let images = tags.image_refs(&config.image);
    registry.build(&config.dockerfile, &config.context, &images)?;
    tracing::info!(image = %config.image, %tags, "image built");
    Ok(images)
}

#[cfg(test)]
mod tests {
    use grokdock_runtime::exec::ExecOutput;
    use grokdock_runtime::fakes::{FakeClock, FakeRuntime, RecordingRunner};

    use super::*;

    fn dockerfile(dir: &Path) -> PathBuf {
        let path = dir.join("Dockerfile");
        std::fs::write(&path, "FROM tomcat:10-jdk21\nUSER appuser\n").expect("write");
        path
    }

    fn container_linter() -> Linter {
        Linter::Container {
            engine: "docker".into(),
            image: "hadolint/hadolint".into(),
        }
    }

    #[test]
    fn lint_pipes_dockerfile_on_stdin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dockerfile(dir.path());
        let runner = RecordingRunner::new();

        lint(&runner, &container_linter(), &path).expect("lint");

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command_line(), "docker run --rm -i hadolint/hadolint");
        assert_eq!(
            calls[0].stdin.as_deref(),
            Some(&b"FROM tomcat:10-jdk21\nUSER appuser\n"[..])
        );
    }

    #[test]
    fn local_linter_reads_stdin_dash() {
        let linter = Linter::Local(PathBuf::from("/usr/bin/hadolint"));
        assert_eq!(linter.command().command_line(), "/usr/bin/hadolint -");
    }

    #[test]
    fn lint_findings_are_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dockerfile(dir.path());
        let runner = RecordingRunner::new();
        runner.respond(
            "docker run",
            ExecOutput {
                stdout: "-:1 DL3006 warning: Always tag the version of an image explicitly\n".into(),
                stderr: String::new(),
                exit_code: 1,
            },
        );

        let err = lint(&runner, &container_linter(), &path).unwrap_err();
        assert!(matches!(err, CiError::LintFailed { ref output, .. } if output.contains("DL3006")));
    }

    #[test]
    fn missing_dockerfile_is_reported_before_running_anything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = RecordingRunner::new();
        let err = lint(&runner, &container_linter(), &dir.path().join("Dockerfile")).unwrap_err();
        assert!(matches!(err, CiError::Io { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn build_tags_every_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CiConfig {
            dockerfile: dockerfile(dir.path()),
            context: dir.path().to_path_buf(),
            ..CiConfig::default()
        };
        let rt = FakeRuntime::new(FakeClock::new());
        let tags = TagSet::release(["1.2.3".to_string(), "1.2".to_string(), "latest".to_string()]);

        let images = build_image(&rt, &config, &tags).expect("build");
        assert_eq!(images.len(), 3);
        assert_eq!(
            rt.calls(),
            ["build opengrok/docker:1.2.3 opengrok/docker:1.2 opengrok/docker:latest"]
        );
    }

    #[test]
    fn build_failure_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CiConfig {
            dockerfile: dockerfile(dir.path()),
            context: dir.path().to_path_buf(),
            ..CiConfig::default()
        };
        let rt = FakeRuntime::new(FakeClock::new()).build_error("COPY failed");
        let err = build_image(&rt, &config, &TagSet::branch()).unwrap_err();
        assert!(matches!(err, CiError::CommandFailed { .. }));
    }
}
