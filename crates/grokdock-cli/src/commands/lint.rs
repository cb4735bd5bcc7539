//! `grokdock lint`: Lint the Dockerfile.

use clap::Args;
use grokdock_common::config::CiConfig;
use grokdock_pipeline::build::{self, Linter};
use grokdock_runtime::process::SystemRunner;

use crate::output;

/// Arguments for the `lint` command.
#[derive(Args, Debug)]
pub struct LintArgs {
    /// Always run the linter image, even if a local binary exists.
    #[arg(long)]
    pub container: bool,
}

/// Picks the linter for the given arguments.
#[must_use]
pub fn linter(args: &LintArgs) -> Linter {
    if args.container {
        Linter::Container {
            engine: grokdock_runtime::backend::docker::DOCKER_BINARY.to_string(),
            image: grokdock_common::constants::HADOLINT_IMAGE.to_string(),
        }
    } else {
        Linter::discover()
    }
}

/// Executes the `lint` command.
///
/// # Errors
///
/// Returns an error if the Dockerfile is missing or has findings.
pub fn execute(args: &LintArgs, config: &CiConfig) -> anyhow::Result<()> {
    output::step("Lint", &config.dockerfile.display().to_string());
    build::lint(&SystemRunner, &linter(args), &config.dockerfile)?;
    output::ok("Dockerfile lint passed");
    Ok(())
}
