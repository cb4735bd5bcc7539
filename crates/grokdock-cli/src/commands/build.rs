//! `grokdock build`: Build the image with every version tag.

use std::time::Instant;

use clap::Args;
use grokdock_common::config::CiConfig;
use grokdock_pipeline::build;
use grokdock_runtime::backend::docker::DockerCli;

use super::VersionArgs;
use crate::output;

/// Arguments for the `build` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Version inputs.
    #[command(flatten)]
    pub version: VersionArgs,
}

/// Executes the `build` command.
///
/// # Errors
///
/// Returns an error if the version cannot be derived or the build fails.
pub fn execute(args: &BuildArgs, config: &CiConfig) -> anyhow::Result<()> {
    let tags = args.version.tags()?;
    output::header();
    output::step("Build", &format!("{} [{tags}]", config.image));

    let start = Instant::now();
    let images = build::build_image(&DockerCli::new(), config, &tags)?;
    output::ok(&format!(
        "Built {} tag(s) in {}",
        images.len(),
        output::format_duration(start.elapsed())
    ));
    Ok(())
}
