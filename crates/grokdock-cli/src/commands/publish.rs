//! `grokdock publish`: Push every version tag when the gate allows it.

use clap::Args;
use grokdock_common::config::CiConfig;
use grokdock_pipeline::publish::publish;
use grokdock_runtime::backend::docker::DockerCli;

use super::{PublishArgs, VersionArgs};
use crate::output;

/// Arguments for the `publish` command.
#[derive(Args, Debug)]
pub struct PublishCmdArgs {
    /// Version inputs.
    #[command(flatten)]
    pub version: VersionArgs,

    /// Publish gate inputs.
    #[command(flatten)]
    pub gate: PublishArgs,
}

/// Executes the `publish` command. A skipped publication succeeds.
///
/// # Errors
///
/// Returns an error if credentials are missing or login or a push fails.
pub fn execute(args: &PublishCmdArgs, config: &CiConfig) -> anyhow::Result<()> {
    let tags = args.version.tags()?;
    output::header();
    output::step("Publish", &format!("{} [{tags}]", config.image));

    let outcome = publish(
        &DockerCli::new(),
        config,
        &tags,
        &args.gate.inputs(),
        args.gate.dry_run,
    )?;
    output::publish_outcome(&outcome);
    Ok(())
}
