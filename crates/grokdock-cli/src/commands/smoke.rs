//! `grokdock smoke`: Start the image and run the advisory checks.

use clap::Args;
use grokdock_common::config::CiConfig;
use grokdock_pipeline::smoke::run_smoke;

use super::{Session, VersionArgs, primary_image};
use crate::output;

/// Arguments for the `smoke` command.
#[derive(Args, Debug)]
pub struct SmokeArgs {
    /// Version inputs selecting the tag under test.
    #[command(flatten)]
    pub version: VersionArgs,
}

/// Executes the `smoke` command.
///
/// # Errors
///
/// Returns an error on a fatal smoke condition: failed start, crash,
/// readiness timeout, unwritable mount or interrupt.
pub fn execute(args: &SmokeArgs, config: &CiConfig) -> anyhow::Result<()> {
    let tags = args.version.tags()?;
    let image = primary_image(config, &tags);
    output::header();
    output::step("Smoke", &image.to_string());

    let session = Session::open(config)?;
    let outcome = run_smoke(&session.context(config), &image)?;
    output::smoke_report(&outcome);
    Ok(())
}
