//! `grokdock suite`: Run the ordered verification suite.

use std::path::PathBuf;

use clap::Args;
use grokdock_common::config::CiConfig;
use grokdock_pipeline::suite::run_suite;

use super::{Session, VersionArgs, primary_image};
use crate::output;

/// Arguments for the `suite` command.
#[derive(Args, Debug)]
pub struct SuiteArgs {
    /// Version inputs selecting the tag under test.
    #[command(flatten)]
    pub version: VersionArgs,

    /// Write the JSON report to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Executes the `suite` command.
///
/// # Errors
///
/// Returns an error if setup fails or any check fails.
pub fn execute(args: &SuiteArgs, config: &CiConfig) -> anyhow::Result<()> {
    let tags = args.version.tags()?;
    let image = primary_image(config, &tags);
    output::header();
    output::step("Suite", &image.to_string());

    let session = Session::open(config)?;
    let report = run_suite(&session.context(config), &image)?;
    output::suite_report(&report);
    if let Some(path) = &args.report {
        report.write(path)?;
        output::note(&format!("Report written to {}", path.display()));
    }
    let _ = report.into_result()?;
    Ok(())
}
