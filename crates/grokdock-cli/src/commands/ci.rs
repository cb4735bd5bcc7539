//! `grokdock ci`: The whole pipeline in one invocation.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use grokdock_common::config::CiConfig;
use grokdock_pipeline::build::Linter;
use grokdock_pipeline::ci::{CiPlan, run_ci};
use grokdock_runtime::process::SystemRunner;

use super::{PublishArgs, Session, VersionArgs};
use crate::output;

/// Arguments for the `ci` command.
#[derive(Args, Debug)]
pub struct CiArgs {
    /// Version inputs.
    #[command(flatten)]
    pub version: VersionArgs,

    /// Publish gate inputs.
    #[command(flatten)]
    pub gate: PublishArgs,

    /// Run the gating verification suite after the smoke test.
    #[arg(long)]
    pub suite: bool,

    /// Write the suite's JSON report to this path.
    #[arg(long, requires = "suite")]
    pub report: Option<PathBuf>,

    /// Skip the Dockerfile lint.
    #[arg(long)]
    pub no_lint: bool,
}

/// Executes the `ci` command.
///
/// # Errors
///
/// Returns the first fatal condition of any step.
pub fn execute(args: &CiArgs, config: &CiConfig) -> anyhow::Result<()> {
    let total_start = Instant::now();
    let tags = args.version.tags()?;
    output::header();
    output::step("CI", &format!("{} [{tags}]", config.image));

    let plan = CiPlan {
        tags,
        inputs: args.gate.inputs(),
        linter: (!args.no_lint).then(Linter::discover),
        run_suite: args.suite,
        report: args.report.clone(),
        dry_run: args.gate.dry_run,
    };

    let session = Session::open(config)?;
    let summary = run_ci(&session.context(config), session.docker(), &SystemRunner, &plan)?;

    output::ok(&format!("Built {} tag(s)", summary.images.len()));
    output::smoke_report(&summary.smoke);
    if let Some(report) = &summary.suite {
        output::suite_report(report);
    }
    output::publish_outcome(&summary.publish);
    output::note(&format!(
        "Finished in {}",
        output::format_duration(total_start.elapsed())
    ));
    Ok(())
}
