//! The full CI sequence: lint, build, smoke, suite, publish.

use std::path::PathBuf;

use grokdock_common::error::Result;
use grokdock_common::types::{ImageRef, TagSet};
use grokdock_runtime::backend::ImageRegistry;
use grokdock_runtime::process::ProcessRunner;

use crate::build::{self, Linter};
use crate::context::RunContext;
use crate::publish::{self, PublishInputs, PublishOutcome};
use crate::smoke::{self, SmokeOutcome};
use crate::suite::{self, SuiteReport};

/// What a CI run should do.
#[derive(Debug, Clone)]
pub struct CiPlan {
    /// Tags to build and push.
    pub tags: TagSet,
    /// Publish gate inputs.
    pub inputs: PublishInputs,
    /// Linter to run before the build; `None` skips linting.
    pub linter: Option<Linter>,
    /// Whether the gating suite runs after the smoke test.
    pub run_suite: bool,
    /// Where to write the suite report.
    pub report: Option<PathBuf>,
    /// Evaluate the publish gate without pushing.
    pub dry_run: bool,
}

/// Everything a successful CI run produced.
#[derive(Debug, Clone)]
pub struct CiSummary {
    /// Images built.
    pub images: Vec<ImageRef>,
    /// Smoke test result.
    pub smoke: SmokeOutcome,
    /// Suite result, when it ran.
    pub suite: Option<SuiteReport>,
    /// Publish result.
    pub publish: PublishOutcome,
}

/// Runs the pipeline top to bottom. Any fatal step stops the run before
/// publication.
///
/// # Errors
///
/// Returns the first fatal condition, including `CiError::SuiteFailed`
/// when any suite check failed.
pub fn run_ci(
    ctx: &RunContext<'_>,
    registry: &dyn ImageRegistry,
    runner: &dyn ProcessRunner,
    plan: &CiPlan,
) -> Result<CiSummary> {
    tracing::info!(tags = %plan.tags, release = plan.tags.is_release(), "CI run starting");

    if let Some(linter) = &plan.linter {
        build::lint(runner, linter, &ctx.config.dockerfile)?;
    }
    let images = build::build_image(registry, ctx.config, &plan.tags)?;
    let primary = ImageRef::new(&ctx.config.image, plan.tags.primary());

    let smoke = smoke::run_smoke(ctx, &primary)?;

    let suite = if plan.run_suite {
        let report = suite::run_suite(ctx, &primary)?;
        if let Some(path) = &plan.report {
            report.write(path)?;
            tracing::info!(path = %path.display(), "suite report written");
        }
        Some(report.into_result()?)
    } else {
        None
    };

    ctx.cancel.check()?;
    let publish = publish::publish(registry, ctx.config, &plan.tags, &plan.inputs, plan.dry_run)?;

    Ok(CiSummary {
        images,
        smoke,
        suite,
        publish,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use grokdock_common::config::CiConfig;
    use grokdock_common::error::CiError;
    use grokdock_runtime::fakes::{FakeClock, FakeHttp, FakeRuntime, RecordingRunner};

    use super::*;

    fn config(dir: &Path) -> CiConfig {
        let dockerfile = dir.join("Dockerfile");
        std::fs::write(&dockerfile, "FROM tomcat:10-jdk21\n").expect("write");
        CiConfig {
            dockerfile,
            context: dir.to_path_buf(),
            ..CiConfig::default()
        }
    }

    fn plan(run_suite: bool) -> CiPlan {
        CiPlan {
            tags: TagSet::branch(),
            inputs: PublishInputs {
                event: Some("push".into()),
                repo_slug: Some("oracle/opengrok".into()),
                username: Some("bot".into()),
                token: Some("t0ken".into()),
            },
            linter: Some(Linter::Container {
                engine: "docker".into(),
                image: "hadolint/hadolint".into(),
            }),
            run_suite,
            report: None,
            dry_run: false,
        }
    }

    #[test]
    fn smoke_then_publish_on_the_canonical_repository() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path());
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone());
        let http = FakeHttp::healthy();
        let runner = RecordingRunner::new();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(scratch.path());

        let summary = run_ci(&ctx, &rt, &runner, &plan(false)).expect("ci");
        assert_eq!(runner.calls().len(), 1);
        assert!(summary.smoke.report.is_clean());
        assert!(matches!(summary.publish, PublishOutcome::Pushed(_)));

        let calls = rt.calls();
        assert_eq!(calls.first().map(String::as_str), Some("build opengrok/docker:master"));
        assert_eq!(calls.last().map(String::as_str), Some("push opengrok/docker:master"));
    }

    #[test]
    fn failed_suite_blocks_publication_and_writes_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path());
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone()).log_line("FATAL: bad config");
        let http = FakeHttp::healthy();
        let runner = RecordingRunner::new();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(scratch.path());

        let report = dir.path().join("suite.json");
        let plan = CiPlan {
            report: Some(report.clone()),
            ..plan(true)
        };
        let err = run_ci(&ctx, &rt, &runner, &plan).unwrap_err();
        assert!(matches!(err, CiError::SuiteFailed { failed: 1, total: 10 }));
        assert_eq!(rt.count("login"), 0);
        assert_eq!(rt.count("push"), 0);
        assert!(report.is_file());
    }

    #[test]
    fn smoke_warnings_do_not_block_publication() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path());
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone()).log_line("ERROR something recoverable");
        let http = FakeHttp::healthy();
        let runner = RecordingRunner::new();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(scratch.path());

        let summary = run_ci(&ctx, &rt, &runner, &plan(false)).expect("ci");
        assert_eq!(summary.smoke.report.error_lines, 1);
        assert!(matches!(summary.publish, PublishOutcome::Pushed(_)));
    }

    #[test]
    fn crash_stops_before_publication() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path());
        let clock = FakeClock::new();
        let rt = FakeRuntime::new(clock.clone()).exits_after(std::time::Duration::from_secs(2));
        let http = FakeHttp::healthy();
        let runner = RecordingRunner::new();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(scratch.path());

        let err = run_ci(&ctx, &rt, &runner, &plan(false)).unwrap_err();
        assert!(matches!(err, CiError::ContainerCrashed { .. }));
        assert_eq!(rt.count("push"), 0);
        assert!(rt.is_removed());
    }
}
