//! The advisory smoke run: start, wait, verify, tear down.

use std::time::Duration;

use grokdock_common::error::Result;
use grokdock_common::types::{ContainerId, ImageRef, generate_container_name};
use grokdock_runtime::backend::RunSpec;
use grokdock_runtime::scratch::ScratchVolumes;

use crate::cleanup::RunGuard;
use crate::context::RunContext;
use crate::readiness::{self, ReadinessPolicy};
use crate::verify::{self, SmokeReport};

/// Result of a completed smoke run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeOutcome {
    /// Image that was tested.
    pub image: ImageRef,
    /// Time the container took to become ready.
    pub ready_after: Duration,
    /// Verification findings.
    pub report: SmokeReport,
}

/// Creates scratch volumes, starts `image` with both mounts and ports, and
/// waits for readiness under `policy`.
///
/// The returned guard owns every acquired resource. On error everything
/// acquired so far has already been released.
///
/// # Errors
///
/// Returns any volume, start or readiness failure.
pub fn launch<'a>(
    ctx: &RunContext<'a>,
    image: &ImageRef,
    seed_source: bool,
    policy: &ReadinessPolicy,
) -> Result<(RunGuard<'a>, ContainerId, Duration)> {
    ctx.cancel.check()?;
    let volumes = ScratchVolumes::create_in(&ctx.scratch_root)?;
    if seed_source {
        let path = volumes.seed_sample_source()?;
        tracing::debug!(path = %path.display(), "sample source written");
    }
    let mounts = volumes.mounts();
    let mut guard = RunGuard::new(ctx.runtime, volumes);

    let spec = RunSpec {
        name: generate_container_name(),
        image: image.clone(),
        mounts,
        ports: vec![ctx.config.web_port, ctx.config.rest_port],
    };
    let id = readiness::start_container(ctx, &spec)?;
    guard.attach(id.clone());

    let outcome = readiness::wait_until_ready(ctx, &id, policy)?;
    Ok((guard, id, outcome.elapsed))
}

/// Runs the smoke test against `image`.
///
/// Only a failed start, a failed readiness wait, an unwritable mount or an
/// interrupt are errors; every other finding is a warning in the report.
/// The container and scratch volumes are released on every path.
///
/// # Errors
///
/// Returns the first fatal condition.
pub fn run_smoke(ctx: &RunContext<'_>, image: &ImageRef) -> Result<SmokeOutcome> {
    tracing::info!(%image, "smoke test starting");
    let (mut guard, id, ready_after) =
        launch(ctx, image, false, &ReadinessPolicy::smoke(ctx.config))?;

    let report = verify::verify(ctx, &id)?;
    guard.release();

    Ok(SmokeOutcome {
        image: image.clone(),
        ready_after,
        report,
    })
}

#[cfg(test)]
mod tests {
    use grokdock_common::config::CiConfig;
    use grokdock_common::error::CiError;
    use grokdock_runtime::exec::ExecOutput;
    use grokdock_runtime::fakes::{FakeClock, FakeHttp, FakeRuntime};

    use super::*;

    fn image() -> ImageRef {
        ImageRef::new("opengrok/docker", "master")
    }

    fn leftovers(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).expect("read_dir").count()
    }

    #[test]
    fn healthy_image_passes_and_cleans_up() {
        let parent = tempfile::tempdir().expect("tempdir");
        let config = CiConfig::default();
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone());
        let http = FakeHttp::healthy();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(parent.path());

        let outcome = run_smoke(&ctx, &image()).expect("smoke");
        assert_eq!(outcome.ready_after, Duration::from_secs(12));
        assert!(outcome.report.is_clean());
        assert!(rt.is_removed());
        assert_eq!(leftovers(parent.path()), 0);
    }

    #[test]
    fn crash_is_fatal_and_still_cleans_up() {
        let parent = tempfile::tempdir().expect("tempdir");
        let config = CiConfig::default();
        let clock = FakeClock::new();
        let rt = FakeRuntime::new(clock.clone()).exits_after(Duration::from_secs(4));
        let http = FakeHttp::healthy();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(parent.path());

        let err = run_smoke(&ctx, &image()).unwrap_err();
        assert!(matches!(err, CiError::ContainerCrashed { .. }));
        assert!(rt.is_removed());
        assert_eq!(leftovers(parent.path()), 0);
    }

    #[test]
    fn unwritable_mount_is_fatal_and_still_cleans_up() {
        let parent = tempfile::tempdir().expect("tempdir");
        let config = CiConfig::default();
        let clock = FakeClock::new();
        let rt = FakeRuntime::healthy(clock.clone())
            .respond("test -w /opengrok/src", ExecOutput::failed(1, ""));
        let http = FakeHttp::healthy();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(parent.path());

        let err = run_smoke(&ctx, &image()).unwrap_err();
        assert!(matches!(err, CiError::MountNotWritable { .. }));
        assert!(rt.is_removed());
        assert_eq!(leftovers(parent.path()), 0);
    }

    #[test]
    fn failed_start_leaves_no_directories() {
        let parent = tempfile::tempdir().expect("tempdir");
        let config = CiConfig::default();
        let clock = FakeClock::new();
        let rt = FakeRuntime::new(clock.clone()).start_error("pull access denied");
        let http = FakeHttp::new();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(parent.path());

        let err = run_smoke(&ctx, &image()).unwrap_err();
        assert!(matches!(err, CiError::ContainerStart { .. }));
        assert_eq!(rt.count("stop"), 0);
        assert_eq!(leftovers(parent.path()), 0);
    }

    #[test]
    fn interrupt_during_wait_releases_everything() {
        let parent = tempfile::tempdir().expect("tempdir");
        let config = CiConfig::default();
        let clock = FakeClock::new();
        let rt = FakeRuntime::new(clock.clone());
        let http = FakeHttp::new();
        let ctx = RunContext::new(&config, &rt, &http, &*clock).with_scratch_root(parent.path());

        let volumes = ScratchVolumes::create_in(parent.path()).expect("volumes");
        let mut guard = RunGuard::new(&rt, volumes);
        let id = readiness::start_container(
            &ctx,
            &RunSpec {
                name: generate_container_name(),
                image: image(),
                mounts: guard.volumes().mounts(),
                ports: vec![8080, 5000],
            },
        )
        .expect("start");
        guard.attach(id.clone());

        ctx.cancel.cancel();
        let err = readiness::wait_until_ready(&ctx, &id, &ReadinessPolicy::smoke(&config)).unwrap_err();
        assert!(matches!(err, CiError::Interrupted));
        drop(guard);

        assert!(rt.is_removed());
        assert_eq!(leftovers(parent.path()), 0);
    }
}
