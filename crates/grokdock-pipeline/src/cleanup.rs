//! Guaranteed release of the container and scratch volumes.
//!
//! [`RunGuard`] pairs every acquisition (scratch volumes, container start)
//! with its release. Release happens on the first of: an explicit
//! [`RunGuard::release`], an early return through `?`, unwinding, or the
//! end of scope after an interrupt. It runs its effects exactly once.

use grokdock_common::types::ContainerId;
use grokdock_runtime::backend::ContainerRuntime;
use grokdock_runtime::scratch::ScratchVolumes;

/// Owner of the resources acquired by one run.
pub struct RunGuard<'a> {
    runtime: &'a dyn ContainerRuntime,
    volumes: ScratchVolumes,
    container: Option<ContainerId>,
    released: bool,
}

impl<'a> RunGuard<'a> {
    /// Takes ownership of the scratch volumes.
    #[must_use]
    pub fn new(runtime: &'a dyn ContainerRuntime, volumes: ScratchVolumes) -> Self {
        Self {
            runtime,
            volumes,
            container: None,
            released: false,
        }
    }

    /// Registers the started container.
    ///
    /// Only one container is live per run: a previously attached container
    /// is torn down first.
    pub fn attach(&mut self, id: ContainerId) {
        if let Some(previous) = self.container.take() {
            tracing::warn!(id = %previous.short(), "replacing live container");
            self.teardown_container(&previous);
        }
        self.container = Some(id);
    }

    /// The attached container, if any.
    #[must_use]
    pub const fn container(&self) -> Option<&ContainerId> {
        self.container.as_ref()
    }

    /// The scratch volumes.
    #[must_use]
    pub const fn volumes(&self) -> &ScratchVolumes {
        &self.volumes
    }

    /// Returns whether release has already run.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Stops and removes the container, then deletes the scratch volumes.
    /// Calls after the first are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(id) = self.container.take() {
            self.teardown_container(&id);
        }
        self.volumes.remove();
        tracing::info!("cleanup complete");
    }

    fn teardown_container(&self, id: &ContainerId) {
        // Either call fails harmlessly once the container is already gone.
        if let Err(e) = self.runtime.stop(id) {
            tracing::debug!(id = %id.short(), error = %e, "stop skipped");
        }
        if let Err(e) = self.runtime.remove(id) {
            tracing::debug!(id = %id.short(), error = %e, "remove skipped");
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
