//! Ephemeral host directories bound into the container under test.

use std::path::{Path, PathBuf};

use grokdock_common::constants;
use grokdock_common::error::{CiError, Result};
use grokdock_common::types::BindMount;
use tempfile::TempDir;

/// The source and data directories of one run.
///
/// Dropping the value deletes both directories; [`ScratchVolumes::remove`]
/// does so eagerly and may be called any number of times.
#[derive(Debug)]
pub struct ScratchVolumes {
    src: Option<TempDir>,
    data: Option<TempDir>,
    src_path: PathBuf,
    data_path: PathBuf,
}

impl ScratchVolumes {
    /// Creates both directories under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created.
    pub fn create_in(parent: &Path) -> Result<Self> {
        let src = make_dir(parent, "src")?;
        let data = make_dir(parent, "data")?;
        let src_path = src.path().to_path_buf();
        let data_path = data.path().to_path_buf();
        tracing::info!(src = %src_path.display(), data = %data_path.display(), "scratch volumes created");
        Ok(Self {
            src: Some(src),
            data: Some(data),
            src_path,
            data_path,
        })
    }

    /// Writes the sample source file the indexer picks up.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn seed_sample_source(&self) -> Result<PathBuf> {
        let path = self.src_path.join(constants::SAMPLE_SOURCE_NAME);
        std::fs::write(&path, constants::SAMPLE_SOURCE).map_err(|e| CiError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Host path of the source directory.
    #[must_use]
    pub fn src(&self) -> &Path {
        &self.src_path
    }

    /// Host path of the data directory.
    #[must_use]
    pub fn data(&self) -> &Path {
        &self.data_path
    }

    /// Bind mounts for `/opengrok/src` and `/opengrok/data`.
    #[must_use]
    pub fn mounts(&self) -> Vec<BindMount> {
        vec![
            BindMount::new(&self.src_path, constants::SRC_MOUNT),
            BindMount::new(&self.data_path, constants::DATA_MOUNT),
        ]
    }

    /// Deletes both directories recursively. Later calls are no-ops.
    ///
    /// Removal failures are logged, not returned.
    pub fn remove(&mut self) {
        for dir in [self.src.take(), self.data.take()].into_iter().flatten() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => tracing::debug!(path = %path.display(), "scratch directory removed"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch directory");
                }
            }
        }
    }

    /// Returns whether [`ScratchVolumes::remove`] has run.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.src.is_none() && self.data.is_none()
    }
}

fn make_dir(parent: &Path, role: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("{}{role}-", constants::SCRATCH_PREFIX))
        .tempdir_in(parent)
        .map_err(|e| CiError::Io {
            path: parent.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_makes_two_distinct_directories() {
        let parent = tempfile::tempdir().expect("tempdir");
        let volumes = ScratchVolumes::create_in(parent.path()).expect("create");
        assert!(volumes.src().is_dir());
        assert!(volumes.data().is_dir());
        assert_ne!(volumes.src(), volumes.data());
    }

    #[test]
    fn mounts_target_fixed_container_paths() {
        let parent = tempfile::tempdir().expect("tempdir");
        let volumes = ScratchVolumes::create_in(parent.path()).expect("create");
        let mounts = volumes.mounts();
        assert_eq!(mounts[0].container, "/opengrok/src");
        assert_eq!(mounts[0].host, volumes.src());
        assert_eq!(mounts[1].container, "/opengrok/data");
    }

    #[test]
    fn seed_writes_sample_source() {
        let parent = tempfile::tempdir().expect("tempdir");
        let volumes = ScratchVolumes::create_in(parent.path()).expect("create");
        let path = volumes.seed_sample_source().expect("seed");
        assert!(path.ends_with("test.java"));
        let content = std::fs::read_to_string(path).expect("read");
        assert!(content.contains("public class Test"));
    }

    #[test]
    fn remove_deletes_nested_content_and_is_idempotent() {
        let parent = tempfile::tempdir().expect("tempdir");
        let mut volumes = ScratchVolumes::create_in(parent.path()).expect("create");
        std::fs::create_dir_all(volumes.data().join("index/sub")).expect("mkdir");
        let _ = volumes.seed_sample_source().expect("seed");
        let (src, data) = (volumes.src().to_path_buf(), volumes.data().to_path_buf());

        volumes.remove();
        volumes.remove();

        assert!(volumes.is_removed());
        assert!(!src.exists());
        assert!(!data.exists());
    }

    #[test]
    fn drop_deletes_directories() {
        let parent = tempfile::tempdir().expect("tempdir");
        let volumes = ScratchVolumes::create_in(parent.path()).expect("create");
        let src = volumes.src().to_path_buf();
        drop(volumes);
        assert!(!src.exists());
    }
}
