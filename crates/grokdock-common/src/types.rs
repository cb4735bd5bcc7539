//! Domain primitive types used across the grokdock workspace.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Handle of a container instance as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened form suitable for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates a unique container name for one run.
#[must_use]
pub fn generate_container_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", crate::constants::APP_NAME, &id[..12])
}

/// Fully qualified image reference (`repository:tag`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    /// Image repository, e.g. `opengrok/docker`.
    pub repository: String,
    /// Image tag, e.g. `1.13`.
    pub tag: String,
}

impl ImageRef {
    /// Creates an image reference.
    #[must_use]
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// The ordered set of tags one build is published under.
///
/// Immutable once computed; parameterizes both build and push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    tags: Vec<String>,
    release: bool,
}

impl TagSet {
    /// Tag set of a tagged release build. Duplicate tags are dropped,
    /// keeping first occurrence order.
    #[must_use]
    pub fn release(tags: impl IntoIterator<Item = String>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        Self {
            tags: unique,
            release: true,
        }
    }

    /// Tag set of an untagged branch build.
    #[must_use]
    pub fn branch() -> Self {
        Self {
            tags: vec![crate::constants::MASTER_TAG.to_string()],
            release: false,
        }
    }

    /// Returns the tags in order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns whether this is a tagged release build.
    #[must_use]
    pub const fn is_release(&self) -> bool {
        self.release
    }

    /// Returns the first tag, used to run the built image.
    #[must_use]
    pub fn primary(&self) -> &str {
        self.tags
            .first()
            .map_or(crate::constants::MASTER_TAG, String::as_str)
    }

    /// Qualifies every tag with the given repository.
    #[must_use]
    pub fn image_refs(&self, repository: &str) -> Vec<ImageRef> {
        self.tags
            .iter()
            .map(|tag| ImageRef::new(repository, tag.clone()))
            .collect()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tags.join(" "))
    }
}

/// A host directory bound into the container at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    /// Host-side directory.
    pub host: PathBuf,
    /// In-container path.
    pub container: String,
}

impl BindMount {
    /// Creates a bind mount specification.
    #[must_use]
    pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for BindMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.display(), self.container)
    }
}
