//! Version and tag-set resolution.
//!
//! A release is triggered by a `refs/tags/X.Y.Z` ref or an explicit tag.
//! It is published as `X.Y.Z`, `X.Y` and `latest`. Everything else is a
//! branch build published as `master`.

use grokdock_common::constants::{LATEST_TAG, TAG_REF_PREFIX};
use grokdock_common::error::{CiError, Result};
use grokdock_common::types::TagSet;

/// Full and short version of a tagged build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Full version, e.g. `1.13.2`.
    pub version: String,
    /// First two components, e.g. `1.13`.
    pub short_version: String,
}

/// Derives the version of a tagged build.
///
/// A `refs/tags/` ref wins over the explicit tag. An explicit tag that is
/// empty counts as absent. Returns `None` for branch builds.
///
/// # Errors
///
/// Returns `CiError::EmptyVersion` if the version or short version derived
/// from a tag is empty.
pub fn resolve_version(git_ref: Option<&str>, tag: Option<&str>) -> Result<Option<VersionInfo>> {
    let from_ref = git_ref.and_then(|r| r.strip_prefix(TAG_REF_PREFIX));
    let explicit = tag.filter(|t| !t.is_empty());
    let Some(raw) = from_ref.or(explicit) else {
        return Ok(None);
    };

    let input = git_ref.filter(|_| from_ref.is_some()).unwrap_or(raw);
    let version = raw.trim();
    if version.is_empty() {
        return Err(CiError::EmptyVersion {
            field: "version",
            input: input.to_string(),
        });
    }
    let short_version = short_version(version);
    if short_version.is_empty() {
        return Err(CiError::EmptyVersion {
            field: "short version",
            input: input.to_string(),
        });
    }

    Ok(Some(VersionInfo {
        version: version.to_string(),
        short_version: short_version.to_string(),
    }))
}

/// Computes the tag set for a build.
///
/// # Errors
///
/// Propagates `CiError::EmptyVersion` from [`resolve_version`].
pub fn resolve_tags(git_ref: Option<&str>, tag: Option<&str>) -> Result<TagSet> {
    let tags = match resolve_version(git_ref, tag)? {
        Some(info) => TagSet::release([info.version, info.short_version, LATEST_TAG.to_string()]),
        None => TagSet::branch(),
    };
    tracing::info!(tags = %tags, release = tags.is_release(), "resolved tag set");
    Ok(tags)
}

/// Truncates a version to its first two dot-separated components.
#[must_use]
pub fn short_version(version: &str) -> &str {
    match version.match_indices('.').nth(1) {
        Some((idx, _)) => &version[..idx],
        None => version,
    }
}
