//! # grokdock-pipeline
//!
//! The CI pipeline for the OpenGrok container image. Control flows strictly
//! downward:
//!
//! 1. [`version`]: derive the tag set from the git ref or explicit tag.
//! 2. [`build`]: lint the Dockerfile and build every tag.
//! 3. [`readiness`]: start the container and poll until it is ready.
//! 4. [`verify`]: advisory smoke checks against the ready container.
//! 5. [`cleanup`]: stop and remove the container, delete scratch volumes.
//! 6. [`publish`]: gate on event and repository, then push every tag.
//!
//! [`suite`] runs the ordered, gating verification checks and [`ci`] wires
//! the whole sequence together.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod build;
pub mod cancel;
pub mod ci;
pub mod cleanup;
pub mod context;
pub mod probes;
pub mod publish;
pub mod readiness;
pub mod smoke;
pub mod suite;
pub mod verify;
pub mod version;
