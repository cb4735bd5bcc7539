//! Seams between the CI pipeline and the outside world.
//!
//! - **Process**: a [`process::ProcessRunner`] capability returning
//!   stdout, stderr and exit code for any external command.
//! - **Backend**: the [`backend::ContainerRuntime`] and
//!   [`backend::ImageRegistry`] traits with the Docker CLI implementation.
//! - **HTTP**: bounded-timeout GET probes.
//! - **Scratch**: host directories bound into the container under test.
//! - **Clock**: monotonic time and sleeping, swappable in tests.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod clock;
pub mod exec;
#[cfg(any(test, feature = "fakes"))]
pub mod fakes;
pub mod http;
pub mod logs;
pub mod process;
pub mod scratch;
