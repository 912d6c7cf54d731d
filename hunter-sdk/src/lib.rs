//! Shared data objects for Hunter.
//!
//! These types travel between the orchestrator, the broadcast pool and the
//! HTTP surface, so they live in their own crate with a small dependency set.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
