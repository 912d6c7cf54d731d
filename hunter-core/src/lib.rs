#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod broadcast;
pub mod events;
pub mod launcher;
pub mod output;
pub mod processors;
pub mod registry;
pub mod source;
pub mod storage;
