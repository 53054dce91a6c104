#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod broker;
pub mod config;
pub mod consumers;
pub mod identifier;
pub mod router;
pub mod telemetry;

#[cfg(test)]
mod testing;
