#![doc = include_str!("../README.md")]
#![deny(
    clippy::nursery,
    clippy::pedantic,
    missing_docs,
    unused_crate_dependencies
)]

pub mod balance;
pub mod channel;
pub mod config;
pub mod error;
pub mod establisher;
pub mod identity;
pub mod metrics;
pub mod orchestrator;
pub mod sequencer;
pub mod status;
pub mod supervisor;
pub mod toolchain;

pub use error::RelayerError;
pub use identity::RelayerIdentity;
