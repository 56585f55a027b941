//! The hub relayer binary: command line, observability, metrics endpoint and
//! shutdown handling around [`hub_relayer_core`].
#![deny(clippy::nursery, clippy::pedantic, missing_docs)]

pub mod cli;
pub mod observability;
pub mod server;
pub mod shutdown;
