//! rebrokerd: the remote environment broker daemon.
//!
//! Assembles the broker from a `broker.toml`: a redb state store, the remote
//! environment registry, EnvironmentMappings, the in-memory cluster stand-in,
//! and the OSB HTTP API on top.

pub mod config;
pub mod standalone;

pub use config::BrokerFileConfig;
pub use standalone::{assemble, Assembled};
