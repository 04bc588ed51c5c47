//! Node wiring: CLI, configuration, logging, and the external-collaborator
//! interfaces (gossip, mempool admission, the miner, and the HTTP/gRPC
//! API) — none of which this core implements.

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod daemon;

pub use config::Config;
pub use daemon::Daemon;
