use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "node")]
#[command(about = "State-transition core node (signature policy, connect/disconnect dispatch, matching engine, access groups)", long_about = None)]
pub struct Args {
    /// Path to configuration file (optional, uses defaults if not provided).
    #[arg(short, long)]
    pub config_path: Option<PathBuf>,

    /// Data directory the store opens its column families under.
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Network (mainnet, testnet, devnet).
    #[arg(short, long)]
    pub network: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Disable the RPC surface stub (the real HTTP/gRPC API is out of
    /// this core's scope; see `collaborators::RpcSurface`).
    #[arg(long)]
    pub no_rpc: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}
