//! `serde` + `toml` configuration with per-network defaults, mirroring
//! `jiopad::config::Config` (`Config::for_network`/`Config::load`/
//! `apply_cli_overrides`). Everything here feeds either `store::Database`
//! bootstrap or the genesis `GlobalParamsEntry` the core reads at block 0;
//! it configures no networking, RPC, or mining behavior of its own, since
//! this core doesn't implement those.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub genesis_params: GenesisParamsConfig,
    pub rpc: RpcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Seeds the genesis `GlobalParamsEntry` a node's store needs before it can
/// validate its first block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisParamsConfig {
    pub usd_cents_per_bitcoin: u64,
    pub min_network_fee_nanos_per_kb: u64,
    pub profile_creation_fee_nanos: u64,
    pub nft_creation_fee_nanos: u64,
    pub max_copies_per_nft: u64,
    pub balance_model_fork_height: u64,
    /// Hex-encoded 33-byte public key installed as the sole update
    /// authority the first time `UpdateGlobalParams` ever connects.
    pub update_authority_public_key_hex: String,
}

/// Whether and where the (externally implemented) RPC surface should
/// listen — this crate only threads the setting through to whatever binds
/// `collaborators::RpcSurface`, it doesn't itself open a socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, String> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| format!("failed to read config file: {e}"))?;
            toml::from_str(&content).map_err(|e| format!("failed to parse config: {e}"))
        } else {
            Ok(Config::default())
        }
    }

    pub fn for_network(network: &str) -> Result<Self, String> {
        let mut config = Config::default();
        match network {
            "mainnet" | "testnet" | "devnet" => config.network.network_id = network.to_string(),
            other => return Err(format!("unknown network: {other}")),
        }
        Ok(config)
    }

    pub fn apply_cli_overrides(&mut self, args: &crate::cli::Args) {
        if let Some(data_dir) = &args.data_dir {
            self.storage.data_dir = data_dir.clone();
        }
        if args.no_rpc {
            self.rpc.enabled = false;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig { network_id: "mainnet".to_string() },
            storage: StorageConfig { data_dir: PathBuf::from("./data") },
            genesis_params: GenesisParamsConfig {
                usd_cents_per_bitcoin: 0,
                min_network_fee_nanos_per_kb: 1000,
                profile_creation_fee_nanos: 0,
                nft_creation_fee_nanos: 0,
                max_copies_per_nft: 1000,
                balance_model_fork_height: u64::MAX,
                update_authority_public_key_hex: "00".repeat(core_types::PUBLIC_KEY_LENGTH),
            },
            rpc: RpcConfig { enabled: true, bind_address: "127.0.0.1".to_string(), port: 18_888 },
        }
    }
}
