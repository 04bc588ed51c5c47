//! Thin orchestration: open the store, seed the genesis `GlobalParamsEntry`
//! if none is recorded yet, and expose `connect_block`/`disconnect_block`
//! for whatever external collaborator (miner, gossip relay, RPC surface)
//! drives this node. Mirrors `jiopad::daemon::Daemon::new` wiring storage
//! first and consensus on top of it, but without the network/mining/RPC
//! components this core doesn't implement.

use crate::config::Config;
use chain::{Block, BlockReverseOps};
use core_types::PublicKey;
use state::StagedView;
use std::sync::Arc;
use store::Database;
use tracing::info;

pub struct Daemon {
    config: Config,
    store: Arc<Database>,
}

impl Daemon {
    pub fn new(config: Config) -> Result<Self, String> {
        info!(data_dir = ?config.storage.data_dir, network = %config.network.network_id, "opening store");
        let store = Arc::new(Database::open(&config.storage.data_dir).map_err(|e| e.to_string())?);

        let mut bootstrap = StagedView::new(store.clone());
        if txn::params::effective_global_params(&bootstrap, 0).map_err(|e| e.to_string())?.is_none() {
            info!("seeding genesis global params entry");
            seed_genesis_params(&mut bootstrap, &config)?;
            bootstrap.flush().map_err(|e| e.to_string())?;
        }

        Ok(Self { config, store })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<Database> {
        self.store.clone()
    }

    /// Opens a fresh staged view over the current store contents, connects
    /// `block` against it, and flushes on success. On failure nothing is
    /// written through — `connect_block` itself leaves no staged trace in
    /// that case.
    pub fn submit_block(&self, block: &Block) -> Result<BlockReverseOps, String> {
        let mut view = StagedView::new(self.store.clone());
        let ops = chain::connect_block(&mut view, block).map_err(|e| e.to_string())?;
        view.flush().map_err(|e| e.to_string())?;
        Ok(ops)
    }
}

fn seed_genesis_params(view: &mut StagedView, config: &Config) -> Result<(), String> {
    let authority_bytes = hex::decode(&config.genesis_params.update_authority_public_key_hex)
        .map_err(|e| format!("invalid genesis authority key hex: {e}"))?;
    let authority = PublicKey::try_from(authority_bytes.as_slice()).map_err(|_| "genesis authority key must be 33 bytes".to_string())?;

    txn::params::apply_update(
        view,
        &authority,
        0,
        Some(config.genesis_params.usd_cents_per_bitcoin),
        Some(config.genesis_params.min_network_fee_nanos_per_kb),
        Some(config.genesis_params.profile_creation_fee_nanos),
        Some(config.genesis_params.nft_creation_fee_nanos),
        Some(config.genesis_params.max_copies_per_nft),
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}
