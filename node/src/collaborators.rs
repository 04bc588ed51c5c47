//! Interfaces of the external collaborators this core treats as out of
//! scope: the peer-to-peer gossip layer, the miner, the mempool's
//! admission policy, and the HTTP/gRPC API. Only the shape of each
//! collaborator's contact with the core is defined here — none of these
//! traits are implemented in this crate, only their interfaces with the
//! core are named.

use async_trait::async_trait;
use chain::Block;
use core_types::wire::Transaction;
use core_types::CoreResult;

/// What the mempool needs from the core to decide whether a candidate
/// transaction may be admitted: nothing beyond a connect trial against a
/// disposable view. The mempool's own prioritization and eviction policy
/// lives entirely outside this core.
#[async_trait]
pub trait MempoolAdmission: Send + Sync {
    /// Trials `tx` against a speculative view and reports whether it would
    /// connect, without leaving any staged effect observable afterward.
    async fn admit(&self, tx: &Transaction) -> CoreResult<()>;
}

/// What a miner needs from the core: a block template to extend (the
/// ordered transaction list a new block should carry, excluding the block
/// reward it will prepend itself) and a place to submit the block it
/// found. Chain selection, difficulty retargeting, and PoW search
/// themselves are the miner's job, not the core's.
#[async_trait]
pub trait BlockTemplateSink: Send + Sync {
    async fn block_template(&self, height: u64) -> CoreResult<Vec<Transaction>>;
    async fn submit_block(&self, block: Block) -> CoreResult<()>;
}

/// What the gossip layer needs from the core: nothing beyond being handed
/// already-parsed transactions and blocks to connect. Peer discovery,
/// propagation, and the wire protocol itself live entirely in the
/// network layer.
#[async_trait]
pub trait GossipRelay: Send + Sync {
    async fn on_transaction_received(&self, tx: Transaction) -> CoreResult<()>;
    async fn on_block_received(&self, block: Block) -> CoreResult<()>;
}

/// What an HTTP/gRPC API needs from the core: read access to the store's
/// current committed state plus a connect entry point. This core exposes
/// no transport of its own.
#[async_trait]
pub trait RpcSurface: Send + Sync {
    async fn submit_transaction(&self, tx: Transaction) -> CoreResult<()>;
}
