//! A block as the driver sees it: the block-reward transaction followed by
//! the ordinary transactions it carries. Header chain selection, parent
//! linkage, and difficulty are the P2P/chain-selection layer's concern,
//! out of scope here — this crate only needs a height (for the reward
//! schedule and global-params lookups) and the transaction list.

use crate::errors::{ChainError, ChainResult};
use core_types::wire::Transaction;
use txn::ReverseOperation;

/// A connectable block: `transactions[0]` must be the block-reward
/// transaction, by the same convention a legacy UTXO chain gives its
/// coinbase.
#[derive(Debug, Clone)]
pub struct Block {
    pub height: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Splits the block reward off the front of the transaction list.
    pub fn split_reward(&self) -> ChainResult<(&Transaction, &[Transaction])> {
        match self.transactions.split_first() {
            None => Err(ChainError::EmptyBlock),
            Some((reward, rest)) if reward.is_block_reward() => Ok((reward, rest)),
            Some(_) => Err(ChainError::MissingBlockReward),
        }
    }
}

/// One connected block's full pre-image: every transaction's reverse-ops
/// (the block reward's own ops first), in block order. `disconnect_block`
/// walks this in reverse, and within each transaction's entry its own ops
/// are replayed in reverse by `txn::disconnect`.
#[derive(Debug, Clone, Default)]
pub struct BlockReverseOps {
    pub per_transaction: Vec<Vec<ReverseOperation>>,
}
