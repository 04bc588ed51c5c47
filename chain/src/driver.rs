//! Block connect/disconnect driver. `connect_block` applies the
//! block-reward transaction then every remaining transaction via
//! `txn::connect`, threading reverse-operations; under a debug or test
//! build it also runs a connect-then-disconnect round trip and checks the
//! store checksum is unchanged, the way `BodyProcessor::process_body`
//! validates before committing.

use crate::block::{Block, BlockReverseOps};
use crate::errors::{ChainError, ChainResult};
use crate::rewards::max_allowed_reward_nanos;
use state::StagedView;
use tracing::{debug, info, warn};

/// Connects `block` against `view`. On any transaction's failure, every
/// transaction already connected earlier in this block is rolled back via
/// `txn::disconnect` before the error is returned. The failing transaction
/// itself never reaches `per_transaction` in the first place: `txn::connect`
/// unwinds whatever it staged before propagating its own error, so there is
/// nothing left over for this loop to clean up on its behalf. Together,
/// a partially invalid block never leaves partial effects staged — the same
/// all-or-nothing guarantee `state::SafeView::try_connect` gives a single
/// transaction, lifted to block granularity.
///
/// In a debug or test build this additionally verifies the round-trip
/// property in place: disconnects everything it just connected,
/// compares the view's checksum against what it was before, and — if
/// equal — reconnects for real before returning. A checksum mismatch is a
/// bug in a connect/disconnect pair and is itself returned as an error
/// rather than silently ignored.
pub fn connect_block(view: &mut StagedView, block: &Block) -> ChainResult<BlockReverseOps> {
    #[cfg(any(test, debug_assertions))]
    {
        let pre_checksum = view.checksum()?;
        let ops = connect_block_inner(view, block)?;
        disconnect_block(view, &ops)?;
        let post_checksum = view.checksum()?;
        if post_checksum != pre_checksum {
            warn!(height = block.height, "round-trip checksum mismatch");
            return Err(ChainError::RoundTripChecksumMismatch);
        }
        return connect_block_inner(view, block);
    }

    #[cfg(not(any(test, debug_assertions)))]
    connect_block_inner(view, block)
}

fn connect_block_inner(view: &mut StagedView, block: &Block) -> ChainResult<BlockReverseOps> {
    let (reward_tx, rest) = block.split_reward()?;
    let mut per_transaction = Vec::with_capacity(block.transactions.len());

    let max_reward = max_allowed_reward_nanos(block.height);
    let reward_hash = reward_tx.content_hash();
    let reward_ops = txn::connect_block_reward(view, reward_tx, block.height, reward_hash, max_reward)?;
    per_transaction.push(reward_ops);

    for tx in rest {
        let content_hash = tx.content_hash();
        match txn::connect(view, tx, block.height, content_hash) {
            Ok(outcome) => per_transaction.push(outcome.reverse_ops),
            Err(err) => {
                for ops in per_transaction.iter().rev() {
                    txn::disconnect(view, ops)?;
                }
                return Err(ChainError::from(err));
            }
        }
    }

    debug!(height = block.height, transactions = block.transactions.len(), "connected block");
    Ok(BlockReverseOps { per_transaction })
}

/// Walks a block's transactions in reverse, disconnecting each one's
/// reverse-ops in turn. A failure here indicates corrupted reverse-ops or
/// an on-disk inconsistency, not a normal validation outcome — a disconnect
/// error is fatal to the whole block, not recoverable.
pub fn disconnect_block(view: &mut StagedView, ops: &BlockReverseOps) -> ChainResult<()> {
    for tx_ops in ops.per_transaction.iter().rev() {
        txn::disconnect(view, tx_ops)?;
    }
    info!(transactions = ops.per_transaction.len(), "disconnected block");
    Ok(())
}
