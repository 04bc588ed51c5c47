//! Block-reward subsidy schedule: `maxAllowed(height)`, the cap
//! the driver enforces against the block-reward transaction's total
//! output before it's ever dispatched to `txn::connect_block_reward`.
//! Generalizes a `CoinbaseProcessor::calculate_block_reward`-style halving
//! schedule to DESO's nano denomination.

/// Initial per-block subsidy, in nanos. Arbitrary but fixed genesis
/// constant; halves every [`BLOCKS_PER_HALVING`] blocks.
pub const INITIAL_REWARD_NANOS: u64 = 50_000_000_000;
pub const BLOCKS_PER_HALVING: u64 = 210_000;
/// After this many halvings the subsidy underflows to zero; stop shifting
/// once we'd shift a `u64` out entirely.
const MAX_HALVINGS: u64 = 64;

/// The maximum total block-reward output nanos allowed at `height`.
/// Block-reward transactions whose summed outputs exceed this fail with
/// `CoreError::BlockRewardExceedsMaxAllowed`.
pub fn max_allowed_reward_nanos(height: u64) -> u64 {
    let halvings = height / BLOCKS_PER_HALVING;
    if halvings >= MAX_HALVINGS {
        0
    } else {
        INITIAL_REWARD_NANOS >> halvings
    }
}
