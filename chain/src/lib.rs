//! Block-level connect/disconnect driver: iterates a block's transactions
//! through `txn`, threads reverse-operations, enforces the block-reward
//! cap, and verifies the connect/disconnect round trip in debug and test
//! builds.

pub mod block;
pub mod driver;
pub mod errors;
pub mod rewards;

pub use block::{Block, BlockReverseOps};
pub use driver::{connect_block, disconnect_block};
pub use errors::{ChainError, ChainResult};
