//! Transaction-level signature/derived-key policy and the connect/
//! disconnect dispatch: the generic preamble every transaction runs
//! through, the per-metadata-kind handler table, and the `ReverseOperation`
//! record `disconnect` replays to restore state exactly.

pub mod auth;
pub mod derived_key;
pub mod dispatch;
pub mod params;
pub mod prelude;
pub mod profile;
pub mod reverse_op;

pub use dispatch::{connect, connect_block_reward, disconnect, ConnectOutcome};
pub use prelude::AccountingModel;
pub use reverse_op::ReverseOperation;
