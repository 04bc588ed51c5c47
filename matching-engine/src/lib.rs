//! The DAO coin limit-order book: balance accounting, order storage,
//! legacy-UTXO input consumption, and price-time priority matching, all
//! staged against a [`state::StagedView`] so a failed transaction rolls
//! back cleanly under the Safe View.

pub mod book;
pub mod engine;
pub mod ledger;
pub mod utxo;

pub use engine::{cancel_order, disconnect, place_order, MatchOutcome, OrderBookReverseOp, PlaceOrderRequest};
