//! The per-transaction disconnect record: one [`ReverseOperation`] per
//! connected transaction, aggregating whichever sub-crate reverse-ops its
//! handler produced. `dispatch::disconnect` replays a transaction's whole
//! `Vec<ReverseOperation>` in reverse, mirroring the way
//! `matching_engine::engine::disconnect` replays its own op list.

use access_groups::{GroupCreated, MemberReverseOp};
use core_types::entries::{DerivedKeyEntry, UtxoEntry};
use core_types::wire::TransactionOutpoint;
use core_types::{CoreResult, Pkid};
use matching_engine::OrderBookReverseOp;
use state::StagedView;

use crate::derived_key::DerivedKeyAuthorized;
use crate::params::GlobalParamsUpdated;
use crate::profile::ProfileUpdated;

/// One connected transaction's full pre-image, in the order its handler
/// produced it. `dispatch::disconnect` walks a slice of these in reverse,
/// and within an `Orders`/`Members` entry the inner `Vec` is itself
/// replayed in reverse by the sub-crate's own `disconnect`.
#[derive(Debug, Clone)]
pub enum ReverseOperation {
    /// A plain legacy-UTXO input was spent (pre-balance-model basic
    /// transfers and block rewards); disconnect restores it.
    UtxoSpent { outpoint: TransactionOutpoint, entry: UtxoEntry },
    /// A balance-model debit/credit outside the matching engine (basic
    /// transfers and DAO coin mint/burn/transfer once the balance model is
    /// active).
    BalanceChanged { holder: Pkid, creator: Pkid, is_dao_coin: bool, previous_balance: fixed_point::Uint256 },
    Profile(ProfileUpdated),
    DerivedKeyAuthorized(DerivedKeyAuthorized),
    /// The derived-key spend counters touched by this transaction, if it
    /// was signed by a derived key at all.
    DerivedKeySpend(DerivedKeyEntry),
    GlobalParams(GlobalParamsUpdated),
    GroupCreated(GroupCreated),
    Members(Vec<MemberReverseOp>),
    Orders(Vec<OrderBookReverseOp>),
}

/// Replays `ops` in reverse, restoring every pre-image exactly. Mirrors the
/// structure of `matching_engine::engine::disconnect` one level up.
pub fn disconnect(view: &mut StagedView, ops: &[ReverseOperation]) -> CoreResult<()> {
    for op in ops.iter().rev() {
        match op {
            ReverseOperation::UtxoSpent { outpoint, entry } => {
                matching_engine::utxo::restore(view, outpoint, entry)?;
            }
            ReverseOperation::BalanceChanged { holder, creator, is_dao_coin, previous_balance } => {
                matching_engine::ledger::restore_balance(view, holder, creator, *is_dao_coin, *previous_balance)?;
            }
            ReverseOperation::Profile(update) => crate::profile::disconnect(view, update)?,
            ReverseOperation::DerivedKeyAuthorized(update) => crate::derived_key::disconnect_authorized(view, update)?,
            ReverseOperation::DerivedKeySpend(previous) => crate::auth::restore_spend(view, previous)?,
            ReverseOperation::GlobalParams(update) => crate::params::disconnect_update(view, update)?,
            ReverseOperation::GroupCreated(created) => access_groups::disconnect_group_created(view, created)?,
            ReverseOperation::Members(member_ops) => access_groups::disconnect_member_modification(view, member_ops)?,
            ReverseOperation::Orders(order_ops) => matching_engine::disconnect(view, order_ops)?,
        }
    }
    Ok(())
}
