//! Coin balance reads/writes against a [`StagedView`], shared by the
//! matching engine and by `txn`'s generic prelude (basic transfers, DAO
//! coin issuance). Keyed by `(holder, creator, isDAO)`; the zero-balance
//! invariant is enforced here so callers never have to.

use core_types::entries::CoinBalanceEntry;
use core_types::keys::balance_key;
use core_types::{CoreError, CoreResult, Pkid};
use fixed_point::Uint256;
use state::StagedView;
use store::db::CF_BALANCES;

fn decode(bytes: &[u8]) -> CoreResult<CoinBalanceEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode(entry: &CoinBalanceEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

/// Returns the holder's balance of `(creator, isDAO)`, or zero if no entry
/// is staged or stored — absence and a zero balance are equivalent, per
/// the "no zero-balance entry is kept" invariant.
pub fn get_balance(view: &StagedView, holder: &Pkid, creator: &Pkid, is_dao_coin: bool) -> CoreResult<Uint256> {
    let key = balance_key(holder, creator, is_dao_coin);
    match view.get(CF_BALANCES, &key).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(decode(&bytes)?.balance),
        None => Ok(Uint256::ZERO),
    }
}

/// Stages `new_balance` for `(holder, creator, isDAO)`. A zero balance
/// stages a tombstone instead of a zeroed entry, preserving the invariant
/// that no zero-balance entry is ever kept.
pub fn set_balance(
    view: &mut StagedView,
    holder: &Pkid,
    creator: &Pkid,
    is_dao_coin: bool,
    new_balance: Uint256,
) -> CoreResult<()> {
    let key = balance_key(holder, creator, is_dao_coin);
    if new_balance.is_zero() {
        view.delete(CF_BALANCES, &key);
        return Ok(());
    }
    let entry = CoinBalanceEntry {
        holder_pkid: *holder,
        creator_pkid: *creator,
        is_dao_coin,
        balance: new_balance,
        is_deleted: false,
    };
    view.put(CF_BALANCES, &key, encode(&entry)?);
    Ok(())
}

/// Credits `amount` to the holder's balance, returning the balance
/// immediately before the credit so the caller can record it as a reverse-
/// operation pre-image.
pub fn credit(
    view: &mut StagedView,
    holder: &Pkid,
    creator: &Pkid,
    is_dao_coin: bool,
    amount: &Uint256,
) -> CoreResult<Uint256> {
    let previous = get_balance(view, holder, creator, is_dao_coin)?;
    let new_balance = previous.checked_add(amount).map_err(|_| CoreError::TotalCostOverflowsUint256)?;
    set_balance(view, holder, creator, is_dao_coin, new_balance)?;
    Ok(previous)
}

/// Debits `amount` from the holder's balance. Fails without staging
/// anything if the holder's balance is insufficient, with the error kind
/// supplied by the caller (DESO vs. DAO coin callers surface different
/// error kinds for the same underlying shortfall).
pub fn debit(
    view: &mut StagedView,
    holder: &Pkid,
    creator: &Pkid,
    is_dao_coin: bool,
    amount: &Uint256,
    insufficient_err: CoreError,
) -> CoreResult<Uint256> {
    let previous = get_balance(view, holder, creator, is_dao_coin)?;
    let new_balance = previous.checked_sub(amount).map_err(|_| insufficient_err)?;
    set_balance(view, holder, creator, is_dao_coin, new_balance)?;
    Ok(previous)
}

/// Restores a balance to its pre-image exactly, used by disconnect.
pub fn restore_balance(
    view: &mut StagedView,
    holder: &Pkid,
    creator: &Pkid,
    is_dao_coin: bool,
    previous_balance: Uint256,
) -> CoreResult<()> {
    set_balance(view, holder, creator, is_dao_coin, previous_balance)
}
