//! Legacy UTXO-model input consumption, shared by `txn`'s generic prelude
//! (ordinary transaction inputs) and the matching engine's bidder-input
//! handling.

use core_types::entries::UtxoEntry;
use core_types::keys::utxo_key;
use core_types::wire::TransactionOutpoint;
use core_types::{CoreError, CoreResult, PublicKey};
use state::StagedView;
use store::db::CF_UTXOS;

fn decode(bytes: &[u8]) -> CoreResult<UtxoEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode(entry: &UtxoEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

pub fn get(view: &StagedView, outpoint: &TransactionOutpoint) -> CoreResult<Option<UtxoEntry>> {
    match view.get(CF_UTXOS, &utxo_key(outpoint)).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

pub fn create(view: &mut StagedView, outpoint: &TransactionOutpoint, public_key: PublicKey, amount_nanos: u64) -> CoreResult<()> {
    let entry = UtxoEntry { public_key, amount_nanos, is_deleted: false };
    view.put(CF_UTXOS, &utxo_key(outpoint), encode(&entry)?);
    Ok(())
}

/// Spends the UTXO at `outpoint`, verifying its recorded owner matches
/// `expected_owner` first. Returns the entry that was spent (the reverse-
/// operation pre-image), or an error if it no longer exists or the owner
/// doesn't match.
pub fn spend(
    view: &mut StagedView,
    outpoint: &TransactionOutpoint,
    expected_owner: &PublicKey,
    not_found_err: CoreError,
) -> CoreResult<UtxoEntry> {
    let entry = get(view, outpoint)?.ok_or_else(|| not_found_err.clone())?;
    if entry.public_key != *expected_owner {
        return Err(CoreError::InputWithPublicKeyDifferentFromTxnPublicKey);
    }
    view.delete(CF_UTXOS, &utxo_key(outpoint));
    Ok(entry)
}

/// Restores a previously spent UTXO exactly, used by disconnect.
pub fn restore(view: &mut StagedView, outpoint: &TransactionOutpoint, entry: &UtxoEntry) -> CoreResult<()> {
    view.put(CF_UTXOS, &utxo_key(outpoint), encode(entry)?);
    Ok(())
}
