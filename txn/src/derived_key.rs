//! `DerivedKeyEntry` storage, keyed by `(owner PKID, derived public key)`.
//! Authorization overwrites the entry wholesale, resetting usage counters to
//! zero — [`crate::auth`] is the only mutator of the counters afterward.

use core_types::entries::{DerivedKeyEntry, TransactionSpendingLimit};
use core_types::keys::derived_key_key;
use core_types::{CoreError, CoreResult, Pkid, PublicKey};
use state::StagedView;
use store::db::CF_DERIVED_KEYS;

fn decode(bytes: &[u8]) -> CoreResult<DerivedKeyEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode(entry: &DerivedKeyEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

pub fn get(view: &StagedView, owner_pkid: &Pkid, derived_public_key: &PublicKey) -> CoreResult<Option<DerivedKeyEntry>> {
    let key = derived_key_key(owner_pkid, derived_public_key.as_bytes());
    match view.get(CF_DERIVED_KEYS, &key).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn put(view: &mut StagedView, entry: &DerivedKeyEntry) -> CoreResult<()> {
    let key = derived_key_key(&entry.owner_pkid, entry.derived_public_key.as_bytes());
    view.put(CF_DERIVED_KEYS, &key, encode(entry)?);
    Ok(())
}

/// Reverse-op pre-image for `authorize`: `None` means the key was never
/// authorized before (disconnect deletes the record entirely).
#[derive(Debug, Clone)]
pub struct DerivedKeyAuthorized {
    pub owner_pkid: Pkid,
    pub derived_public_key: PublicKey,
    pub previous: Option<DerivedKeyEntry>,
}

pub fn authorize(
    view: &mut StagedView,
    owner_pkid: &Pkid,
    derived_public_key: PublicKey,
    expiration_block: u64,
    is_revoked: bool,
    spending_limit: TransactionSpendingLimit,
) -> CoreResult<DerivedKeyAuthorized> {
    let previous = get(view, owner_pkid, &derived_public_key)?;
    let entry = DerivedKeyEntry {
        owner_pkid: *owner_pkid,
        derived_public_key,
        expiration_block,
        is_revoked,
        spending_limit,
        deso_spent: 0,
        transaction_count_used: Default::default(),
        coin_operation_count_used: Default::default(),
        nft_operation_count_used: Default::default(),
        is_deleted: false,
    };
    put(view, &entry)?;
    Ok(DerivedKeyAuthorized { owner_pkid: *owner_pkid, derived_public_key, previous })
}

pub fn disconnect_authorized(view: &mut StagedView, authorized: &DerivedKeyAuthorized) -> CoreResult<()> {
    match &authorized.previous {
        Some(prior) => put(view, prior),
        None => {
            let key = derived_key_key(&authorized.owner_pkid, authorized.derived_public_key.as_bytes());
            view.delete(CF_DERIVED_KEYS, &key);
            Ok(())
        }
    }
}
