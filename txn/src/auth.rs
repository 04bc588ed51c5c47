//! Signature verification and derived-key spending-limit policy: the three
//! supported signature schemes, and the counter bookkeeping a derived-key
//! signer's spend is checked and recorded against.

use crate::derived_key;
use core_types::entries::{CoinOperationLimitKey, NftOperationLimitKey, TransactionKind};
use core_types::wire::Transaction;
use core_types::{CoreError, CoreResult, Pkid, PublicKey};
use state::StagedView;

/// Which key actually produced `tx.signature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifiedSigner {
    Owner,
    Derived(PublicKey),
}

/// Checks the signature against one of the three schemes:
/// - DER-recoverable (`signature.is_recoverable`): the signer's public key is
///   recovered from the signature itself and treated as a derived key.
/// - Extra-data derived-key variant: `extra_data` carries the derived public
///   key under a well-known tag; the signature is checked against it.
/// - Owner: the signature is checked against `tx.public_key` directly.
pub fn verify_signature(tx: &Transaction) -> CoreResult<VerifiedSigner> {
    let signature = tx.signature.as_ref().ok_or(CoreError::InvalidTransactionSignature)?;
    let digest: [u8; 32] = (*tx.signing_digest()).into();

    if signature.is_recoverable {
        let recovered = core_crypto::recover_public_key(&digest, signature).map_err(|_| CoreError::InvalidTransactionSignature)?;
        return Ok(VerifiedSigner::Derived(PublicKey::from_crypto(&recovered)));
    }

    if let Some(derived_bytes) = tx.extra_data.derived_public_key() {
        let derived_pk = PublicKey::try_from(derived_bytes).map_err(|_| CoreError::InvalidTransactionSignature)?;
        let crypto_pk = derived_pk.to_crypto().map_err(|_| CoreError::InvalidTransactionSignature)?;
        let ok = core_crypto::verify(&crypto_pk, &digest, signature).map_err(|_| CoreError::InvalidTransactionSignature)?;
        if !ok {
            return Err(CoreError::InvalidTransactionSignature);
        }
        return Ok(VerifiedSigner::Derived(derived_pk));
    }

    let crypto_pk = tx.public_key.to_crypto().map_err(|_| CoreError::InvalidTransactionSignature)?;
    let ok = core_crypto::verify(&crypto_pk, &digest, signature).map_err(|_| CoreError::InvalidTransactionSignature)?;
    if !ok {
        return Err(CoreError::InvalidTransactionSignature);
    }
    Ok(VerifiedSigner::Owner)
}

/// Looks up and validates the derived-key authorization record for a
/// `Derived` signer, returning the derived public key if the signer used one
/// (`None` for `Owner`). Fails closed if the key was never authorized, was
/// revoked, or has expired as of `block_height`.
pub fn authorize_signer(
    view: &StagedView,
    owner_pkid: &Pkid,
    signer: VerifiedSigner,
    block_height: u64,
) -> CoreResult<Option<PublicKey>> {
    match signer {
        VerifiedSigner::Owner => Ok(None),
        VerifiedSigner::Derived(derived_pk) => {
            let entry = derived_key::get(view, owner_pkid, &derived_pk)?.ok_or(CoreError::DerivedKeyNotAuthorized)?;
            if entry.is_revoked || entry.is_expired_at(block_height) {
                return Err(CoreError::DerivedKeyNotAuthorized);
            }
            Ok(Some(derived_pk))
        }
    }
}

/// What a connecting transaction is about to spend, for the purpose of
/// checking and recording it against a derived key's caps.
pub struct SpendCheck {
    pub kind: TransactionKind,
    pub deso_spent_nanos: u64,
    pub coin_operation: Option<CoinOperationLimitKey>,
    pub nft_operation: Option<NftOperationLimitKey>,
}

/// Checks `check` against the derived key's remaining caps and, only if
/// every applicable cap has room, records the spend by mutating and staging
/// the entry. Returns the entry exactly as it stood before the mutation, the
/// reverse-operation pre-image `disconnect` restores wholesale.
pub fn check_and_record_spend(
    view: &mut StagedView,
    owner_pkid: &Pkid,
    derived_pk: &PublicKey,
    check: SpendCheck,
) -> CoreResult<core_types::entries::DerivedKeyEntry> {
    let mut entry = derived_key::get(view, owner_pkid, derived_pk)?.ok_or(CoreError::DerivedKeyNotAuthorized)?;
    let previous = entry.clone();

    let new_deso_spent = entry.deso_spent.checked_add(check.deso_spent_nanos).ok_or(CoreError::DerivedKeyNotAuthorized)?;
    if new_deso_spent > entry.spending_limit.global_deso_limit {
        return Err(CoreError::DerivedKeyNotAuthorized);
    }

    let kind_cap = *entry.spending_limit.transaction_count_limit.get(&check.kind).ok_or(CoreError::DerivedKeyNotAuthorized)?;
    let kind_used = entry.transaction_count_used.get(&check.kind).copied().unwrap_or(0);
    if kind_used >= kind_cap {
        return Err(CoreError::DerivedKeyNotAuthorized);
    }

    if let Some(op_key) = check.coin_operation {
        let cap = *entry.spending_limit.coin_operation_limit.get(&op_key).ok_or(CoreError::DerivedKeyNotAuthorized)?;
        let used = entry.coin_operation_count_used.get(&op_key).copied().unwrap_or(0);
        if used >= cap {
            return Err(CoreError::DerivedKeyNotAuthorized);
        }
        entry.coin_operation_count_used.insert(op_key, used + 1);
    }
    if let Some(op_key) = check.nft_operation {
        let cap = *entry.spending_limit.nft_operation_limit.get(&op_key).ok_or(CoreError::DerivedKeyNotAuthorized)?;
        let used = entry.nft_operation_count_used.get(&op_key).copied().unwrap_or(0);
        if used >= cap {
            return Err(CoreError::DerivedKeyNotAuthorized);
        }
        entry.nft_operation_count_used.insert(op_key, used + 1);
    }

    entry.deso_spent = new_deso_spent;
    entry.transaction_count_used.insert(check.kind, kind_used + 1);
    derived_key::put(view, &entry)?;
    Ok(previous)
}

/// Restores a derived key's entry to its pre-spend state, used by disconnect.
pub fn restore_spend(view: &mut StagedView, previous: &core_types::entries::DerivedKeyEntry) -> CoreResult<()> {
    derived_key::put(view, previous)
}
