//! `GlobalParamsEntry`/`EpochEntry` storage. Global params are recorded once
//! per block height they change at (see `core_types::keys::global_params_key`);
//! `effective_global_params` walks backward from a target height to find the
//! entry currently in force, the way a fee estimator reads "whatever was
//! last set at or before this block."

use core_types::entries::{EpochEntry, GlobalParamsEntry};
use core_types::keys::{epoch_key, global_params_key};
use core_types::{CoreError, CoreResult, PublicKey};
use state::StagedView;
use store::db::{CF_EPOCH, CF_GLOBAL_PARAMS};

fn decode_params(bytes: &[u8]) -> CoreResult<GlobalParamsEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode_params(entry: &GlobalParamsEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

pub fn get_global_params(view: &StagedView, block_height: u64) -> CoreResult<Option<GlobalParamsEntry>> {
    match view.get(CF_GLOBAL_PARAMS, &global_params_key(block_height)).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(Some(decode_params(&bytes)?)),
        None => Ok(None),
    }
}

fn put_global_params(view: &mut StagedView, block_height: u64, entry: &GlobalParamsEntry) -> CoreResult<()> {
    view.put(CF_GLOBAL_PARAMS, &global_params_key(block_height), encode_params(entry)?);
    Ok(())
}

/// The record in force at `at_height`: the entry recorded at the greatest
/// height not exceeding it. `None` before any `UpdateGlobalParams`
/// transaction has ever connected.
pub fn effective_global_params(view: &StagedView, at_height: u64) -> CoreResult<Option<GlobalParamsEntry>> {
    let all = view.scan_from(CF_GLOBAL_PARAMS, &global_params_key(0)).map_err(|e| CoreError::Encoding(e.to_string()))?;
    let mut best: Option<(u64, GlobalParamsEntry)> = None;
    for (key, value) in all {
        let height = height_from_key(&key)?;
        if height > at_height {
            continue;
        }
        let entry = decode_params(&value)?;
        if best.as_ref().map(|(h, _)| height > *h).unwrap_or(true) {
            best = Some((height, entry));
        }
    }
    Ok(best.map(|(_, entry)| entry))
}

fn height_from_key(key: &[u8]) -> CoreResult<u64> {
    let height_bytes: [u8; 8] = key.get(1..9).and_then(|s| s.try_into().ok()).ok_or_else(|| CoreError::Encoding("malformed global params key".to_string()))?;
    Ok(u64::from_be_bytes(height_bytes))
}

/// Reverse-op pre-image for a global-params update: `None` means no entry
/// existed at `block_height` before (disconnect deletes it).
#[derive(Debug, Clone)]
pub struct GlobalParamsUpdated {
    pub block_height: u64,
    pub previous: Option<GlobalParamsEntry>,
}

/// Applies an `UpdateGlobalParams` body at `block_height`, carrying forward
/// every field the body leaves unset from the entry currently in force.
/// Fails closed if `signer_public_key` isn't one of the carried-forward
/// authority set — except before any entry has ever been recorded, when
/// there is no authority set yet to check against.
#[allow(clippy::too_many_arguments)]
pub fn apply_update(
    view: &mut StagedView,
    signer_public_key: &PublicKey,
    block_height: u64,
    usd_cents_per_bitcoin: Option<u64>,
    min_network_fee_nanos_per_kb: Option<u64>,
    profile_creation_fee_nanos: Option<u64>,
    nft_creation_fee_nanos: Option<u64>,
    max_copies_per_nft: Option<u64>,
) -> CoreResult<GlobalParamsUpdated> {
    let carried_forward = effective_global_params(view, block_height)?;
    if let Some(current) = &carried_forward {
        if !current.update_authority_public_keys.contains(signer_public_key) {
            return Err(CoreError::UpdateGlobalParamsUnauthorized);
        }
    }

    let base = carried_forward.clone().unwrap_or(GlobalParamsEntry {
        usd_cents_per_bitcoin: 0,
        min_network_fee_nanos_per_kb: 0,
        profile_creation_fee_nanos: 0,
        nft_creation_fee_nanos: 0,
        max_copies_per_nft: 0,
        update_authority_public_keys: vec![*signer_public_key],
        balance_model_fork_height: 0,
        is_deleted: false,
    });

    let entry = GlobalParamsEntry {
        usd_cents_per_bitcoin: usd_cents_per_bitcoin.unwrap_or(base.usd_cents_per_bitcoin),
        min_network_fee_nanos_per_kb: min_network_fee_nanos_per_kb.unwrap_or(base.min_network_fee_nanos_per_kb),
        profile_creation_fee_nanos: profile_creation_fee_nanos.unwrap_or(base.profile_creation_fee_nanos),
        nft_creation_fee_nanos: nft_creation_fee_nanos.unwrap_or(base.nft_creation_fee_nanos),
        max_copies_per_nft: max_copies_per_nft.unwrap_or(base.max_copies_per_nft),
        update_authority_public_keys: base.update_authority_public_keys,
        balance_model_fork_height: base.balance_model_fork_height,
        is_deleted: false,
    };

    let previous = get_global_params(view, block_height)?;
    put_global_params(view, block_height, &entry)?;
    Ok(GlobalParamsUpdated { block_height, previous })
}

pub fn disconnect_update(view: &mut StagedView, update: &GlobalParamsUpdated) -> CoreResult<()> {
    match &update.previous {
        Some(prior) => put_global_params(view, update.block_height, prior),
        None => {
            view.delete(CF_GLOBAL_PARAMS, &global_params_key(update.block_height));
            Ok(())
        }
    }
}

fn decode_epoch(bytes: &[u8]) -> CoreResult<EpochEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode_epoch(entry: &EpochEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

pub fn get_epoch(view: &StagedView, epoch_number: u64) -> CoreResult<Option<EpochEntry>> {
    match view.get(CF_EPOCH, &epoch_key(epoch_number)).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(Some(decode_epoch(&bytes)?)),
        None => Ok(None),
    }
}

fn put_epoch(view: &mut StagedView, entry: &EpochEntry) -> CoreResult<()> {
    view.put(CF_EPOCH, &epoch_key(entry.epoch_number), encode_epoch(entry)?);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct EpochAdvanced {
    pub epoch_number: u64,
    pub previous: Option<EpochEntry>,
}

/// Records a new epoch entry, called by the block driver at an epoch
/// boundary rather than by any transaction handler.
pub fn advance_epoch(view: &mut StagedView, entry: EpochEntry) -> CoreResult<EpochAdvanced> {
    let previous = get_epoch(view, entry.epoch_number)?;
    put_epoch(view, &entry)?;
    Ok(EpochAdvanced { epoch_number: entry.epoch_number, previous })
}

pub fn disconnect_epoch(view: &mut StagedView, advanced: &EpochAdvanced) -> CoreResult<()> {
    match &advanced.previous {
        Some(prior) => put_epoch(view, prior),
        None => {
            view.delete(CF_EPOCH, &epoch_key(advanced.epoch_number));
            Ok(())
        }
    }
}
