//! Profile create/update, backing `UpdateProfile`. Keyed by PKID, same
//! upsert-or-create posture as [`access_groups::group`].

use core_types::entries::ProfileEntry;
use core_types::keys::profile_key;
use core_types::{CoreError, CoreResult, Pkid};
use state::StagedView;
use store::db::CF_PROFILES;

fn decode(bytes: &[u8]) -> CoreResult<ProfileEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode(entry: &ProfileEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

pub fn get(view: &StagedView, pkid: &Pkid) -> CoreResult<Option<ProfileEntry>> {
    match view.get(CF_PROFILES, &profile_key(pkid)).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn put(view: &mut StagedView, entry: &ProfileEntry) -> CoreResult<()> {
    view.put(CF_PROFILES, &profile_key(&entry.pkid), encode(entry)?);
    Ok(())
}

/// Reverse-op pre-image: `None` means no profile existed before (disconnect
/// deletes it), `Some` means it did (disconnect restores the prior entry).
#[derive(Debug, Clone)]
pub struct ProfileUpdated {
    pub pkid: Pkid,
    pub previous: Option<ProfileEntry>,
}

pub fn update(
    view: &mut StagedView,
    pkid: &Pkid,
    username: Vec<u8>,
    description: Vec<u8>,
    creator_basis_points: u64,
) -> CoreResult<ProfileUpdated> {
    let previous = get(view, pkid)?;
    let entry = ProfileEntry {
        pkid: *pkid,
        username,
        description,
        creator_basis_points,
        dao_coin_minting_disabled: previous.as_ref().map(|p| p.dao_coin_minting_disabled).unwrap_or(false),
        is_deleted: false,
    };
    put(view, &entry)?;
    Ok(ProfileUpdated { pkid: *pkid, previous })
}

/// Sets `dao_coin_minting_disabled` on an existing profile. Separate from
/// `update` since minting can be disabled without touching the rest of the
/// profile, and the flag is deliberately one-way (no re-enable operation).
pub fn disable_minting(view: &mut StagedView, pkid: &Pkid) -> CoreResult<ProfileUpdated> {
    let previous = get(view, pkid)?.ok_or(CoreError::BuyingDAOCoinCreatorMissingProfile)?;
    let mut entry = previous.clone();
    entry.dao_coin_minting_disabled = true;
    put(view, &entry)?;
    Ok(ProfileUpdated { pkid: *pkid, previous: Some(previous) })
}

pub fn disconnect(view: &mut StagedView, update: &ProfileUpdated) -> CoreResult<()> {
    match &update.previous {
        Some(prior) => put(view, prior),
        None => {
            view.delete(CF_PROFILES, &profile_key(&update.pkid));
            Ok(())
        }
    }
}
