//! The access group record itself: `(owner, group key name)` to an access
//! public key. Member storage lives in [`crate::member`].

use core_types::entries::{AccessGroupEntry, GroupKeyName};
use core_types::keys::access_group_key;
use core_types::{CoreError, CoreResult, Pkid, PublicKey};
use state::StagedView;
use store::db::CF_ACCESS_GROUPS;

fn decode(bytes: &[u8]) -> CoreResult<AccessGroupEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode(entry: &AccessGroupEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

pub fn get(view: &StagedView, owner_pkid: &Pkid, group_key_name: &GroupKeyName) -> CoreResult<Option<AccessGroupEntry>> {
    let key = access_group_key(owner_pkid, group_key_name);
    match view.get(CF_ACCESS_GROUPS, &key).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn put(view: &mut StagedView, entry: &AccessGroupEntry) -> CoreResult<()> {
    let key = access_group_key(&entry.owner_pkid, &entry.group_key_name);
    view.put(CF_ACCESS_GROUPS, &key, encode(entry)?);
    Ok(())
}

/// Reverse-op pre-image for `create`: `None` means the group didn't exist
/// before (disconnect deletes it), `Some` means it did (disconnect
/// restores the prior access public key).
#[derive(Debug, Clone)]
pub struct GroupCreated {
    pub owner_pkid: Pkid,
    pub group_key_name: GroupKeyName,
    pub previous: Option<AccessGroupEntry>,
}

/// Creates or updates an access group's access public key. Rejects only
/// the all-zeros reserved name; re-creating under an existing name is an
/// upsert rather than an error — there is no distinct "group already
/// exists" error kind, only `NameCannotBeZeros` at the group level, with
/// everything else in the error list concerning membership.
pub fn create(
    view: &mut StagedView,
    owner_pkid: &Pkid,
    group_key_name: GroupKeyName,
    access_public_key: PublicKey,
) -> CoreResult<GroupCreated> {
    if group_key_name.is_base_key() {
        return Err(CoreError::NameCannotBeZeros);
    }
    let previous = get(view, owner_pkid, &group_key_name)?;
    let entry = AccessGroupEntry { owner_pkid: *owner_pkid, group_key_name, access_public_key, is_deleted: false };
    put(view, &entry)?;
    Ok(GroupCreated { owner_pkid: *owner_pkid, group_key_name, previous })
}

pub fn disconnect_created(view: &mut StagedView, created: &GroupCreated) -> CoreResult<()> {
    match &created.previous {
        Some(prior) => put(view, prior),
        None => {
            let key = access_group_key(&created.owner_pkid, &created.group_key_name);
            view.delete(CF_ACCESS_GROUPS, &key);
            Ok(())
        }
    }
}
