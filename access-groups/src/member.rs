//! Add/Remove/Update handlers for access-group membership. Keeps the
//! primary `(member, owner, name)` record and the sorted enumeration index
//! in lockstep, the same way [`crate::book`]-style modules elsewhere in
//! this workspace keep a primary record and its secondary index together.

use core_types::entries::{AccessGroupMemberEntry, GroupKeyName};
use core_types::keys::{access_group_member_enum_key, access_group_member_key};
use core_types::wire::{AccessGroupMemberModification, AccessGroupOperationType};
use core_types::{CoreError, CoreResult, Pkid};
use state::StagedView;
use std::collections::HashSet;
use store::db::{CF_ACCESS_GROUP_MEMBERS, CF_ACCESS_GROUP_MEMBER_ENUM_INDEX};

fn decode(bytes: &[u8]) -> CoreResult<AccessGroupMemberEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode(entry: &AccessGroupMemberEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

pub fn get(view: &StagedView, member_pkid: &Pkid, owner_pkid: &Pkid, group_key_name: &GroupKeyName) -> CoreResult<Option<AccessGroupMemberEntry>> {
    let key = access_group_member_key(member_pkid, owner_pkid, group_key_name);
    match view.get(CF_ACCESS_GROUP_MEMBERS, &key).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn put(view: &mut StagedView, entry: &AccessGroupMemberEntry) -> CoreResult<()> {
    view.put(CF_ACCESS_GROUP_MEMBERS, &access_group_member_key(&entry.member_pkid, &entry.owner_pkid, &entry.group_key_name), encode(entry)?);
    view.put(
        CF_ACCESS_GROUP_MEMBER_ENUM_INDEX,
        &access_group_member_enum_key(&entry.owner_pkid, &entry.group_key_name, &entry.member_pkid),
        Vec::new(),
    );
    Ok(())
}

fn remove(view: &mut StagedView, entry: &AccessGroupMemberEntry) {
    view.delete(CF_ACCESS_GROUP_MEMBERS, &access_group_member_key(&entry.member_pkid, &entry.owner_pkid, &entry.group_key_name));
    view.delete(
        CF_ACCESS_GROUP_MEMBER_ENUM_INDEX,
        &access_group_member_enum_key(&entry.owner_pkid, &entry.group_key_name, &entry.member_pkid),
    );
}

pub struct MemberModificationRequest {
    pub group_key_name: GroupKeyName,
    pub operation_type: AccessGroupOperationType,
    pub members: Vec<AccessGroupMemberModification>,
}

/// One membership's pre-image, in application order. `crate::enumerate`'s
/// session cache is invalidated by the caller (the dispatch layer, which
/// owns the cache's lifetime) whenever any of these is produced.
#[derive(Debug, Clone)]
pub enum MemberReverseOp {
    Added { member_pkid: Pkid, owner_pkid: Pkid, group_key_name: GroupKeyName },
    Removed { previous: AccessGroupMemberEntry },
    Updated { previous: AccessGroupMemberEntry },
}

/// Applies an Add/Remove/Update batch against `owner_pkid`'s group named
/// `request.group_key_name`, validating every membership rule before
/// staging anything. On any validation failure nothing in `request` has
/// been applied yet — checks run fully before the first `put`/`remove`.
pub fn apply(view: &mut StagedView, owner_pkid: &Pkid, request: MemberModificationRequest) -> CoreResult<Vec<MemberReverseOp>> {
    if request.group_key_name.is_base_key() {
        return Err(CoreError::NameCannotBeZeros);
    }
    if crate::group::get(view, owner_pkid, &request.group_key_name)?.is_none() {
        return Err(CoreError::GroupDoesntExist);
    }
    if request.members.is_empty() {
        return Err(CoreError::MembersListCannotBeEmpty);
    }

    let mut seen = HashSet::new();
    for modification in &request.members {
        if !seen.insert(modification.member_pkid) {
            return Err(CoreError::MemberListDuplicateMember);
        }
        if crate::group::get(view, &modification.member_pkid, &modification.member_group_key_name)?.is_none() {
            return Err(CoreError::GroupDoesntExist);
        }
        if modification.member_pkid == *owner_pkid && modification.member_group_key_name == request.group_key_name {
            return Err(CoreError::MemberCantAddOwnerBySameGroup);
        }

        let existing = get(view, &modification.member_pkid, owner_pkid, &request.group_key_name)?;
        match request.operation_type {
            AccessGroupOperationType::Add => {
                if existing.is_some() {
                    return Err(CoreError::MemberAlreadyExists);
                }
                if modification.encrypted_key.is_empty() {
                    return Err(CoreError::MemberEncryptedKeyCannotBeEmpty);
                }
            }
            AccessGroupOperationType::Remove => {
                if existing.is_none() {
                    return Err(CoreError::MemberDoesntExistOrIsDeleted);
                }
                if !modification.encrypted_key.is_empty() {
                    return Err(CoreError::MemberRemoveEncryptedKeyNotEmpty);
                }
                if !modification.extra_data.is_empty() {
                    return Err(CoreError::MemberRemoveExtraDataNotEmpty);
                }
            }
            AccessGroupOperationType::Update => {
                let existing = existing.ok_or(CoreError::MemberDoesntExistOrIsDeleted)?;
                if existing.member_group_key_name != modification.member_group_key_name {
                    return Err(CoreError::MemberDoesntExistOrIsDeleted);
                }
            }
        }
    }

    let mut reverse_ops = Vec::with_capacity(request.members.len());
    for modification in request.members {
        match request.operation_type {
            AccessGroupOperationType::Add => {
                let entry = AccessGroupMemberEntry {
                    member_pkid: modification.member_pkid,
                    owner_pkid: *owner_pkid,
                    group_key_name: request.group_key_name,
                    member_group_key_name: modification.member_group_key_name,
                    encrypted_key: modification.encrypted_key,
                    extra_data: modification.extra_data,
                    is_deleted: false,
                };
                put(view, &entry)?;
                reverse_ops.push(MemberReverseOp::Added {
                    member_pkid: entry.member_pkid,
                    owner_pkid: entry.owner_pkid,
                    group_key_name: entry.group_key_name,
                });
            }
            AccessGroupOperationType::Remove => {
                let previous = get(view, &modification.member_pkid, owner_pkid, &request.group_key_name)?
                    .expect("validated present above");
                remove(view, &previous);
                reverse_ops.push(MemberReverseOp::Removed { previous });
            }
            AccessGroupOperationType::Update => {
                let previous = get(view, &modification.member_pkid, owner_pkid, &request.group_key_name)?
                    .expect("validated present above");
                let updated = AccessGroupMemberEntry {
                    encrypted_key: modification.encrypted_key,
                    extra_data: modification.extra_data,
                    ..previous.clone()
                };
                put(view, &updated)?;
                reverse_ops.push(MemberReverseOp::Updated { previous });
            }
        }
    }
    Ok(reverse_ops)
}

/// Replays `ops` in reverse, restoring every pre-image exactly.
pub fn disconnect(view: &mut StagedView, ops: &[MemberReverseOp]) -> CoreResult<()> {
    for op in ops.iter().rev() {
        match op {
            MemberReverseOp::Added { member_pkid, owner_pkid, group_key_name } => {
                if let Some(entry) = get(view, member_pkid, owner_pkid, group_key_name)? {
                    remove(view, &entry);
                }
            }
            MemberReverseOp::Removed { previous } => put(view, previous)?,
            MemberReverseOp::Updated { previous } => put(view, previous)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{ExtraData, PublicKey};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn view() -> (TempDir, StagedView) {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(store::Database::open(tmp.path()).unwrap());
        (tmp, StagedView::new(db))
    }

    fn owner() -> Pkid {
        Pkid::from([1u8; 33])
    }

    fn member(b: u8) -> Pkid {
        Pkid::from([b; 33])
    }

    fn make_group(v: &mut StagedView, owner: &Pkid, name: &GroupKeyName) {
        crate::group::create(v, owner, *name, PublicKey([9u8; 33])).unwrap();
    }

    fn modification(member_pkid: Pkid, encrypted_key: Vec<u8>) -> AccessGroupMemberModification {
        AccessGroupMemberModification { member_pkid, member_group_key_name: GroupKeyName::BASE_KEY, encrypted_key, extra_data: ExtraData::new() }
    }

    #[test]
    fn add_rejects_missing_group() {
        let (_tmp, mut v) = view();
        let name = GroupKeyName::from_bytes(b"chat");
        let request = MemberModificationRequest { group_key_name: name, operation_type: AccessGroupOperationType::Add, members: vec![modification(member(2), vec![1])] };
        assert_eq!(apply(&mut v, &owner(), request).unwrap_err(), CoreError::GroupDoesntExist);
    }

    #[test]
    fn add_then_remove_round_trips_via_disconnect() {
        let (_tmp, mut v) = view();
        let name = GroupKeyName::from_bytes(b"chat");
        make_group(&mut v, &owner(), &name);

        let add = MemberModificationRequest { group_key_name: name, operation_type: AccessGroupOperationType::Add, members: vec![modification(member(2), vec![1, 2, 3])] };
        let add_ops = apply(&mut v, &owner(), add).unwrap();
        assert!(get(&v, &member(2), &owner(), &name).unwrap().is_some());

        disconnect(&mut v, &add_ops).unwrap();
        assert!(get(&v, &member(2), &owner(), &name).unwrap().is_none());
    }

    #[test]
    fn add_rejects_duplicate_and_empty_key() {
        let (_tmp, mut v) = view();
        let name = GroupKeyName::from_bytes(b"chat");
        make_group(&mut v, &owner(), &name);

        let dup = MemberModificationRequest {
            group_key_name: name,
            operation_type: AccessGroupOperationType::Add,
            members: vec![modification(member(2), vec![1]), modification(member(2), vec![1])],
        };
        assert_eq!(apply(&mut v, &owner(), dup).unwrap_err(), CoreError::MemberListDuplicateMember);

        let empty_key = MemberModificationRequest { group_key_name: name, operation_type: AccessGroupOperationType::Add, members: vec![modification(member(2), vec![])] };
        assert_eq!(apply(&mut v, &owner(), empty_key).unwrap_err(), CoreError::MemberEncryptedKeyCannotBeEmpty);
    }

    #[test]
    fn remove_rejects_extra_data_or_encrypted_key() {
        let (_tmp, mut v) = view();
        let name = GroupKeyName::from_bytes(b"chat");
        make_group(&mut v, &owner(), &name);
        let add = MemberModificationRequest { group_key_name: name, operation_type: AccessGroupOperationType::Add, members: vec![modification(member(2), vec![1])] };
        apply(&mut v, &owner(), add).unwrap();

        let bad_remove = MemberModificationRequest { group_key_name: name, operation_type: AccessGroupOperationType::Remove, members: vec![modification(member(2), vec![1])] };
        assert_eq!(apply(&mut v, &owner(), bad_remove).unwrap_err(), CoreError::MemberRemoveEncryptedKeyNotEmpty);
    }

    #[test]
    fn owner_adding_self_under_same_group_name_is_rejected() {
        let (_tmp, mut v) = view();
        let name = GroupKeyName::from_bytes(b"chat");
        make_group(&mut v, &owner(), &name);
        let modification = AccessGroupMemberModification { member_pkid: owner(), member_group_key_name: name, encrypted_key: vec![1], extra_data: ExtraData::new() };
        let request = MemberModificationRequest { group_key_name: name, operation_type: AccessGroupOperationType::Add, members: vec![modification] };
        assert_eq!(apply(&mut v, &owner(), request).unwrap_err(), CoreError::MemberCantAddOwnerBySameGroup);
    }

    #[test]
    fn update_replaces_encrypted_key_and_disconnect_restores_it() {
        let (_tmp, mut v) = view();
        let name = GroupKeyName::from_bytes(b"chat");
        make_group(&mut v, &owner(), &name);
        let add = MemberModificationRequest { group_key_name: name, operation_type: AccessGroupOperationType::Add, members: vec![modification(member(2), vec![1])] };
        apply(&mut v, &owner(), add).unwrap();

        let update = MemberModificationRequest { group_key_name: name, operation_type: AccessGroupOperationType::Update, members: vec![modification(member(2), vec![9, 9])] };
        let update_ops = apply(&mut v, &owner(), update).unwrap();
        assert_eq!(get(&v, &member(2), &owner(), &name).unwrap().unwrap().encrypted_key, vec![9, 9]);

        disconnect(&mut v, &update_ops).unwrap();
        assert_eq!(get(&v, &member(2), &owner(), &name).unwrap().unwrap().encrypted_key, vec![1]);
    }
}
