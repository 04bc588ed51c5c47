//! A per-group memo of previously enumerated members, scoped to one
//! [`state::StagedView`] session. Thrown away freely — [`crate::enumerate`]
//! rebuilds whatever it needs lazily. The only invariant the cache itself
//! must uphold is that it only ever grows by appending at its known tail;
//! anything that would require splicing into the middle instead
//! invalidates and starts over.

use core_types::entries::GroupKeyName;
use core_types::Pkid;
use std::collections::HashMap;

#[derive(Default)]
pub struct EnumerationCache {
    entries: HashMap<(Pkid, GroupKeyName), Vec<Pkid>>,
}

impl EnumerationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner_pkid: &Pkid, group_key_name: &GroupKeyName) -> Option<&[Pkid]> {
        self.entries.get(&(*owner_pkid, *group_key_name)).map(Vec::as_slice)
    }

    pub fn install(&mut self, owner_pkid: Pkid, group_key_name: GroupKeyName, members: Vec<Pkid>) {
        self.entries.insert((owner_pkid, group_key_name), members);
    }

    pub fn extend(&mut self, owner_pkid: &Pkid, group_key_name: &GroupKeyName, members: Vec<Pkid>) {
        if let Some(existing) = self.entries.get_mut(&(*owner_pkid, *group_key_name)) {
            existing.extend(members);
        }
    }

    /// Any write to a group's membership (add/remove/update) calls this so
    /// the next enumeration rebuilds from scratch rather than serving a
    /// stale page.
    pub fn invalidate(&mut self, owner_pkid: &Pkid, group_key_name: &GroupKeyName) {
        self.entries.remove(&(*owner_pkid, *group_key_name));
    }
}
