//! Cryptographic access-group membership: group records, membership
//! Add/Remove/Update, and the paginated, tombstone-aware enumeration index
//! over a group's members.

pub mod cache;
pub mod enumerate;
pub mod group;
pub mod member;

pub use cache::EnumerationCache;
pub use enumerate::enumerate;
pub use group::{create as create_group, disconnect_created as disconnect_group_created, GroupCreated};
pub use member::{apply as apply_member_modification, disconnect as disconnect_member_modification, MemberModificationRequest, MemberReverseOp};
