//! Canonical big-endian key encoders. Keys are composed as
//! `prefix || field1 || field2 || …` so that byte-lexicographic order
//! equals the semantic order each index needs.

use crate::entries::{GroupKeyName, OrderId, GROUP_KEY_NAME_LENGTH};
use crate::pkid::{Pkid, PUBLIC_KEY_LENGTH};
use core_hashes::Hash;
use fixed_point::{ScaledExchangeRate, Uint256};

/// One-byte key prefixes, one per column family / logical index.
pub mod prefix {
    pub const PROFILE: u8 = 0x01;
    pub const BALANCE: u8 = 0x02;
    pub const ORDER_BY_ID: u8 = 0x03;
    pub const ORDER_MATCH_INDEX: u8 = 0x04;
    pub const ORDER_BY_TRANSACTOR: u8 = 0x05;
    pub const ACCESS_GROUP: u8 = 0x06;
    pub const ACCESS_GROUP_MEMBER: u8 = 0x07;
    pub const ACCESS_GROUP_MEMBER_ENUM_INDEX: u8 = 0x08;
    pub const DERIVED_KEY: u8 = 0x09;
    pub const UTXO: u8 = 0x0c;
    pub const GLOBAL_PARAMS: u8 = 0x0a;
    pub const EPOCH: u8 = 0x0b;
}

pub fn profile_key(pkid: &Pkid) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + PUBLIC_KEY_LENGTH);
    key.push(prefix::PROFILE);
    key.extend_from_slice(pkid.as_bytes());
    key
}

pub fn balance_key(holder: &Pkid, creator: &Pkid, is_dao_coin: bool) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 * PUBLIC_KEY_LENGTH + 1);
    key.push(prefix::BALANCE);
    key.extend_from_slice(holder.as_bytes());
    key.extend_from_slice(creator.as_bytes());
    key.push(is_dao_coin as u8);
    key
}

pub fn order_key(order_id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 32);
    key.push(prefix::ORDER_BY_ID);
    key.extend_from_slice(order_id.as_bytes());
    key
}

/// Descending-rate sort achieved by storing the bitwise complement of the
/// rate's big-endian bytes: ascending byte order on the complement equals
/// descending numeric order on the rate, matching the order book's match
/// index.
fn rate_complement_bytes(rate: &ScaledExchangeRate) -> [u8; 32] {
    let mut bytes = rate.0.to_be_bytes();
    for b in bytes.iter_mut() {
        *b = !*b;
    }
    bytes
}

pub fn order_match_index_key(
    buying_pkid: &Pkid,
    selling_pkid: &Pkid,
    scaled_rate: &ScaledExchangeRate,
    block_height: u64,
    order_id: &OrderId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 * PUBLIC_KEY_LENGTH + 32 + 8 + 32);
    key.push(prefix::ORDER_MATCH_INDEX);
    key.extend_from_slice(buying_pkid.as_bytes());
    key.extend_from_slice(selling_pkid.as_bytes());
    key.extend_from_slice(&rate_complement_bytes(scaled_rate));
    key.extend_from_slice(&block_height.to_be_bytes());
    key.extend_from_slice(order_id.as_bytes());
    key
}

/// Prefix shared by every match-index entry for a given `(buying, selling)`
/// pair; scanning from this prefix yields candidates in match priority
/// order (best rate first, then oldest first).
pub fn order_match_index_prefix(buying_pkid: &Pkid, selling_pkid: &Pkid) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 * PUBLIC_KEY_LENGTH);
    key.push(prefix::ORDER_MATCH_INDEX);
    key.extend_from_slice(buying_pkid.as_bytes());
    key.extend_from_slice(selling_pkid.as_bytes());
    key
}

pub fn order_by_transactor_key(transactor_pkid: &Pkid, order_id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + PUBLIC_KEY_LENGTH + 32);
    key.push(prefix::ORDER_BY_TRANSACTOR);
    key.extend_from_slice(transactor_pkid.as_bytes());
    key.extend_from_slice(order_id.as_bytes());
    key
}

pub fn access_group_key(owner_pkid: &Pkid, group_key_name: &GroupKeyName) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + PUBLIC_KEY_LENGTH + GROUP_KEY_NAME_LENGTH);
    key.push(prefix::ACCESS_GROUP);
    key.extend_from_slice(owner_pkid.as_bytes());
    key.extend_from_slice(&group_key_name.0);
    key
}

pub fn access_group_member_key(member_pkid: &Pkid, owner_pkid: &Pkid, group_key_name: &GroupKeyName) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 * PUBLIC_KEY_LENGTH + GROUP_KEY_NAME_LENGTH);
    key.push(prefix::ACCESS_GROUP_MEMBER);
    key.extend_from_slice(member_pkid.as_bytes());
    key.extend_from_slice(owner_pkid.as_bytes());
    key.extend_from_slice(&group_key_name.0);
    key
}

/// The sorted-enumeration secondary index: `(owner, group name, member)`,
/// used by the access-group enumeration algorithm for ordered, paginated
/// scans.
pub fn access_group_member_enum_key(owner_pkid: &Pkid, group_key_name: &GroupKeyName, member_pkid: &Pkid) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + PUBLIC_KEY_LENGTH + GROUP_KEY_NAME_LENGTH + PUBLIC_KEY_LENGTH);
    key.push(prefix::ACCESS_GROUP_MEMBER_ENUM_INDEX);
    key.extend_from_slice(owner_pkid.as_bytes());
    key.extend_from_slice(&group_key_name.0);
    key.extend_from_slice(member_pkid.as_bytes());
    key
}

pub fn access_group_member_enum_prefix(owner_pkid: &Pkid, group_key_name: &GroupKeyName) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + PUBLIC_KEY_LENGTH + GROUP_KEY_NAME_LENGTH);
    key.push(prefix::ACCESS_GROUP_MEMBER_ENUM_INDEX);
    key.extend_from_slice(owner_pkid.as_bytes());
    key.extend_from_slice(&group_key_name.0);
    key
}

pub fn derived_key_key(owner_pkid: &Pkid, derived_public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 * PUBLIC_KEY_LENGTH);
    key.push(prefix::DERIVED_KEY);
    key.extend_from_slice(owner_pkid.as_bytes());
    key.extend_from_slice(derived_public_key);
    key
}

/// Global parameters are a single record per block height; the key is the
/// height, big-endian, so a range scan also returns them in height order.
pub fn global_params_key(block_height: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8);
    key.push(prefix::GLOBAL_PARAMS);
    key.extend_from_slice(&block_height.to_be_bytes());
    key
}

pub fn epoch_key(epoch_number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8);
    key.push(prefix::EPOCH);
    key.extend_from_slice(&epoch_number.to_be_bytes());
    key
}

/// Legacy UTXO-model entries, keyed by the outpoint they were created at.
/// Covers both ordinary transaction inputs and the bidder-input DESO
/// transfers the matching engine consumes on a counterparty's behalf.
pub fn utxo_key(outpoint: &crate::wire::TransactionOutpoint) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 32 + 4);
    key.push(prefix::UTXO);
    key.extend_from_slice(outpoint.transaction_id.as_bytes());
    key.extend_from_slice(&outpoint.index.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkid(b: u8) -> Pkid {
        Pkid::from([b; PUBLIC_KEY_LENGTH])
    }

    #[test]
    fn match_index_key_orders_higher_rate_first() {
        let order_id = Hash::zeroed();
        let low_rate = ScaledExchangeRate::parse_decimal("1").unwrap();
        let high_rate = ScaledExchangeRate::parse_decimal("2").unwrap();
        let key_low = order_match_index_key(&pkid(1), &pkid(2), &low_rate, 10, &order_id);
        let key_high = order_match_index_key(&pkid(1), &pkid(2), &high_rate, 10, &order_id);
        // higher numeric rate must sort first (ascending bytes on the complement)
        assert!(key_high < key_low);
    }

    #[test]
    fn match_index_key_orders_lower_height_first_at_equal_rate() {
        let order_id = Hash::zeroed();
        let rate = ScaledExchangeRate::parse_decimal("5").unwrap();
        let earlier = order_match_index_key(&pkid(1), &pkid(2), &rate, 10, &order_id);
        let later = order_match_index_key(&pkid(1), &pkid(2), &rate, 20, &order_id);
        assert!(earlier < later);
    }

    #[test]
    fn prefix_is_a_strict_prefix_of_full_key() {
        let order_id = Hash::zeroed();
        let rate = ScaledExchangeRate::parse_decimal("5").unwrap();
        let full = order_match_index_key(&pkid(1), &pkid(2), &rate, 10, &order_id);
        let prefix = order_match_index_prefix(&pkid(1), &pkid(2));
        assert!(full.starts_with(&prefix));
    }
}
