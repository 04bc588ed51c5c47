use crate::pkid::{Pkid, PublicKey};
use borsh_derive::{BorshDeserialize, BorshSerialize};
use core_hashes::Hash;
use core_utils::{serde_bytes, serde_bytes_fixed_ref};
use extra_data::ExtraData;
use fixed_point::{ScaledExchangeRate, Uint256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::extra_data;

/// Content hash of the transaction that created an order. Orders have no
/// sequence number; they are identified purely by this hash.
pub type OrderId = Hash;

/// Fixed-width padded group key name. The all-zeros name is reserved (the
/// "base key") and forbidden as an edit target.
pub const GROUP_KEY_NAME_LENGTH: usize = 32;

#[derive(Clone, Copy, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct GroupKeyName(#[serde(with = "serde_bytes_fixed_ref")] pub [u8; GROUP_KEY_NAME_LENGTH]);

impl GroupKeyName {
    pub const BASE_KEY: GroupKeyName = GroupKeyName([0u8; GROUP_KEY_NAME_LENGTH]);

    /// Builds a padded name from a short byte slice, zero-filling the rest.
    pub fn from_bytes(name: &[u8]) -> Self {
        let mut bytes = [0u8; GROUP_KEY_NAME_LENGTH];
        let n = name.len().min(GROUP_KEY_NAME_LENGTH);
        bytes[..n].copy_from_slice(&name[..n]);
        Self(bytes)
    }

    pub fn is_base_key(&self) -> bool {
        self.0 == [0u8; GROUP_KEY_NAME_LENGTH]
    }
}

impl PartialEq for GroupKeyName {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for GroupKeyName {}

impl std::fmt::Debug for GroupKeyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GroupKeyName({})", String::from_utf8_lossy(&self.0).trim_end_matches('\0'))
    }
}

/// A record keyed by PKID holding username, description, creator basis
/// points, and flags. Required before issuing DAO coins or placing orders
/// in that coin.
#[derive(Clone, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ProfileEntry {
    pub pkid: Pkid,
    #[serde(with = "serde_bytes")]
    pub username: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub description: Vec<u8>,
    pub creator_basis_points: u64,
    pub dao_coin_minting_disabled: bool,
    pub is_deleted: bool,
}

impl PartialEq for ProfileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.pkid == other.pkid
            && self.username == other.username
            && self.description == other.description
            && self.creator_basis_points == other.creator_basis_points
            && self.dao_coin_minting_disabled == other.dao_coin_minting_disabled
    }
}
impl Eq for ProfileEntry {}

/// Keyed by `(holder, creator, isDAO)`. DESO balances use `Pkid::ZERO` as
/// the creator. Invariant: no entry with a zero balance is kept — the
/// staged view deletes rather than stores a zeroed entry.
#[derive(Clone, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CoinBalanceEntry {
    pub holder_pkid: Pkid,
    pub creator_pkid: Pkid,
    pub is_dao_coin: bool,
    pub balance: Uint256,
    pub is_deleted: bool,
}

impl PartialEq for CoinBalanceEntry {
    fn eq(&self, other: &Self) -> bool {
        self.holder_pkid == other.holder_pkid
            && self.creator_pkid == other.creator_pkid
            && self.is_dao_coin == other.is_dao_coin
            && self.balance == other.balance
    }
}
impl Eq for CoinBalanceEntry {}

impl CoinBalanceEntry {
    pub fn is_deso(&self) -> bool {
        !self.is_dao_coin && self.creator_pkid.is_zero()
    }
}

/// A legacy UTXO-model unspent output, keyed by the outpoint that created
/// it. Presence in the store means unspent; spending stages a tombstone.
/// Covers both ordinary transaction inputs and bidder-input DESO transfers
/// consumed on a counterparty's behalf by the matching engine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct UtxoEntry {
    pub public_key: PublicKey,
    pub amount_nanos: u64,
    pub is_deleted: bool,
}

impl PartialEq for UtxoEntry {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key && self.amount_nanos == other.amount_nanos
    }
}
impl Eq for UtxoEntry {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum OperationType {
    Bid,
    Ask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum FillType {
    GoodTillCancelled,
    FillOrKill,
    ImmediateOrCancel,
}

/// Identified by `OrderId` (content hash of the creating transaction).
/// `quantity` is always denominated in the order's own buying coin and
/// tracks the amount still left to fill ("I want to buy Q units of
/// *buying coin*" / "...to receive Q units of *buying coin*"), matching
/// the wire metadata's `quantity_to_buy` field — no unit conversion
/// happens at order placement.
/// `scaled_exchange_rate` is selling-coin units per one buying-coin unit,
/// in the order's own buying/selling labels; `matching_engine::book`
/// derives the selling-coin amount for a fill via
/// `ScaledExchangeRate::total_cost`.
#[derive(Clone, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OrderEntry {
    pub order_id: OrderId,
    pub transactor_pkid: Pkid,
    pub buying_coin_pkid: Pkid,
    pub selling_coin_pkid: Pkid,
    pub scaled_exchange_rate: ScaledExchangeRate,
    pub quantity: Uint256,
    pub operation_type: OperationType,
    pub fill_type: FillType,
    pub block_height: u64,
    pub is_deleted: bool,
}

impl PartialEq for OrderEntry {
    fn eq(&self, other: &Self) -> bool {
        self.order_id == other.order_id
            && self.transactor_pkid == other.transactor_pkid
            && self.buying_coin_pkid == other.buying_coin_pkid
            && self.selling_coin_pkid == other.selling_coin_pkid
            && self.scaled_exchange_rate == other.scaled_exchange_rate
            && self.quantity == other.quantity
            && self.operation_type == other.operation_type
            && self.fill_type == other.fill_type
            && self.block_height == other.block_height
    }
}
impl Eq for OrderEntry {}

impl OrderEntry {
    pub fn is_market_order(&self) -> bool {
        self.scaled_exchange_rate.is_market_order()
    }
}

/// Keyed by `(owner PKID, group key name)`. Holds the group's access
/// public key.
#[derive(Clone, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AccessGroupEntry {
    pub owner_pkid: Pkid,
    pub group_key_name: GroupKeyName,
    pub access_public_key: PublicKey,
    pub is_deleted: bool,
}

impl PartialEq for AccessGroupEntry {
    fn eq(&self, other: &Self) -> bool {
        self.owner_pkid == other.owner_pkid
            && self.group_key_name == other.group_key_name
            && self.access_public_key == other.access_public_key
    }
}
impl Eq for AccessGroupEntry {}

/// Keyed by `(member PKID, owner PKID, group key name)`. Holds the
/// member's own access-group key name, an opaque encrypted payload, and
/// extra data.
#[derive(Clone, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AccessGroupMemberEntry {
    pub member_pkid: Pkid,
    pub owner_pkid: Pkid,
    pub group_key_name: GroupKeyName,
    pub member_group_key_name: GroupKeyName,
    #[serde(with = "serde_bytes")]
    pub encrypted_key: Vec<u8>,
    pub extra_data: ExtraData,
    pub is_deleted: bool,
}

impl PartialEq for AccessGroupMemberEntry {
    fn eq(&self, other: &Self) -> bool {
        self.member_pkid == other.member_pkid
            && self.owner_pkid == other.owner_pkid
            && self.group_key_name == other.group_key_name
            && self.member_group_key_name == other.member_group_key_name
            && self.encrypted_key == other.encrypted_key
            && self.extra_data == other.extra_data
    }
}
impl Eq for AccessGroupMemberEntry {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum CoinOperationLimitKind {
    Any,
    Transfer,
    Buy,
    Sell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CoinOperationLimitKey {
    pub creator_pkid: Pkid,
    pub operation: CoinOperationLimitKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum NftOperationLimitKind {
    Any,
    Update,
    Bid,
    Transfer,
    Burn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct NftOperationLimitKey {
    pub post_hash: Hash,
    pub serial_number: u64,
    pub operation: NftOperationLimitKind,
}

/// Global DESO cap plus per-transaction-kind, per-coin-operation, and
/// per-NFT-operation caps. Set once when the derived key is authorized and
/// never mutated afterward; usage counters live alongside it on
/// `DerivedKeyEntry`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionSpendingLimit {
    pub global_deso_limit: u64,
    pub transaction_count_limit: BTreeMap<TransactionKind, u64>,
    pub coin_operation_limit: BTreeMap<CoinOperationLimitKey, u64>,
    pub nft_operation_limit: BTreeMap<NftOperationLimitKey, u64>,
}

impl PartialEq for TransactionSpendingLimit {
    fn eq(&self, other: &Self) -> bool {
        self.global_deso_limit == other.global_deso_limit
            && self.transaction_count_limit == other.transaction_count_limit
            && self.coin_operation_limit == other.coin_operation_limit
            && self.nft_operation_limit == other.nft_operation_limit
    }
}
impl Eq for TransactionSpendingLimit {}

/// Keyed by `(owner PKID, derived public key)`. Holds expiration block,
/// revocation flag, the original spending-limit caps, and the lifetime
/// usage counters that connect/disconnect mutate and restore symmetrically.
#[derive(Clone, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct DerivedKeyEntry {
    pub owner_pkid: Pkid,
    pub derived_public_key: PublicKey,
    pub expiration_block: u64,
    pub is_revoked: bool,
    pub spending_limit: TransactionSpendingLimit,
    pub deso_spent: u64,
    pub transaction_count_used: BTreeMap<TransactionKind, u64>,
    pub coin_operation_count_used: BTreeMap<CoinOperationLimitKey, u64>,
    pub nft_operation_count_used: BTreeMap<NftOperationLimitKey, u64>,
    pub is_deleted: bool,
}

impl PartialEq for DerivedKeyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.owner_pkid == other.owner_pkid
            && self.derived_public_key == other.derived_public_key
            && self.expiration_block == other.expiration_block
            && self.is_revoked == other.is_revoked
            && self.spending_limit == other.spending_limit
            && self.deso_spent == other.deso_spent
            && self.transaction_count_used == other.transaction_count_used
            && self.coin_operation_count_used == other.coin_operation_count_used
            && self.nft_operation_count_used == other.nft_operation_count_used
    }
}
impl Eq for DerivedKeyEntry {}

impl DerivedKeyEntry {
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        block_height > self.expiration_block
    }
}

/// A single record carrying minimum fee rate, profile-creation fee,
/// NFT-copy cap, and update-authority key set, read once per block height.
/// Also carries the height at which the legacy UTXO accounting model is
/// superseded by the post-fork balance model (see `DESIGN.md`).
#[derive(Clone, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct GlobalParamsEntry {
    pub usd_cents_per_bitcoin: u64,
    pub min_network_fee_nanos_per_kb: u64,
    pub profile_creation_fee_nanos: u64,
    pub nft_creation_fee_nanos: u64,
    pub max_copies_per_nft: u64,
    pub update_authority_public_keys: Vec<PublicKey>,
    pub balance_model_fork_height: u64,
    pub is_deleted: bool,
}

impl PartialEq for GlobalParamsEntry {
    fn eq(&self, other: &Self) -> bool {
        self.usd_cents_per_bitcoin == other.usd_cents_per_bitcoin
            && self.min_network_fee_nanos_per_kb == other.min_network_fee_nanos_per_kb
            && self.profile_creation_fee_nanos == other.profile_creation_fee_nanos
            && self.nft_creation_fee_nanos == other.nft_creation_fee_nanos
            && self.max_copies_per_nft == other.max_copies_per_nft
            && self.update_authority_public_keys == other.update_authority_public_keys
            && self.balance_model_fork_height == other.balance_model_fork_height
    }
}
impl Eq for GlobalParamsEntry {}

/// A single record holding the current epoch number, final block height,
/// and current random-seed hash, used for PoS leader election.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct EpochEntry {
    pub epoch_number: u64,
    pub final_block_height: u64,
    pub random_seed_hash: Hash,
    pub is_deleted: bool,
}

impl PartialEq for EpochEntry {
    fn eq(&self, other: &Self) -> bool {
        self.epoch_number == other.epoch_number
            && self.final_block_height == other.final_block_height
            && self.random_seed_hash == other.random_seed_hash
    }
}
impl Eq for EpochEntry {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum TransactionKind {
    BlockReward,
    BasicTransfer,
    UpdateProfile,
    DaoCoin,
    DaoCoinTransfer,
    DaoCoinLimitOrder,
    CreateAccessGroup,
    AccessGroupMembers,
    AuthorizeDerivedKey,
    UpdateGlobalParams,
}
