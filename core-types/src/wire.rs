//! The transaction wire format: `[inputs] [outputs] public_key
//! metadata_variant_tag metadata_body extra_data_map signature`.

use crate::entries::{FillType, GroupKeyName, OperationType, OrderId};
use crate::extra_data::ExtraData;
pub use crate::entries::TransactionKind;
use crate::pkid::{Pkid, PublicKey};
use borsh_derive::{BorshDeserialize, BorshSerialize};
use core_crypto::Signature;
use core_hashes::Hash;
use core_utils::{serde_bytes, serde_bytes_fixed_ref};
use fixed_point::{ScaledExchangeRate, Uint256};
use serde::{Deserialize, Serialize};

/// A reference to a previously created, unspent transaction output, used by
/// legacy UTXO-model inputs and by bidder inputs in order placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionOutpoint {
    #[serde(with = "serde_bytes_fixed_ref")]
    pub transaction_id: Hash,
    pub index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionInput {
    pub previous_outpoint: TransactionOutpoint,
}

/// A legacy UTXO-model output paying a fixed amount of DESO to a public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionOutput {
    pub public_key: PublicKey,
    pub amount_nanos: u64,
}

/// A counterparty UTXO reference carried in an order-placement transaction
/// to cover the counterparty's DESO outflow. The engine checks `owner`
/// against the input's actual recorded owner before spending it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BidderInput {
    pub input: TransactionOutpoint,
    pub owner: PublicKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum AccessGroupOperationType {
    Add,
    Remove,
    Update,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AccessGroupMemberModification {
    pub member_pkid: Pkid,
    pub member_group_key_name: GroupKeyName,
    #[serde(with = "serde_bytes")]
    pub encrypted_key: Vec<u8>,
    pub extra_data: ExtraData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum DaoCoinOperation {
    Mint,
    Burn,
    DisableMinting,
}

/// Per-metadata-kind transaction body. `BlockReward` carries no body beyond
/// the tag; the prelude rejects a block-reward transaction that has inputs
/// or a signature before this is ever inspected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum TransactionMetadata {
    BlockReward,
    BasicTransfer,
    UpdateProfile {
        #[serde(with = "serde_bytes")]
        username: Vec<u8>,
        #[serde(with = "serde_bytes")]
        description: Vec<u8>,
        creator_basis_points: u64,
    },
    /// Issues or retires units of the signer's own DAO coin. A profile
    /// must already exist for the signer before this connects.
    DaoCoin {
        operation: DaoCoinOperation,
        coin_amount: Uint256,
    },
    DaoCoinTransfer {
        coin_creator_pkid: Pkid,
        receiver_pkid: Pkid,
        amount: Uint256,
    },
    DaoCoinLimitOrder {
        buying_coin_pkid: Pkid,
        selling_coin_pkid: Pkid,
        scaled_exchange_rate: ScaledExchangeRate,
        quantity_to_buy: Uint256,
        operation_type: OperationType,
        fill_type: FillType,
        cancel_order_id: Option<OrderId>,
        bidder_inputs: Vec<BidderInput>,
    },
    CreateAccessGroup {
        group_key_name: GroupKeyName,
        access_public_key: PublicKey,
    },
    AccessGroupMembers {
        group_key_name: GroupKeyName,
        operation_type: AccessGroupOperationType,
        members: Vec<AccessGroupMemberModification>,
    },
    AuthorizeDerivedKey {
        derived_public_key: PublicKey,
        expiration_block: u64,
        is_revoked: bool,
    },
    UpdateGlobalParams {
        usd_cents_per_bitcoin: Option<u64>,
        min_network_fee_nanos_per_kb: Option<u64>,
        profile_creation_fee_nanos: Option<u64>,
        nft_creation_fee_nanos: Option<u64>,
        max_copies_per_nft: Option<u64>,
    },
}

impl TransactionMetadata {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionMetadata::BlockReward => TransactionKind::BlockReward,
            TransactionMetadata::BasicTransfer => TransactionKind::BasicTransfer,
            TransactionMetadata::UpdateProfile { .. } => TransactionKind::UpdateProfile,
            TransactionMetadata::DaoCoin { .. } => TransactionKind::DaoCoin,
            TransactionMetadata::DaoCoinTransfer { .. } => TransactionKind::DaoCoinTransfer,
            TransactionMetadata::DaoCoinLimitOrder { .. } => TransactionKind::DaoCoinLimitOrder,
            TransactionMetadata::CreateAccessGroup { .. } => TransactionKind::CreateAccessGroup,
            TransactionMetadata::AccessGroupMembers { .. } => TransactionKind::AccessGroupMembers,
            TransactionMetadata::AuthorizeDerivedKey { .. } => TransactionKind::AuthorizeDerivedKey,
            TransactionMetadata::UpdateGlobalParams { .. } => TransactionKind::UpdateGlobalParams,
        }
    }
}

/// A fully formed transaction as it appears on the wire: inputs, outputs,
/// the signing public key, the dispatched metadata body, extra data, and a
/// signature in one of the owner/derived-key/DER-recoverable schemes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub public_key: PublicKey,
    pub metadata: TransactionMetadata,
    pub extra_data: ExtraData,
    pub fee_nanos: u64,
    pub signature: Option<Signature>,
}

impl Transaction {
    pub fn is_block_reward(&self) -> bool {
        matches!(self.metadata, TransactionMetadata::BlockReward)
    }

    /// The content hash used as `OrderId` for `DaoCoinLimitOrder` placements.
    pub fn content_hash(&self) -> Hash {
        let encoded = borsh::BorshSerialize::try_to_vec(self).expect("transaction always encodes");
        Hash::from(core_hashes::hasher::content_hash(&encoded))
    }

    /// The digest actually covered by `signature`: the transaction with the
    /// signature field cleared. Recomputed on every connect attempt rather
    /// than cached, since a staged/disconnected transaction may be re-signed.
    pub fn signing_digest(&self) -> Hash {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        let encoded = borsh::BorshSerialize::try_to_vec(&unsigned).expect("transaction always encodes");
        Hash::from(core_hashes::hasher::double_sha256(&encoded))
    }
}
