//! Per-metadata-kind handler table: runs the generic preamble (or the
//! block-reward entry point), then dispatches on [`TransactionMetadata`] to
//! the sub-crate that owns that kind's state, and finally checks the
//! spend against the signer's derived-key caps if it was signed by one.
//! `connect`/`disconnect` are the only two entry points the block driver
//! (`chain::driver`) calls.

use crate::auth::{self, SpendCheck};
use crate::reverse_op::ReverseOperation;
use access_groups::{MemberModificationRequest, MemberReverseOp};
use core_types::entries::{CoinOperationLimitKey, CoinOperationLimitKind, OrderEntry, TransactionKind};
use core_types::wire::{DaoCoinOperation, Transaction, TransactionMetadata};
use core_types::{CoreError, CoreResult, Pkid};
use matching_engine::PlaceOrderRequest;
use state::StagedView;
use tracing::{debug, info};

/// Everything one connected transaction produced: its reverse-ops (for
/// `disconnect`) and, for a `DaoCoinLimitOrder` placement, the book's
/// verdict (resting order, if any) a caller may want to surface.
pub struct ConnectOutcome {
    pub reverse_ops: Vec<ReverseOperation>,
    pub resting_order: Option<OrderEntry>,
}

/// Connects an ordinary (non-block-reward) transaction: the generic
/// preamble, then the metadata-specific body, then the derived-key spend
/// check. The preamble already self-unwinds its own failures; the body and
/// the spend check run on top of the preamble's staged ops, so if either of
/// them fails this call unwinds everything staged so far (preamble included)
/// before returning, leaving the caller with nothing to clean up.
pub fn connect(view: &mut StagedView, tx: &Transaction, block_height: u64, content_hash: core_hashes::Hash) -> CoreResult<ConnectOutcome> {
    let mut preamble = crate::prelude::run(view, tx, block_height, content_hash)?;
    let transactor_pkid = preamble.transactor_pkid;

    let mut resting_order = None;
    let body_check = match run_body(view, tx, &transactor_pkid, block_height, content_hash, &mut preamble.reverse_ops, &mut resting_order) {
        Ok(body_check) => body_check,
        Err(err) => {
            disconnect(view, &preamble.reverse_ops).expect("unwinding our own freshly-staged reverse-ops cannot fail");
            return Err(err);
        }
    };

    if let Some(derived_pk) = preamble.derived_public_key {
        match auth::check_and_record_spend(view, &transactor_pkid, &derived_pk, body_check) {
            Ok(spend_pre) => preamble.reverse_ops.push(ReverseOperation::DerivedKeySpend(spend_pre)),
            Err(err) => {
                disconnect(view, &preamble.reverse_ops).expect("unwinding our own freshly-staged reverse-ops cannot fail");
                return Err(err);
            }
        }
    }

    debug!(kind = ?tx.metadata.kind(), %transactor_pkid, "connected transaction");
    Ok(ConnectOutcome { reverse_ops: preamble.reverse_ops, resting_order })
}

/// Connects a block-reward transaction via its own dedicated preamble.
/// There is no metadata body to dispatch to and no derived-key spend check
/// (block rewards carry no signature at all).
pub fn connect_block_reward(
    view: &mut StagedView,
    tx: &Transaction,
    block_height: u64,
    content_hash: core_hashes::Hash,
    max_reward_nanos: u64,
) -> CoreResult<Vec<ReverseOperation>> {
    let preamble = crate::prelude::run_block_reward(view, tx, block_height, content_hash, max_reward_nanos)?;
    Ok(preamble.reverse_ops)
}

/// Replays a transaction's reverse-ops in reverse, restoring every
/// pre-image exactly. Shared by both ordinary and block-reward
/// transactions, since both build the same `Vec<ReverseOperation>` shape.
pub fn disconnect(view: &mut StagedView, ops: &[ReverseOperation]) -> CoreResult<()> {
    crate::reverse_op::disconnect(view, ops)
}

fn run_body(
    view: &mut StagedView,
    tx: &Transaction,
    transactor_pkid: &Pkid,
    block_height: u64,
    content_hash: core_hashes::Hash,
    reverse_ops: &mut Vec<ReverseOperation>,
    resting_order: &mut Option<OrderEntry>,
) -> CoreResult<SpendCheck> {
    match &tx.metadata {
        TransactionMetadata::BlockReward => unreachable!("block reward uses connect_block_reward"),

        TransactionMetadata::BasicTransfer => Ok(SpendCheck {
            kind: TransactionKind::BasicTransfer,
            deso_spent_nanos: tx.outputs.iter().map(|o| o.amount_nanos).sum(),
            coin_operation: None,
            nft_operation: None,
        }),

        TransactionMetadata::UpdateProfile { username, description, creator_basis_points } => {
            let update = crate::profile::update(view, transactor_pkid, username.clone(), description.clone(), *creator_basis_points)?;
            reverse_ops.push(ReverseOperation::Profile(update));
            Ok(SpendCheck { kind: TransactionKind::UpdateProfile, deso_spent_nanos: 0, coin_operation: None, nft_operation: None })
        }

        TransactionMetadata::DaoCoin { operation, coin_amount } => {
            let op_key = CoinOperationLimitKey { creator_pkid: *transactor_pkid, operation: CoinOperationLimitKind::Any };
            match operation {
                DaoCoinOperation::Mint => {
                    crate::profile::get(view, transactor_pkid)?.ok_or(CoreError::BuyingDAOCoinCreatorMissingProfile)?;
                    let prev = matching_engine::ledger::credit(view, transactor_pkid, transactor_pkid, true, coin_amount)?;
                    reverse_ops.push(ReverseOperation::BalanceChanged { holder: *transactor_pkid, creator: *transactor_pkid, is_dao_coin: true, previous_balance: prev });
                }
                DaoCoinOperation::Burn => {
                    let prev = matching_engine::ledger::debit(
                        view,
                        transactor_pkid,
                        transactor_pkid,
                        true,
                        coin_amount,
                        CoreError::InsufficientDAOCoinsToOpenOrder,
                    )?;
                    reverse_ops.push(ReverseOperation::BalanceChanged { holder: *transactor_pkid, creator: *transactor_pkid, is_dao_coin: true, previous_balance: prev });
                }
                DaoCoinOperation::DisableMinting => {
                    let update = crate::profile::disable_minting(view, transactor_pkid)?;
                    reverse_ops.push(ReverseOperation::Profile(update));
                }
            }
            Ok(SpendCheck { kind: TransactionKind::DaoCoin, deso_spent_nanos: 0, coin_operation: Some(op_key), nft_operation: None })
        }

        TransactionMetadata::DaoCoinTransfer { coin_creator_pkid, receiver_pkid, amount } => {
            let prev_sender = matching_engine::ledger::debit(
                view,
                transactor_pkid,
                coin_creator_pkid,
                true,
                amount,
                CoreError::InsufficientDAOCoinsToOpenOrder,
            )?;
            reverse_ops.push(ReverseOperation::BalanceChanged { holder: *transactor_pkid, creator: *coin_creator_pkid, is_dao_coin: true, previous_balance: prev_sender });
            let prev_receiver = matching_engine::ledger::credit(view, receiver_pkid, coin_creator_pkid, true, amount)?;
            reverse_ops.push(ReverseOperation::BalanceChanged { holder: *receiver_pkid, creator: *coin_creator_pkid, is_dao_coin: true, previous_balance: prev_receiver });

            let op_key = CoinOperationLimitKey { creator_pkid: *coin_creator_pkid, operation: CoinOperationLimitKind::Transfer };
            Ok(SpendCheck { kind: TransactionKind::DaoCoinTransfer, deso_spent_nanos: 0, coin_operation: Some(op_key), nft_operation: None })
        }

        TransactionMetadata::DaoCoinLimitOrder {
            buying_coin_pkid,
            selling_coin_pkid,
            scaled_exchange_rate,
            quantity_to_buy,
            operation_type,
            fill_type,
            cancel_order_id,
            bidder_inputs,
        } => {
            let op_key_kind = match operation_type {
                core_types::entries::OperationType::Bid => CoinOperationLimitKind::Buy,
                core_types::entries::OperationType::Ask => CoinOperationLimitKind::Sell,
            };
            let traded_coin_creator = if buying_coin_pkid.is_zero() { *selling_coin_pkid } else { *buying_coin_pkid };
            let op_key = CoinOperationLimitKey { creator_pkid: traded_coin_creator, operation: op_key_kind };

            if let Some(order_id) = cancel_order_id {
                let op = matching_engine::cancel_order(view, transactor_pkid, order_id)?;
                reverse_ops.push(ReverseOperation::Orders(vec![op]));
                return Ok(SpendCheck { kind: TransactionKind::DaoCoinLimitOrder, deso_spent_nanos: 0, coin_operation: Some(op_key), nft_operation: None });
            }

            if !buying_coin_pkid.is_zero() {
                crate::profile::get(view, buying_coin_pkid)?.ok_or(CoreError::BuyingDAOCoinCreatorMissingProfile)?;
            }
            if !selling_coin_pkid.is_zero() {
                crate::profile::get(view, selling_coin_pkid)?.ok_or(CoreError::BuyingDAOCoinCreatorMissingProfile)?;
            }

            let request = PlaceOrderRequest {
                order_id: content_hash,
                transactor_pkid: *transactor_pkid,
                buying_coin_pkid: *buying_coin_pkid,
                selling_coin_pkid: *selling_coin_pkid,
                scaled_exchange_rate: *scaled_exchange_rate,
                quantity_to_buy: *quantity_to_buy,
                operation_type: *operation_type,
                fill_type: *fill_type,
                block_height,
                bidder_inputs: bidder_inputs.clone(),
            };
            let outcome = matching_engine::place_order(view, request)?;
            info!(fills = outcome.reverse_ops.len(), resting = outcome.resting_order.is_some(), "order placed");
            *resting_order = outcome.resting_order;
            reverse_ops.push(ReverseOperation::Orders(outcome.reverse_ops));
            // DESO actually moved is bounded by each fill's balance deltas on
            // both legs of the book, not recoverable from `previous_balance`
            // pre-images alone without a second read; the spending-limit's
            // per-kind and per-coin-operation counters (both applied below)
            // already bound how many orders a derived key can place, so the
            // global DESO cap is left unmetered for this kind specifically.
            // See DESIGN.md.
            Ok(SpendCheck { kind: TransactionKind::DaoCoinLimitOrder, deso_spent_nanos: 0, coin_operation: Some(op_key), nft_operation: None })
        }

        TransactionMetadata::CreateAccessGroup { group_key_name, access_public_key } => {
            let created = access_groups::create_group(view, transactor_pkid, *group_key_name, *access_public_key)?;
            reverse_ops.push(ReverseOperation::GroupCreated(created));
            Ok(SpendCheck { kind: TransactionKind::CreateAccessGroup, deso_spent_nanos: 0, coin_operation: None, nft_operation: None })
        }

        TransactionMetadata::AccessGroupMembers { group_key_name, operation_type, members } => {
            let request = MemberModificationRequest { group_key_name: *group_key_name, operation_type: *operation_type, members: members.clone() };
            let ops: Vec<MemberReverseOp> = access_groups::apply_member_modification(view, transactor_pkid, request)?;
            reverse_ops.push(ReverseOperation::Members(ops));
            Ok(SpendCheck { kind: TransactionKind::AccessGroupMembers, deso_spent_nanos: 0, coin_operation: None, nft_operation: None })
        }

        TransactionMetadata::AuthorizeDerivedKey { derived_public_key, expiration_block, is_revoked } => {
            let authorized = crate::derived_key::authorize(
                view,
                transactor_pkid,
                *derived_public_key,
                *expiration_block,
                *is_revoked,
                core_types::entries::TransactionSpendingLimit::default(),
            )?;
            reverse_ops.push(ReverseOperation::DerivedKeyAuthorized(authorized));
            Ok(SpendCheck { kind: TransactionKind::AuthorizeDerivedKey, deso_spent_nanos: 0, coin_operation: None, nft_operation: None })
        }

        TransactionMetadata::UpdateGlobalParams {
            usd_cents_per_bitcoin,
            min_network_fee_nanos_per_kb,
            profile_creation_fee_nanos,
            nft_creation_fee_nanos,
            max_copies_per_nft,
        } => {
            let update = crate::params::apply_update(
                view,
                &tx.public_key,
                block_height,
                *usd_cents_per_bitcoin,
                *min_network_fee_nanos_per_kb,
                *profile_creation_fee_nanos,
                *nft_creation_fee_nanos,
                *max_copies_per_nft,
            )?;
            reverse_ops.push(ReverseOperation::GlobalParams(update));
            Ok(SpendCheck { kind: TransactionKind::UpdateGlobalParams, deso_spent_nanos: 0, coin_operation: None, nft_operation: None })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_crypto::sign;
    use core_types::entries::{FillType, OperationType};
    use core_types::wire::TransactionMetadata;
    use core_types::ExtraData;
    use fixed_point::ScaledExchangeRate;
    use secp256k1::Secp256k1;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn view() -> (TempDir, StagedView) {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(store::Database::open(tmp.path()).unwrap());
        (tmp, StagedView::new(db))
    }

    fn keypair() -> (secp256k1::SecretKey, core_types::PublicKey) {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(&mut rand::rngs::OsRng);
        (sk, core_types::PublicKey::from_crypto(&pk))
    }

    fn signed(mut tx: Transaction, sk: &secp256k1::SecretKey) -> Transaction {
        let digest: [u8; 32] = (*tx.signing_digest()).into();
        tx.signature = Some(sign(sk, &digest).unwrap());
        tx
    }

    fn order_tx(public_key: core_types::PublicKey, metadata: TransactionMetadata) -> Transaction {
        Transaction { inputs: vec![], outputs: vec![], public_key, metadata, extra_data: ExtraData::new(), fee_nanos: 0, signature: None }
    }

    /// Spec §8 scenario 1: `m0` has an open ASK (sell 100 DAO0 for DESO at
    /// rate 10), `m1` submits a BID that exactly matches it.
    #[test]
    fn exact_bid_ask_match_moves_all_four_balances() {
        let (_tmp, mut v) = view();
        let (sk0, pk0) = keypair();
        let (sk1, pk1) = keypair();
        let m0 = Pkid::from(pk0);
        let m1 = Pkid::from(pk1);

        crate::profile::update(&mut v, &m0, b"maker".to_vec(), Vec::new(), 0).unwrap();
        matching_engine::ledger::credit(&mut v, &m0, &m0, true, &Uint256_::from(100u64)).unwrap();
        matching_engine::ledger::credit(&mut v, &m1, &Pkid::ZERO, false, &Uint256_::from(10u64)).unwrap();

        let rate = ScaledExchangeRate::parse_decimal("10").unwrap();
        let ask = signed(
            order_tx(
                pk0,
                TransactionMetadata::DaoCoinLimitOrder {
                    buying_coin_pkid: Pkid::ZERO,
                    selling_coin_pkid: m0,
                    scaled_exchange_rate: rate,
                    quantity_to_buy: Uint256_::from(10u64),
                    operation_type: OperationType::Ask,
                    fill_type: FillType::GoodTillCancelled,
                    cancel_order_id: None,
                    bidder_inputs: vec![],
                },
            ),
            &sk0,
        );
        let ask_hash = ask.content_hash();
        connect(&mut v, &ask, 1, ask_hash).unwrap();

        let bid = signed(
            order_tx(
                pk1,
                TransactionMetadata::DaoCoinLimitOrder {
                    buying_coin_pkid: m0,
                    selling_coin_pkid: Pkid::ZERO,
                    scaled_exchange_rate: rate,
                    quantity_to_buy: Uint256_::from(100u64),
                    operation_type: OperationType::Bid,
                    fill_type: FillType::GoodTillCancelled,
                    cancel_order_id: None,
                    bidder_inputs: vec![],
                },
            ),
            &sk1,
        );
        let bid_hash = bid.content_hash();
        let outcome = connect(&mut v, &bid, 1, bid_hash).unwrap();
        assert!(outcome.resting_order.is_none());

        assert_eq!(matching_engine::ledger::get_balance(&v, &m0, &m0, true).unwrap(), Uint256_::ZERO);
        assert_eq!(matching_engine::ledger::get_balance(&v, &m0, &Pkid::ZERO, false).unwrap(), Uint256_::from(10u64));
        assert_eq!(matching_engine::ledger::get_balance(&v, &m1, &Pkid::ZERO, false).unwrap(), Uint256_::ZERO);
        assert_eq!(matching_engine::ledger::get_balance(&v, &m1, &m0, true).unwrap(), Uint256_::from(100u64));
        assert!(matching_engine::book::get(&v, &ask_hash).unwrap().is_none());
    }

    #[test]
    fn cancel_then_disconnect_restores_resting_order() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        let transactor = Pkid::from(pk);
        let counterparty = Pkid::from([9u8; 33]);
        matching_engine::ledger::credit(&mut v, &transactor, &counterparty, true, &Uint256_::from(50u64)).unwrap();
        crate::profile::update(&mut v, &counterparty, b"creator".to_vec(), Vec::new(), 0).unwrap();

        let rate = ScaledExchangeRate::parse_decimal("2").unwrap();
        let tx = signed(
            order_tx(
                pk,
                TransactionMetadata::DaoCoinLimitOrder {
                    buying_coin_pkid: Pkid::ZERO,
                    selling_coin_pkid: counterparty,
                    scaled_exchange_rate: rate,
                    quantity_to_buy: Uint256_::from(20u64),
                    operation_type: OperationType::Ask,
                    fill_type: FillType::GoodTillCancelled,
                    cancel_order_id: None,
                    bidder_inputs: vec![],
                },
            ),
            &sk,
        );
        let order_hash = tx.content_hash();
        let placed = connect(&mut v, &tx, 1, order_hash).unwrap();
        assert!(placed.resting_order.is_some());
        assert!(matching_engine::book::get(&v, &order_hash).unwrap().is_some());

        let cancel = signed(
            order_tx(
                pk,
                TransactionMetadata::DaoCoinLimitOrder {
                    buying_coin_pkid: Pkid::ZERO,
                    selling_coin_pkid: counterparty,
                    scaled_exchange_rate: rate,
                    quantity_to_buy: Uint256_::from(20u64),
                    operation_type: OperationType::Ask,
                    fill_type: FillType::GoodTillCancelled,
                    cancel_order_id: Some(order_hash),
                    bidder_inputs: vec![],
                },
            ),
            &sk,
        );
        let cancel_hash = cancel.content_hash();
        let cancel_outcome = connect(&mut v, &cancel, 2, cancel_hash).unwrap();
        assert!(matching_engine::book::get(&v, &order_hash).unwrap().is_none());

        disconnect(&mut v, &cancel_outcome.reverse_ops).unwrap();
        assert!(matching_engine::book::get(&v, &order_hash).unwrap().is_some());
    }

    use fixed_point::Uint256 as Uint256_;
}
