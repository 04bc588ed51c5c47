//! The generic preamble every transaction runs through before its own
//! metadata body connects: signature verification, derived-key
//! authorization, minimum-fee enforcement, and settlement of the legacy
//! UTXO inputs/outputs or their balance-model equivalent. Block-reward
//! transactions skip most of this — [`run_block_reward`] is their own
//! entry point, mirroring how `core_types::wire::Transaction::is_block_reward`
//! gates which path `dispatch` takes.

use crate::auth::{self, VerifiedSigner};
use crate::reverse_op::ReverseOperation;
use core_types::wire::{Transaction, TransactionMetadata, TransactionOutpoint};
use core_types::{CoreError, CoreResult, Pkid, PublicKey};
use fixed_point::Uint256;
use state::StagedView;

/// Unwinds every op staged so far in one call's `reverse_ops`, used when
/// that same call discovers partway through that it must fail. These are
/// ops this call itself just staged, so restoring them can't fail in turn.
fn unwind(view: &mut StagedView, reverse_ops: &[ReverseOperation]) {
    crate::reverse_op::disconnect(view, reverse_ops).expect("unwinding our own freshly-staged reverse-ops cannot fail");
}

/// Which of the two input/output settlement schemes is in force at a given
/// block height, switched once at `GlobalParamsEntry.balance_model_fork_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountingModel {
    Utxo,
    Balance,
}

/// Before any `UpdateGlobalParams` transaction has ever connected there is
/// no recorded fork height; the chain behaves as pure UTXO until one is set.
pub fn accounting_model(view: &StagedView, block_height: u64) -> CoreResult<AccountingModel> {
    match crate::params::effective_global_params(view, block_height)? {
        Some(params) if block_height >= params.balance_model_fork_height => Ok(AccountingModel::Balance),
        _ => Ok(AccountingModel::Utxo),
    }
}

/// What the generic preamble established about a connecting transaction,
/// for `dispatch` to build the kind-specific body on top of.
pub struct Preamble {
    pub transactor_pkid: Pkid,
    pub signer: VerifiedSigner,
    pub derived_public_key: Option<PublicKey>,
    pub reverse_ops: Vec<ReverseOperation>,
}

/// Runs the ordinary (non-block-reward) preamble.
pub fn run(view: &mut StagedView, tx: &Transaction, block_height: u64, content_hash: core_hashes::Hash) -> CoreResult<Preamble> {
    let signer = auth::verify_signature(tx)?;
    let transactor_pkid = Pkid::from(tx.public_key);
    let derived_public_key = auth::authorize_signer(view, &transactor_pkid, signer, block_height)?;

    check_fee(view, tx, block_height)?;
    let mut reverse_ops = Vec::new();
    if let Err(err) = settle_inputs_and_outputs(view, tx, block_height, content_hash, &mut reverse_ops) {
        unwind(view, &reverse_ops);
        return Err(err);
    }

    Ok(Preamble { transactor_pkid, signer, derived_public_key, reverse_ops })
}

/// A block-reward transaction carries neither a signature nor inputs, and
/// its outputs are capped at `max_reward_nanos` (the chain driver's
/// subsidy-schedule figure for this height) rather than covered by an input
/// side at all.
pub fn run_block_reward(
    view: &mut StagedView,
    tx: &Transaction,
    block_height: u64,
    content_hash: core_hashes::Hash,
    max_reward_nanos: u64,
) -> CoreResult<Preamble> {
    if tx.signature.is_some() {
        return Err(CoreError::BlockRewardTxnNotAllowedToHaveSignature);
    }
    if !tx.inputs.is_empty() {
        return Err(CoreError::BlockRewardTxnNotAllowedToHaveInputs);
    }
    let total_out = tx.outputs.iter().try_fold(0u64, |acc, o| acc.checked_add(o.amount_nanos)).ok_or(CoreError::BlockRewardExceedsMaxAllowed)?;
    if total_out > max_reward_nanos {
        return Err(CoreError::BlockRewardExceedsMaxAllowed);
    }

    let mut reverse_ops = Vec::new();
    if let Err(err) = credit_outputs(view, tx, block_height, content_hash, &mut reverse_ops) {
        unwind(view, &reverse_ops);
        return Err(err);
    }
    Ok(Preamble { transactor_pkid: Pkid::from(tx.public_key), signer: VerifiedSigner::Owner, derived_public_key: None, reverse_ops })
}

fn check_fee(view: &StagedView, tx: &Transaction, block_height: u64) -> CoreResult<()> {
    let params = match crate::params::effective_global_params(view, block_height)? {
        Some(params) => params,
        None => return Ok(()),
    };
    let size_bytes = borsh::BorshSerialize::try_to_vec(tx).map_err(|e| CoreError::Encoding(e.to_string()))?.len() as u64;
    let min_fee = params.min_network_fee_nanos_per_kb.saturating_mul(size_bytes) / 1000;
    if tx.fee_nanos < min_fee {
        return Err(CoreError::FeeNanosBelowMinTxFee);
    }
    // A DAO coin limit order's fee is pinned to exactly the minimum: there's
    // no change output for an overpayment to land in, so any excess is
    // rejected rather than silently burned.
    if matches!(tx.metadata, TransactionMetadata::DaoCoinLimitOrder { .. }) && tx.fee_nanos > min_fee {
        return Err(CoreError::OverspendingDESO);
    }
    Ok(())
}

fn credit_outputs(
    view: &mut StagedView,
    tx: &Transaction,
    block_height: u64,
    content_hash: core_hashes::Hash,
    reverse_ops: &mut Vec<ReverseOperation>,
) -> CoreResult<()> {
    match accounting_model(view, block_height)? {
        AccountingModel::Utxo => {
            for (index, output) in tx.outputs.iter().enumerate() {
                let outpoint = TransactionOutpoint { transaction_id: content_hash, index: index as u32 };
                matching_engine::utxo::create(view, &outpoint, output.public_key, output.amount_nanos)?;
                reverse_ops.push(ReverseOperation::UtxoCreated { outpoint });
            }
        }
        AccountingModel::Balance => {
            for output in &tx.outputs {
                let receiver_pkid = Pkid::from(output.public_key);
                let prev = matching_engine::ledger::credit(view, &receiver_pkid, &Pkid::ZERO, false, &Uint256::from(output.amount_nanos))?;
                reverse_ops.push(ReverseOperation::BalanceChanged {
                    holder: receiver_pkid,
                    creator: Pkid::ZERO,
                    is_dao_coin: false,
                    previous_balance: prev,
                });
            }
        }
    }
    Ok(())
}

/// Spends declared inputs (UTXO model) or debits the transactor's DESO
/// balance (balance model) for `sum(outputs) + fee`, then credits the
/// outputs the same way `credit_outputs` does for a block reward. Any
/// excess input value over what's required is burned rather than refunded,
/// the same posture the legacy UTXO model takes toward an unclaimed change
/// output.
fn settle_inputs_and_outputs(
    view: &mut StagedView,
    tx: &Transaction,
    block_height: u64,
    content_hash: core_hashes::Hash,
    reverse_ops: &mut Vec<ReverseOperation>,
) -> CoreResult<()> {
    let total_out = tx.outputs.iter().try_fold(0u64, |acc, out| acc.checked_add(out.amount_nanos)).ok_or(CoreError::OverspendingDESO)?;
    let required = total_out.checked_add(tx.fee_nanos).ok_or(CoreError::OverspendingDESO)?;

    match accounting_model(view, block_height)? {
        AccountingModel::Utxo => {
            let mut total_in = 0u64;
            for input in &tx.inputs {
                let entry = matching_engine::utxo::spend(view, &input.previous_outpoint, &tx.public_key, CoreError::NotFound)?;
                reverse_ops.push(ReverseOperation::UtxoSpent { outpoint: input.previous_outpoint, entry });
                total_in = total_in.checked_add(entry.amount_nanos).ok_or(CoreError::OverspendingDESO)?;
            }
            if total_in < required {
                return Err(CoreError::OverspendingDESO);
            }
        }
        AccountingModel::Balance => {
            let transactor_pkid = Pkid::from(tx.public_key);
            let prev = matching_engine::ledger::debit(
                view,
                &transactor_pkid,
                &Pkid::ZERO,
                false,
                &Uint256::from(required),
                CoreError::InsufficientDESOToOpenOrder,
            )?;
            reverse_ops.push(ReverseOperation::BalanceChanged { holder: transactor_pkid, creator: Pkid::ZERO, is_dao_coin: false, previous_balance: prev });
        }
    }
    credit_outputs(view, tx, block_height, content_hash, reverse_ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_crypto::sign;
    use core_types::wire::{TransactionInput, TransactionMetadata, TransactionOutput};
    use core_types::ExtraData;
    use secp256k1::Secp256k1;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn view() -> (TempDir, StagedView) {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(store::Database::open(tmp.path()).unwrap());
        (tmp, StagedView::new(db))
    }

    fn keypair() -> (secp256k1::SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(&mut rand::rngs::OsRng);
        (sk, PublicKey::from_crypto(&pk))
    }

    fn signed(mut tx: Transaction, sk: &secp256k1::SecretKey) -> Transaction {
        let digest: [u8; 32] = (*tx.signing_digest()).into();
        tx.signature = Some(sign(sk, &digest).unwrap());
        tx
    }

    #[test]
    fn utxo_model_spends_inputs_and_creates_outputs() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        let (_, payee) = keypair();
        let outpoint = TransactionOutpoint { transaction_id: core_hashes::Hash::zeroed(), index: 0 };
        matching_engine::utxo::create(&mut v, &outpoint, pk, 1000).unwrap();

        let tx = signed(
            Transaction {
                inputs: vec![TransactionInput { previous_outpoint: outpoint }],
                outputs: vec![TransactionOutput { public_key: payee, amount_nanos: 900 }],
                public_key: pk,
                metadata: TransactionMetadata::BasicTransfer,
                extra_data: ExtraData::new(),
                fee_nanos: 100,
                signature: None,
            },
            &sk,
        );
        let content_hash = tx.content_hash();
        let preamble = run(&mut v, &tx, 1, content_hash).unwrap();
        assert_eq!(preamble.signer, VerifiedSigner::Owner);
        assert!(matching_engine::utxo::get(&v, &outpoint).unwrap().is_none());
        let new_outpoint = TransactionOutpoint { transaction_id: content_hash, index: 0 };
        assert_eq!(matching_engine::utxo::get(&v, &new_outpoint).unwrap().unwrap().amount_nanos, 900);
    }

    #[test]
    fn utxo_model_rejects_insufficient_input() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        let (_, payee) = keypair();
        let outpoint = TransactionOutpoint { transaction_id: core_hashes::Hash::zeroed(), index: 0 };
        matching_engine::utxo::create(&mut v, &outpoint, pk, 10).unwrap();

        let tx = signed(
            Transaction {
                inputs: vec![TransactionInput { previous_outpoint: outpoint }],
                outputs: vec![TransactionOutput { public_key: payee, amount_nanos: 900 }],
                public_key: pk,
                metadata: TransactionMetadata::BasicTransfer,
                extra_data: ExtraData::new(),
                fee_nanos: 100,
                signature: None,
            },
            &sk,
        );
        let content_hash = tx.content_hash();
        assert_eq!(run(&mut v, &tx, 1, content_hash).unwrap_err(), CoreError::OverspendingDESO);
    }

    #[test]
    fn utxo_model_unwinds_already_spent_inputs_on_shortfall() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        let (_, payee) = keypair();
        let first = TransactionOutpoint { transaction_id: core_hashes::Hash::zeroed(), index: 0 };
        let second = TransactionOutpoint { transaction_id: core_hashes::Hash::zeroed(), index: 1 };
        matching_engine::utxo::create(&mut v, &first, pk, 10).unwrap();
        matching_engine::utxo::create(&mut v, &second, pk, 10).unwrap();
        let pre_checksum = v.checksum().unwrap();

        let tx = signed(
            Transaction {
                inputs: vec![TransactionInput { previous_outpoint: first }, TransactionInput { previous_outpoint: second }],
                outputs: vec![TransactionOutput { public_key: payee, amount_nanos: 900 }],
                public_key: pk,
                metadata: TransactionMetadata::BasicTransfer,
                extra_data: ExtraData::new(),
                fee_nanos: 100,
                signature: None,
            },
            &sk,
        );
        let content_hash = tx.content_hash();
        // Both inputs are spent by the time the loop discovers total_in (20)
        // still falls short of required (1000); both must come back.
        assert_eq!(run(&mut v, &tx, 1, content_hash).unwrap_err(), CoreError::OverspendingDESO);
        assert_eq!(v.checksum().unwrap(), pre_checksum, "a failed transfer must leave no staged trace");
        assert!(matching_engine::utxo::get(&v, &first).unwrap().is_some());
        assert!(matching_engine::utxo::get(&v, &second).unwrap().is_some());
    }

    /// `apply_update` bootstraps `balance_model_fork_height` to 0, which
    /// would otherwise flip every test height straight to the balance
    /// model. Tests that only care about the fee check and still want the
    /// UTXO path pin it back out to effectively "never."
    fn keep_utxo_model(v: &mut StagedView, at_height: u64) {
        let entry = crate::params::effective_global_params(v, at_height).unwrap().unwrap();
        let mut forked = entry.clone();
        forked.balance_model_fork_height = u64::MAX;
        v.put(store::db::CF_GLOBAL_PARAMS, &core_types::keys::global_params_key(at_height), borsh::BorshSerialize::try_to_vec(&forked).unwrap());
    }

    fn dao_coin_limit_order_metadata() -> TransactionMetadata {
        TransactionMetadata::DaoCoinLimitOrder {
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: Pkid::ZERO,
            scaled_exchange_rate: fixed_point::ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity_to_buy: Uint256::from(1u64),
            operation_type: core_types::entries::OperationType::Bid,
            fill_type: core_types::entries::FillType::GoodTillCancelled,
            cancel_order_id: None,
            bidder_inputs: vec![],
        }
    }

    /// Builds and signs a zero-input, zero-output `DaoCoinLimitOrder` with
    /// `fee_nanos` set so that, at `params.min_network_fee_nanos_per_kb`,
    /// it sits `delta_nanos` away from the exact minimum fee (negative:
    /// under; zero: exact; positive: over). The transaction is re-signed
    /// after `fee_nanos` is finalized, since the signature covers it.
    fn dao_coin_limit_order_with_fee_delta(sk: &secp256k1::SecretKey, pk: PublicKey, min_fee_nanos_per_kb: u64, delta_nanos: i64) -> Transaction {
        let unsigned = Transaction {
            inputs: vec![],
            outputs: vec![],
            public_key: pk,
            metadata: dao_coin_limit_order_metadata(),
            extra_data: ExtraData::new(),
            fee_nanos: 0,
            signature: None,
        };
        // A signature's serialized length doesn't depend on the message it
        // signs, so a placeholder-fee signed transaction already has the
        // exact byte size `check_fee` will measure on the real one.
        let placeholder = signed(unsigned.clone(), sk);
        let size_bytes = borsh::BorshSerialize::try_to_vec(&placeholder).unwrap().len() as u64;
        let min_fee = min_fee_nanos_per_kb.saturating_mul(size_bytes) / 1000;
        let fee_nanos = (min_fee as i64 + delta_nanos).max(0) as u64;
        signed(Transaction { fee_nanos, ..unsigned }, sk)
    }

    #[test]
    fn dao_coin_limit_order_underpaying_fee_is_rejected() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        crate::params::apply_update(&mut v, &pk, 0, None, Some(1000), None, None, None).unwrap();
        keep_utxo_model(&mut v, 0);

        let tx = dao_coin_limit_order_with_fee_delta(&sk, pk, 1000, -1);
        let content_hash = tx.content_hash();
        assert_eq!(run(&mut v, &tx, 0, content_hash).unwrap_err(), CoreError::FeeNanosBelowMinTxFee);
    }

    #[test]
    fn dao_coin_limit_order_overpaying_fee_is_rejected() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        crate::params::apply_update(&mut v, &pk, 0, None, Some(1000), None, None, None).unwrap();
        keep_utxo_model(&mut v, 0);

        let tx = dao_coin_limit_order_with_fee_delta(&sk, pk, 1000, 1);
        let content_hash = tx.content_hash();
        assert_eq!(run(&mut v, &tx, 0, content_hash).unwrap_err(), CoreError::OverspendingDESO);
    }

    #[test]
    fn dao_coin_limit_order_paying_exact_fee_passes_fee_check() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        crate::params::apply_update(&mut v, &pk, 0, None, Some(1000), None, None, None).unwrap();
        keep_utxo_model(&mut v, 0);

        let tx = dao_coin_limit_order_with_fee_delta(&sk, pk, 1000, 0);
        let content_hash = tx.content_hash();
        // Paying exactly the minimum passes the fee check; UTXO settlement
        // then fails on its own (no inputs to cover the fee), confirming
        // the rejection came from input coverage, not from `check_fee`.
        assert_eq!(run(&mut v, &tx, 0, content_hash).unwrap_err(), CoreError::OverspendingDESO);
    }

    #[test]
    fn basic_transfer_overpaying_fee_is_accepted() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        crate::params::apply_update(&mut v, &pk, 0, None, Some(1000), None, None, None).unwrap();
        keep_utxo_model(&mut v, 0);
        let outpoint = TransactionOutpoint { transaction_id: core_hashes::Hash::zeroed(), index: 0 };
        matching_engine::utxo::create(&mut v, &outpoint, pk, 10_000).unwrap();

        let unsigned = Transaction {
            inputs: vec![TransactionInput { previous_outpoint: outpoint }],
            outputs: vec![],
            public_key: pk,
            metadata: TransactionMetadata::BasicTransfer,
            extra_data: ExtraData::new(),
            fee_nanos: 0,
            signature: None,
        };
        let placeholder = signed(unsigned.clone(), &sk);
        let size_bytes = borsh::BorshSerialize::try_to_vec(&placeholder).unwrap().len() as u64;
        let min_fee = 1000u64.saturating_mul(size_bytes) / 1000;
        // A basic transfer has no exact-fee ceiling: overpaying well beyond
        // the minimum is accepted, unlike a `DaoCoinLimitOrder`.
        let tx = signed(Transaction { fee_nanos: min_fee + 5_000, ..unsigned }, &sk);
        let content_hash = tx.content_hash();
        run(&mut v, &tx, 0, content_hash).unwrap();
    }

    #[test]
    fn balance_model_debits_transactor_and_credits_payee() {
        let (_tmp, mut v) = view();
        let (sk, pk) = keypair();
        let (_, payee) = keypair();
        let transactor_pkid = Pkid::from(pk);
        matching_engine::ledger::credit(&mut v, &transactor_pkid, &Pkid::ZERO, false, &Uint256::from(1000u64)).unwrap();
        crate::params::apply_update(&mut v, &pk, 0, None, None, None, None, None).unwrap();
        // Force the balance model on at height 0 by setting the fork height directly.
        let entry = crate::params::effective_global_params(&v, 0).unwrap().unwrap();
        let mut forked = entry.clone();
        forked.balance_model_fork_height = 0;
        v.put(store::db::CF_GLOBAL_PARAMS, &core_types::keys::global_params_key(0), borsh::BorshSerialize::try_to_vec(&forked).unwrap());

        let tx = signed(
            Transaction {
                inputs: vec![],
                outputs: vec![TransactionOutput { public_key: payee, amount_nanos: 300 }],
                public_key: pk,
                metadata: TransactionMetadata::BasicTransfer,
                extra_data: ExtraData::new(),
                fee_nanos: 10,
                signature: None,
            },
            &sk,
        );
        let content_hash = tx.content_hash();
        run(&mut v, &tx, 0, content_hash).unwrap();
        assert_eq!(matching_engine::ledger::get_balance(&v, &transactor_pkid, &Pkid::ZERO, false).unwrap(), Uint256::from(690u64));
        assert_eq!(matching_engine::ledger::get_balance(&v, &Pkid::from(payee), &Pkid::ZERO, false).unwrap(), Uint256::from(300u64));
    }

    #[test]
    fn block_reward_skips_signature_and_inputs() {
        let (_tmp, mut v) = view();
        let (_, payee) = keypair();
        let tx = Transaction {
            inputs: vec![],
            outputs: vec![TransactionOutput { public_key: payee, amount_nanos: 50 }],
            public_key: payee,
            metadata: TransactionMetadata::BlockReward,
            extra_data: ExtraData::new(),
            fee_nanos: 0,
            signature: None,
        };
        let content_hash = tx.content_hash();
        run_block_reward(&mut v, &tx, 1, content_hash, 100).unwrap();
        let outpoint = TransactionOutpoint { transaction_id: content_hash, index: 0 };
        assert_eq!(matching_engine::utxo::get(&v, &outpoint).unwrap().unwrap().amount_nanos, 50);
    }

    #[test]
    fn block_reward_exceeding_cap_is_rejected() {
        let (_tmp, mut v) = view();
        let (_, payee) = keypair();
        let tx = Transaction {
            inputs: vec![],
            outputs: vec![TransactionOutput { public_key: payee, amount_nanos: 500 }],
            public_key: payee,
            metadata: TransactionMetadata::BlockReward,
            extra_data: ExtraData::new(),
            fee_nanos: 0,
            signature: None,
        };
        let content_hash = tx.content_hash();
        assert_eq!(run_block_reward(&mut v, &tx, 1, content_hash, 100).unwrap_err(), CoreError::BlockRewardExceedsMaxAllowed);
    }
}
