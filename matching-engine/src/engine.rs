//! Price-time priority matching: the core `place_order` entry point plus
//! `cancel_order`. Every mutation along the way is mirrored into an
//! [`OrderBookReverseOp`] so disconnect can restore the pre-image exactly.

use crate::{book, ledger, utxo};
use core_types::entries::{FillType, OperationType, OrderEntry, OrderId, UtxoEntry};
use core_types::wire::{BidderInput, TransactionOutpoint};
use core_types::{CoreError, CoreResult, Pkid};
use fixed_point::{FixedPointError, ScaledExchangeRate, Uint256};
use state::StagedView;
use tracing::debug;

fn from_fp(e: FixedPointError) -> CoreError {
    match e {
        FixedPointError::TotalCostOverflowsUint256 | FixedPointError::Overflow => CoreError::TotalCostOverflowsUint256,
        FixedPointError::TotalCostIsLessThanOneNano => CoreError::TotalCostIsLessThanOneNano,
        FixedPointError::InvalidExchangeRate(s) => CoreError::InvalidExchangeRate(s),
        FixedPointError::DivideByZero => CoreError::InvalidExchangeRate("division by zero".to_string()),
    }
}

fn is_dao(pkid: &Pkid) -> bool {
    !pkid.is_zero()
}

/// One primitive state change recorded by `place_order`/`cancel_order`, in
/// application order. `disconnect` walks a slice of these in reverse.
#[derive(Debug, Clone)]
pub enum OrderBookReverseOp {
    BalanceChanged { holder: Pkid, creator: Pkid, is_dao_coin: bool, previous_balance: Uint256 },
    /// A brand-new order was inserted (either the taker's leftover resting
    /// under GTC, or nothing prior existed at this id); disconnect deletes it.
    OrderCreated { order_id: OrderId },
    /// A resting maker order's remaining quantity was decremented without
    /// closing it; disconnect restores the previous quantity.
    OrderQuantityChanged { order_id: OrderId, previous_quantity: Uint256 },
    /// An order (maker fully filled, auto-cancelled, or explicitly
    /// cancelled) was removed entirely; disconnect reinserts it whole.
    OrderClosed { previous: OrderEntry },
    UtxoSpent { outpoint: TransactionOutpoint, entry: UtxoEntry },
}

pub struct PlaceOrderRequest {
    pub order_id: OrderId,
    pub transactor_pkid: Pkid,
    pub buying_coin_pkid: Pkid,
    pub selling_coin_pkid: Pkid,
    pub scaled_exchange_rate: ScaledExchangeRate,
    pub quantity_to_buy: Uint256,
    pub operation_type: OperationType,
    pub fill_type: FillType,
    pub block_height: u64,
    pub bidder_inputs: Vec<BidderInput>,
}

pub struct MatchOutcome {
    /// `Some` iff a resting order now sits in the book under `request.order_id`.
    pub resting_order: Option<OrderEntry>,
    pub reverse_ops: Vec<OrderBookReverseOp>,
}

/// Applies `request` against the book: matches against existing candidates
/// in price-time priority, then applies the fill-type policy to any
/// leftover.
///
/// Every mutation the matching loop, bidder-input settlement, and fill
/// policy stage is tracked in `reverse_ops` as it happens; if any of them
/// fails partway (a `FillOrKill` with insufficient supply, a self-match, a
/// bidder-input shortfall, an overflow), everything staged so far this call
/// is unwound before the error is returned, so a failed `place_order` is
/// never partially observable — per §4.F ("no staged mutation is
/// observable" on failure) and the FOK "zero balance changes" requirement.
pub fn place_order(view: &mut StagedView, request: PlaceOrderRequest) -> CoreResult<MatchOutcome> {
    if request.buying_coin_pkid == request.selling_coin_pkid {
        return Err(CoreError::CannotBuyAndSellSameCoin);
    }
    if request.quantity_to_buy.is_zero() {
        return Err(CoreError::InvalidQuantity);
    }

    let mut reverse_ops = Vec::new();
    match place_order_staged(view, &request, &mut reverse_ops) {
        Ok(resting_order) => Ok(MatchOutcome { resting_order, reverse_ops }),
        Err(err) => {
            disconnect(view, &reverse_ops).expect("unwinding our own freshly-staged reverse-ops cannot fail");
            Err(err)
        }
    }
}

/// The matching loop, bidder-input settlement, and fill policy, all staging
/// into the caller's `reverse_ops` so a failure anywhere can be unwound in
/// one place (see `place_order`).
fn place_order_staged(view: &mut StagedView, request: &PlaceOrderRequest, reverse_ops: &mut Vec<OrderBookReverseOp>) -> CoreResult<Option<OrderEntry>> {
    let mut remaining = request.quantity_to_buy;
    // Total DESO a maker owes the taker across all fills this order touches,
    // covered by consuming `request.bidder_inputs` after the loop. At most
    // one maker's leftover change is refunded — see DESIGN.md for why
    // that's an acceptable simplification.
    let mut deso_owed_by_makers = Uint256::ZERO;
    let mut last_deso_selling_maker: Option<Pkid> = None;

    let candidates = book::match_candidates(view, &request.selling_coin_pkid, &request.buying_coin_pkid)?;

    for maker in candidates {
        if remaining.is_zero() {
            break;
        }
        if !maker.scaled_exchange_rate.crosses(&request.scaled_exchange_rate) {
            // Candidates are sorted best-price-first (descending maker
            // rate); crossing is monotonic in the maker's rate, so once one
            // candidate fails to cross, none of the rest can either.
            break;
        }
        if maker.transactor_pkid == request.transactor_pkid {
            return Err(CoreError::MatchingOwnOrder);
        }

        let maker_max_x = maker.scaled_exchange_rate.total_cost(&maker.quantity).map_err(from_fp)?;
        let (y_transfer, x_transfer, maker_closes) = if maker_max_x.lt(&remaining) || maker_max_x == remaining {
            (maker.quantity, maker_max_x, true)
        } else {
            let y = maker.scaled_exchange_rate.max_quantity_for_budget(&remaining).map_err(from_fp)?;
            let x = maker.scaled_exchange_rate.total_cost(&y).map_err(from_fp)?;
            (y, x, false)
        };

        if y_transfer.is_zero() {
            // remaining is too small to buy even one nano at this price; no
            // further candidate (worse-priced) can do better.
            break;
        }

        let maker_sells_dao = is_dao(&maker.selling_coin_pkid);
        if maker_sells_dao {
            let maker_sell_balance = ledger::get_balance(view, &maker.transactor_pkid, &maker.selling_coin_pkid, true)?;
            if maker_sell_balance.lt(&x_transfer) {
                debug!(order_id = ?maker.order_id, "auto-cancelling unfunded maker order");
                book::remove(view, &maker);
                reverse_ops.push(OrderBookReverseOp::OrderClosed { previous: maker });
                continue;
            }
        }

        // Taker pays y_transfer of the selling coin.
        let taker_sell_insufficient_err =
            if request.selling_coin_pkid.is_zero() { CoreError::InsufficientDESOToOpenOrder } else { CoreError::InsufficientDAOCoinsToOpenOrder };
        let prev = ledger::debit(
            view,
            &request.transactor_pkid,
            &request.selling_coin_pkid,
            is_dao(&request.selling_coin_pkid),
            &y_transfer,
            taker_sell_insufficient_err,
        )?;
        reverse_ops.push(OrderBookReverseOp::BalanceChanged {
            holder: request.transactor_pkid,
            creator: request.selling_coin_pkid,
            is_dao_coin: is_dao(&request.selling_coin_pkid),
            previous_balance: prev,
        });

        // Maker receives y_transfer of their own buying coin (== taker's selling coin).
        let prev = ledger::credit(view, &maker.transactor_pkid, &request.selling_coin_pkid, is_dao(&request.selling_coin_pkid), &y_transfer)?;
        reverse_ops.push(OrderBookReverseOp::BalanceChanged {
            holder: maker.transactor_pkid,
            creator: request.selling_coin_pkid,
            is_dao_coin: is_dao(&request.selling_coin_pkid),
            previous_balance: prev,
        });

        if maker_sells_dao {
            let prev = ledger::debit(
                view,
                &maker.transactor_pkid,
                &maker.selling_coin_pkid,
                true,
                &x_transfer,
                CoreError::InsufficientDAOCoinsToOpenOrder,
            )?;
            reverse_ops.push(OrderBookReverseOp::BalanceChanged {
                holder: maker.transactor_pkid,
                creator: maker.selling_coin_pkid,
                is_dao_coin: true,
                previous_balance: prev,
            });
            let prev = ledger::credit(view, &request.transactor_pkid, &request.buying_coin_pkid, true, &x_transfer)?;
            reverse_ops.push(OrderBookReverseOp::BalanceChanged {
                holder: request.transactor_pkid,
                creator: request.buying_coin_pkid,
                is_dao_coin: true,
                previous_balance: prev,
            });
        } else {
            // Maker sells DESO: covered by bidder inputs rather than a ledger
            // debit, since the maker isn't a co-signer of this transaction.
            deso_owed_by_makers = deso_owed_by_makers.checked_add(&x_transfer).map_err(|_| CoreError::TotalCostOverflowsUint256)?;
            last_deso_selling_maker = Some(maker.transactor_pkid);
            let prev = ledger::credit(view, &request.transactor_pkid, &request.buying_coin_pkid, false, &x_transfer)?;
            reverse_ops.push(OrderBookReverseOp::BalanceChanged {
                holder: request.transactor_pkid,
                creator: request.buying_coin_pkid,
                is_dao_coin: false,
                previous_balance: prev,
            });
        }

        remaining = remaining.checked_sub(&x_transfer).map_err(|_| CoreError::TotalCostOverflowsUint256)?;

        if maker_closes {
            book::remove(view, &maker);
            reverse_ops.push(OrderBookReverseOp::OrderClosed { previous: maker });
        } else {
            let new_quantity = maker.quantity.checked_sub(&y_transfer).map_err(|_| CoreError::TotalCostOverflowsUint256)?;
            book::update_quantity(view, &maker, new_quantity)?;
            reverse_ops.push(OrderBookReverseOp::OrderQuantityChanged { order_id: maker.order_id, previous_quantity: maker.quantity });
        }
    }

    if deso_owed_by_makers.is_zero() {
        if !request.bidder_inputs.is_empty() {
            return Err(CoreError::OverspendingDESO);
        }
    } else {
        consume_bidder_inputs(view, &request.bidder_inputs, &deso_owed_by_makers, last_deso_selling_maker.expect("set alongside deso_owed_by_makers"), reverse_ops)?;
    }

    apply_fill_policy(view, request, remaining, reverse_ops)
}

/// Spends `bidder_inputs` until `owed` is covered, erroring if they can't
/// cover it; any excess is refunded to `refund_target` as a DESO credit.
fn consume_bidder_inputs(
    view: &mut StagedView,
    bidder_inputs: &[BidderInput],
    owed: &Uint256,
    refund_target: Pkid,
    reverse_ops: &mut Vec<OrderBookReverseOp>,
) -> CoreResult<()> {
    if bidder_inputs.is_empty() {
        return Err(CoreError::BidderInputNoLongerExists);
    }
    let mut supplied = Uint256::ZERO;
    for bidder_input in bidder_inputs {
        let entry = utxo::spend(view, &bidder_input.input, &bidder_input.owner, CoreError::BidderInputNoLongerExists)
            .map_err(|e| if e == CoreError::InputWithPublicKeyDifferentFromTxnPublicKey { CoreError::BidderInputNoLongerExists } else { e })?;
        reverse_ops.push(OrderBookReverseOp::UtxoSpent { outpoint: bidder_input.input, entry });
        supplied = supplied.checked_add(&Uint256::from(entry.amount_nanos)).map_err(|_| CoreError::TotalCostOverflowsUint256)?;
    }
    if supplied.lt(owed) {
        return Err(CoreError::BidderInputNoLongerExists);
    }
    let excess = supplied.checked_sub(owed).map_err(|_| CoreError::TotalCostOverflowsUint256)?;
    if !excess.is_zero() {
        let prev = ledger::credit(view, &refund_target, &Pkid::ZERO, false, &excess)?;
        reverse_ops.push(OrderBookReverseOp::BalanceChanged { holder: refund_target, creator: Pkid::ZERO, is_dao_coin: false, previous_balance: prev });
    }
    Ok(())
}

fn apply_fill_policy(
    view: &mut StagedView,
    request: &PlaceOrderRequest,
    remaining: Uint256,
    reverse_ops: &mut Vec<OrderBookReverseOp>,
) -> CoreResult<Option<OrderEntry>> {
    if remaining.is_zero() {
        return Ok(None);
    }
    match request.fill_type {
        FillType::FillOrKill => Err(CoreError::FillOrKillOrderUnfulfilled),
        FillType::ImmediateOrCancel => Ok(None),
        FillType::GoodTillCancelled if request.scaled_exchange_rate.is_market_order() => {
            // A market order carries no price to rest at; unfilled leftover
            // is discarded exactly as under ImmediateOrCancel.
            Ok(None)
        }
        FillType::GoodTillCancelled => {
            let order = OrderEntry {
                order_id: request.order_id,
                transactor_pkid: request.transactor_pkid,
                buying_coin_pkid: request.buying_coin_pkid,
                selling_coin_pkid: request.selling_coin_pkid,
                scaled_exchange_rate: request.scaled_exchange_rate,
                quantity: remaining,
                operation_type: request.operation_type,
                fill_type: request.fill_type,
                block_height: request.block_height,
                is_deleted: false,
            };
            book::insert(view, &order)?;
            reverse_ops.push(OrderBookReverseOp::OrderCreated { order_id: order.order_id });
            Ok(Some(order))
        }
    }
}

/// Cancels a resting order placed by `transactor_pkid`. Fails with
/// `ToCancelNotFound`/`ToCancelNotYours`.
pub fn cancel_order(view: &mut StagedView, transactor_pkid: &Pkid, order_id: &OrderId) -> CoreResult<OrderBookReverseOp> {
    let order = book::get(view, order_id)?.ok_or(CoreError::ToCancelNotFound)?;
    if order.transactor_pkid != *transactor_pkid {
        return Err(CoreError::ToCancelNotYours);
    }
    book::remove(view, &order);
    Ok(OrderBookReverseOp::OrderClosed { previous: order })
}

/// Replays `ops` in reverse, restoring every pre-image exactly. The sole
/// caller is `txn::dispatch::disconnect`.
pub fn disconnect(view: &mut StagedView, ops: &[OrderBookReverseOp]) -> CoreResult<()> {
    for op in ops.iter().rev() {
        match op {
            OrderBookReverseOp::BalanceChanged { holder, creator, is_dao_coin, previous_balance } => {
                ledger::restore_balance(view, holder, creator, *is_dao_coin, *previous_balance)?;
            }
            OrderBookReverseOp::OrderCreated { order_id } => {
                if let Some(order) = book::get(view, order_id)? {
                    book::remove(view, &order);
                }
            }
            OrderBookReverseOp::OrderQuantityChanged { order_id, previous_quantity } => {
                if let Some(current) = book::get(view, order_id)? {
                    book::update_quantity(view, &current, *previous_quantity)?;
                }
            }
            OrderBookReverseOp::OrderClosed { previous } => {
                book::insert(view, previous)?;
            }
            OrderBookReverseOp::UtxoSpent { outpoint, entry } => {
                utxo::restore(view, outpoint, entry)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_hashes::Hash;
    use core_types::PublicKey;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn view() -> (TempDir, StagedView) {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(store::Database::open(tmp.path()).unwrap());
        (tmp, StagedView::new(db))
    }

    fn pkid(b: u8) -> Pkid {
        Pkid::from([b; 33])
    }

    fn order_id(b: u8) -> OrderId {
        Hash::from([b; 32])
    }

    /// Scenario 1: exact BID<->ASK match at reciprocal rates (maker 1 dao0
    /// per DESO, taker 1 DESO per dao0 — indifferent prices), both orders
    /// fully closing.
    #[test]
    fn exact_bid_ask_match_closes_both_orders() {
        let (_tmp, mut v) = view();
        let m0 = pkid(1);
        let m1 = pkid(2);
        let dao0 = pkid(10);

        ledger::credit(&mut v, &m0, &dao0, true, &Uint256::from(10u64)).unwrap();
        ledger::credit(&mut v, &m1, &Pkid::ZERO, false, &Uint256::from(10u64)).unwrap();

        // m0: ASK sell dao0 buy DESO, rate=1 (dao0 per DESO), qty=10 DESO target.
        let ask = OrderEntry {
            order_id: order_id(1),
            transactor_pkid: m0,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: dao0,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity: Uint256::from(10u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::GoodTillCancelled,
            block_height: 1,
            is_deleted: false,
        };
        book::insert(&mut v, &ask).unwrap();

        // m1: BID buy dao0 sell DESO, rate=1 (DESO per dao0), qty=10 dao0 target.
        let request = PlaceOrderRequest {
            order_id: order_id(2),
            transactor_pkid: m1,
            buying_coin_pkid: dao0,
            selling_coin_pkid: Pkid::ZERO,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity_to_buy: Uint256::from(10u64),
            operation_type: OperationType::Bid,
            fill_type: FillType::GoodTillCancelled,
            block_height: 2,
            bidder_inputs: vec![],
        };

        let outcome = place_order(&mut v, request).unwrap();
        assert!(outcome.resting_order.is_none());
        assert_eq!(ledger::get_balance(&v, &m0, &dao0, true).unwrap(), Uint256::ZERO);
        assert_eq!(ledger::get_balance(&v, &m0, &Pkid::ZERO, false).unwrap(), Uint256::from(10u64));
        assert_eq!(ledger::get_balance(&v, &m1, &Pkid::ZERO, false).unwrap(), Uint256::ZERO);
        assert_eq!(ledger::get_balance(&v, &m1, &dao0, true).unwrap(), Uint256::from(10u64));
        assert!(book::get(&v, &ask.order_id).unwrap().is_none());
    }

    #[test]
    fn matching_own_order_is_rejected() {
        let (_tmp, mut v) = view();
        let m0 = pkid(1);
        let dao0 = pkid(10);
        ledger::credit(&mut v, &m0, &Pkid::ZERO, false, &Uint256::from(100u64)).unwrap();
        ledger::credit(&mut v, &m0, &dao0, true, &Uint256::from(100u64)).unwrap();

        let ask = OrderEntry {
            order_id: order_id(1),
            transactor_pkid: m0,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: dao0,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("10").unwrap(),
            quantity: Uint256::from(100u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::GoodTillCancelled,
            block_height: 1,
            is_deleted: false,
        };
        book::insert(&mut v, &ask).unwrap();

        let request = PlaceOrderRequest {
            order_id: order_id(2),
            transactor_pkid: m0,
            buying_coin_pkid: dao0,
            selling_coin_pkid: Pkid::ZERO,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("10").unwrap(),
            quantity_to_buy: Uint256::from(10u64),
            operation_type: OperationType::Bid,
            fill_type: FillType::GoodTillCancelled,
            block_height: 2,
            bidder_inputs: vec![],
        };
        assert_eq!(place_order(&mut v, request), Err(CoreError::MatchingOwnOrder));
    }

    /// Scenario 2: price-time priority. Three standing BIDs at rates
    /// {11, 12, 12} (the two 12s at different heights, oldest first); a
    /// market ASK fills the two 12s fully, then half of the 11, leaving 10
    /// of the 11-order's original 20 dao0 resting.
    #[test]
    fn price_time_priority_drains_best_price_first_then_oldest() {
        let (_tmp, mut v) = view();
        let bid12_first = pkid(1);
        let bid12_second = pkid(2);
        let bid11 = pkid(3);
        let taker = pkid(4);
        let dao0 = pkid(10);

        // Taker sells dao0, so it needs enough dao0 to cover every maker fill
        // (5 + 5 + 10 = 20).
        ledger::credit(&mut v, &taker, &dao0, true, &Uint256::from(20u64)).unwrap();

        let maker_pk = |b: u8| PublicKey([b; 33]);
        let bid = |transactor: Pkid, order_id_byte: u8, rate: &str, qty: u64, height: u64| OrderEntry {
            order_id: order_id(order_id_byte),
            transactor_pkid: transactor,
            buying_coin_pkid: dao0,
            selling_coin_pkid: Pkid::ZERO,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal(rate).unwrap(),
            quantity: Uint256::from(qty),
            operation_type: OperationType::Bid,
            fill_type: FillType::GoodTillCancelled,
            block_height: height,
            is_deleted: false,
        };

        let bid_12a = bid(bid12_first, 1, "12", 5, 1);
        let bid_12b = bid(bid12_second, 2, "12", 5, 2);
        let bid_11 = bid(bid11, 3, "11", 20, 3);
        book::insert(&mut v, &bid_12a).unwrap();
        book::insert(&mut v, &bid_12b).unwrap();
        book::insert(&mut v, &bid_11).unwrap();

        // Bidder inputs cover every DESO-selling maker's total obligation:
        // 12*5 + 12*5 + 11*10 = 230 nanos, all supplied from one UTXO owned
        // by the last-touched (rate-11) maker.
        let outpoint = TransactionOutpoint { transaction_id: Hash::from([42u8; 32]), index: 0 };
        utxo::create(&mut v, &outpoint, maker_pk(3), 230).unwrap();

        let request = PlaceOrderRequest {
            order_id: order_id(4),
            transactor_pkid: taker,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: dao0,
            scaled_exchange_rate: ScaledExchangeRate::ZERO,
            quantity_to_buy: Uint256::from(240u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::ImmediateOrCancel,
            block_height: 4,
            bidder_inputs: vec![BidderInput { input: outpoint, owner: maker_pk(3) }],
        };
        let outcome = place_order(&mut v, request).unwrap();
        assert!(outcome.resting_order.is_none());

        assert!(book::get(&v, &bid_12a.order_id).unwrap().is_none(), "older 12-rate order should be fully filled");
        assert!(book::get(&v, &bid_12b.order_id).unwrap().is_none(), "younger 12-rate order should be fully filled");
        let remaining_11 = book::get(&v, &bid_11.order_id).unwrap().expect("11-rate order still resting");
        assert_eq!(remaining_11.quantity, Uint256::from(10u64));

        assert_eq!(ledger::get_balance(&v, &taker, &dao0, true).unwrap(), Uint256::ZERO);
        assert_eq!(ledger::get_balance(&v, &taker, &Pkid::ZERO, false).unwrap(), Uint256::from(230u64));
    }

    /// Scenario 4/5: FOK fails outright when supply is insufficient; IOC
    /// partially fills and discards the remainder. The maker (ASK, rate=1
    /// dao0/DESO) can only supply 10 dao0; the taker (market BID) wants 20.
    #[test]
    fn fill_or_kill_errors_when_unfulfilled() {
        let (_tmp, mut v) = view();
        let maker = pkid(1);
        let taker = pkid(2);
        let dao0 = pkid(10);
        ledger::credit(&mut v, &maker, &dao0, true, &Uint256::from(10u64)).unwrap();
        ledger::credit(&mut v, &taker, &Pkid::ZERO, false, &Uint256::from(1000u64)).unwrap();

        let ask = OrderEntry {
            order_id: order_id(1),
            transactor_pkid: maker,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: dao0,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity: Uint256::from(10u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::GoodTillCancelled,
            block_height: 1,
            is_deleted: false,
        };
        book::insert(&mut v, &ask).unwrap();

        let request = PlaceOrderRequest {
            order_id: order_id(2),
            transactor_pkid: taker,
            buying_coin_pkid: dao0,
            selling_coin_pkid: Pkid::ZERO,
            scaled_exchange_rate: ScaledExchangeRate::ZERO,
            quantity_to_buy: Uint256::from(20u64),
            operation_type: OperationType::Bid,
            fill_type: FillType::FillOrKill,
            block_height: 2,
            bidder_inputs: vec![],
        };
        let pre_checksum = v.checksum().unwrap();
        assert_eq!(place_order(&mut v, request), Err(CoreError::FillOrKillOrderUnfulfilled));

        // Scenario 4 requires zero balance changes on a FOK failure: the
        // partial fill the matching loop staged before discovering it can't
        // reach zero remainder must be fully unwound, not just the error
        // surfaced.
        assert_eq!(v.checksum().unwrap(), pre_checksum, "a failed FOK order must leave no staged trace");
        assert_eq!(ledger::get_balance(&v, &maker, &dao0, true).unwrap(), Uint256::from(10u64));
        assert_eq!(ledger::get_balance(&v, &taker, &Pkid::ZERO, false).unwrap(), Uint256::from(1000u64));
        assert_eq!(ledger::get_balance(&v, &taker, &dao0, true).unwrap(), Uint256::ZERO);
        let still_resting = book::get(&v, &ask.order_id).unwrap().expect("maker's order must still be resting, untouched");
        assert_eq!(still_resting.quantity, Uint256::from(10u64));
    }

    #[test]
    fn immediate_or_cancel_discards_remainder() {
        let (_tmp, mut v) = view();
        let maker = pkid(1);
        let taker = pkid(2);
        let dao0 = pkid(10);
        ledger::credit(&mut v, &maker, &dao0, true, &Uint256::from(10u64)).unwrap();
        ledger::credit(&mut v, &taker, &Pkid::ZERO, false, &Uint256::from(1000u64)).unwrap();

        let ask = OrderEntry {
            order_id: order_id(1),
            transactor_pkid: maker,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: dao0,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity: Uint256::from(10u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::GoodTillCancelled,
            block_height: 1,
            is_deleted: false,
        };
        book::insert(&mut v, &ask).unwrap();

        let request = PlaceOrderRequest {
            order_id: order_id(2),
            transactor_pkid: taker,
            buying_coin_pkid: dao0,
            selling_coin_pkid: Pkid::ZERO,
            scaled_exchange_rate: ScaledExchangeRate::ZERO,
            quantity_to_buy: Uint256::from(20u64),
            operation_type: OperationType::Bid,
            fill_type: FillType::ImmediateOrCancel,
            block_height: 2,
            bidder_inputs: vec![],
        };
        let outcome = place_order(&mut v, request).unwrap();
        assert!(outcome.resting_order.is_none());
        assert_eq!(ledger::get_balance(&v, &taker, &dao0, true).unwrap(), Uint256::from(10u64));
        assert!(book::get(&v, &ask.order_id).unwrap().is_none());
    }

    /// Scenario 3: an unfunded maker is auto-cancelled and skipped in favor
    /// of the next, better-priced candidate. `unfunded_ask` sorts first
    /// (higher own-rate = more generous to a dao0-buying taker) but can't
    /// cover its own quoted sale; `funded_ask` then fills the taker's
    /// market order completely.
    #[test]
    fn auto_cancels_unfunded_maker_and_continues() {
        let (_tmp, mut v) = view();
        let unfunded_maker = pkid(1);
        let funded_maker = pkid(2);
        let taker = pkid(3);
        let dao0 = pkid(10);

        ledger::credit(&mut v, &unfunded_maker, &dao0, true, &Uint256::from(1u64)).unwrap();
        ledger::credit(&mut v, &funded_maker, &dao0, true, &Uint256::from(100u64)).unwrap();
        ledger::credit(&mut v, &taker, &Pkid::ZERO, false, &Uint256::from(1000u64)).unwrap();

        // rate=2 dao0/DESO, qty=5 DESO target -> needs 10 dao0 to fully pay, has only 1.
        let unfunded_ask = OrderEntry {
            order_id: order_id(1),
            transactor_pkid: unfunded_maker,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: dao0,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("2").unwrap(),
            quantity: Uint256::from(5u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::GoodTillCancelled,
            block_height: 1,
            is_deleted: false,
        };
        // rate=1 dao0/DESO, qty=100 DESO target -> fully funded.
        let funded_ask = OrderEntry {
            order_id: order_id(2),
            transactor_pkid: funded_maker,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: dao0,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity: Uint256::from(100u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::GoodTillCancelled,
            block_height: 1,
            is_deleted: false,
        };
        book::insert(&mut v, &unfunded_ask).unwrap();
        book::insert(&mut v, &funded_ask).unwrap();

        let request = PlaceOrderRequest {
            order_id: order_id(3),
            transactor_pkid: taker,
            buying_coin_pkid: dao0,
            selling_coin_pkid: Pkid::ZERO,
            scaled_exchange_rate: ScaledExchangeRate::ZERO,
            quantity_to_buy: Uint256::from(50u64),
            operation_type: OperationType::Bid,
            fill_type: FillType::ImmediateOrCancel,
            block_height: 2,
            bidder_inputs: vec![],
        };
        let outcome = place_order(&mut v, request).unwrap();
        assert!(outcome.resting_order.is_none());
        assert!(book::get(&v, &unfunded_ask.order_id).unwrap().is_none(), "unfunded maker should be auto-cancelled");
        assert_eq!(ledger::get_balance(&v, &taker, &dao0, true).unwrap(), Uint256::from(50u64));
    }

    #[test]
    fn cancel_rejects_wrong_owner_and_missing_order() {
        let (_tmp, mut v) = view();
        let owner = pkid(1);
        let other = pkid(2);
        let order = OrderEntry {
            order_id: order_id(1),
            transactor_pkid: owner,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: pkid(10),
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity: Uint256::from(10u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::GoodTillCancelled,
            block_height: 1,
            is_deleted: false,
        };
        book::insert(&mut v, &order).unwrap();

        assert_eq!(cancel_order(&mut v, &other, &order.order_id).unwrap_err(), CoreError::ToCancelNotYours);
        assert_eq!(cancel_order(&mut v, &owner, &order_id(99)).unwrap_err(), CoreError::ToCancelNotFound);
        assert!(cancel_order(&mut v, &owner, &order.order_id).is_ok());
    }

    #[test]
    fn bidder_input_tampering_fails_closed() {
        let (_tmp, mut v) = view();
        let maker = pkid(1);
        let taker = pkid(2);
        let dao0 = pkid(10);
        ledger::credit(&mut v, &taker, &dao0, true, &Uint256::from(100u64)).unwrap();

        let bid = OrderEntry {
            order_id: order_id(1),
            transactor_pkid: maker,
            buying_coin_pkid: dao0,
            selling_coin_pkid: Pkid::ZERO,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity: Uint256::from(10u64),
            operation_type: OperationType::Bid,
            fill_type: FillType::GoodTillCancelled,
            block_height: 1,
            is_deleted: false,
        };
        book::insert(&mut v, &bid).unwrap();

        let outpoint = TransactionOutpoint { transaction_id: Hash::from([9u8; 32]), index: 0 };
        // Bidder input claims to be owned by the taker instead of the maker.
        utxo::create(&mut v, &outpoint, PublicKey([2u8; 33]), 10).unwrap();

        let request = PlaceOrderRequest {
            order_id: order_id(2),
            transactor_pkid: taker,
            buying_coin_pkid: Pkid::ZERO,
            selling_coin_pkid: dao0,
            scaled_exchange_rate: ScaledExchangeRate::parse_decimal("1").unwrap(),
            quantity_to_buy: Uint256::from(10u64),
            operation_type: OperationType::Ask,
            fill_type: FillType::ImmediateOrCancel,
            block_height: 2,
            bidder_inputs: vec![BidderInput { input: outpoint, owner: PublicKey([1u8; 33]) }],
        };
        assert_eq!(place_order(&mut v, request), Err(CoreError::BidderInputNoLongerExists));
    }
}
