//! Order storage: the `OrderId`-keyed primary record plus its two
//! secondary indexes (match index, by-transactor). All three keys are
//! kept in lockstep by [`insert`] and [`remove`] so callers never have to
//! remember to update one without the other.

use core_types::entries::OrderEntry;
use core_types::keys::{order_by_transactor_key, order_key, order_match_index_key, order_match_index_prefix};
use core_types::{CoreError, CoreResult, Pkid};
use state::StagedView;
use store::db::{CF_ORDERS_BY_ID, CF_ORDERS_BY_TRANSACTOR, CF_ORDERS_MATCH_INDEX};

fn decode(bytes: &[u8]) -> CoreResult<OrderEntry> {
    borsh::BorshDeserialize::try_from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
}

fn encode(entry: &OrderEntry) -> CoreResult<Vec<u8>> {
    borsh::BorshSerialize::try_to_vec(entry).map_err(|e| CoreError::Encoding(e.to_string()))
}

pub fn get(view: &StagedView, order_id: &core_types::entries::OrderId) -> CoreResult<Option<OrderEntry>> {
    let key = order_key(order_id);
    match view.get(CF_ORDERS_BY_ID, &key).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Stages the order's primary record and both secondary indexes.
pub fn insert(view: &mut StagedView, order: &OrderEntry) -> CoreResult<()> {
    let encoded = encode(order)?;
    view.put(CF_ORDERS_BY_ID, &order_key(&order.order_id), encoded.clone());
    view.put(
        CF_ORDERS_MATCH_INDEX,
        &order_match_index_key(
            &order.buying_coin_pkid,
            &order.selling_coin_pkid,
            &order.scaled_exchange_rate,
            order.block_height,
            &order.order_id,
        ),
        encoded,
    );
    view.put(CF_ORDERS_BY_TRANSACTOR, &order_by_transactor_key(&order.transactor_pkid, &order.order_id), Vec::new());
    Ok(())
}

/// Tombstones the order's primary record and both secondary indexes. The
/// caller must already hold the full pre-image (from [`get`]) to emit as a
/// reverse-operation, since a tombstone alone carries no content.
pub fn remove(view: &mut StagedView, order: &OrderEntry) {
    view.delete(CF_ORDERS_BY_ID, &order_key(&order.order_id));
    view.delete(
        CF_ORDERS_MATCH_INDEX,
        &order_match_index_key(
            &order.buying_coin_pkid,
            &order.selling_coin_pkid,
            &order.scaled_exchange_rate,
            order.block_height,
            &order.order_id,
        ),
    );
    view.delete(CF_ORDERS_BY_TRANSACTOR, &order_by_transactor_key(&order.transactor_pkid, &order.order_id));
}

/// Replaces a resting order's quantity in place, rewriting all three
/// records (the match-index key embeds neither quantity, so only the
/// value payload changes there and on the primary record).
pub fn update_quantity(view: &mut StagedView, order: &OrderEntry, new_quantity: fixed_point::Uint256) -> CoreResult<OrderEntry> {
    let mut updated = order.clone();
    updated.quantity = new_quantity;
    insert(view, &updated)?;
    Ok(updated)
}

/// Candidates for a transactor offering `(selling, buying)` live in the
/// match index under `(buying, selling, …)` — i.e. swapped from the
/// taker's own labels, since the match index is keyed by what each
/// *resting* order itself buys and sells.
pub fn match_candidates(
    view: &StagedView,
    taker_selling_pkid: &Pkid,
    taker_buying_pkid: &Pkid,
) -> CoreResult<Vec<OrderEntry>> {
    let prefix = order_match_index_prefix(taker_selling_pkid, taker_buying_pkid);
    let scanned = view.scan_from(CF_ORDERS_MATCH_INDEX, &prefix).map_err(|e| CoreError::Encoding(e.to_string()))?;
    let mut out = Vec::new();
    for (key, value) in scanned {
        if !key.starts_with(&prefix) {
            break;
        }
        out.push(decode(&value)?);
    }
    Ok(out)
}
