//! Rule Evaluator - derived facts computed fresh from store state.
//!
//! Two fixed rule shapes cover this domain:
//! - **LowStock**: `Inventory(i) ∧ qty(i) < threshold → LowStock(i)`
//! - **Purchases**: `Order(o) ∧ HasCustomer(o, c) ∧ HasBook(o, b) → Purchases(c, b)`
//!
//! Nothing here is cached. Every call reads the store as it is right now, so a
//! derived fact can never lag behind a stock mutation.

use crate::store::EntityStore;
use bookstore_env::{BookId, CustomerId, InventoryId};
use std::collections::{BTreeMap, BTreeSet};

/// Inventories whose available quantity is strictly below `threshold`.
pub fn low_stock(store: &EntityStore, threshold: u32) -> BTreeSet<InventoryId> {
    store
        .inventories()
        .filter(|inv| inv.available_quantity < threshold)
        .map(|inv| inv.id.clone())
        .collect()
}

/// LowStock for a single inventory. Unknown inventories are never low.
pub fn is_low_stock(store: &EntityStore, id: &InventoryId, threshold: u32) -> bool {
    store.quantity(id).is_some_and(|qty| qty < threshold)
}

/// Purchases relation derived from the order ledger, in ledger order.
pub fn purchases_from_orders(store: &EntityStore) -> BTreeMap<CustomerId, Vec<BookId>> {
    let mut purchases: BTreeMap<CustomerId, Vec<BookId>> = BTreeMap::new();
    for order in store.orders() {
        purchases
            .entry(order.customer.clone())
            .or_default()
            .push(order.book.clone());
    }
    purchases
}

/// RestockRequested tag: low inventories paired with the quantity that brings
/// them back to `target`.
///
/// `scope` limits the result to a managed subset; `None` covers every
/// inventory. Pairs with a zero top-up are dropped.
pub fn restock_requests(
    store: &EntityStore,
    threshold: u32,
    target: u32,
    scope: Option<&BTreeSet<InventoryId>>,
) -> Vec<(InventoryId, u32)> {
    low_stock(store, threshold)
        .into_iter()
        .filter(|id| scope.map_or(true, |managed| managed.contains(id)))
        .filter_map(|id| {
            let qty = target.saturating_sub(store.quantity(&id)?);
            (qty > 0).then_some((id, qty))
        })
        .collect()
}
