//! Inventory Manager - turns purchase requests into orders or rejections.
//!
//! The manager is the only component that decrements stock. Because the bus
//! dispatches synchronously and every handler runs to completion, each
//! check-then-decrement below is atomic with respect to every other purchase
//! request in the same tick: no two requests can both commit against the same
//! units.

use crate::bus::{Message, MessageBus, PurchaseRequest, Topic};
use crate::record::{EventKind, EventLog};
use crate::store::{EntityStore, SharedStore};
use bookstore_env::{CustomerId, OrderId, SimError, SimResult};
use std::rc::Rc;
use tracing::debug;

/// Result of handling one purchase request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Committed { order: OrderId, remaining: u32 },
    Rejected { available: u32 },
}

/// Transactional handler for `purchase_request`.
#[derive(Debug, Clone)]
pub struct InventoryManager {
    store: SharedStore,
    log: EventLog,
}

impl InventoryManager {
    pub fn new(store: SharedStore, log: EventLog) -> Self {
        Self { store, log }
    }

    /// Subscribes the manager to `purchase_request`.
    pub fn attach(self: &Rc<Self>, bus: &MessageBus) {
        let manager = Rc::clone(self);
        bus.subscribe(Topic::PurchaseRequest, move |bus, message| match message {
            Message::PurchaseRequest(request) => manager.handle_purchase(bus, request).map(|_| ()),
            _ => Ok(()),
        });
    }

    /// Commits or rejects one purchase, then publishes the outcome with the
    /// original request as payload.
    ///
    /// Errors only on setup defects: an unknown or unstocked book, or a
    /// customer id that resolves to nobody.
    pub fn handle_purchase(
        &self,
        bus: &MessageBus,
        request: &PurchaseRequest,
    ) -> SimResult<PurchaseOutcome> {
        let outcome = self.commit(request)?;

        match &outcome {
            PurchaseOutcome::Committed { order, remaining } => {
                debug!(
                    customer = %request.customer_id,
                    book = %request.book_id,
                    qty = request.qty,
                    remaining,
                    "purchase ok"
                );
                self.log.push(EventKind::PurchaseOk {
                    customer: request.customer_id.clone(),
                    book: request.book_id.clone(),
                    qty: request.qty,
                    order: *order,
                    remaining: *remaining,
                });
                bus.publish(Message::PurchaseOk(request.clone()));
            }
            PurchaseOutcome::Rejected { available } => {
                debug!(
                    customer = %request.customer_id,
                    book = %request.book_id,
                    qty = request.qty,
                    available,
                    "purchase rejected, not enough stock"
                );
                self.log.push(EventKind::PurchaseFail {
                    customer: request.customer_id.clone(),
                    book: request.book_id.clone(),
                    qty: request.qty,
                    available: *available,
                });
                bus.publish(Message::PurchaseFail(request.clone()));
            }
        }

        Ok(outcome)
    }

    /// The store transaction. The borrow ends before anything is published.
    fn commit(&self, request: &PurchaseRequest) -> SimResult<PurchaseOutcome> {
        let mut store = self.store.borrow_mut();

        if store.book(&request.book_id).is_none() {
            return Err(SimError::UnknownBook(request.book_id.clone()));
        }
        let inventory = store
            .inventory_for_book(&request.book_id)
            .cloned()
            .ok_or_else(|| SimError::UnstockedBook(request.book_id.clone()))?;
        let customer = resolve_customer(&store, &request.customer_id)?;

        match store.try_decrement_stock(&inventory, request.qty) {
            Some(remaining) => {
                let order = store.record_order(customer.clone(), request.book_id.clone(), request.qty);
                store.record_purchase(&customer, request.book_id.clone())?;
                Ok(PurchaseOutcome::Committed { order, remaining })
            }
            None => Ok(PurchaseOutcome::Rejected {
                available: store.quantity(&inventory).unwrap_or(0),
            }),
        }
    }
}

/// Resolves a customer id to a seeded customer.
///
/// An exact key match wins. Otherwise the numeric suffix `n` selects the
/// `n`-th seeded customer (1-based, wrapping), with customers ordered by their
/// own numeric suffix and then by key. `Shopper_2` therefore maps to `Cust_2`
/// even when `Cust_10` sorts before it as a string.
pub fn resolve_customer(store: &EntityStore, id: &CustomerId) -> SimResult<CustomerId> {
    if store.customer(id).is_some() {
        return Ok(id.clone());
    }

    let mut seeded: Vec<&CustomerId> = store.customers().map(|c| &c.id).collect();
    seeded.sort_by_key(|c| (c.numeric_suffix().is_none(), c.numeric_suffix(), *c));
    match (id.numeric_suffix(), seeded.len()) {
        (Some(n), len) if n > 0 && len > 0 => {
            let index = ((n - 1) % len as u64) as usize;
            Ok(seeded[index].clone())
        }
        _ => Err(SimError::UnknownCustomer(id.clone())),
    }
}
