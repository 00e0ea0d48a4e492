//! Run oracle - audits a finished model against its invariants.
//!
//! The Oracle replays the event log on top of the setup stock levels and
//! checks that every snapshot and the order ledger agree with it:
//! - Stock never goes negative at a tick boundary
//! - Every `purchase_ok` has exactly one Order, with the same book
//! - Each snapshot equals initial stock + restocks - sales up to that tick
//! - Snapshot ticks are consecutive and events never run ahead of them

use bookstore_core::{BookId, BookstoreModel, EventKind, InventoryId};
use std::collections::BTreeMap;
use thiserror::Error;

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("tick {tick}: {inventory} went negative ({level})")]
    NegativeStock {
        tick: u64,
        inventory: InventoryId,
        level: i64,
    },

    #[error("{orders} orders recorded but {ok_events} purchase_ok events")]
    OrderCountMismatch { orders: usize, ok_events: usize },

    #[error("order #{index} is for {order_book} but its purchase_ok names {event_book}")]
    OrderBookMismatch {
        index: usize,
        order_book: BookId,
        event_book: BookId,
    },

    #[error("tick {tick}: {inventory} snapshot {actual} but ledger replay gives {expected}")]
    ConservationBroken {
        tick: u64,
        inventory: InventoryId,
        expected: i64,
        actual: u32,
    },

    #[error("snapshot #{index} has tick {tick}")]
    TickGap { index: usize, tick: u64 },

    #[error("purchase_ok for {0}, which no inventory stores")]
    UnstockedSale(BookId),
}

/// Stateless invariant checker.
pub struct Oracle;

impl Oracle {
    /// Returns every violation found; empty means the run is consistent.
    pub fn audit(model: &BookstoreModel) -> Vec<Violation> {
        let mut violations = Vec::new();
        violations.extend(Self::audit_ledger(model));
        violations.extend(Self::audit_ticks(model));
        violations.extend(Self::audit_conservation(model));
        violations
    }

    fn audit_ledger(model: &BookstoreModel) -> Vec<Violation> {
        let store = model.store();
        let ok_books: Vec<BookId> = model
            .events()
            .into_iter()
            .filter_map(|record| match record.kind {
                EventKind::PurchaseOk { book, .. } => Some(book),
                _ => None,
            })
            .collect();

        if ok_books.len() != store.orders().len() {
            return vec![Violation::OrderCountMismatch {
                orders: store.orders().len(),
                ok_events: ok_books.len(),
            }];
        }

        store
            .orders()
            .iter()
            .zip(ok_books)
            .enumerate()
            .filter(|(_, (order, book))| order.book != *book)
            .map(|(index, (order, book))| Violation::OrderBookMismatch {
                index,
                order_book: order.book.clone(),
                event_book: book,
            })
            .collect()
    }

    fn audit_ticks(model: &BookstoreModel) -> Vec<Violation> {
        model
            .snapshots()
            .iter()
            .enumerate()
            .filter(|(index, snapshot)| snapshot.tick != *index as u64)
            .map(|(index, snapshot)| Violation::TickGap {
                index,
                tick: snapshot.tick,
            })
            .collect()
    }

    fn audit_conservation(model: &BookstoreModel) -> Vec<Violation> {
        let mut violations = Vec::new();
        let book_to_inventory: BTreeMap<BookId, InventoryId> = model
            .store()
            .inventories()
            .map(|inv| (inv.book.clone(), inv.id.clone()))
            .collect();

        let mut delta: BTreeMap<(u64, InventoryId), i64> = BTreeMap::new();
        for record in model.events() {
            match record.kind {
                EventKind::PurchaseOk { book, qty, .. } => match book_to_inventory.get(&book) {
                    Some(inventory) => {
                        *delta.entry((record.tick, inventory.clone())).or_default() -=
                            i64::from(qty);
                    }
                    None => violations.push(Violation::UnstockedSale(book)),
                },
                EventKind::Restock { inventory, qty, .. } => {
                    *delta.entry((record.tick, inventory)).or_default() += i64::from(qty);
                }
                _ => {}
            }
        }

        let mut expected: BTreeMap<InventoryId, i64> = model
            .initial_levels()
            .iter()
            .map(|(id, qty)| (id.clone(), i64::from(*qty)))
            .collect();

        for snapshot in model.snapshots() {
            for (inventory, level) in expected.iter_mut() {
                *level += delta
                    .get(&(snapshot.tick, inventory.clone()))
                    .copied()
                    .unwrap_or(0);

                if *level < 0 {
                    violations.push(Violation::NegativeStock {
                        tick: snapshot.tick,
                        inventory: inventory.clone(),
                        level: *level,
                    });
                }
                let actual = snapshot.levels.get(inventory).copied().unwrap_or(0);
                if i64::from(actual) != *level {
                    violations.push(Violation::ConservationBroken {
                        tick: snapshot.tick,
                        inventory: inventory.clone(),
                        expected: *level,
                        actual,
                    });
                }
            }
        }
        violations
    }
}
