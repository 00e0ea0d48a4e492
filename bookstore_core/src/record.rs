//! Event log and inventory snapshots handed to report writers.
//!
//! Records serialize flat: `{"tick": 3, "type": "purchase_ok", "customer": ...}`
//! and `{"tick": 3, "Inv_HP1": 4, ...}`. The field set of each event type is
//! fixed, so a writer that unions keys across records gets a stable header.

use bookstore_env::{BookId, CustomerId, EmployeeId, InventoryId, OrderId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Type-specific fields of an event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    PurchaseRequest {
        customer: CustomerId,
        book: BookId,
        qty: u32,
    },
    PurchaseOk {
        customer: CustomerId,
        book: BookId,
        qty: u32,
        order: OrderId,
        /// Stock left after the decrement
        remaining: u32,
    },
    PurchaseFail {
        customer: CustomerId,
        book: BookId,
        qty: u32,
        /// Stock seen when the request was rejected
        available: u32,
    },
    Restock {
        employee: EmployeeId,
        inventory: InventoryId,
        book: BookId,
        qty: u32,
        after_qty: u32,
    },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::PurchaseRequest { .. } => "purchase_request",
            EventKind::PurchaseOk { .. } => "purchase_ok",
            EventKind::PurchaseFail { .. } => "purchase_fail",
            EventKind::Restock { .. } => "restock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub tick: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl EventRecord {
    /// Flattened named fields, `tick` and `type` included.
    pub fn fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Inventory levels at the end of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(flatten)]
    pub levels: BTreeMap<InventoryId, u32>,
}

/// Append-only event log, stamped with the tick currently executing.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Rc<RefCell<Vec<EventRecord>>>,
    tick: Rc<Cell<u64>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tick stamped on subsequent records.
    pub fn set_tick(&self, tick: u64) {
        self.tick.set(tick);
    }

    pub fn tick(&self) -> u64 {
        self.tick.get()
    }

    pub fn push(&self, kind: EventKind) {
        self.records.borrow_mut().push(EventRecord {
            tick: self.tick.get(),
            kind,
        });
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Copy of every record so far.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.borrow().clone()
    }

    /// Number of records of the given type.
    pub fn count(&self, type_name: &str) -> usize {
        self.records
            .borrow()
            .iter()
            .filter(|r| r.kind.type_name() == type_name)
            .count()
    }

    /// Union of field names across all records, `tick` and `type` first.
    pub fn columns(&self) -> Vec<String> {
        let mut rest = BTreeSet::new();
        for record in self.records.borrow().iter() {
            rest.extend(record.fields().into_iter().map(|(key, _)| key));
        }
        rest.remove("tick");
        rest.remove("type");

        ["tick", "type"]
            .into_iter()
            .map(String::from)
            .chain(rest)
            .collect()
    }
}
