//! Agents - per-tick behaviors driven by the scheduler.
//!
//! - [`CustomerAgent`]: picks a random book each tick and asks to buy it
//! - [`EmployeeAgent`]: watches its inventories for low stock and applies
//!   restocks published on the bus
//!
//! Agents read the store through their shared handle and talk to each other
//! only through the bus. Customers never write to the store.

use crate::bus::{Message, MessageBus, PurchaseRequest, RestockRequest, Topic};
use crate::record::{EventKind, EventLog};
use crate::rules;
use crate::store::SharedStore;
use bookstore_env::{CustomerId, EmployeeId, InventoryId, SimContext, SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Everything an agent may touch during its step.
pub struct StepEnv<'a> {
    /// Tick being executed
    pub tick: u64,
    pub bus: &'a MessageBus,
    pub ctx: &'a mut SimContext,
}

/// A participant activated once per tick.
pub trait Agent {
    fn id(&self) -> &str;

    fn step(&mut self, env: &mut StepEnv<'_>) -> SimResult<()>;
}

// ============================================================================
// CUSTOMER
// ============================================================================

/// How many copies a customer asks for per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityPolicy {
    Fixed(u32),
    /// Uniform over `min..=max`
    Uniform { min: u32, max: u32 },
}

impl QuantityPolicy {
    pub fn validate(&self) -> SimResult<()> {
        match *self {
            QuantityPolicy::Fixed(0) => Err(SimError::invalid_config(
                "quantity",
                "fixed purchase quantity must be positive",
            )),
            QuantityPolicy::Uniform { min, max } if min == 0 || min > max => {
                Err(SimError::invalid_config(
                    "quantity",
                    format!("uniform range {min}..={max} must be positive and non-empty"),
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn sample(&self, ctx: &mut SimContext) -> u32 {
        match *self {
            QuantityPolicy::Fixed(qty) => qty,
            QuantityPolicy::Uniform { min, max } => ctx.gen_range(min..=max),
        }
    }
}

impl Default for QuantityPolicy {
    fn default() -> Self {
        QuantityPolicy::Fixed(1)
    }
}

pub struct CustomerAgent {
    id: CustomerId,
    store: SharedStore,
    log: EventLog,
    quantity: QuantityPolicy,
}

impl CustomerAgent {
    pub fn new(id: CustomerId, store: SharedStore, log: EventLog, quantity: QuantityPolicy) -> Self {
        Self {
            id,
            store,
            log,
            quantity,
        }
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.id
    }
}

impl Agent for CustomerAgent {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn step(&mut self, env: &mut StepEnv<'_>) -> SimResult<()> {
        // Catalog is fixed after setup; key order keeps the draw deterministic
        let books = self.store.borrow().book_ids();
        let Some(book) = env.ctx.choose(&books).cloned() else {
            return Ok(());
        };
        let qty = self.quantity.sample(env.ctx);

        self.log.push(EventKind::PurchaseRequest {
            customer: self.id.clone(),
            book: book.clone(),
            qty,
        });
        env.bus.publish(Message::PurchaseRequest(PurchaseRequest {
            customer_id: self.id.clone(),
            book_id: book,
            qty,
        }));
        Ok(())
    }
}

// ============================================================================
// EMPLOYEE
// ============================================================================

/// Which inventories an employee looks after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Every inventory in the store
    All,
    Only(BTreeSet<InventoryId>),
}

impl Assignment {
    pub fn covers(&self, id: &InventoryId) -> bool {
        match self {
            Assignment::All => true,
            Assignment::Only(managed) => managed.contains(id),
        }
    }

    fn scope(&self) -> Option<&BTreeSet<InventoryId>> {
        match self {
            Assignment::All => None,
            Assignment::Only(managed) => Some(managed),
        }
    }
}

/// Restock thresholds shared by all employees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestockPolicy {
    /// Stock strictly below this is low
    pub threshold: u32,
    /// Level a restock tops up to
    pub target: u32,
}

#[derive(Debug, Clone)]
pub struct EmployeeAgent {
    id: EmployeeId,
    store: SharedStore,
    log: EventLog,
    assignment: Assignment,
    policy: RestockPolicy,
}

impl EmployeeAgent {
    pub fn new(
        id: EmployeeId,
        store: SharedStore,
        log: EventLog,
        assignment: Assignment,
        policy: RestockPolicy,
    ) -> Self {
        Self {
            id,
            store,
            log,
            assignment,
            policy,
        }
    }

    pub fn employee_id(&self) -> &EmployeeId {
        &self.id
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Subscribes this employee to `restock_request`.
    pub fn attach(&self, bus: &MessageBus) {
        let employee = self.clone();
        bus.subscribe(Topic::RestockRequest, move |_, message| {
            if let Message::RestockRequest(request) = message {
                employee.handle_restock(request);
            }
            Ok(())
        });
    }

    /// Applies a restock for a covered inventory. Returns the new level, or
    /// `None` when the request was not for this employee or names an unknown
    /// inventory.
    pub fn handle_restock(&self, request: &RestockRequest) -> Option<u32> {
        if !self.assignment.covers(&request.inventory_id) {
            return None;
        }

        let mut store = self.store.borrow_mut();
        let Some(after_qty) = store.increment_stock(&request.inventory_id, request.qty) else {
            warn!(
                employee = %self.id,
                inventory = %request.inventory_id,
                "restock for unknown inventory ignored"
            );
            return None;
        };
        let book = store.inventory(&request.inventory_id)?.book.clone();
        drop(store);

        debug!(
            employee = %self.id,
            inventory = %request.inventory_id,
            qty = request.qty,
            after_qty,
            "restock"
        );
        self.log.push(EventKind::Restock {
            employee: self.id.clone(),
            inventory: request.inventory_id.clone(),
            book,
            qty: request.qty,
            after_qty,
        });
        Some(after_qty)
    }
}

impl Agent for EmployeeAgent {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn step(&mut self, env: &mut StepEnv<'_>) -> SimResult<()> {
        let requests = rules::restock_requests(
            &self.store.borrow(),
            self.policy.threshold,
            self.policy.target,
            self.assignment.scope(),
        );

        for (inventory_id, qty) in requests {
            env.bus
                .publish(Message::RestockRequest(RestockRequest { inventory_id, qty }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Catalog;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store() -> SharedStore {
        Catalog::new()
            .with_book("Book_I1", "One", "Author", "Genre", 1.0, 1)
            .with_book("Book_I2", "Two", "Author", "Genre", 1.0, 2)
            .build_store()
            .unwrap()
            .shared()
    }

    fn only(ids: &[&str]) -> Assignment {
        Assignment::Only(ids.iter().map(|id| InventoryId::new(*id)).collect())
    }

    const POLICY: RestockPolicy = RestockPolicy {
        threshold: 3,
        target: 10,
    };

    #[test]
    fn test_quantity_policy_validation() {
        assert!(QuantityPolicy::Fixed(1).validate().is_ok());
        assert!(QuantityPolicy::Fixed(0).validate().is_err());
        assert!(QuantityPolicy::Uniform { min: 1, max: 3 }.validate().is_ok());
        assert!(QuantityPolicy::Uniform { min: 3, max: 1 }.validate().is_err());
        assert!(QuantityPolicy::Uniform { min: 0, max: 1 }.validate().is_err());
    }

    #[test]
    fn test_uniform_quantity_in_range() {
        let mut ctx = SimContext::new(9);
        let policy = QuantityPolicy::Uniform { min: 2, max: 4 };
        for _ in 0..100 {
            let qty = policy.sample(&mut ctx);
            assert!((2..=4).contains(&qty));
        }
    }

    #[test]
    fn test_customer_publishes_request() {
        let store = store();
        let log = EventLog::new();
        let bus = MessageBus::new();
        let mut ctx = SimContext::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        bus.subscribe(Topic::PurchaseRequest, move |_, msg| {
            sink.borrow_mut().push(msg.clone());
            Ok(())
        });

        let mut customer = CustomerAgent::new(
            CustomerId::new("Cust_1"),
            Rc::clone(&store),
            log.clone(),
            QuantityPolicy::Fixed(2),
        );
        customer
            .step(&mut StepEnv {
                tick: 0,
                bus: &bus,
                ctx: &mut ctx,
            })
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            Message::PurchaseRequest(req) => {
                assert_eq!(req.customer_id, CustomerId::new("Cust_1"));
                assert_eq!(req.qty, 2);
                assert!(store.borrow().book(&req.book_id).is_some());
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert_eq!(log.count("purchase_request"), 1);
        // Customers never touch stock
        assert_eq!(store.borrow().quantity(&InventoryId::new("Inv_I1")), Some(1));
    }

    #[test]
    fn test_managed_restock_scenario() {
        let store = store();
        let log = EventLog::new();
        let bus = MessageBus::new();
        let mut ctx = SimContext::new(1);

        let mut employee = EmployeeAgent::new(
            EmployeeId::new("Emp_1"),
            Rc::clone(&store),
            log.clone(),
            only(&["Inv_I1"]),
            POLICY,
        );
        employee.attach(&bus);

        employee
            .step(&mut StepEnv {
                tick: 0,
                bus: &bus,
                ctx: &mut ctx,
            })
            .unwrap();

        // Only the managed inventory is topped up to target
        assert_eq!(store.borrow().quantity(&InventoryId::new("Inv_I1")), Some(10));
        assert_eq!(store.borrow().quantity(&InventoryId::new("Inv_I2")), Some(2));

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].kind,
            EventKind::Restock {
                employee: EmployeeId::new("Emp_1"),
                inventory: InventoryId::new("Inv_I1"),
                book: bookstore_env::BookId::new("Book_I1"),
                qty: 9,
                after_qty: 10,
            }
        );
    }

    #[test]
    fn test_partitioned_employees_restock_once() {
        let store = store();
        let log = EventLog::new();
        let bus = MessageBus::new();
        let mut ctx = SimContext::new(1);

        let mut first = EmployeeAgent::new(
            EmployeeId::new("Emp_1"),
            Rc::clone(&store),
            log.clone(),
            only(&["Inv_I1"]),
            POLICY,
        );
        let second = EmployeeAgent::new(
            EmployeeId::new("Emp_2"),
            Rc::clone(&store),
            log.clone(),
            only(&["Inv_I2"]),
            POLICY,
        );
        first.attach(&bus);
        second.attach(&bus);

        first
            .step(&mut StepEnv {
                tick: 0,
                bus: &bus,
                ctx: &mut ctx,
            })
            .unwrap();

        assert_eq!(log.count("restock"), 1);
        assert_eq!(store.borrow().quantity(&InventoryId::new("Inv_I1")), Some(10));
    }

    #[test]
    fn test_unknown_inventory_ignored() {
        let store = store();
        let employee = EmployeeAgent::new(
            EmployeeId::new("Emp_1"),
            store,
            EventLog::new(),
            Assignment::All,
            POLICY,
        );

        let result = employee.handle_restock(&RestockRequest {
            inventory_id: InventoryId::new("Inv_Gone"),
            qty: 4,
        });
        assert_eq!(result, None);
    }

    #[test]
    fn test_no_request_when_not_low() {
        let store = store();
        let bus = MessageBus::new();
        let mut ctx = SimContext::new(1);
        let mut employee = EmployeeAgent::new(
            EmployeeId::new("Emp_1"),
            store,
            EventLog::new(),
            Assignment::All,
            RestockPolicy {
                threshold: 1,
                target: 10,
            },
        );

        employee
            .step(&mut StepEnv {
                tick: 0,
                bus: &bus,
                ctx: &mut ctx,
            })
            .unwrap();
        assert_eq!(bus.published_count(), 0);
    }
}
