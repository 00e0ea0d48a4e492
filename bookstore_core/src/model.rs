//! BookstoreModel - owns the store, the bus and the agent roster for one run.
//!
//! # Setup
//!
//! ```text
//! Catalog ──► EntityStore ◄──────────────── SharedStore handles ───┐
//!                 ▲                                                │
//!                 │ decrements                 increments          │
//!       ┌─────────┴────────┐              ┌──────────────┐         │
//!       │ InventoryManager │              │  Employees   │         │
//!       └─────────▲────────┘              └──────▲───────┘         │
//!                 │ purchase_request             │ restock_request │
//!  ┌──────────────┴──────────────────────────────┴───────────┐     │
//!  │                      MessageBus                         │     │
//!  └──────────────▲──────────────────────────────▲───────────┘     │
//!                 │                              │                 │
//!          ┌──────┴─────┐                 ┌──────┴─────┐           │
//!          │ Customers  │                 │ Employees  │───────────┘
//!          └────────────┘                 └────────────┘
//!                  ▲  Scheduler (sequential | shuffled)  ▲
//! ```
//!
//! Each `step()` activates every agent once, then appends one snapshot of all
//! inventory levels labelled with the tick that produced it.

use crate::agents::{
    Assignment, CustomerAgent, EmployeeAgent, QuantityPolicy, RestockPolicy,
};
use crate::bus::{Message, MessageBus, PurchaseRequest};
use crate::inventory::InventoryManager;
use crate::record::{EventKind, EventLog, EventRecord, Snapshot};
use crate::rules;
use crate::scheduler::{ActivationOrder, Scheduler};
use crate::store::{Catalog, EntityStore, SharedStore};
use bookstore_env::{
    BookId, CustomerId, EmployeeId, InventoryId, SimContext, SimError, SimResult,
};
use serde::{Deserialize, Serialize};
use std::cell::Ref;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

const CUSTOMER_NAMES: [&str; 12] = [
    "Maya", "Leo", "Ava", "Noah", "Iris", "Omar", "Zoe", "Eli", "Nina", "Theo", "Lena", "Sam",
];
const EMPLOYEE_NAMES: [&str; 4] = ["Alice", "Bob", "Carol", "Dan"];

/// Which inventories each employee watches and restocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestockScope {
    /// Inventories are partitioned round-robin across employees
    #[default]
    Managed,
    /// Every employee watches and restocks every inventory
    Global,
}

impl std::str::FromStr for RestockScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "managed" | "partitioned" => Ok(RestockScope::Managed),
            "global" | "all" => Ok(RestockScope::Global),
            _ => Err(format!("Unknown restock scope: {}", s)),
        }
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of customer agents
    pub n_customers: usize,

    /// Number of employee agents
    pub n_employees: usize,

    /// Ticks executed by `run_configured`
    pub steps: u64,

    /// Stock strictly below this is low
    pub restock_threshold: u32,

    /// Level a restock tops up to
    pub restock_target: u32,

    /// Master seed; `None` or negative means a fresh seed from OS entropy
    pub seed: Option<i64>,

    pub quantity: QuantityPolicy,

    pub activation: ActivationOrder,

    pub restock_scope: RestockScope,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_customers: 12,
            n_employees: 2,
            steps: 40,
            restock_threshold: 10,
            restock_target: 30,
            seed: Some(42),
            quantity: QuantityPolicy::Fixed(1),
            activation: ActivationOrder::Shuffled,
            restock_scope: RestockScope::Managed,
        }
    }
}

impl ModelConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(SimError::export)?;
        serde_json::from_str(&raw).map_err(SimError::export)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.n_customers == 0 {
            return Err(SimError::invalid_config("n_customers", "must be positive"));
        }
        if self.n_employees == 0 {
            return Err(SimError::invalid_config("n_employees", "must be positive"));
        }
        if self.steps == 0 {
            return Err(SimError::invalid_config("steps", "must be positive"));
        }
        if self.restock_threshold == 0 {
            return Err(SimError::invalid_config("restock_threshold", "must be positive"));
        }
        if self.restock_target == 0 {
            return Err(SimError::invalid_config("restock_target", "must be positive"));
        }
        if self.restock_target < self.restock_threshold {
            return Err(SimError::invalid_config(
                "restock_target",
                format!(
                    "{} is below restock_threshold {}",
                    self.restock_target, self.restock_threshold
                ),
            ));
        }
        self.quantity.validate()
    }

    pub fn with_customers(mut self, n: usize) -> Self {
        self.n_customers = n;
        self
    }

    pub fn with_employees(mut self, n: usize) -> Self {
        self.n_employees = n;
        self
    }

    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_restock(mut self, threshold: u32, target: u32) -> Self {
        self.restock_threshold = threshold;
        self.restock_target = target;
        self
    }

    pub fn with_seed(mut self, seed: Option<i64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_quantity(mut self, quantity: QuantityPolicy) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_activation(mut self, activation: ActivationOrder) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_restock_scope(mut self, scope: RestockScope) -> Self {
        self.restock_scope = scope;
        self
    }
}

/// Counters over a run's event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub purchases_requested: usize,
    pub purchases_ok: usize,
    pub purchases_failed: usize,
    pub restocks: usize,
    pub units_sold: u64,
    pub units_restocked: u64,
}

/// One simulation run.
pub struct BookstoreModel {
    config: ModelConfig,
    ctx: SimContext,
    store: SharedStore,
    bus: MessageBus,
    log: EventLog,
    scheduler: Scheduler,
    snapshots: Vec<Snapshot>,
    initial_levels: BTreeMap<InventoryId, u32>,

    /// First defect hit; once set the run is over
    fault: Option<SimError>,
}

impl BookstoreModel {
    /// Creates a model over the classic catalog.
    pub fn new(config: ModelConfig) -> SimResult<Self> {
        Self::with_catalog(config, &Catalog::classic())
    }

    /// Creates a model over a custom catalog.
    pub fn with_catalog(config: ModelConfig, catalog: &Catalog) -> SimResult<Self> {
        config.validate()?;

        let ctx = SimContext::from_optional_seed(config.seed);
        if !ctx.is_deterministic() {
            warn!(seed = ctx.seed(), "no valid seed configured, using a random one");
        }

        let mut store = catalog.build_store()?;
        let assignments = assign_inventories(&store, &config);

        let customer_ids: Vec<CustomerId> = (1..=config.n_customers)
            .map(|i| CustomerId::new(format!("Cust_{i}")))
            .collect();
        for (i, id) in customer_ids.iter().enumerate() {
            store.add_customer(id.clone(), CUSTOMER_NAMES[i % CUSTOMER_NAMES.len()]);
        }
        for (i, (id, assignment)) in assignments.iter().enumerate() {
            let manages = match assignment {
                Assignment::All => store.inventory_ids().into_iter().collect(),
                Assignment::Only(managed) => managed.clone(),
            };
            store.add_employee(id.clone(), EMPLOYEE_NAMES[i % EMPLOYEE_NAMES.len()], manages);
        }

        let initial_levels = store.stock_levels();
        let store = store.shared();
        let bus = MessageBus::new();
        let log = EventLog::new();

        // The manager is the one subscriber of purchase_request
        let manager = Rc::new(InventoryManager::new(Rc::clone(&store), log.clone()));
        manager.attach(&bus);

        let mut scheduler = Scheduler::new(config.activation);
        for id in customer_ids {
            scheduler.add(Box::new(CustomerAgent::new(
                id,
                Rc::clone(&store),
                log.clone(),
                config.quantity,
            )));
        }

        let policy = RestockPolicy {
            threshold: config.restock_threshold,
            target: config.restock_target,
        };
        for (id, assignment) in assignments {
            let employee = EmployeeAgent::new(id, Rc::clone(&store), log.clone(), assignment, policy);
            employee.attach(&bus);
            scheduler.add(Box::new(employee));
        }

        info!(
            seed = ctx.seed(),
            customers = config.n_customers,
            employees = config.n_employees,
            activation = %config.activation,
            "bookstore model ready"
        );

        Ok(Self {
            config,
            ctx,
            store,
            bus,
            log,
            scheduler,
            snapshots: Vec::new(),
            initial_levels,
            fault: None,
        })
    }

    /// Executes one tick and records its snapshot.
    ///
    /// After a defect every further call returns that same defect.
    pub fn step(&mut self) -> SimResult<()> {
        self.ensure_running()?;
        let tick = self.scheduler.tick();
        self.log.set_tick(tick);

        let outcome = self.scheduler.step(&self.bus, &mut self.ctx);
        self.latch(outcome)?;

        let levels = self.store.borrow().stock_levels();
        debug!(tick, low = self.low_stock().len(), "tick complete");
        self.snapshots.push(Snapshot { tick, levels });
        Ok(())
    }

    /// Executes `n` ticks, stopping at the first defect.
    pub fn run(&mut self, n: u64) -> SimResult<()> {
        self.ensure_running()?;
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Executes the configured number of ticks.
    pub fn run_configured(&mut self) -> SimResult<()> {
        self.run(self.config.steps)
    }

    /// Logs and publishes a purchase request from outside the roster, stamped
    /// with the current tick.
    pub fn inject_purchase(&mut self, customer: CustomerId, book: BookId, qty: u32) -> SimResult<()> {
        self.ensure_running()?;
        self.log.set_tick(self.scheduler.tick());
        self.log.push(EventKind::PurchaseRequest {
            customer: customer.clone(),
            book: book.clone(),
            qty,
        });
        self.bus.publish(Message::PurchaseRequest(PurchaseRequest {
            customer_id: customer,
            book_id: book,
            qty,
        }));
        let outcome = match self.bus.take_fault() {
            Some(defect) => Err(defect),
            None => Ok(()),
        };
        self.latch(outcome)
    }

    /// The defect that ended the run, if any.
    pub fn fault(&self) -> Option<&SimError> {
        self.fault.as_ref()
    }

    fn ensure_running(&self) -> SimResult<()> {
        match &self.fault {
            Some(defect) => Err(defect.clone()),
            None => Ok(()),
        }
    }

    /// Records the first defect so the run cannot continue past it.
    fn latch<T>(&mut self, outcome: SimResult<T>) -> SimResult<T> {
        if let Err(defect) = &outcome {
            error!(tick = self.scheduler.tick(), %defect, "run aborted");
            self.fault.get_or_insert_with(|| defect.clone());
        }
        outcome
    }

    /// Ticks completed so far.
    pub fn tick(&self) -> u64 {
        self.scheduler.tick()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Seed actually in use (drawn from entropy if none was configured).
    pub fn seed(&self) -> u64 {
        self.ctx.seed()
    }

    pub fn store(&self) -> Ref<'_, EntityStore> {
        self.store.borrow()
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.log.records()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Stock levels at setup, before any tick ran.
    pub fn initial_levels(&self) -> &BTreeMap<InventoryId, u32> {
        &self.initial_levels
    }

    /// Inventories currently below the configured threshold.
    pub fn low_stock(&self) -> BTreeSet<InventoryId> {
        rules::low_stock(&self.store.borrow(), self.config.restock_threshold)
    }

    /// Purchases relation derived from the order ledger.
    pub fn purchases(&self) -> BTreeMap<CustomerId, Vec<BookId>> {
        rules::purchases_from_orders(&self.store.borrow())
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            ticks: self.tick(),
            ..RunSummary::default()
        };
        for record in self.log.records() {
            match record.kind {
                EventKind::PurchaseRequest { .. } => summary.purchases_requested += 1,
                EventKind::PurchaseOk { qty, .. } => {
                    summary.purchases_ok += 1;
                    summary.units_sold += u64::from(qty);
                }
                EventKind::PurchaseFail { .. } => summary.purchases_failed += 1,
                EventKind::Restock { qty, .. } => {
                    summary.restocks += 1;
                    summary.units_restocked += u64::from(qty);
                }
            }
        }
        summary
    }
}

impl std::fmt::Debug for BookstoreModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookstoreModel")
            .field("config", &self.config)
            .field("ctx", &self.ctx)
            .field("scheduler", &self.scheduler)
            .field("bus", &self.bus)
            .field("events", &self.log.len())
            .field("fault", &self.fault)
            .finish()
    }
}

/// Employee ids paired with their inventories.
fn assign_inventories(store: &EntityStore, config: &ModelConfig) -> Vec<(EmployeeId, Assignment)> {
    let ids: Vec<EmployeeId> = (1..=config.n_employees)
        .map(|j| EmployeeId::new(format!("Emp_{j}")))
        .collect();

    match config.restock_scope {
        RestockScope::Global => ids.into_iter().map(|id| (id, Assignment::All)).collect(),
        RestockScope::Managed => {
            let mut partitions = vec![BTreeSet::new(); ids.len()];
            for (i, inventory) in store.inventory_ids().into_iter().enumerate() {
                partitions[i % ids.len()].insert(inventory);
            }
            ids.into_iter()
                .zip(partitions)
                .map(|(id, managed)| (id, Assignment::Only(managed)))
                .collect()
        }
    }
}
