//! Bookstore Core - deterministic turn-based supply-chain simulation
//!
//! Customers generate purchase demand, an inventory manager fulfils or rejects
//! it against stock, and employees restock inventories that drop below a
//! threshold. Everything runs on one thread:
//!
//! 1. **Scheduler** activates each agent once per tick (fixed or shuffled order)
//! 2. **Agents** read the store and publish requests on the bus
//! 3. **MessageBus** dispatches synchronously, in subscription order
//! 4. **Handlers** (inventory manager, employees) mutate the store and may
//!    publish follow-up messages
//! 5. **Model** appends a snapshot of every inventory level
//!
//! Because dispatch is synchronous and the inventory manager is the only
//! writer that decrements stock, purchases against one inventory are
//! serialized by construction and stock can never go negative.
//!
//! # Usage
//!
//! ```ignore
//! use bookstore_core::{BookstoreModel, ModelConfig};
//!
//! let mut model = BookstoreModel::new(ModelConfig::default().with_steps(20))?;
//! model.run_configured()?;
//!
//! for record in model.events() {
//!     println!("{}", serde_json::to_string(&record)?);
//! }
//! ```

pub mod agents;
pub mod bus;
pub mod inventory;
pub mod model;
pub mod record;
pub mod rules;
pub mod scheduler;
pub mod store;

pub use agents::{Agent, Assignment, CustomerAgent, EmployeeAgent, QuantityPolicy, RestockPolicy, StepEnv};
pub use bus::{Message, MessageBus, PurchaseRequest, RestockRequest, SubscriptionId, Topic};
pub use inventory::{InventoryManager, PurchaseOutcome};
pub use model::{BookstoreModel, ModelConfig, RestockScope, RunSummary};
pub use record::{EventKind, EventLog, EventRecord, Snapshot};
pub use scheduler::{ActivationOrder, Scheduler};
pub use store::{Book, Catalog, EntityStore, Inventory, Order, SharedStore};

pub use bookstore_env::{BookId, CustomerId, EmployeeId, InventoryId, OrderId, SimContext, SimError, SimResult};
