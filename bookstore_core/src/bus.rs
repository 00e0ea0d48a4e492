//! Message Bus - synchronous topic-based publish/subscribe.
//!
//! The bus is the only channel between agents. Dispatch is synchronous and
//! in subscription order; handlers receive the bus itself so they can publish
//! follow-up messages (re-entrant dispatch).
//!
//! # Dispatch rules
//!
//! - `publish` snapshots the handler list for the topic before invoking any
//!   handler, so (un)subscribing during dispatch only affects later publishes.
//! - No subscriber for a topic is a silent no-op.
//! - A handler error is a setup defect: the bus keeps the first one, stops
//!   dispatching, and ignores every later publish until the fault is taken.

use bookstore_env::{BookId, CustomerId, InventoryId, SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{error, trace};

/// The fixed set of topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    PurchaseRequest,
    RestockRequest,
    PurchaseOk,
    PurchaseFail,
}

impl Topic {
    pub fn name(&self) -> &'static str {
        match self {
            Topic::PurchaseRequest => "purchase_request",
            Topic::RestockRequest => "restock_request",
            Topic::PurchaseOk => "purchase_ok",
            Topic::PurchaseFail => "purchase_fail",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of `purchase_request`, echoed unchanged by `purchase_ok`/`purchase_fail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub customer_id: CustomerId,
    pub book_id: BookId,
    pub qty: u32,
}

/// Payload of `restock_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockRequest {
    pub inventory_id: InventoryId,
    pub qty: u32,
}

/// A message on the bus. The variant determines the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "snake_case")]
pub enum Message {
    PurchaseRequest(PurchaseRequest),
    RestockRequest(RestockRequest),
    PurchaseOk(PurchaseRequest),
    PurchaseFail(PurchaseRequest),
}

impl Message {
    pub fn topic(&self) -> Topic {
        match self {
            Message::PurchaseRequest(_) => Topic::PurchaseRequest,
            Message::RestockRequest(_) => Topic::RestockRequest,
            Message::PurchaseOk(_) => Topic::PurchaseOk,
            Message::PurchaseFail(_) => Topic::PurchaseFail,
        }
    }
}

/// A subscribed handler.
///
/// Handlers run to completion; any state they mutate lives behind the shared
/// store or log handles they captured.
pub type Handler = Rc<dyn Fn(&MessageBus, &Message) -> SimResult<()>>;

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct MessageBus {
    subscriptions: RefCell<BTreeMap<Topic, Vec<(SubscriptionId, Handler)>>>,
    next_subscription: Cell<u64>,
    fault: RefCell<Option<SimError>>,
    published: Cell<u64>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler; it fires after every handler already on `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&MessageBus, &Message) -> SimResult<()> + 'static,
    {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);

        self.subscriptions
            .borrow_mut()
            .entry(topic)
            .or_default()
            .push((id, Rc::new(handler)));
        id
    }

    /// Removes a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        for handlers in subscriptions.values_mut() {
            if let Some(pos) = handlers.iter().position(|(sub, _)| *sub == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Dispatches `message` to every current subscriber of its topic, in order.
    pub fn publish(&self, message: Message) {
        if self.is_halted() {
            trace!(topic = %message.topic(), "bus halted, dropping message");
            return;
        }

        let topic = message.topic();
        let handlers: Vec<Handler> = self
            .subscriptions
            .borrow()
            .get(&topic)
            .map(|subs| subs.iter().map(|(_, handler)| Rc::clone(handler)).collect())
            .unwrap_or_default();

        self.published.set(self.published.get() + 1);
        trace!(%topic, handlers = handlers.len(), "publish");

        for handler in handlers {
            if let Err(defect) = handler(self, &message) {
                error!(%topic, %defect, "handler reported a setup defect, halting bus");
                self.fault.borrow_mut().get_or_insert(defect);
            }
            // A nested publish may have faulted as well
            if self.is_halted() {
                return;
            }
        }
    }

    /// True once a handler has reported a defect.
    pub fn is_halted(&self) -> bool {
        self.fault.borrow().is_some()
    }

    /// Takes the recorded defect, re-opening the bus.
    pub fn take_fault(&self) -> Option<SimError> {
        self.fault.borrow_mut().take()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscriptions
            .borrow()
            .get(&topic)
            .map_or(0, |subs| subs.len())
    }

    /// Number of publish calls that were dispatched.
    pub fn published_count(&self) -> u64 {
        self.published.get()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<Topic, usize> = self
            .subscriptions
            .borrow()
            .iter()
            .map(|(topic, subs)| (*topic, subs.len()))
            .collect();
        f.debug_struct("MessageBus")
            .field("subscriptions", &counts)
            .field("halted", &self.is_halted())
            .field("published", &self.published.get())
            .finish()
    }
}
