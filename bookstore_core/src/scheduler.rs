//! Step scheduler - activates every agent once per tick.

use crate::agents::{Agent, StepEnv};
use crate::bus::MessageBus;
use bookstore_env::{SimContext, SimResult};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Order in which agents act within a tick.
///
/// When stock is scarce, an earlier agent's purchase can exhaust it and a later
/// one sees `purchase_fail` purely because of this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOrder {
    /// Roster insertion order every tick
    Sequential,
    /// Fresh random permutation every tick
    #[default]
    Shuffled,
}

impl std::fmt::Display for ActivationOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationOrder::Sequential => write!(f, "sequential"),
            ActivationOrder::Shuffled => write!(f, "shuffled"),
        }
    }
}

impl std::str::FromStr for ActivationOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" | "fixed" | "insertion" => Ok(ActivationOrder::Sequential),
            "shuffled" | "random" => Ok(ActivationOrder::Shuffled),
            _ => Err(format!("Unknown activation order: {}", s)),
        }
    }
}

/// Agent roster plus the tick counter.
pub struct Scheduler {
    agents: Vec<Box<dyn Agent>>,
    order: ActivationOrder,
    tick: u64,
}

impl Scheduler {
    pub fn new(order: ActivationOrder) -> Self {
        Self {
            agents: Vec::new(),
            order,
            tick: 0,
        }
    }

    pub fn add(&mut self, agent: Box<dyn Agent>) {
        self.agents.push(agent);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn order(&self) -> ActivationOrder {
        self.order
    }

    /// Ticks completed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Roster ids in insertion order.
    pub fn agent_ids(&self) -> Vec<&str> {
        self.agents.iter().map(|agent| agent.id()).collect()
    }

    /// Roster indices in the order they act this tick.
    pub fn activation_sequence(&self, ctx: &mut SimContext) -> Vec<usize> {
        let mut sequence: Vec<usize> = (0..self.agents.len()).collect();
        if self.order == ActivationOrder::Shuffled {
            ctx.shuffle(&mut sequence);
        }
        sequence
    }

    /// Runs one tick: every agent steps once, then the counter advances.
    ///
    /// A defect raised by an agent or by any handler it triggered aborts the
    /// tick, and the counter is left unchanged.
    pub fn step(&mut self, bus: &MessageBus, ctx: &mut SimContext) -> SimResult<u64> {
        let sequence = self.activation_sequence(ctx);
        let tick = self.tick;

        for index in sequence {
            let agent = &mut self.agents[index];
            trace!(tick, agent = agent.id(), "activate");

            agent.step(&mut StepEnv {
                tick,
                bus,
                ctx: &mut *ctx,
            })?;
            if let Some(defect) = bus.take_fault() {
                return Err(defect);
            }
        }

        self.tick += 1;
        Ok(tick)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("agents", &self.agent_ids())
            .field("order", &self.order)
            .field("tick", &self.tick)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_env::{BookId, SimError};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        id: String,
        trace: Rc<RefCell<Vec<String>>>,
    }

    impl Agent for Recorder {
        fn id(&self) -> &str {
            &self.id
        }

        fn step(&mut self, env: &mut StepEnv<'_>) -> SimResult<()> {
            self.trace.borrow_mut().push(format!("{}@{}", self.id, env.tick));
            Ok(())
        }
    }

    struct Faulty;

    impl Agent for Faulty {
        fn id(&self) -> &str {
            "faulty"
        }

        fn step(&mut self, _env: &mut StepEnv<'_>) -> SimResult<()> {
            Err(SimError::UnknownBook(BookId::new("Book_Missing")))
        }
    }

    fn roster(order: ActivationOrder, trace: &Rc<RefCell<Vec<String>>>) -> Scheduler {
        let mut scheduler = Scheduler::new(order);
        for id in ["a", "b", "c", "d"] {
            scheduler.add(Box::new(Recorder {
                id: id.to_string(),
                trace: Rc::clone(trace),
            }));
        }
        scheduler
    }

    #[test]
    fn test_sequential_order() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = roster(ActivationOrder::Sequential, &trace);
        let bus = MessageBus::new();
        let mut ctx = SimContext::new(42);

        assert_eq!(scheduler.tick(), 0);
        scheduler.step(&bus, &mut ctx).unwrap();
        scheduler.step(&bus, &mut ctx).unwrap();

        assert_eq!(scheduler.tick(), 2);
        assert_eq!(
            *trace.borrow(),
            vec!["a@0", "b@0", "c@0", "d@0", "a@1", "b@1", "c@1", "d@1"]
        );
    }

    #[test]
    fn test_shuffled_is_permutation_and_deterministic() {
        let bus = MessageBus::new();
        let run = |seed| {
            let trace = Rc::new(RefCell::new(Vec::new()));
            let mut scheduler = roster(ActivationOrder::Shuffled, &trace);
            let mut ctx = SimContext::new(seed);
            for _ in 0..5 {
                scheduler.step(&bus, &mut ctx).unwrap();
            }
            let trace = trace.borrow().clone();
            trace
        };

        let first = run(7);
        assert_eq!(first, run(7));
        assert_eq!(first.len(), 20);

        for tick in 0..5 {
            let mut ids: Vec<&str> = first[tick * 4..tick * 4 + 4]
                .iter()
                .map(|entry| &entry[..1])
                .collect();
            ids.sort();
            assert_eq!(ids, vec!["a", "b", "c", "d"]);
        }
    }

    #[test]
    fn test_defect_aborts_tick() {
        let mut scheduler = Scheduler::new(ActivationOrder::Sequential);
        scheduler.add(Box::new(Faulty));
        let bus = MessageBus::new();
        let mut ctx = SimContext::new(1);

        let err = scheduler.step(&bus, &mut ctx).unwrap_err();
        assert_eq!(err, SimError::UnknownBook(BookId::new("Book_Missing")));
        assert_eq!(scheduler.tick(), 0);
    }

    #[test]
    fn test_activation_order_parse() {
        assert_eq!("random".parse::<ActivationOrder>(), Ok(ActivationOrder::Shuffled));
        assert_eq!(
            "Sequential".parse::<ActivationOrder>(),
            Ok(ActivationOrder::Sequential)
        );
        assert!("sideways".parse::<ActivationOrder>().is_err());
    }
}
