//! Named bookstore scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Default roster and classic catalog, audited end to end
    Baseline,

    /// One inventory of 5, threshold 3: a qty-4 purchase succeeds, a qty-2 one fails
    ScarceStock,

    /// An employee tops up only the inventory it manages once it runs low
    ManagedRestock,

    /// Two customers race for the same stock within one tick
    ContendedTick,

    /// Every employee restocks every inventory, random purchase quantities
    GlobalRestock,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::ScarceStock,
            ScenarioId::ManagedRestock,
            ScenarioId::ContendedTick,
            ScenarioId::GlobalRestock,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::ScarceStock => "scarce_stock",
            ScenarioId::ManagedRestock => "managed_restock",
            ScenarioId::ContendedTick => "contended_tick",
            ScenarioId::GlobalRestock => "global_restock",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Configured roster over the classic catalog, oracle audit",
            ScenarioId::ScarceStock => "Purchase drains stock below threshold, oversized follow-up is rejected",
            ScenarioId::ManagedRestock => "Managing employee restocks its low inventory back to target",
            ScenarioId::ContendedTick => "Same-tick purchases exceed stock, first activation wins",
            ScenarioId::GlobalRestock => "All employees restock all inventories, uniform 1..=3 quantities",
        }
    }

    /// True when the scenario runs the caller's configuration rather than a
    /// fixed setup.
    pub fn is_configurable(&self) -> bool {
        matches!(self, ScenarioId::Baseline | ScenarioId::GlobalRestock)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "default" => Ok(ScenarioId::Baseline),
            "scarce_stock" | "scarcestock" | "a" => Ok(ScenarioId::ScarceStock),
            "managed_restock" | "managedrestock" | "b" => Ok(ScenarioId::ManagedRestock),
            "contended_tick" | "contendedtick" | "c" => Ok(ScenarioId::ContendedTick),
            "global_restock" | "globalrestock" => Ok(ScenarioId::GlobalRestock),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
