use serde::{Deserialize, Serialize};

/// Calendar year.
pub type Year = i32;

pub type ReportId = u64;
pub type SourceId = u64;
pub type StrategyId = u64;
pub type ModificationId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub name: String,
}

/// 來源只能掛在報告或減量策略其中之一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceOwner {
    Report(ReportId),
    Strategy(StrategyId),
}

impl SourceOwner {
    pub fn report(&self) -> Option<ReportId> {
        match self {
            SourceOwner::Report(id) => Some(*id),
            SourceOwner::Strategy(_) => None,
        }
    }

    pub fn strategy(&self) -> Option<StrategyId> {
        match self {
            SourceOwner::Report(_) => None,
            SourceOwner::Strategy(id) => Some(*id),
        }
    }
}

/// A single GHG-emitting item.
///
/// `value * emission_factor` is the total emission in kg. When `lifetime` is
/// set the total is spread over that many years starting at
/// `acquisition_year`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub owner: SourceOwner,
    #[serde(default)]
    pub description: Option<String>,
    pub value: f64,
    pub emission_factor: f64,
    #[serde(default)]
    pub lifetime: Option<u32>,
    #[serde(default)]
    pub acquisition_year: Option<Year>,
}

impl Source {
    pub fn total_emission(&self) -> f64 {
        self.value * self.emission_factor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionStrategy {
    pub id: StrategyId,
    pub report: ReportId,
    pub name: String,
}

/// One entry of a (source, strategy) ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionModification {
    pub id: ModificationId,
    pub source: SourceId,
    pub strategy: StrategyId,
    #[serde(default)]
    pub description: Option<String>,
    /// Added to the running value.
    #[serde(default)]
    pub value_modification: Option<f64>,
    /// Replaces the running emission factor.
    #[serde(default)]
    pub emission_factor_change: Option<f64>,
    pub order: u32,
    pub modification_start_year: Year,
}

/// Source fields supplied on create and update. The owner is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSource {
    #[serde(default)]
    pub description: Option<String>,
    pub value: f64,
    pub emission_factor: f64,
    #[serde(default)]
    pub lifetime: Option<u32>,
    #[serde(default)]
    pub acquisition_year: Option<Year>,
}

impl NewSource {
    pub fn new(value: f64, emission_factor: f64) -> Self {
        Self {
            value,
            emission_factor,
            ..Default::default()
        }
    }

    pub fn with_lifetime(mut self, lifetime: u32, acquisition_year: Year) -> Self {
        self.lifetime = Some(lifetime);
        self.acquisition_year = Some(acquisition_year);
        self
    }

    pub fn acquired_in(mut self, acquisition_year: Year) -> Self {
        self.acquisition_year = Some(acquisition_year);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Modification candidate. `order` is assigned when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewModification {
    pub source: SourceId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value_modification: Option<f64>,
    #[serde(default)]
    pub emission_factor_change: Option<f64>,
    #[serde(default)]
    pub order: Option<u32>,
    pub modification_start_year: Year,
}

impl NewModification {
    pub fn new(source: SourceId, modification_start_year: Year) -> Self {
        Self {
            source,
            modification_start_year,
            ..Default::default()
        }
    }

    pub fn value_modification(mut self, delta: f64) -> Self {
        self.value_modification = Some(delta);
        self
    }

    pub fn emission_factor_change(mut self, factor: f64) -> Self {
        self.emission_factor_change = Some(factor);
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Mutable fields of an existing modification. Source, strategy and order stay fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value_modification: Option<f64>,
    #[serde(default)]
    pub emission_factor_change: Option<f64>,
    pub modification_start_year: Year,
}

/// Where a source is read or written from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceScope {
    Report(ReportId),
    Strategy {
        report: ReportId,
        strategy: StrategyId,
    },
}

impl SourceScope {
    pub fn owner(&self) -> SourceOwner {
        match self {
            SourceScope::Report(report) => SourceOwner::Report(*report),
            SourceScope::Strategy { strategy, .. } => SourceOwner::Strategy(*strategy),
        }
    }
}
