//! In-memory entity graph: reports, sources, strategies and modifications.
//!
//! Every write goes through a method here so that ownership, the lifetime /
//! acquisition_year pairing and the ledger ordering hold for everything that
//! is stored. Identities come from one increasing sequence per entity kind
//! and collections iterate in identity order.

use crate::core::aggregation;
use crate::core::ledger::Ledger;
use crate::domain::model::{
    ModificationId, ModificationUpdate, NewModification, NewSource, ReductionModification,
    ReductionStrategy, Report, ReportId, Source, SourceId, SourceOwner, StrategyId, Year,
};
use crate::utils::error::{EmissionError, Result};
use crate::utils::validation::{validate_finite, validate_name};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSequence {
    pub report: u64,
    pub source: u64,
    pub strategy: u64,
    pub modification: u64,
}

/// Serialized form of a [`Dataset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub sequence: IdSequence,
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub strategies: Vec<ReductionStrategy>,
    #[serde(default)]
    pub modifications: Vec<ReductionModification>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    sequence: IdSequence,
    reports: BTreeMap<ReportId, Report>,
    sources: BTreeMap<SourceId, Source>,
    strategies: BTreeMap<StrategyId, ReductionStrategy>,
    modifications: BTreeMap<ModificationId, ReductionModification>,
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

fn check_source_fields(fields: &NewSource) -> Result<()> {
    validate_finite("value", fields.value)?;
    validate_finite("emission_factor", fields.emission_factor)?;
    if fields.lifetime == Some(0) {
        return Err(EmissionError::validation("lifetime must be a positive number of years"));
    }
    if fields.lifetime.is_some() && fields.acquisition_year.is_none() {
        return Err(EmissionError::integrity(
            "acquisition_year must be set when lifetime is set",
        ));
    }
    Ok(())
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- snapshot -------------------------------------------------------

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            sequence: self.sequence,
            reports: self.reports.values().cloned().collect(),
            sources: self.sources.values().cloned().collect(),
            strategies: self.strategies.values().cloned().collect(),
            modifications: self.modifications.values().cloned().collect(),
        }
    }

    /// Rebuilds a dataset and re-checks every integrity rule.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EmissionError::ConfigError {
                message: format!(
                    "unsupported snapshot version {} (expected {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }

        let mut dataset = Dataset {
            sequence: snapshot.sequence,
            ..Default::default()
        };
        for report in snapshot.reports {
            dataset.reports.insert(report.id, report);
        }
        for strategy in snapshot.strategies {
            dataset.strategies.insert(strategy.id, strategy);
        }
        for source in snapshot.sources {
            dataset.sources.insert(source.id, source);
        }
        for modification in snapshot.modifications {
            dataset.modifications.insert(modification.id, modification);
        }

        dataset.check_integrity()?;
        Ok(dataset)
    }

    fn check_integrity(&mut self) -> Result<()> {
        for strategy in self.strategies.values() {
            if !self.reports.contains_key(&strategy.report) {
                return Err(EmissionError::integrity(format!(
                    "strategy {} belongs to missing report {}",
                    strategy.id, strategy.report
                )));
            }
        }

        for source in self.sources.values() {
            self.require_owner(source.owner)?;
            check_source_fields(&NewSource {
                description: None,
                value: source.value,
                emission_factor: source.emission_factor,
                lifetime: source.lifetime,
                acquisition_year: source.acquisition_year,
            })?;
        }

        // 每組 (source, strategy) 依 order 重播一次，確認起始年份不遞減
        let mut pairs: BTreeMap<(SourceId, StrategyId), Vec<&ReductionModification>> =
            BTreeMap::new();
        for m in self.modifications.values() {
            self.modification_target(m.strategy, m.source)?;
            pairs.entry((m.source, m.strategy)).or_default().push(m);
        }
        for ((source_id, _), mut entries) in pairs {
            entries.sort_by_key(|m| m.order);
            let acquired = self.sources.get(&source_id).and_then(|s| s.acquisition_year);
            let mut floor = acquired;
            let mut last_order: Option<u32> = None;
            for m in entries {
                if last_order == Some(m.order) {
                    return Err(EmissionError::integrity(format!(
                        "duplicate order {} for source {} in strategy {}",
                        m.order, m.source, m.strategy
                    )));
                }
                if matches!(floor, Some(f) if m.modification_start_year < f) {
                    return Err(EmissionError::integrity(format!(
                        "modification {} starts before an earlier ledger entry or the acquisition year",
                        m.id
                    )));
                }
                floor = Some(m.modification_start_year);
                last_order = Some(m.order);
            }
        }

        // 舊快照可能缺少序號，補到目前最大值
        let seq = &mut self.sequence;
        seq.report = seq.report.max(self.reports.keys().max().copied().unwrap_or(0));
        seq.source = seq.source.max(self.sources.keys().max().copied().unwrap_or(0));
        seq.strategy = seq
            .strategy
            .max(self.strategies.keys().max().copied().unwrap_or(0));
        seq.modification = seq
            .modification
            .max(self.modifications.keys().max().copied().unwrap_or(0));
        Ok(())
    }

    // ---- lookups --------------------------------------------------------

    pub fn report(&self, id: ReportId) -> Result<&Report> {
        self.reports
            .get(&id)
            .ok_or_else(|| EmissionError::not_found("report", id))
    }

    pub fn source(&self, id: SourceId) -> Result<&Source> {
        self.sources
            .get(&id)
            .ok_or_else(|| EmissionError::not_found("source", id))
    }

    pub fn strategy(&self, id: StrategyId) -> Result<&ReductionStrategy> {
        self.strategies
            .get(&id)
            .ok_or_else(|| EmissionError::not_found("strategy", id))
    }

    pub fn modification(&self, id: ModificationId) -> Result<&ReductionModification> {
        self.modifications
            .get(&id)
            .ok_or_else(|| EmissionError::not_found("modification", id))
    }

    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.reports.values()
    }

    pub fn sources_of(&self, owner: SourceOwner) -> impl Iterator<Item = &Source> {
        self.sources.values().filter(move |s| s.owner == owner)
    }

    pub fn strategies_of(&self, report: ReportId) -> impl Iterator<Item = &ReductionStrategy> {
        self.strategies.values().filter(move |s| s.report == report)
    }

    pub fn modifications_of(
        &self,
        strategy: StrategyId,
    ) -> impl Iterator<Item = &ReductionModification> {
        self.modifications
            .values()
            .filter(move |m| m.strategy == strategy)
    }

    /// The ledger of one (source, strategy) pair.
    pub fn ledger(&self, source: SourceId, strategy: StrategyId) -> Result<Ledger<'_>> {
        let source = self.source(source)?;
        Ok(self.ledger_for(source, strategy))
    }

    fn ledger_for<'a>(&'a self, source: &'a Source, strategy: StrategyId) -> Ledger<'a> {
        Ledger::new(
            source,
            self.modifications
                .values()
                .filter(move |m| m.source == source.id && m.strategy == strategy),
        )
    }

    fn require_owner(&self, owner: SourceOwner) -> Result<()> {
        let found = match owner {
            SourceOwner::Report(id) => self.report(id).map(|_| ()),
            SourceOwner::Strategy(id) => self.strategy(id).map(|_| ()),
        };
        found.map_err(|_| {
            EmissionError::integrity(format!(
                "source must be attached to an existing report or strategy, got {:?}",
                owner
            ))
        })
    }

    /// Modifications may only target sources of the strategy's parent report.
    fn modification_target(
        &self,
        strategy: StrategyId,
        source: SourceId,
    ) -> Result<(&ReductionStrategy, &Source)> {
        let strategy = self.strategy(strategy)?;
        let source = self.source(source)?;
        if source.owner != SourceOwner::Report(strategy.report) {
            return Err(EmissionError::integrity(format!(
                "source {} does not belong to report {} of strategy {}",
                source.id, strategy.report, strategy.id
            )));
        }
        Ok((strategy, source))
    }

    // ---- accounting -----------------------------------------------------

    pub fn report_year_emission(&self, report: ReportId, year: Year) -> Result<f64> {
        self.report(report)?;
        Ok(aggregation::report_year_emission(
            self.sources_of(SourceOwner::Report(report)),
            year,
        ))
    }

    pub fn strategy_year_delta(&self, strategy: StrategyId, year: Year) -> Result<f64> {
        let strategy = self.strategy(strategy)?;
        let ledgers = self
            .sources_of(SourceOwner::Report(strategy.report))
            .map(|source| self.ledger_for(source, strategy.id));
        Ok(aggregation::strategy_year_delta(
            ledgers,
            self.sources_of(SourceOwner::Strategy(strategy.id)),
            year,
        ))
    }

    /// Delta of the ledger the modification belongs to.
    pub fn modification_year_delta(&self, modification: ModificationId, year: Year) -> Result<f64> {
        let m = self.modification(modification)?;
        Ok(self.ledger(m.source, m.strategy)?.year_delta_emission(year))
    }

    // ---- reports --------------------------------------------------------

    pub fn insert_report(&mut self, name: &str) -> Result<Report> {
        validate_name("name", name)?;
        let report = Report {
            id: next_id(&mut self.sequence.report),
            name: name.trim().to_string(),
        };
        self.reports.insert(report.id, report.clone());
        Ok(report)
    }

    pub fn rename_report(&mut self, id: ReportId, name: &str) -> Result<Report> {
        validate_name("name", name)?;
        let report = self
            .reports
            .get_mut(&id)
            .ok_or_else(|| EmissionError::not_found("report", id))?;
        report.name = name.trim().to_string();
        Ok(report.clone())
    }

    pub fn remove_report(&mut self, id: ReportId) -> Result<Report> {
        let report = self
            .reports
            .remove(&id)
            .ok_or_else(|| EmissionError::not_found("report", id))?;

        let strategies: Vec<StrategyId> = self.strategies_of(id).map(|s| s.id).collect();
        for strategy in strategies {
            self.remove_strategy(strategy)?;
        }
        let sources: Vec<SourceId> = self.sources_of(SourceOwner::Report(id)).map(|s| s.id).collect();
        for source in sources {
            self.remove_source(source)?;
        }
        Ok(report)
    }

    // ---- sources --------------------------------------------------------

    pub fn insert_source(&mut self, owner: SourceOwner, fields: NewSource) -> Result<Source> {
        self.require_owner(owner)?;
        check_source_fields(&fields)?;
        let source = Source {
            id: next_id(&mut self.sequence.source),
            owner,
            description: fields.description,
            value: fields.value,
            emission_factor: fields.emission_factor,
            lifetime: fields.lifetime,
            acquisition_year: fields.acquisition_year,
        };
        self.sources.insert(source.id, source.clone());
        Ok(source)
    }

    /// Replaces the fields of a source. The owner never changes.
    pub fn update_source(&mut self, id: SourceId, fields: NewSource) -> Result<Source> {
        check_source_fields(&fields)?;
        self.source(id)?;

        if let Some(acquired) = fields.acquisition_year {
            if let Some(m) = self
                .modifications
                .values()
                .find(|m| m.source == id && m.modification_start_year < acquired)
            {
                return Err(EmissionError::validation(format!(
                    "acquisition_year {} is later than modification {} starting in {}",
                    acquired, m.id, m.modification_start_year
                )));
            }
        }

        let source = self
            .sources
            .get_mut(&id)
            .ok_or_else(|| EmissionError::not_found("source", id))?;
        source.description = fields.description;
        source.value = fields.value;
        source.emission_factor = fields.emission_factor;
        source.lifetime = fields.lifetime;
        source.acquisition_year = fields.acquisition_year;
        Ok(source.clone())
    }

    pub fn remove_source(&mut self, id: SourceId) -> Result<Source> {
        let source = self
            .sources
            .remove(&id)
            .ok_or_else(|| EmissionError::not_found("source", id))?;
        self.modifications.retain(|_, m| m.source != id);
        Ok(source)
    }

    // ---- strategies -----------------------------------------------------

    pub fn insert_strategy(&mut self, report: ReportId, name: &str) -> Result<ReductionStrategy> {
        self.report(report)?;
        validate_name("name", name)?;
        let strategy = ReductionStrategy {
            id: next_id(&mut self.sequence.strategy),
            report,
            name: name.trim().to_string(),
        };
        self.strategies.insert(strategy.id, strategy.clone());
        Ok(strategy)
    }

    pub fn rename_strategy(&mut self, id: StrategyId, name: &str) -> Result<ReductionStrategy> {
        validate_name("name", name)?;
        let strategy = self
            .strategies
            .get_mut(&id)
            .ok_or_else(|| EmissionError::not_found("strategy", id))?;
        strategy.name = name.trim().to_string();
        Ok(strategy.clone())
    }

    pub fn remove_strategy(&mut self, id: StrategyId) -> Result<ReductionStrategy> {
        let strategy = self
            .strategies
            .remove(&id)
            .ok_or_else(|| EmissionError::not_found("strategy", id))?;
        self.modifications.retain(|_, m| m.strategy != id);
        let sources: Vec<SourceId> = self.sources_of(SourceOwner::Strategy(id)).map(|s| s.id).collect();
        for source in sources {
            self.remove_source(source)?;
        }
        Ok(strategy)
    }

    // ---- modifications --------------------------------------------------

    /// Validates the candidate against its ledger, then appends it.
    pub fn append_modification(
        &mut self,
        strategy: StrategyId,
        candidate: NewModification,
    ) -> Result<ReductionModification> {
        let (_, source) = self.modification_target(strategy, candidate.source)?;
        let ordered = self.ledger_for(source, strategy).validate(candidate)?;

        let NewModification {
            source,
            description,
            value_modification,
            emission_factor_change,
            modification_start_year,
            ..
        } = ordered.modification;
        let modification = ReductionModification {
            id: next_id(&mut self.sequence.modification),
            source,
            strategy,
            description,
            value_modification,
            emission_factor_change,
            order: ordered.order,
            modification_start_year,
        };
        self.modifications
            .insert(modification.id, modification.clone());
        Ok(modification)
    }

    /// Updates a modification in place; the new start year must stay between
    /// its neighbours in the ledger.
    pub fn update_modification(
        &mut self,
        id: ModificationId,
        update: ModificationUpdate,
    ) -> Result<ReductionModification> {
        crate::utils::validation::validate_optional_finite(
            "value_modification",
            update.value_modification,
        )?;
        crate::utils::validation::validate_optional_finite(
            "emission_factor_change",
            update.emission_factor_change,
        )?;

        let current = self.modification(id)?;
        let (lower, upper) = self
            .ledger(current.source, current.strategy)?
            .start_year_bounds(current.order);
        let start = update.modification_start_year;
        if matches!(lower, Some(l) if start < l) || matches!(upper, Some(u) if start > u) {
            return Err(EmissionError::validation(format!(
                "modification_start_year {} must stay within {}..={} to keep the ledger ordered",
                start,
                lower.map_or("-".to_string(), |y| y.to_string()),
                upper.map_or("-".to_string(), |y| y.to_string()),
            )));
        }

        let modification = self
            .modifications
            .get_mut(&id)
            .ok_or_else(|| EmissionError::not_found("modification", id))?;
        modification.description = update.description;
        modification.value_modification = update.value_modification;
        modification.emission_factor_change = update.emission_factor_change;
        modification.modification_start_year = start;
        Ok(modification.clone())
    }

    pub fn remove_modification(&mut self, id: ModificationId) -> Result<ReductionModification> {
        self.modifications
            .remove(&id)
            .ok_or_else(|| EmissionError::not_found("modification", id))
    }
}
