//! Read models returned by the service.
//!
//! Derived fields (`total_emission`, `delta_total_emission`) are only filled
//! when the caller passed a parseable year; otherwise they serialize as `null`.

use crate::core::accounting::year_emission;
use crate::core::dataset::Dataset;
use crate::domain::model::{
    ModificationId, ReductionModification, ReductionStrategy, Report, ReportId, Source, SourceId,
    SourceOwner, StrategyId, Year,
};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

/// Parses the optional `year` query value. Anything that is not an integer
/// yields `None` rather than an error.
pub fn parse_year(raw: Option<&str>) -> Option<Year> {
    let raw = raw?;
    match raw.trim().parse::<Year>() {
        Ok(year) => Some(year),
        Err(e) => {
            tracing::debug!("Ignoring year parameter '{}': {}", raw, e);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceView {
    pub id: SourceId,
    pub description: Option<String>,
    pub value: f64,
    pub emission_factor: f64,
    pub total_emission: Option<f64>,
    pub lifetime: Option<u32>,
    pub acquisition_year: Option<Year>,
    pub report: Option<ReportId>,
    pub strategy: Option<StrategyId>,
}

impl SourceView {
    pub fn build(source: &Source, year: Option<Year>) -> Self {
        Self {
            id: source.id,
            description: source.description.clone(),
            value: source.value,
            emission_factor: source.emission_factor,
            total_emission: year.map(|y| year_emission(source, y)),
            lifetime: source.lifetime,
            acquisition_year: source.acquisition_year,
            report: source.owner.report(),
            strategy: source.owner.strategy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportView {
    pub id: ReportId,
    pub name: String,
    pub total_emission: Option<f64>,
    pub sources: Vec<SourceView>,
}

impl ReportView {
    pub fn build(dataset: &Dataset, report: &Report, year: Option<Year>) -> Result<Self> {
        let total_emission = match year {
            Some(y) => Some(dataset.report_year_emission(report.id, y)?),
            None => None,
        };
        Ok(Self {
            id: report.id,
            name: report.name.clone(),
            total_emission,
            sources: dataset
                .sources_of(SourceOwner::Report(report.id))
                .map(|s| SourceView::build(s, year))
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationView {
    pub id: ModificationId,
    pub source: SourceId,
    pub strategy: StrategyId,
    pub description: Option<String>,
    pub value_modification: Option<f64>,
    pub emission_factor_change: Option<f64>,
    pub order: u32,
    pub modification_start_year: Year,
    pub delta_total_emission: Option<f64>,
}

impl ModificationView {
    pub fn build(
        dataset: &Dataset,
        modification: &ReductionModification,
        year: Option<Year>,
    ) -> Result<Self> {
        let delta_total_emission = match year {
            Some(y) => Some(dataset.modification_year_delta(modification.id, y)?),
            None => None,
        };
        Ok(Self {
            id: modification.id,
            source: modification.source,
            strategy: modification.strategy,
            description: modification.description.clone(),
            value_modification: modification.value_modification,
            emission_factor_change: modification.emission_factor_change,
            order: modification.order,
            modification_start_year: modification.modification_start_year,
            delta_total_emission,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyView {
    pub id: StrategyId,
    pub report: ReportId,
    pub name: String,
    pub delta_total_emission: Option<f64>,
    pub modifications: Vec<ModificationView>,
    pub sources: Vec<SourceView>,
}

impl StrategyView {
    pub fn build(
        dataset: &Dataset,
        strategy: &ReductionStrategy,
        year: Option<Year>,
    ) -> Result<Self> {
        let delta_total_emission = match year {
            Some(y) => Some(dataset.strategy_year_delta(strategy.id, y)?),
            None => None,
        };
        let modifications = dataset
            .modifications_of(strategy.id)
            .map(|m| ModificationView::build(dataset, m, year))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: strategy.id,
            report: strategy.report,
            name: strategy.name.clone(),
            delta_total_emission,
            modifications,
            sources: dataset
                .sources_of(SourceOwner::Strategy(strategy.id))
                .map(|s| SourceView::build(s, year))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::NewSource;

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year(Some("2020")), Some(2020));
        assert_eq!(parse_year(Some(" 1999 ")), Some(1999));
        assert_eq!(parse_year(Some("abc")), None);
        assert_eq!(parse_year(Some("2020.5")), None);
        assert_eq!(parse_year(Some("")), None);
        assert_eq!(parse_year(None), None);
    }

    #[test]
    fn test_report_view_derived_fields() {
        let mut ds = Dataset::new();
        let report = ds.insert_report("Report 1").unwrap();
        ds.insert_source(SourceOwner::Report(report.id), NewSource::new(1.0, 10.0))
            .unwrap();

        let view = ReportView::build(&ds, &report, Some(2020)).unwrap();
        assert_eq!(view.total_emission, Some(10.0));
        assert_eq!(view.sources[0].total_emission, Some(10.0));
        assert_eq!(view.sources[0].report, Some(report.id));
        assert_eq!(view.sources[0].strategy, None);

        let view = ReportView::build(&ds, &report, None).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["total_emission"].is_null());
        assert!(json["sources"][0]["total_emission"].is_null());
    }
}
