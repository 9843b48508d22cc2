use crate::core::dataset::Dataset;
use crate::domain::model::{ReportId, StrategyId, Year};
use crate::utils::error::{EmissionError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyYear {
    pub strategy: StrategyId,
    pub delta: f64,
    /// Baseline minus the strategy's net delta.
    pub projected: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub year: Year,
    pub baseline: f64,
    pub strategies: Vec<StrategyYear>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyColumn {
    pub id: StrategyId,
    pub name: String,
}

/// Baseline and per-strategy results for every year of a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub report: ReportId,
    pub report_name: String,
    pub strategies: Vec<StrategyColumn>,
    pub rows: Vec<TimelineRow>,
}

impl Timeline {
    pub fn build(
        dataset: &Dataset,
        report: ReportId,
        from: Year,
        to: Year,
        max_span: u32,
    ) -> Result<Self> {
        if from > to {
            return Err(EmissionError::validation(format!(
                "timeline start {} is after end {}",
                from, to
            )));
        }
        let span = i64::from(to) - i64::from(from) + 1;
        if span > i64::from(max_span) {
            return Err(EmissionError::validation(format!(
                "timeline covers {} years, at most {} allowed",
                span, max_span
            )));
        }

        let report_entity = dataset.report(report)?;
        let strategies: Vec<StrategyColumn> = dataset
            .strategies_of(report)
            .map(|s| StrategyColumn {
                id: s.id,
                name: s.name.clone(),
            })
            .collect();

        let mut rows = Vec::with_capacity(span as usize);
        for year in from..=to {
            let baseline = dataset.report_year_emission(report, year)?;
            let strategies = strategies
                .iter()
                .map(|column| {
                    let delta = dataset.strategy_year_delta(column.id, year)?;
                    Ok(StrategyYear {
                        strategy: column.id,
                        delta,
                        projected: baseline - delta,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(TimelineRow {
                year,
                baseline,
                strategies,
            });
        }

        Ok(Self {
            report,
            report_name: report_entity.name.clone(),
            strategies,
            rows,
        })
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["year".to_string(), "baseline".to_string()];
        for column in &self.strategies {
            header.push(format!("{} delta", column.name));
            header.push(format!("{} projected", column.name));
        }
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.year.to_string(), row.baseline.to_string()];
            for cell in &row.strategies {
                record.push(cell.delta.to_string());
                record.push(cell.projected.to_string());
            }
            writer.write_record(&record)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        String::from_utf8(bytes).map_err(|e| EmissionError::ConfigError {
            message: format!("CSV output is not UTF-8: {}", e),
        })
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}
