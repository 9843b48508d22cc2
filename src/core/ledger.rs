//! Ordered modification ledger of one (source, strategy) pair.
//!
//! Entries are replayed in ascending `order`. An emission factor change
//! replaces the running factor, a value modification is added to the running
//! value. Each entry is cut off by the source's own lifetime window counted
//! from the entry's start year.

use crate::core::accounting::{self, window_closed_before};
use crate::domain::model::{NewModification, ReductionModification, Source, Year};
use crate::utils::error::{EmissionError, Result};
use crate::utils::validation::validate_optional_finite;

/// A candidate that passed validation and carries its ledger position.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedModification {
    pub order: u32,
    pub modification: NewModification,
}

#[derive(Debug, Clone)]
pub struct Ledger<'a> {
    source: &'a Source,
    entries: Vec<&'a ReductionModification>,
}

impl<'a> Ledger<'a> {
    /// Entries may arrive in any order; they are sorted by `order`.
    pub fn new<I>(source: &'a Source, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a ReductionModification>,
    {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by_key(|m| m.order);
        Self { source, entries }
    }

    pub fn latest_start_year(&self) -> Option<Year> {
        self.entries.iter().map(|m| m.modification_start_year).max()
    }

    pub fn max_order(&self) -> Option<u32> {
        self.entries.last().map(|m| m.order)
    }

    pub fn next_order(&self) -> Result<u32> {
        match self.max_order() {
            None => Ok(0),
            Some(max) => max.checked_add(1).ok_or_else(|| {
                EmissionError::validation(format!(
                    "order space exhausted for source {}: last order is {}",
                    self.source.id, max
                ))
            }),
        }
    }

    /// Checks a candidate against this ledger and assigns its order.
    pub fn validate(&self, candidate: NewModification) -> Result<OrderedModification> {
        validate_optional_finite("value_modification", candidate.value_modification)?;
        validate_optional_finite("emission_factor_change", candidate.emission_factor_change)?;

        let start = candidate.modification_start_year;

        if let Some(latest) = self.latest_start_year() {
            if start < latest {
                return Err(EmissionError::validation(format!(
                    "modification_start_year {} is earlier than the latest modification ({}) for source {}",
                    start, latest, self.source.id
                )));
            }
        }

        if let Some(acquired) = self.source.acquisition_year {
            if start < acquired {
                return Err(EmissionError::validation(format!(
                    "modification_start_year {} is earlier than the source acquisition_year {}",
                    start, acquired
                )));
            }
        }

        let order = match candidate.order {
            None => self.next_order()?,
            Some(requested) => {
                if let Some(max) = self.max_order() {
                    if requested <= max {
                        return Err(EmissionError::validation(format!(
                            "order {} must be greater than the current last order {}",
                            requested, max
                        )));
                    }
                }
                requested
            }
        };

        Ok(OrderedModification {
            order,
            modification: candidate,
        })
    }

    /// Bounds allowed for a new start year of the entry at `order`, given its
    /// neighbours in the ledger.
    pub fn start_year_bounds(&self, order: u32) -> (Option<Year>, Option<Year>) {
        let lower = self
            .entries
            .iter()
            .filter(|m| m.order < order)
            .map(|m| m.modification_start_year)
            .max();
        let upper = self
            .entries
            .iter()
            .filter(|m| m.order > order)
            .map(|m| m.modification_start_year)
            .min();
        let lower = match (lower, self.source.acquisition_year) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        (lower, upper)
    }

    /// Baseline emission minus modified emission for `year`.
    ///
    /// Positive means the modifications reduce emissions.
    pub fn year_delta_emission(&self, year: Year) -> f64 {
        let source = self.source;
        if accounting::not_yet_acquired(source, year) {
            return 0.0;
        }

        let mut cumul_value = source.value;
        let mut cumul_emission_factor = source.emission_factor;
        if accounting::fully_amortized(source, year) {
            cumul_value = 0.0;
        }

        for modification in self
            .entries
            .iter()
            .filter(|m| m.modification_start_year <= year)
        {
            if let Some(factor) = modification.emission_factor_change {
                cumul_emission_factor = factor;
            }
            if let Some(lifetime) = source.lifetime {
                if window_closed_before(modification.modification_start_year, lifetime, year) {
                    break;
                }
            }
            if let Some(delta) = modification.value_modification {
                cumul_value += delta;
            }
        }

        let total_emission = accounting::year_emission(source, year);
        let emission_modified =
            accounting::amortize(source, (cumul_emission_factor * cumul_value).max(0.0));

        total_emission - emission_modified
    }
}
