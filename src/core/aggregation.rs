use crate::core::accounting::year_emission;
use crate::core::ledger::Ledger;
use crate::domain::model::{Source, Year};

/// Baseline emission of a report: the sum over the sources it owns directly.
pub fn report_year_emission<'a, I>(sources: I, year: Year) -> f64
where
    I: IntoIterator<Item = &'a Source>,
{
    sources.into_iter().map(|s| year_emission(s, year)).sum()
}

/// Net reduction of a strategy in `year`.
///
/// `ledgers` holds one ledger per source of the parent report (sources
/// without modifications contribute nothing). `new_sources` are the sources
/// the strategy introduces; their emission is subtracted from the savings.
pub fn strategy_year_delta<'a, L, S>(ledgers: L, new_sources: S, year: Year) -> f64
where
    L: IntoIterator<Item = Ledger<'a>>,
    S: IntoIterator<Item = &'a Source>,
{
    let total_delta: f64 = ledgers
        .into_iter()
        .map(|ledger| ledger.year_delta_emission(year))
        .sum();
    let total_new_sources = report_year_emission(new_sources, year);
    total_delta - total_new_sources
}
