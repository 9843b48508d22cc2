//! Per-source yearly emission with acquisition and lifetime windowing.

use crate::domain::model::{Source, Year};

/// `start + lifetime < year`, computed without overflow.
pub(crate) fn window_closed_before(start: Year, lifetime: u32, year: Year) -> bool {
    i64::from(start) + i64::from(lifetime) < i64::from(year)
}

/// The source is not acquired yet in `year`.
pub(crate) fn not_yet_acquired(source: &Source, year: Year) -> bool {
    matches!(source.acquisition_year, Some(acquired) if acquired > year)
}

/// The source's lifetime window has closed before `year`.
pub(crate) fn fully_amortized(source: &Source, year: Year) -> bool {
    match (source.acquisition_year, source.lifetime) {
        (Some(acquired), Some(lifetime)) => window_closed_before(acquired, lifetime, year),
        _ => false,
    }
}

/// Divides by the lifetime when the source is amortized.
pub(crate) fn amortize(source: &Source, total: f64) -> f64 {
    match source.lifetime {
        Some(lifetime) if lifetime > 0 => total / f64::from(lifetime),
        _ => total,
    }
}

/// Emission attributed to `source` in `year`.
///
/// Sources without a lifetime are recognized in full in every active year.
/// Sources with a lifetime contribute `total / lifetime` per year until
/// `acquisition_year + lifetime`, inclusive.
pub fn year_emission(source: &Source, year: Year) -> f64 {
    if not_yet_acquired(source, year) || fully_amortized(source, year) {
        return 0.0;
    }
    amortize(source, source.total_emission())
}
