//! Future-PSI labels for a reference timestamp

use crate::core_types::psi::PsiSeries;
use crate::training::Horizon;
use chrono::{DateTime, Duration, Utc};

/// Label for each horizon, in [`Horizon::ALL`] order
///
/// A horizon resolves to the reading closest to `reference + horizon`, and
/// only if it lies within `tolerance` of that instant.
pub fn resolve_targets(series: &PsiSeries, reference: DateTime<Utc>, tolerance: Duration) -> [Option<f64>; 4] {
    Horizon::ALL.map(|h| series.nearest_within(reference + h.duration(), tolerance))
}

/// All four labels, or the first horizon that could not be resolved
pub fn complete_targets(
    series: &PsiSeries,
    reference: DateTime<Utc>,
    tolerance: Duration,
) -> Result<[f64; 4], Horizon> {
    let resolved = resolve_targets(series, reference, tolerance);
    let mut values = [0.0; 4];
    for (i, h) in Horizon::ALL.into_iter().enumerate() {
        values[i] = resolved[i].ok_or(h)?;
    }
    Ok(values)
}
