//! Persistence baseline: current PSI rescaled onto the 0-100 feature range

/// PSI value that maps to a baseline score of 100
pub const PSI_CAP: f64 = 500.0;

/// Baseline score in `[0, 100]`
///
/// Negative or NaN readings score 0; anything above [`PSI_CAP`] scores 100.
pub fn calculate_baseline_score(current_psi: f64) -> f64 {
    if current_psi.is_nan() || current_psi < 0.0 {
        return 0.0;
    }
    current_psi.min(PSI_CAP) / 5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_breakpoints() {
        assert_eq!(calculate_baseline_score(0.0), 0.0);
        assert_eq!(calculate_baseline_score(500.0), 100.0);
        assert_eq!(calculate_baseline_score(1000.0), 100.0);
        assert_eq!(calculate_baseline_score(-10.0), 0.0);
        assert_eq!(calculate_baseline_score(55.0), 11.0);
    }

    #[test]
    fn test_baseline_invalid_input() {
        assert_eq!(calculate_baseline_score(f64::NAN), 0.0);
        assert_eq!(calculate_baseline_score(f64::INFINITY), 100.0);
    }
}
