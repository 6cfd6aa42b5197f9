//! Sequence- and profile-level evolutionary distances.
//!
//! The discrete distances operate on raw aligned sequences; the profile
//! distances operate on [`Profile`] matrices and are the ones used
//! throughout the profile-based algorithm. Both share the same
//! Jukes-Cantor-style log correction with a saturation clamp.

use crate::error::{FastNjError, Result};
use crate::profile::{Profile, N_BASES};

/// Fraction of non-gap aligned positions that differ between two sequences.
///
/// Positions where either side is a gap are excluded from both numerator
/// and denominator. If no comparable positions remain the distance is 0.
pub fn uncorrected_distance(a: &str, b: &str) -> Result<f64> {
    if a.is_empty() {
        return Err(FastNjError::InvalidInput("empty sequences".into()));
    }
    if a.len() != b.len() {
        return Err(FastNjError::InvalidInput(format!(
            "alignment length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let mut diffs = 0usize;
    let mut compared = 0usize;
    for (x, y) in a.bytes().zip(b.bytes()) {
        if x == b'-' || y == b'-' {
            continue;
        }
        compared += 1;
        if x != y {
            diffs += 1;
        }
    }
    if compared == 0 {
        return Ok(0.0);
    }
    Ok(diffs as f64 / compared as f64)
}

/// Jukes-Cantor-style log correction of a raw distance.
///
/// With `du = 1 - 4/3·d`, returns `-3/4·log10(du)` while `du` is positive.
/// At or past saturation (`du <= 0`) the logarithm is undefined and the
/// true distance is very large, so the fixed `saturation` constant is
/// returned instead. This clamp is deliberate: it keeps saturated pairs
/// comparable without a numeric domain failure.
pub fn log_correct(d: f64, saturation: f64) -> f64 {
    let du = 1.0 - (4.0 / 3.0) * d;
    if du > 0.0 {
        -0.75 * du.log10()
    } else {
        saturation
    }
}

/// Log-corrected sequence distance (correction applied to
/// [`uncorrected_distance`]).
pub fn corrected_distance(a: &str, b: &str, saturation: f64) -> Result<f64> {
    Ok(log_correct(uncorrected_distance(a, b)?, saturation))
}

/// Average per-column, per-base absolute frequency difference between two
/// profiles: `Σ|p - q| / (4·L)`.
pub fn profile_distance(p: &Profile, q: &Profile) -> f64 {
    p.l1_difference(q) / (N_BASES * p.columns()) as f64
}

/// Log-corrected profile distance (same correction as
/// [`corrected_distance`], applied to [`profile_distance`]).
pub fn log_corrected_profile_distance(p: &Profile, q: &Profile, saturation: f64) -> f64 {
    log_correct(profile_distance(p, q), saturation)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAT: f64 = 1.5;

    #[test]
    fn uncorrected_identical() {
        assert_eq!(uncorrected_distance("ACGT", "ACGT").unwrap(), 0.0);
    }

    #[test]
    fn uncorrected_counts_mismatches() {
        // One mismatch over four comparable positions.
        let d = uncorrected_distance("ACGT", "ACGA").unwrap();
        assert!((d - 0.25).abs() < 1e-12);
    }

    #[test]
    fn uncorrected_skips_gap_positions() {
        // Column 1 has a gap on each side in turn; two comparable columns.
        let d = uncorrected_distance("A-G", "AC-").unwrap();
        assert_eq!(d, 0.0);
        let d = uncorrected_distance("A-GT", "ACGA").unwrap();
        assert!((d - (1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn uncorrected_no_overlap_is_zero() {
        assert_eq!(uncorrected_distance("A--", "--A").unwrap(), 0.0);
    }

    #[test]
    fn uncorrected_length_mismatch_errors() {
        assert!(uncorrected_distance("AC", "ACG").is_err());
        assert!(uncorrected_distance("", "").is_err());
    }

    #[test]
    fn log_correct_known_value() {
        // d = 0.25 -> du = 2/3 -> -0.75*log10(2/3)
        let d = log_correct(0.25, SAT);
        let expected = -0.75 * (2.0f64 / 3.0).log10();
        assert!((d - expected).abs() < 1e-12);
    }

    #[test]
    fn log_correct_zero_is_zero() {
        assert_eq!(log_correct(0.0, SAT), 0.0);
    }

    #[test]
    fn log_correct_saturation_clamp() {
        // du <= 0 at d >= 0.75: fixed fallback, no NaN.
        assert_eq!(log_correct(0.75, SAT), SAT);
        assert_eq!(log_correct(1.0, SAT), SAT);
        assert_eq!(log_correct(0.9, 2.5), 2.5);
    }

    #[test]
    fn corrected_distance_uses_correction() {
        let d = corrected_distance("AAAA", "AAAT", SAT).unwrap();
        let expected = log_correct(0.25, SAT);
        assert!((d - expected).abs() < 1e-12);
    }

    #[test]
    fn profile_distance_identity() {
        let p = Profile::from_sequence("ACGT").unwrap();
        assert_eq!(profile_distance(&p, &p), 0.0);
    }

    #[test]
    fn profile_distance_symmetry() {
        let p = Profile::from_sequence("ACGT").unwrap();
        let q = Profile::from_sequence("TTGT").unwrap();
        assert_eq!(profile_distance(&p, &q), profile_distance(&q, &p));
    }

    #[test]
    fn profile_distance_single_mismatch() {
        // One differing one-hot column contributes 2 to the L1 sum,
        // normalized by 4*L.
        let p = Profile::from_sequence("ACGT").unwrap();
        let q = Profile::from_sequence("ACGA").unwrap();
        assert!((profile_distance(&p, &q) - 2.0 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn log_corrected_profile_matches_formula() {
        let p = Profile::from_sequence("ACGT").unwrap();
        let q = Profile::from_sequence("ACGA").unwrap();
        let d = profile_distance(&p, &q);
        assert_eq!(
            log_corrected_profile_distance(&p, &q, SAT),
            log_correct(d, SAT)
        );
    }
}
