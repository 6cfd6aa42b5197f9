//! Frequency profiles over aligned nucleotide sequences.
//!
//! A [`Profile`] is a 4×L matrix of base frequencies: one row per base in
//! `A, C, G, T` order, one column per alignment position. Leaf profiles are
//! counted directly from a sequence; internal-node profiles are the
//! column-wise mean of the two child profiles. Profiles are value objects —
//! always recomputed, never diffed.

use crate::error::{FastNjError, Result};

/// Number of profile rows (the nucleotide alphabet size).
pub const N_BASES: usize = 4;

/// Row index for a nucleotide, or `None` for anything else.
fn base_index(b: u8) -> Option<usize> {
    match b.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// True for the characters treated as gaps in an alignment.
fn is_gap(b: u8) -> bool {
    b == b'-' || b == b' '
}

/// A 4×L base-frequency matrix stored row-major in a flat `Vec<f64>`.
///
/// Every column sums to 1, except all-gap columns which sum to 0.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile {
    data: Vec<f64>,
    columns: usize,
}

impl Profile {
    /// Build a leaf profile from a single aligned sequence.
    ///
    /// Gap positions contribute nothing to their column, so an all-gap
    /// column sums to 0. Characters outside `{A,C,G,T,-}` are rejected.
    pub fn from_sequence(alignment: &str) -> Result<Self> {
        let bytes = alignment.as_bytes();
        if bytes.is_empty() {
            return Err(FastNjError::InvalidInput("empty alignment".into()));
        }
        let columns = bytes.len();
        let mut data = vec![0.0; N_BASES * columns];
        for (col, &b) in bytes.iter().enumerate() {
            if is_gap(b) {
                continue;
            }
            let row = base_index(b).ok_or_else(|| {
                FastNjError::InvalidInput(format!(
                    "unexpected character '{}' at alignment position {}",
                    b as char, col
                ))
            })?;
            data[row * columns + col] = 1.0;
        }
        Ok(Self { data, columns })
    }

    /// Column-wise mean of two profiles. Both must cover the same number
    /// of alignment columns; the construction pipeline guarantees this.
    pub fn mean(a: &Profile, b: &Profile) -> Profile {
        debug_assert_eq!(a.columns, b.columns);
        let data = a
            .data
            .iter()
            .zip(&b.data)
            .map(|(x, y)| (x + y) / 2.0)
            .collect();
        Profile {
            data,
            columns: a.columns,
        }
    }

    /// Number of alignment columns covered.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Frequency of base row `base` at column `col`.
    pub fn get(&self, base: usize, col: usize) -> f64 {
        self.data[base * self.columns + col]
    }

    /// Sum of the base frequencies in one column.
    pub fn column_sum(&self, col: usize) -> f64 {
        (0..N_BASES).map(|b| self.get(b, col)).sum()
    }

    /// Sum of absolute per-cell differences against another profile.
    pub fn l1_difference(&self, other: &Profile) -> f64 {
        debug_assert_eq!(self.columns, other.columns);
        self.data
            .iter()
            .zip(&other.data)
            .map(|(x, y)| (x - y).abs())
            .sum()
    }

    /// Project the profile onto a subset of columns (used by bootstrap
    /// resampling). Column indices may repeat or appear in any order.
    pub fn subset_columns(&self, cols: &[usize]) -> Profile {
        let mut data = vec![0.0; N_BASES * cols.len()];
        for (new_col, &old_col) in cols.iter().enumerate() {
            for base in 0..N_BASES {
                data[base * cols.len() + new_col] = self.get(base, old_col);
            }
        }
        Profile {
            data,
            columns: cols.len(),
        }
    }
}

/// The running mean profile over all currently active nodes.
///
/// It changes by O(1/N) per join, so it is refreshed by an explicit
/// [`TotalProfile::recompute`] call rather than after every join.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TotalProfile {
    profile: Profile,
    active_count: usize,
}

impl TotalProfile {
    /// Compute the mean profile over the given active-node profiles.
    pub fn new<'a>(profiles: impl Iterator<Item = &'a Profile>) -> Result<Self> {
        let mut tp = Self {
            profile: Profile {
                data: Vec::new(),
                columns: 0,
            },
            active_count: 0,
        };
        tp.recompute(profiles)?;
        Ok(tp)
    }

    /// Refresh the mean from the current active set.
    pub fn recompute<'a>(
        &mut self,
        profiles: impl Iterator<Item = &'a Profile>,
    ) -> Result<()> {
        let mut sum: Option<Vec<f64>> = None;
        let mut columns = 0;
        let mut count = 0usize;
        for p in profiles {
            match &mut sum {
                None => {
                    sum = Some(p.data.clone());
                    columns = p.columns;
                }
                Some(acc) => {
                    for (a, x) in acc.iter_mut().zip(&p.data) {
                        *a += x;
                    }
                }
            }
            count += 1;
        }
        let mut data = sum.ok_or_else(|| {
            FastNjError::InvalidInput("cannot average an empty active set".into())
        })?;
        for v in &mut data {
            *v /= count as f64;
        }
        self.profile = Profile { data, columns };
        self.active_count = count;
        Ok(())
    }

    /// The averaged profile.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Number of active nodes averaged over.
    pub fn active_count(&self) -> usize {
        self.active_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_profile_columns_sum_to_one() {
        let p = Profile::from_sequence("ACGT").unwrap();
        for col in 0..4 {
            assert!((p.column_sum(col) - 1.0).abs() < 1e-12);
        }
        assert_eq!(p.get(0, 0), 1.0); // A at column 0
        assert_eq!(p.get(1, 1), 1.0); // C at column 1
        assert_eq!(p.get(2, 2), 1.0); // G at column 2
        assert_eq!(p.get(3, 3), 1.0); // T at column 3
    }

    #[test]
    fn gap_column_sums_to_zero() {
        let p = Profile::from_sequence("A-G").unwrap();
        assert!((p.column_sum(0) - 1.0).abs() < 1e-12);
        assert_eq!(p.column_sum(1), 0.0);
        assert!((p.column_sum(2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_character_rejected() {
        assert!(Profile::from_sequence("ACGX").is_err());
        assert!(Profile::from_sequence("").is_err());
    }

    #[test]
    fn lowercase_accepted() {
        let p = Profile::from_sequence("acgt").unwrap();
        assert_eq!(p.get(0, 0), 1.0);
    }

    #[test]
    fn mean_averages_columns() {
        let a = Profile::from_sequence("AA").unwrap();
        let c = Profile::from_sequence("CA").unwrap();
        let m = Profile::mean(&a, &c);
        assert!((m.get(0, 0) - 0.5).abs() < 1e-12);
        assert!((m.get(1, 0) - 0.5).abs() < 1e-12);
        assert!((m.get(0, 1) - 1.0).abs() < 1e-12);
        // Averaged columns still sum to 1.
        assert!((m.column_sum(0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn subset_columns_projects() {
        let p = Profile::from_sequence("ACGT").unwrap();
        let s = p.subset_columns(&[3, 0]);
        assert_eq!(s.columns(), 2);
        assert_eq!(s.get(3, 0), 1.0); // old column 3 was T
        assert_eq!(s.get(0, 1), 1.0); // old column 0 was A
    }

    #[test]
    fn total_profile_averages_active_set() {
        let a = Profile::from_sequence("AA").unwrap();
        let c = Profile::from_sequence("CC").unwrap();
        let profiles = [a, c];
        let tp = TotalProfile::new(profiles.iter()).unwrap();
        assert_eq!(tp.active_count(), 2);
        assert!((tp.profile().get(0, 0) - 0.5).abs() < 1e-12);
        assert!((tp.profile().get(1, 0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn total_profile_empty_set_errors() {
        let profiles: Vec<Profile> = Vec::new();
        assert!(TotalProfile::new(profiles.iter()).is_err());
    }

    #[test]
    fn total_profile_recompute_shrinks() {
        let a = Profile::from_sequence("AA").unwrap();
        let c = Profile::from_sequence("CC").unwrap();
        let profiles = [a.clone(), c];
        let mut tp = TotalProfile::new(profiles.iter()).unwrap();
        tp.recompute([a].iter()).unwrap();
        assert_eq!(tp.active_count(), 1);
        assert!((tp.profile().get(0, 0) - 1.0).abs() < 1e-12);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn alignment() -> impl Strategy<Value = String> {
        "[ACGT-]{1,40}"
    }

    proptest! {
        #[test]
        fn columns_sum_to_one_or_zero(s in alignment()) {
            let p = Profile::from_sequence(&s).unwrap();
            for col in 0..p.columns() {
                let sum = p.column_sum(col);
                prop_assert!(
                    sum.abs() < 1e-12 || (sum - 1.0).abs() < 1e-12,
                    "column {} sums to {}", col, sum
                );
            }
        }

        #[test]
        fn mean_preserves_column_sums(s in "[ACGT]{1,20}", t in "[ACGT]{1,20}") {
            // Equal lengths, no gaps: every merged column must sum to 1.
            let len = s.len().min(t.len());
            let a = Profile::from_sequence(&s[..len]).unwrap();
            let b = Profile::from_sequence(&t[..len]).unwrap();
            let m = Profile::mean(&a, &b);
            for col in 0..m.columns() {
                prop_assert!((m.column_sum(col) - 1.0).abs() < 1e-12);
            }
        }
    }
}
