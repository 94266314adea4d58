//! Eta update and refactor trigger (C6): the product-form-of-the-inverse
//! representation of incremental basis changes since the last full LU
//! refactorization, plus the policy that decides when to refactor.

/// One incremental basis change, applied in FTRAN chronologically and in
/// BTRAN in reverse (spec.md §3, §4.5 — this ordering is load-bearing).
#[derive(Debug, Clone)]
pub struct EtaVector {
    pub pivot_row: usize,
    /// `1 / alpha[pivot_row]`, the transformed entering column's value
    /// at the pivot row before the pivot.
    pub pivot_multiplier: f64,
    /// `(row, -alpha[row]/alpha[pivot_row])` for every non-pivot row
    /// with `|alpha[row]| > drop_tol`.
    pub entries: Vec<(usize, f64)>,
    /// Variable pivoted in, kept for diagnostics only.
    pub entering_var: usize,
}

impl EtaVector {
    /// Builds the eta for a pivot on `pivot_row` given the FTRAN-
    /// transformed entering column `alpha` (dense, indexed by row).
    /// Rejects a pivot whose element is below `pivot_tol` — the caller
    /// must refactor and retry rather than append an unstable eta.
    pub fn from_transformed_column(
        pivot_row: usize,
        alpha: &[f64],
        entering_var: usize,
        pivot_tol: f64,
        drop_tol: f64,
    ) -> Option<Self> {
        let pivot_value = alpha[pivot_row];
        if pivot_value.abs() < pivot_tol {
            return None;
        }
        let pivot_multiplier = 1.0 / pivot_value;
        let mut entries = Vec::new();
        for (row, &v) in alpha.iter().enumerate() {
            if row == pivot_row {
                continue;
            }
            if v.abs() > drop_tol {
                entries.push((row, -v / pivot_value));
            }
        }
        Some(Self {
            pivot_row,
            pivot_multiplier,
            entries,
            entering_var,
        })
    }
}

/// Outcome of [`should_refactor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefactorTrigger {
    No,
    Recommended,
    Required,
}

/// Decides whether the eta file has grown enough to warrant a refactor.
/// `avg_ftran_time`/`baseline_ftran_time` are optional timing signals —
/// `None` disables the timing-based `Recommended` path, which is the
/// common case in environments without a monotonic clock available at
/// this granularity.
pub fn should_refactor(
    eta_count: usize,
    iters_since_refactor: u64,
    max_eta: usize,
    refactor_interval: u64,
    avg_ftran_time: Option<f64>,
    baseline_ftran_time: Option<f64>,
) -> RefactorTrigger {
    if eta_count > max_eta {
        return RefactorTrigger::Required;
    }
    if iters_since_refactor > refactor_interval {
        return RefactorTrigger::Recommended;
    }
    if let (Some(avg), Some(baseline)) = (avg_ftran_time, baseline_ftran_time) {
        if baseline > 0.0 && avg > 3.0 * baseline {
            return RefactorTrigger::Recommended;
        }
    }
    RefactorTrigger::No
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_eta_from_transformed_column() {
        let alpha = vec![2.0, 4.0, -1.0];
        let eta = EtaVector::from_transformed_column(1, &alpha, 7, 1e-9, 1e-20).unwrap();
        assert_eq!(eta.pivot_row, 1);
        assert_eq!(eta.pivot_multiplier, 0.25);
        assert_eq!(eta.entries, vec![(0, -0.5), (2, 0.25)]);
        assert_eq!(eta.entering_var, 7);
    }

    #[test]
    fn rejects_tiny_pivot() {
        let alpha = vec![1.0, 1e-12];
        assert!(EtaVector::from_transformed_column(1, &alpha, 0, 1e-9, 1e-20).is_none());
    }

    #[test]
    fn required_when_eta_count_exceeds_max() {
        assert_eq!(
            should_refactor(251, 0, 250, 100, None, None),
            RefactorTrigger::Required
        );
    }

    #[test]
    fn recommended_when_interval_exceeded() {
        assert_eq!(
            should_refactor(10, 101, 250, 100, None, None),
            RefactorTrigger::Recommended
        );
    }

    #[test]
    fn recommended_when_ftran_time_regresses() {
        assert_eq!(
            should_refactor(10, 5, 250, 100, Some(0.9), Some(0.2)),
            RefactorTrigger::Recommended
        );
    }

    #[test]
    fn no_when_nothing_triggers() {
        assert_eq!(should_refactor(5, 5, 250, 100, None, None), RefactorTrigger::No);
    }
}
