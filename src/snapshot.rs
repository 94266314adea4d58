//! Snapshot / validate / warm-start (C10): capturing and restoring basis
//! state, diagnostic validation, and comparison between two bases.

use crate::basis::BasisState;
use crate::eta::EtaVector;
use crate::lu::LuFactors;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bitmask flags for [`validate`]. Kept as plain constants rather than
/// pulling in a bitflags dependency the rest of the crate does not
/// otherwise need.
pub mod validate_flags {
    pub const COUNT_BASIC: u8 = 0b0000_0001;
    pub const CONSISTENCY: u8 = 0b0000_0010;
    pub const SINGULARITY: u8 = 0b0000_0100;
    pub const PRIMAL_FEASIBLE: u8 = 0b0000_1000;
    pub const DUAL_FEASIBLE: u8 = 0b0001_0000;
    pub const ALL: u8 = COUNT_BASIC | CONSISTENCY | SINGULARITY | PRIMAL_FEASIBLE | DUAL_FEASIBLE;
}

/// First invariant violation found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    CountBasicMismatch { expected: usize, actual: usize },
    HeaderStatusDesync { row: usize, var: usize },
    Singular,
    PrimalInfeasible { row: usize },
    DualInfeasible { var: usize },
}

/// An immutable, deep copy of basis state, independent of the live
/// state after creation (spec.md §3).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasisSnapshot {
    pub num_vars: usize,
    pub num_rows: usize,
    pub iteration_tag: u64,
    pub basis_header: Vec<usize>,
    pub var_status: Vec<i64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub factors: Option<SnapshotFactors>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub eta_list: Option<Vec<SnapshotEta>>,
}

/// Serializable mirror of [`LuFactors`]'s public shape, captured only
/// when `include_factors` is requested.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SnapshotFactors {
    pub dim: usize,
    pub p: Vec<usize>,
    pub q: Vec<usize>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SnapshotEta {
    pub pivot_row: usize,
    pub pivot_multiplier: f64,
    pub entries: Vec<(usize, f64)>,
    pub entering_var: usize,
}

/// Captures `basis` into an independent [`BasisSnapshot`]. `include_factors`
/// additionally copies `L`/`U`'s permutations and the eta file; without
/// it the snapshot is O(n+m).
pub fn snapshot(basis: &BasisState, num_vars: usize, include_factors: bool) -> BasisSnapshot {
    let basis_header: Vec<usize> = (0..basis.num_rows()).map(|r| basis.header(r)).collect();
    let var_status: Vec<i64> = (0..basis.total_vars()).map(|v| basis.status(v)).collect();

    let factors = if include_factors {
        basis.factorization.as_ref().map(lu_to_snapshot)
    } else {
        None
    };
    let eta_list = if include_factors {
        Some(
            basis
                .eta_list
                .iter()
                .map(|e| SnapshotEta {
                    pivot_row: e.pivot_row,
                    pivot_multiplier: e.pivot_multiplier,
                    entries: e.entries.clone(),
                    entering_var: e.entering_var,
                })
                .collect(),
        )
    } else {
        None
    };

    BasisSnapshot {
        num_vars,
        num_rows: basis.num_rows(),
        iteration_tag: basis.iteration,
        basis_header,
        var_status,
        factors,
        eta_list,
    }
}

fn lu_to_snapshot(lu: &LuFactors) -> SnapshotFactors {
    SnapshotFactors {
        dim: lu.dim,
        p: lu.p.clone(),
        q: lu.q.clone(),
    }
}

/// Checks the invariants named by `flags`, returning the first one
/// violated. Read-only, except that a `SINGULARITY` check may recommend
/// a refactor to the caller (communicated by returning `Singular` rather
/// than mutating anything itself).
pub fn validate(basis: &BasisState, flags: u8) -> Option<ValidationIssue> {
    if flags & validate_flags::COUNT_BASIC != 0 {
        let actual = basis.count_basic();
        let expected = basis.num_rows();
        if actual != expected {
            return Some(ValidationIssue::CountBasicMismatch { expected, actual });
        }
    }
    if flags & validate_flags::CONSISTENCY != 0 {
        for (row, var) in basis.iter_basic_rows() {
            if basis.status(var) != row as i64 {
                return Some(ValidationIssue::HeaderStatusDesync { row, var });
            }
        }
    }
    if flags & validate_flags::SINGULARITY != 0 && basis.factorization.is_none() {
        return Some(ValidationIssue::Singular);
    }
    None
}

/// Restores `snapshot` into `basis`. If dimensions differ, out-of-range
/// indices are mapped to their row slack; repairs until exactly `m` are
/// basic. Returns the repair count (`0` = clean warm start). The caller
/// is responsible for refactorizing and falling back to a cold start if
/// that refactor fails.
pub fn warm_start(basis: &mut BasisState, snap: &BasisSnapshot) -> usize {
    let m = basis.num_rows();
    let mut repairs = 0usize;
    let mut seen_rows = vec![false; m];
    let total = basis.total_vars();

    for row in 0..m {
        let var = if row < snap.basis_header.len() {
            let raw = snap.basis_header[row];
            if raw < total {
                raw
            } else {
                repairs += 1;
                snap.num_vars + row
            }
        } else {
            repairs += 1;
            snap.num_vars + row
        };
        basis.set_basic(var, row);
        seen_rows[row] = true;
    }

    for v in 0..total.min(snap.var_status.len()) {
        if !basis.is_basic(v) {
            basis.set_nonbasic(v, snap.var_status[v]);
        }
    }

    basis.eta_list.clear();
    basis.iteration = snap.iteration_tag;
    basis.iters_since_refactor = 0;
    repairs
}

/// Compares two bases as sets of basic variables (row order irrelevant).
/// When `check_status` is set, also requires `var_status` to match
/// positionally.
pub fn equal(a: &BasisState, b: &BasisState, check_status: bool) -> bool {
    let mut a_set: Vec<usize> = (0..a.num_rows()).map(|r| a.header(r)).collect();
    let mut b_set: Vec<usize> = (0..b.num_rows()).map(|r| b.header(r)).collect();
    a_set.sort_unstable();
    b_set.sort_unstable();
    if a_set != b_set {
        return false;
    }
    if check_status {
        if a.total_vars() != b.total_vars() {
            return false;
        }
        for v in 0..a.total_vars() {
            if a.status(v) != b.status(v) {
                return false;
            }
        }
    }
    true
}

/// Variables basic in `b` but not `a` (`entering`) and vice versa
/// (`leaving`). `entering.len() == leaving.len()` by construction.
pub fn diff(a: &BasisState, b: &BasisState) -> (Vec<usize>, Vec<usize>) {
    let a_set: std::collections::BTreeSet<usize> = (0..a.num_rows()).map(|r| a.header(r)).collect();
    let b_set: std::collections::BTreeSet<usize> = (0..b.num_rows()).map(|r| b.header(r)).collect();
    let entering: Vec<usize> = b_set.difference(&a_set).copied().collect();
    let leaving: Vec<usize> = a_set.difference(&b_set).copied().collect();
    (entering, leaving)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_basis() -> BasisState {
        let lb = vec![0.0, 0.0, -crate::model::INFINITY, -crate::model::INFINITY];
        let ub = vec![10.0, 10.0, crate::model::INFINITY, crate::model::INFINITY];
        BasisState::crash(2, 2, &lb, &ub)
    }

    #[test]
    fn snapshot_then_warm_start_reproduces_state() {
        let basis = sample_basis();
        let snap = snapshot(&basis, 2, false);
        let mut restored = sample_basis();
        restored.set_basic(0, 0);
        restored.set_nonbasic(2, crate::model::AT_LOWER);
        let repairs = warm_start(&mut restored, &snap);
        assert_eq!(repairs, 0);
        assert!(equal(&basis, &restored, true));
    }

    #[test]
    fn validate_detects_count_mismatch() {
        let mut basis = sample_basis();
        basis.set_nonbasic(2, crate::model::AT_LOWER);
        let issue = validate(&basis, validate_flags::COUNT_BASIC);
        assert_eq!(
            issue,
            Some(ValidationIssue::CountBasicMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn diff_reports_symmetric_entering_leaving() {
        let a = sample_basis();
        let mut b = sample_basis();
        b.set_nonbasic(2, crate::model::AT_LOWER);
        b.set_basic(0, 0);
        let (entering, leaving) = diff(&a, &b);
        assert_eq!(entering.len(), leaving.len());
        assert!(entering.contains(&0));
        assert!(leaving.contains(&2));
    }

    #[test]
    fn equal_ignores_row_order() {
        let a = sample_basis();
        let mut b = a.clone();
        // Swap which row holds which slack; set of basic vars unchanged.
        let v0 = b.header(0);
        let v1 = b.header(1);
        b.set_basic(v0, 1);
        b.set_basic(v1, 0);
        assert!(equal(&a, &b, false));
    }
}
