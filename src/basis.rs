//! Basis state (C3): the authoritative mapping between basic rows and
//! variables, the eta file, and the refactor counters that [`crate::eta`]
//! reads to decide when to rebuild [`crate::lu::LuFactors`].

use crate::eta::EtaVector;
use crate::lu::LuFactors;
use crate::model::{AT_LOWER, AT_UPPER, ELIMINATED, FIXED, SUPERBASIC};

/// `basis_header[row] -> var`, `var_status[var] -> row | bound code`,
/// the eta file, and iteration counters, per spec.md §3.
#[derive(Debug, Clone)]
pub struct BasisState {
    num_vars_total: usize,
    basis_header: Vec<usize>,
    var_status: Vec<i64>,
    pub eta_list: Vec<EtaVector>,
    pub factorization: Option<LuFactors>,
    pub iteration: u64,
    pub iters_since_refactor: u64,
    pub fixed_count: u64,
}

impl BasisState {
    /// Builds a crash basis: row `i` holds variable `n + i` (its slack
    /// or artificial logical), every structural variable starts
    /// non-basic at the bound closest to zero.
    pub fn crash(num_vars: usize, num_rows: usize, lb: &[f64], ub: &[f64]) -> Self {
        let total = num_vars + num_rows;
        let mut basis_header = Vec::with_capacity(num_rows);
        let mut var_status = vec![0i64; total];

        for j in 0..num_vars {
            var_status[j] = if lb[j] == ub[j] {
                FIXED
            } else if lb[j] > -crate::model::INFINITY {
                AT_LOWER
            } else {
                AT_UPPER
            };
        }
        for i in 0..num_rows {
            let logical = num_vars + i;
            basis_header.push(logical);
            var_status[logical] = i as i64;
        }

        Self {
            num_vars_total: total,
            basis_header,
            var_status,
            eta_list: Vec::new(),
            factorization: None,
            iteration: 0,
            iters_since_refactor: 0,
            fixed_count: 0,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.basis_header.len()
    }

    pub fn status(&self, var: usize) -> i64 {
        self.var_status[var]
    }

    pub fn header(&self, row: usize) -> usize {
        self.basis_header[row]
    }

    pub fn is_basic(&self, var: usize) -> bool {
        self.var_status[var] >= 0
    }

    /// Atomically updates both arrays: `var` becomes basic in `row`,
    /// displacing whatever `basis_header[row]` held previously (the
    /// caller is responsible for giving the displaced variable a new
    /// non-basic status in the same pivot).
    pub fn set_basic(&mut self, var: usize, row: usize) {
        self.basis_header[row] = var;
        self.var_status[var] = row as i64;
    }

    /// Marks `var` non-basic with the given status code (one of
    /// `AT_LOWER`, `AT_UPPER`, `SUPERBASIC`, `FIXED`, `ELIMINATED`).
    pub fn set_nonbasic(&mut self, var: usize, status_code: i64) {
        debug_assert!(
            status_code == AT_LOWER
                || status_code == AT_UPPER
                || status_code == SUPERBASIC
                || status_code == FIXED
                || status_code == ELIMINATED
        );
        self.var_status[var] = status_code;
    }

    pub fn iter_basic_rows(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.basis_header.iter().copied().enumerate()
    }

    /// Number of variables currently marked basic. Used by
    /// [`crate::snapshot::validate`] to check the `count_basic == m`
    /// invariant.
    pub fn count_basic(&self) -> usize {
        self.var_status.iter().filter(|&&s| s >= 0).count()
    }

    /// Debug-only bijection check between `basis_header` and
    /// `var_status`: every basic row's variable points back at that
    /// row, and the count of basic variables equals `m`.
    pub fn debug_assert_consistent(&self) {
        debug_assert_eq!(self.count_basic(), self.basis_header.len());
        for (row, &var) in self.basis_header.iter().enumerate() {
            debug_assert_eq!(
                self.var_status[var], row as i64,
                "basis_header[{row}]={var} but var_status[{var}]={}",
                self.var_status[var]
            );
        }
    }

    pub fn total_vars(&self) -> usize {
        self.num_vars_total
    }

    /// XOR-of-sorted-headers hash used by the cycle detector (spec.md
    /// §4.9). Cheap and order-independent, at the cost of being a weak
    /// hash — collisions only cost an extra forced refactor, never
    /// correctness.
    pub fn header_hash(&self) -> u64 {
        let mut sorted = self.basis_header.clone();
        sorted.sort_unstable();
        sorted.iter().fold(0u64, |acc, &v| acc ^ (v as u64).wrapping_mul(0x9E3779B97F4A7C15 ^ (acc.rotate_left(1) + 1)))
    }
}
