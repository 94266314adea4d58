//! Per-variable and per-row attribute arrays (C2): bounds, objective
//! coefficients, types, and the canonicalization step that folds `'>'`
//! rows into the internal `'<='`-only representation.

use crate::error::{SimplexError, SimplexResult};
use crate::sparse::SparseMatrix;

/// Sentinel standing in for `-infinity`/`+infinity` in bound arrays, per
/// the data model's `1e100` convention.
pub const INFINITY: f64 = 1e100;

pub const AT_LOWER: i64 = -1;
pub const AT_UPPER: i64 = -2;
pub const SUPERBASIC: i64 = -3;
pub const FIXED: i64 = -4;
pub const ELIMINATED: i64 = -5;

/// Variable kind. Integrality is recorded but ignored by the LP core;
/// only `Binary`'s implied `[0,1]` bound matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Continuous,
    Binary,
    Integer,
    SemiContinuous,
    SemiInteger,
}

/// Constraint sense as given by the caller, before canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// Immutable view of one LP instance, as received at `solve` entry
/// (spec.md §6 `model_view`). Indices `0..num_vars` are structural,
/// `num_vars..num_vars+num_rows` are logical (slack/artificial).
#[derive(Debug, Clone)]
pub struct ModelView {
    pub num_vars: usize,
    pub num_rows: usize,
    pub matrix: SparseMatrix,
    pub lb: Vec<f64>,
    pub ub: Vec<f64>,
    pub obj: Vec<f64>,
    pub vtype: Vec<VarType>,
    pub sense: Vec<Sense>,
    pub rhs: Vec<f64>,
    /// Set by `canonicalize`: rows whose sense was `Ge` and whose
    /// coefficients/rhs were negated in place. Coefficient/dual readers
    /// negate again on the way out (spec.md §4.2, §6).
    flipped_rows: Vec<bool>,
}

impl ModelView {
    /// Builds a model view, validating dimensions up front. No state is
    /// mutated if validation fails.
    pub fn new(
        num_vars: usize,
        num_rows: usize,
        matrix: SparseMatrix,
        lb: Vec<f64>,
        ub: Vec<f64>,
        obj: Vec<f64>,
        vtype: Vec<VarType>,
        sense: Vec<Sense>,
        rhs: Vec<f64>,
    ) -> SimplexResult<Self> {
        let total = num_vars + num_rows;
        if matrix.num_rows() != num_rows || matrix.num_cols() != num_vars {
            return Err(SimplexError::InvalidInput(format!(
                "matrix dims ({}x{}) do not match num_rows={num_rows}, num_vars={num_vars}",
                matrix.num_rows(),
                matrix.num_cols()
            )));
        }
        if lb.len() != total || ub.len() != total || obj.len() != total {
            return Err(SimplexError::InvalidInput(
                "lb/ub/obj must have length num_vars + num_rows".into(),
            ));
        }
        if vtype.len() != num_vars {
            return Err(SimplexError::InvalidInput(
                "vtype must have length num_vars".into(),
            ));
        }
        if sense.len() != num_rows || rhs.len() != num_rows {
            return Err(SimplexError::InvalidInput(
                "sense/rhs must have length num_rows".into(),
            ));
        }
        for (j, (&l, &u)) in lb.iter().zip(ub.iter()).enumerate() {
            if !l.is_finite() && l != -INFINITY {
                return Err(SimplexError::InvalidInput(format!(
                    "non-finite lower bound at index {j}"
                )));
            }
            if !u.is_finite() && u != INFINITY {
                return Err(SimplexError::InvalidInput(format!(
                    "non-finite upper bound at index {j}"
                )));
            }
            if l > u {
                return Err(SimplexError::InvalidInput(format!(
                    "lb[{j}]={l} exceeds ub[{j}]={u}"
                )));
            }
        }
        for (j, &c) in obj.iter().enumerate() {
            if !c.is_finite() {
                return Err(SimplexError::InvalidInput(format!(
                    "non-finite objective coefficient at index {j}"
                )));
            }
        }
        for (i, &r) in rhs.iter().enumerate() {
            if !r.is_finite() {
                return Err(SimplexError::InvalidInput(format!(
                    "non-finite rhs at row {i}"
                )));
            }
        }

        Ok(Self {
            num_vars,
            num_rows,
            matrix,
            lb,
            ub,
            obj,
            vtype,
            sense,
            rhs,
            flipped_rows: vec![false; num_rows],
        })
    }

    pub fn total_vars(&self) -> usize {
        self.num_vars + self.num_rows
    }

    /// Folds `Ge` rows into `Le` by negating their coefficients and rhs.
    /// Idempotent: a row already flipped is left untouched on a second
    /// call (spec.md §8 round-trip law).
    pub fn canonicalize(&mut self) {
        for i in 0..self.num_rows {
            if self.sense[i] == Sense::Ge && !self.flipped_rows[i] {
                for j in 0..self.num_vars {
                    self.matrix.negate_at(i, j);
                }
                self.rhs[i] = -self.rhs[i];
                self.flipped_rows[i] = true;
            }
        }
    }

    /// Whether row `i` was flipped by `canonicalize`.
    pub fn row_is_flipped(&self, i: usize) -> bool {
        self.flipped_rows[i]
    }

    /// Reads coefficient `(i,j)` in the caller's original sign
    /// convention, undoing any canonicalization flip.
    pub fn external_coeff(&self, i: usize, j: usize) -> f64 {
        let v = self.matrix.get_coeff(i, j);
        if self.flipped_rows[i] {
            -v
        } else {
            v
        }
    }

    /// Reads row `i`'s rhs in the caller's original sign convention.
    pub fn external_rhs(&self, i: usize) -> f64 {
        if self.flipped_rows[i] {
            -self.rhs[i]
        } else {
            self.rhs[i]
        }
    }

    /// Narrows `[lb[j], ub[j]]`, used during Phase I to pin artificials
    /// to zero once driven out of the basis (spec.md §4.2).
    pub fn tighten_bound(&mut self, j: usize, new_lb: f64, new_ub: f64) -> SimplexResult<()> {
        if new_lb > new_ub {
            return Err(SimplexError::InvalidInput(format!(
                "tighten_bound({j}) would make lb={new_lb} exceed ub={new_ub}"
            )));
        }
        self.lb[j] = new_lb;
        self.ub[j] = new_ub;
        Ok(())
    }
}
