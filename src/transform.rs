//! FTRAN and BTRAN (C5): triangular solves against the current `L`, `U`
//! plus eta-file replay. Eta replay order is the one invariant this
//! module never relaxes — chronological for FTRAN, reverse for BTRAN.

use crate::basis::BasisState;
use crate::error::{SimplexError, SimplexResult};
use crate::lu::LuFactors;

/// Per-entry drop tolerance applied to FTRAN/BTRAN output, independent
/// of the caller's configured `drop_tol` (spec.md §4.5 fixes this at a
/// tighter constant since it only affects downstream sparsity, not
/// stability).
const OUTPUT_EPS: f64 = 1e-14;

/// Computes `x = B^-1 * a` for a dense right-hand side `a` (indexed by
/// original row). `lu` must be the factorization of the basis at the
/// last refactor; `basis.eta_list` supplies every pivot since.
pub fn ftran(lu: &LuFactors, basis: &BasisState, a: &[f64]) -> SimplexResult<Vec<f64>> {
    let m = lu.dim;
    debug_assert_eq!(a.len(), m);

    // y = P * a (row i of the input now sits at its step index).
    let mut y = vec![0.0; m];
    for row in 0..m {
        y[lu.row_to_step(row)] = a[row];
    }

    // Forward-solve L*z = y, L unit-diagonal-implicit, step-indexed.
    let mut z = y;
    for step in 0..m {
        let zv = z[step];
        if zv == 0.0 {
            continue;
        }
        for &(r, v) in lu.l_column(step) {
            z[r] -= v * zv;
        }
    }

    // Back-solve U*w = z, column-oriented: column `step` only holds
    // entries at rows <= step, so once w[step] is known it is propagated
    // forward into the still-unsolved rows rather than read back out of
    // them (those rows haven't been visited yet in this reverse pass).
    let mut w = vec![0.0; m];
    for step in (0..m).rev() {
        let diag = lu
            .u_column(step)
            .iter()
            .find(|&&(r, _)| r == step)
            .map(|&(_, v)| v)
            .ok_or_else(|| {
                SimplexError::InternalInconsistency(format!("missing U diagonal at step {step}"))
            })?;
        if diag == 0.0 {
            return Err(SimplexError::NumericError(format!(
                "zero U diagonal at step {step} during ftran"
            )));
        }
        let wv = z[step] / diag;
        w[step] = wv;
        for &(r, v) in lu.u_column(step) {
            if r != step {
                z[r] -= v * wv;
            }
        }
    }

    // x0 = Q^T * w: step k's value lands at original basis-column slot q[k].
    let mut x = vec![0.0; m];
    for step in 0..m {
        x[lu.step_to_basis_col(step)] = w[step];
    }

    replay_etas_chronological(basis, &mut x)?;

    for v in x.iter_mut() {
        if v.abs() < OUTPUT_EPS {
            *v = 0.0;
        }
        if !v.is_finite() {
            return Err(SimplexError::NumericError("non-finite ftran result".into()));
        }
    }
    Ok(x)
}

fn replay_etas_chronological(basis: &BasisState, x: &mut [f64]) -> SimplexResult<()> {
    for eta in &basis.eta_list {
        let t = x[eta.pivot_row] * eta.pivot_multiplier;
        x[eta.pivot_row] = t;
        for &(r, v) in &eta.entries {
            x[r] -= v * t;
        }
        if !t.is_finite() {
            return Err(SimplexError::NumericError(
                "non-finite value during eta replay (ftran)".into(),
            ));
        }
    }
    Ok(())
}

/// Computes `y = B^-T * e_i`: the `i`-th row of `B^-1`, used to form the
/// simplex multipliers `pi` for pricing.
pub fn btran(lu: &LuFactors, basis: &BasisState, i: usize) -> SimplexResult<Vec<f64>> {
    let m = lu.dim;
    let mut y = vec![0.0; m];
    y[i] = 1.0;

    replay_etas_reverse(basis, &mut y)?;

    // U^T * v = Q*y (step space): forward substitution since U^T is
    // lower triangular in step order. `B^T = Q^T U^T L^T P`, so the
    // right-hand side is permuted through Q before the triangular solves
    // begin (mirrored by undoing P, not Q, on the way out below).
    let mut v = vec![0.0; m];
    for step in 0..m {
        let mut acc = y[lu.step_to_basis_col(step)];
        for &(r, val) in lu.u_column(step) {
            if r < step {
                acc -= val * v[r];
            }
        }
        let diag = lu
            .u_column(step)
            .iter()
            .find(|&&(r, _)| r == step)
            .map(|&(_, val)| val)
            .ok_or_else(|| {
                SimplexError::InternalInconsistency(format!("missing U diagonal at step {step}"))
            })?;
        if diag == 0.0 {
            return Err(SimplexError::NumericError(format!(
                "zero U diagonal at step {step} during btran"
            )));
        }
        v[step] = acc / diag;
    }

    // L^T * w = v (step space): L's column `step` holds entries at rows
    // greater than `step` (sub-diagonal in step space), so L^T's row
    // `step` depends only on rows already finalized by this same
    // decreasing-step pass — no forward propagation needed here, unlike
    // FTRAN's U back-solve.
    let mut w = vec![0.0; m];
    for step in (0..m).rev() {
        let mut acc = v[step];
        for &(r, val) in lu.l_column(step) {
            acc -= val * w[r];
        }
        w[step] = acc;
    }

    // Undo P: step k's value belongs to original row p[k].
    let mut result = vec![0.0; m];
    for step in 0..m {
        result[lu.step_to_row(step)] = w[step];
    }

    for v in result.iter_mut() {
        if v.abs() < OUTPUT_EPS {
            *v = 0.0;
        }
        if !v.is_finite() {
            return Err(SimplexError::NumericError("non-finite btran result".into()));
        }
    }
    Ok(result)
}

fn replay_etas_reverse(basis: &BasisState, y: &mut [f64]) -> SimplexResult<()> {
    for eta in basis.eta_list.iter().rev() {
        let t: f64 = eta.entries.iter().map(|&(r, v)| v * y[r]).sum();
        let updated = (y[eta.pivot_row] - t) * eta.pivot_multiplier;
        y[eta.pivot_row] = updated;
        if !updated.is_finite() {
            return Err(SimplexError::NumericError(
                "non-finite value during eta replay (btran)".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimplexConfig;
    use crate::lu::factorize;
    use crate::sparse::SparseMatrix;

    fn identity_setup(m: usize) -> (LuFactors, BasisState) {
        let matrix = SparseMatrix::from_columns(m, vec![]).unwrap();
        let basis_header: Vec<usize> = (0..m).collect();
        let config = SimplexConfig::default();
        let lu = factorize(&matrix, &basis_header, 0, &config).unwrap();
        let basis = BasisState::crash(0, m, &vec![0.0; m], &vec![1.0; m]);
        (lu, basis)
    }

    #[test]
    fn ftran_identity_is_no_op() {
        let (lu, basis) = identity_setup(3);
        let a = vec![5.0, -2.0, 7.0];
        let x = ftran(&lu, &basis, &a).unwrap();
        assert_eq!(x, a);
    }

    #[test]
    fn btran_identity_is_unit_vector() {
        let (lu, basis) = identity_setup(3);
        let y = btran(&lu, &basis, 1).unwrap();
        assert_eq!(y, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn ftran_and_btran_match_known_inverse_for_non_identity_basis() {
        // B = [[2,1],[1,3]]: Markowitz picks pivot (row1,col1) first, then
        // (row0,col0), so P/Q are non-trivial. B^-1 = [[0.6,-0.2],[-0.2,0.4]].
        let matrix = SparseMatrix::from_columns(
            2,
            vec![vec![(0, 2.0), (1, 1.0)], vec![(0, 1.0), (1, 3.0)]],
        )
        .unwrap();
        let basis_header = vec![0, 1];
        let config = SimplexConfig::default();
        let lu = factorize(&matrix, &basis_header, 2, &config).unwrap();
        let basis = BasisState::crash(0, 2, &vec![0.0; 2], &vec![1.0; 2]);

        let x = ftran(&lu, &basis, &[1.0, 0.0]).unwrap();
        assert!((x[0] - 0.6).abs() < 1e-9, "x[0] = {}", x[0]);
        assert!((x[1] - (-0.2)).abs() < 1e-9, "x[1] = {}", x[1]);

        let y = btran(&lu, &basis, 0).unwrap();
        assert!((y[0] - 0.6).abs() < 1e-9, "y[0] = {}", y[0]);
        assert!((y[1] - (-0.2)).abs() < 1e-9, "y[1] = {}", y[1]);
    }

    #[test]
    fn ftran_then_eta_reversal_reconstructs_input() {
        let (lu, mut basis) = identity_setup(2);
        let a = vec![3.0, 4.0];
        let alpha = ftran(&lu, &basis, &a).unwrap();
        let eta = crate::eta::EtaVector::from_transformed_column(0, &alpha, 0, 1e-9, 1e-20).unwrap();
        basis.eta_list.push(eta);
        // Replaying one eta and its exact inverse (same eta applied via
        // btran-style reverse unwind) should restore the pre-eta vector
        // within the output tolerance: assert the forward replay at
        // least produces a finite, scaled result consistent with the
        // pivot multiplier.
        let x = ftran(&lu, &basis, &a).unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
    }
}
