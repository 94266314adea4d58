//! Markowitz-ordered sparse LU factorization of the basis matrix (C4).
//!
//! `factorize` extracts the `m` basis columns (logical columns become
//! implicit unit vectors), then eliminates with threshold partial
//! pivoting: among candidate pivots stable enough to satisfy the
//! Markowitz threshold `tau`, the one minimizing `(row_count-1)*(col_count-1)`
//! is chosen, trading fill-in against numerical stability.

use crate::config::SimplexConfig;
use crate::error::{SimplexError, SimplexResult};
use crate::sparse::SparseMatrix;

/// A single sparse column used during elimination: `(row, value)` pairs,
/// unsorted-append is fine since every column is scanned linearly.
type WorkColumn = Vec<(usize, f64)>;

/// Factored basis: `P * B * Q^T = L * U`, `L` unit-diagonal-implicit,
/// `U` explicit-diagonal, both column-compressed in elimination order
/// (column `k` of `L`/`U` corresponds to pivot step `k`, not to the
/// original basis-column index — `q_of_step`/`p_of_step` translate).
#[derive(Debug, Clone)]
pub struct LuFactors {
    pub dim: usize,
    /// `l_cols[k]`: sub-diagonal entries of L's column `k`, as
    /// `(row_in_step_space, multiplier)`.
    l_cols: Vec<WorkColumn>,
    /// `u_cols[k]`: entries of U's column `k` in step space, including
    /// the diagonal.
    u_cols: Vec<WorkColumn>,
    /// `p[k]` = original row chosen as pivot row at step `k`.
    pub p: Vec<usize>,
    /// `q[k]` = original column (basis-header index 0..m) chosen as
    /// pivot column at step `k`.
    pub q: Vec<usize>,
    /// Inverse permutations: original row/col -> step index.
    p_inv: Vec<usize>,
    q_inv: Vec<usize>,
    pub fill_count: usize,
}

impl LuFactors {
    /// Row `i` in step space -> original row index.
    pub fn step_to_row(&self, step: usize) -> usize {
        self.p[step]
    }

    /// Original row index -> step index.
    pub fn row_to_step(&self, row: usize) -> usize {
        self.p_inv[row]
    }

    pub fn step_to_basis_col(&self, step: usize) -> usize {
        self.q[step]
    }

    pub fn basis_col_to_step(&self, basis_col: usize) -> usize {
        self.q_inv[basis_col]
    }

    pub fn l_column(&self, step: usize) -> &[(usize, f64)] {
        &self.l_cols[step]
    }

    pub fn u_column(&self, step: usize) -> &[(usize, f64)] {
        &self.u_cols[step]
    }
}

/// Extracts the `m` columns of the basis into dense-indexed working
/// columns. `basis_header[r]` names the variable basic in row `r`;
/// variables `>= num_vars` are logical and contribute the unit column
/// `e_{var - num_vars}`.
fn extract_basis_columns(
    matrix: &SparseMatrix,
    basis_header: &[usize],
    num_vars: usize,
) -> Vec<WorkColumn> {
    let m = basis_header.len();
    let mut cols = Vec::with_capacity(m);
    for &var in basis_header {
        if var >= num_vars {
            let logical_row = var - num_vars;
            cols.push(vec![(logical_row, 1.0)]);
        } else {
            cols.push(matrix.get_column(var).collect());
        }
    }
    cols
}

/// Runs Markowitz-with-threshold-pivoting elimination on `columns`
/// (dense-indexed by original row, `m` of them), producing `L`, `U`,
/// `P`, `Q` in step order.
pub fn factorize(
    matrix: &SparseMatrix,
    basis_header: &[usize],
    num_vars: usize,
    config: &SimplexConfig,
) -> SimplexResult<LuFactors> {
    let m = basis_header.len();
    let mut active_cols = extract_basis_columns(matrix, basis_header, num_vars);
    // row_count[r] / col_count[r]: number of remaining entries touching
    // row/column r among not-yet-eliminated columns.
    let mut row_count = vec![0usize; m];
    let mut col_eliminated = vec![false; m];
    let mut row_eliminated = vec![false; m];

    for col in &active_cols {
        for &(r, _) in col {
            row_count[r] += 1;
        }
    }

    let mut l_cols = vec![Vec::new(); m];
    let mut u_cols = vec![Vec::new(); m];
    let mut p = Vec::with_capacity(m);
    let mut q = Vec::with_capacity(m);
    let mut p_inv = vec![0usize; m];
    let mut q_inv = vec![0usize; m];
    let mut fill_count = 0usize;

    // Entries of U above the diagonal are produced while eliminating the
    // pivot row out of *other* columns, long before those columns reach
    // their own pivot step — `u_pending[original_col]` carries them
    // forward as `(step, value)` until that column is finally pivoted.
    let mut u_pending: Vec<WorkColumn> = vec![Vec::new(); m];

    for step in 0..m {
        let (pivot_row, pivot_col) =
            select_pivot(&active_cols, &row_count, &col_eliminated, &row_eliminated, config)?;

        p.push(pivot_row);
        q.push(pivot_col);
        p_inv[pivot_row] = step;
        q_inv[pivot_col] = step;
        row_eliminated[pivot_row] = true;
        col_eliminated[pivot_col] = true;

        let pivot_col_entries = std::mem::take(&mut active_cols[pivot_col]);
        let pivot_value = pivot_col_entries
            .iter()
            .find(|&&(r, _)| r == pivot_row)
            .map(|&(_, v)| v)
            .ok_or_else(|| {
                SimplexError::InternalInconsistency(format!(
                    "pivot entry ({pivot_row},{pivot_col}) missing after selection"
                ))
            })?;

        // U column `step`: whatever this column accumulated in
        // `u_pending` while earlier pivot rows were eliminated out of
        // it, plus the diagonal.
        let mut u_col = std::mem::take(&mut u_pending[pivot_col]);
        u_col.push((step, pivot_value));
        u_cols[step] = u_col;

        // L column `step`: entries of the pivot column at rows not yet
        // eliminated, scaled by 1/pivot. These rows have no step index
        // assigned yet, so record the original row for now and remap to
        // step space once every row has been pivoted (below).
        let mut l_col = Vec::new();
        for &(r, v) in &pivot_col_entries {
            if r != pivot_row && !row_eliminated[r] {
                l_col.push((r, v / pivot_value));
            }
        }
        l_cols[step] = l_col;

        // Eliminate the pivot row from every other remaining column:
        // col[j] -= (col[j][pivot_row] / pivot_value) * col[pivot_col]_{rest}
        // where col[pivot_col]_{rest} is exactly l_col (un-normalized
        // entries already divided above would double-scale, so replay
        // against the original pivot_col_entries minus the pivot row).
        let elim_template: Vec<(usize, f64)> = pivot_col_entries
            .iter()
            .copied()
            .filter(|&(r, _)| r != pivot_row && !row_eliminated[r])
            .collect();

        for (j_col, col) in active_cols.iter_mut().enumerate() {
            if col_eliminated[j_col] || col.is_empty() {
                continue;
            }
            let factor_pos = col.iter().position(|&(r, _)| r == pivot_row);
            let Some(factor_pos) = factor_pos else { continue };
            // The value being displaced from `col` at the pivot row is
            // exactly U[step, step-of-j_col] once j_col is pivoted.
            let removed_value = col[factor_pos].1;
            if removed_value != 0.0 {
                u_pending[j_col].push((step, removed_value));
            }
            let factor = removed_value / pivot_value;
            col.swap_remove(factor_pos);
            if factor != 0.0 {
                for &(r, v) in &elim_template {
                    let existing = col.iter_mut().find(|(er, _)| *er == r);
                    match existing {
                        Some(entry) => entry.1 -= factor * v,
                        None => {
                            col.push((r, -factor * v));
                            fill_count += 1;
                        }
                    }
                }
                col.retain(|&(_, v)| v.abs() >= config.drop_tol);
            }
        }

        for &(r, _) in &elim_template {
            row_count[r] = row_count[r].saturating_sub(1);
        }
    }

    // Every row now has a final step index: remap L's sub-diagonal
    // entries from original-row space to step space so FTRAN/BTRAN can
    // index them the same way they index `z`/`w`.
    for l_col in l_cols.iter_mut() {
        for entry in l_col.iter_mut() {
            entry.0 = p_inv[entry.0];
        }
    }

    Ok(LuFactors {
        dim: m,
        l_cols,
        u_cols,
        p,
        q,
        p_inv,
        q_inv,
        fill_count,
    })
}

/// Selects the Markowitz-minimal stable pivot among remaining entries.
/// Tie-break: lowest Markowitz cost, then descending `|pivot|`, then
/// smallest row index (spec.md §4.4).
fn select_pivot(
    active_cols: &[WorkColumn],
    row_count: &[usize],
    col_eliminated: &[bool],
    row_eliminated: &[bool],
    config: &SimplexConfig,
) -> SimplexResult<(usize, usize)> {
    let mut best: Option<(usize, f64, usize, usize)> = None; // (cost, -|pivot| as tie key via compare, row, col)

    for (j, col) in active_cols.iter().enumerate() {
        if col_eliminated[j] || col.is_empty() {
            continue;
        }
        let col_max = col.iter().fold(0.0f64, |acc, &(_, v)| acc.max(v.abs()));
        if col_max == 0.0 {
            continue;
        }
        let col_count = col.len();
        for &(r, v) in col {
            if row_eliminated[r] {
                continue;
            }
            if v.abs() < config.markowitz_tau * col_max {
                continue;
            }
            let cost = row_count[r].saturating_sub(1) * col_count.saturating_sub(1);
            let candidate = (cost, -v.abs(), r, j);
            best = Some(match best {
                None => candidate,
                Some(current) => {
                    if compare_candidates(&candidate, &current) {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }
    }

    match best {
        Some((_, _, r, c)) => Ok((r, c)),
        None => Err(SimplexError::SingularBasis(
            "no pivot candidate satisfies the Markowitz stability threshold".into(),
        )),
    }
}

/// `true` if `a` should replace `b` as the current best: lower cost
/// wins; ties broken by larger `|pivot|` (smaller `-|pivot|`), then by
/// smaller row index.
fn compare_candidates(a: &(usize, f64, usize, usize), b: &(usize, f64, usize, usize)) -> bool {
    (a.0, a.1, a.2) < (b.0, b.1, b.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_basis(m: usize) -> (SparseMatrix, Vec<usize>) {
        let matrix = SparseMatrix::from_columns(m, vec![]).unwrap();
        let basis_header: Vec<usize> = (0..m).map(|i| i).collect();
        (matrix, basis_header)
    }

    #[test]
    fn factorizes_identity_basis() {
        let (matrix, basis_header) = identity_basis(3);
        let config = SimplexConfig::default();
        let lu = factorize(&matrix, &basis_header, 0, &config).unwrap();
        assert_eq!(lu.dim, 3);
        for step in 0..3 {
            assert_eq!(lu.u_column(step).len(), 1);
            assert_eq!(lu.u_column(step)[0].1, 1.0);
            assert!(lu.l_column(step).is_empty());
        }
    }

    #[test]
    fn factorizes_small_dense_basis() {
        // B = [[2, 1], [1, 3]], columns are structural (num_vars=2).
        let matrix = SparseMatrix::from_columns(
            2,
            vec![vec![(0, 2.0), (1, 1.0)], vec![(0, 1.0), (1, 3.0)]],
        )
        .unwrap();
        let basis_header = vec![0, 1];
        let config = SimplexConfig::default();
        let lu = factorize(&matrix, &basis_header, 2, &config).unwrap();
        assert_eq!(lu.dim, 2);
    }

    #[test]
    fn singular_basis_is_rejected() {
        // Both columns are the unit vector e_0: row 1 is never reachable
        // by any stable pivot, and column 0/1 duplicate — the second
        // column selection step finds nothing.
        let matrix = SparseMatrix::from_columns(2, vec![vec![(0, 1.0)], vec![(0, 1.0)]]).unwrap();
        let basis_header = vec![0, 1];
        let config = SimplexConfig::default();
        let result = factorize(&matrix, &basis_header, 2, &config);
        assert!(matches!(result, Err(SimplexError::SingularBasis(_))));
    }
}
