//! Sparse constraint-matrix store (C1): CSC-primary with a lazily built
//! CSR mirror for row-wise access. Column insertion/removal is O(1)
//! amortized at a known position via tombstoning; nothing reshuffles the
//! column arrays until the CSR mirror is rebuilt.

use crate::error::{SimplexError, SimplexResult};

/// Sentinel written into `row_idx` at a tombstoned position. A column
/// reader must skip these; they are never compacted away mid-solve
/// (spec §3: "tombstone is permanent for the life of one solve").
const TOMBSTONE: isize = -1;

/// CSC-primary sparse matrix with an on-demand CSR mirror.
///
/// Column access (`get_column`) never needs the mirror and is always
/// available; row access (`get_row`) triggers [`SparseMatrix::ensure_csr`]
/// if the mirror is dirty.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    num_rows: usize,
    num_cols: usize,
    col_start: Vec<usize>,
    col_len: Vec<usize>,
    row_idx: Vec<isize>,
    val: Vec<f64>,

    csr_dirty: bool,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    row_val: Vec<f64>,
}

impl SparseMatrix {
    /// Builds a matrix from a dense list of columns, each a sorted
    /// `(row, value)` list. Mirrors the builder-from-triplets shape used
    /// throughout the sparse-linear-algebra corpus, but takes
    /// pre-grouped columns since the LP model assembly layer (out of
    /// scope here, §1) already groups by column.
    pub fn from_columns(num_rows: usize, columns: Vec<Vec<(usize, f64)>>) -> SimplexResult<Self> {
        let num_cols = columns.len();
        let mut col_start = Vec::with_capacity(num_cols + 1);
        let mut col_len = Vec::with_capacity(num_cols);
        let mut row_idx = Vec::new();
        let mut val = Vec::new();

        col_start.push(0);
        for (j, column) in columns.into_iter().enumerate() {
            for &(r, v) in &column {
                if r >= num_rows {
                    return Err(SimplexError::InvalidInput(format!(
                        "row index {r} out of bounds (num_rows={num_rows}) in column {j}"
                    )));
                }
                if !v.is_finite() {
                    return Err(SimplexError::InvalidInput(format!(
                        "non-finite coefficient at column {j}"
                    )));
                }
            }
            col_len.push(column.len());
            for (r, v) in column {
                row_idx.push(r as isize);
                val.push(v);
            }
            col_start.push(row_idx.len());
        }

        Ok(Self {
            num_rows,
            num_cols,
            col_start,
            col_len,
            row_idx,
            val,
            csr_dirty: true,
            row_ptr: Vec::new(),
            col_idx: Vec::new(),
            row_val: Vec::new(),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Number of live (non-tombstoned) entries.
    pub fn nnz(&self) -> usize {
        self.col_len.iter().sum()
    }

    /// Iterates the `(row, value)` pairs of column `j`, skipping
    /// tombstones. Never triggers a CSR rebuild.
    pub fn get_column(&self, j: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.col_start[j];
        let end = self.col_start[j + 1];
        (start..end).filter_map(move |p| {
            let r = self.row_idx[p];
            if r == TOMBSTONE {
                None
            } else {
                Some((r as usize, self.val[p]))
            }
        })
    }

    /// Iterates the `(col, value)` pairs of row `i`. Rebuilds the CSR
    /// mirror first if it is dirty.
    pub fn get_row(&mut self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.ensure_csr();
        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];
        self.col_idx[start..end]
            .iter()
            .copied()
            .zip(self.row_val[start..end].iter().copied())
    }

    /// Linear scan of column `j` for row `i`; returns `0.0` if absent.
    pub fn get_coeff(&self, i: usize, j: usize) -> f64 {
        self.get_column(j)
            .find(|&(r, _)| r == i)
            .map(|(_, v)| v)
            .unwrap_or(0.0)
    }

    /// Rebuilds the CSR mirror in one O(nnz) pass: count per-row nnz,
    /// prefix-sum into `row_ptr`, then scatter. No-op if already clean.
    pub fn ensure_csr(&mut self) {
        if !self.csr_dirty {
            return;
        }
        let mut row_ptr = vec![0usize; self.num_rows + 1];
        for &r in &self.row_idx {
            if r != TOMBSTONE {
                row_ptr[r as usize + 1] += 1;
            }
        }
        for i in 0..self.num_rows {
            row_ptr[i + 1] += row_ptr[i];
        }

        let nnz = self.nnz();
        let mut col_idx = vec![0usize; nnz];
        let mut row_val = vec![0.0f64; nnz];
        let mut cursor = row_ptr.clone();

        for j in 0..self.num_cols {
            for (r, v) in self.get_column(j) {
                let p = cursor[r];
                col_idx[p] = j;
                row_val[p] = v;
                cursor[r] += 1;
            }
        }

        self.row_ptr = row_ptr;
        self.col_idx = col_idx;
        self.row_val = row_val;
        self.csr_dirty = false;
    }

    /// Marks the CSR mirror dirty without touching it; used by callers
    /// that mutate coefficients directly.
    pub fn mark_csr_dirty(&mut self) {
        self.csr_dirty = true;
    }

    /// Tombstones the entry at CSC position `pos` within column `j`.
    /// Permanent for the life of the solve; dirties the CSR mirror.
    pub fn tombstone_entry(&mut self, j: usize, pos: usize) {
        debug_assert!(pos >= self.col_start[j] && pos < self.col_start[j + 1]);
        if self.row_idx[pos] != TOMBSTONE {
            self.row_idx[pos] = TOMBSTONE;
            self.col_len[j] -= 1;
            self.csr_dirty = true;
        }
    }

    /// Whether `j` is within `[0, num_cols)`.
    pub fn has_column(&self, j: usize) -> bool {
        j < self.num_cols
    }

    /// Negates the live entry at `(i, j)` in place, if one exists.
    /// Used by canonicalization to flip a `'>'` row's coefficients
    /// without disturbing sparsity structure. O(nnz of column `j`).
    pub fn negate_at(&mut self, i: usize, j: usize) {
        let start = self.col_start[j];
        let end = self.col_start[j + 1];
        for pos in start..end {
            if self.row_idx[pos] == i as isize {
                self.val[pos] = -self.val[pos];
                self.csr_dirty = true;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix {
        // A = [ 1 0 2
        //       0 3 0 ]
        SparseMatrix::from_columns(
            2,
            vec![
                vec![(0, 1.0)],
                vec![(1, 3.0)],
                vec![(0, 2.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn column_iteration_skips_tombstones() {
        let mut m = sample();
        let before: Vec<_> = m.get_column(0).collect();
        assert_eq!(before, vec![(0, 1.0)]);
        m.tombstone_entry(0, m.col_start_for_test(0));
        let after: Vec<_> = m.get_column(0).collect();
        assert!(after.is_empty());
    }

    #[test]
    fn row_query_matches_coeff() {
        let mut m = sample();
        let row0: Vec<_> = m.get_row(0).collect();
        assert_eq!(row0, vec![(0, 1.0), (2, 2.0)]);
        assert_eq!(m.get_coeff(0, 2), 2.0);
        assert_eq!(m.get_coeff(1, 0), 0.0);
    }

    #[test]
    fn csr_rebuild_is_lazy_and_idempotent() {
        let mut m = sample();
        assert!(m.csr_dirty);
        m.ensure_csr();
        assert!(!m.csr_dirty);
        let row1_first: Vec<_> = m.get_row(1).collect();
        let row1_second: Vec<_> = m.get_row(1).collect();
        assert_eq!(row1_first, row1_second);
    }

    #[test]
    fn rejects_out_of_bounds_row() {
        let result = SparseMatrix::from_columns(1, vec![vec![(5, 1.0)]]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_finite_coefficient() {
        let result = SparseMatrix::from_columns(1, vec![vec![(0, f64::NAN)]]);
        assert!(result.is_err());
    }

    // test-only accessor so tests can reach a concrete CSC position
    impl SparseMatrix {
        fn col_start_for_test(&self, j: usize) -> usize {
            self.col_start[j]
        }
    }
}
