//! Sparsity patterns and dependency bit words.

use crate::error::ShapeError;

/// One word of dependency bits: bit `j` tracks seed direction `j`.
///
/// Propagating a word through a computation processes 64 independent
/// directions at once.
pub type Bvec = u64;

/// Number of seed directions carried by one [`Bvec`].
pub const BVEC_BITS: usize = Bvec::BITS as usize;

/// Structural nonzero pattern of a matrix-valued expression.
///
/// Nonzeros are stored as strictly increasing column-major linear positions
/// `row + col * nrow`. Values of an expression with this pattern are laid
/// out in the same order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sparsity {
    nrow: usize,
    ncol: usize,
    positions: Vec<usize>,
}

impl Sparsity {
    /// Build from explicit column-major positions.
    pub fn new(nrow: usize, ncol: usize, positions: Vec<usize>) -> Result<Self, ShapeError> {
        if positions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ShapeError::UnsortedPositions);
        }
        if let Some(&last) = positions.last() {
            if last >= nrow.saturating_mul(ncol) {
                return Err(ShapeError::PositionOutOfRange {
                    position: last,
                    nrow,
                    ncol,
                });
            }
        }
        Ok(Sparsity {
            nrow,
            ncol,
            positions,
        })
    }

    /// Fully dense `nrow × ncol` pattern.
    pub fn dense(nrow: usize, ncol: usize) -> Self {
        Sparsity {
            nrow,
            ncol,
            positions: (0..nrow * ncol).collect(),
        }
    }

    /// Dense column vector of length `n`.
    pub fn column(n: usize) -> Self {
        Sparsity::dense(n, 1)
    }

    /// Dense `1 × 1`.
    pub fn scalar() -> Self {
        Sparsity::dense(1, 1)
    }

    /// Number of structural nonzeros.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    #[inline]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    /// Column-major linear positions of the nonzeros.
    #[inline]
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// `(row, col)` of nonzero `k`.
    pub fn coordinates(&self, k: usize) -> (usize, usize) {
        let p = self.positions[k];
        (p % self.nrow.max(1), p / self.nrow.max(1))
    }

    /// Whether every entry is structurally nonzero.
    pub fn is_dense(&self) -> bool {
        self.nnz() == self.nrow * self.ncol
    }
}

/// Jacobian sparsity pattern in COO format.
///
/// Entries are sorted by `(row, col)`; row `i` is output nonzero `i`,
/// column `j` is input nonzero `j`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JacobianSparsityPattern {
    /// Number of rows (output nonzeros).
    pub num_outputs: usize,
    /// Number of columns (input nonzeros).
    pub num_inputs: usize,
    /// Row indices (0-based).
    pub rows: Vec<u32>,
    /// Column indices (0-based).
    pub cols: Vec<u32>,
}

impl JacobianSparsityPattern {
    /// Number of entries in the pattern.
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Whether the pattern is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether output `row` may depend on input `col`.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .any(|(&r, &c)| r as usize == row && c as usize == col)
    }
}

/// Set bit positions of `word`, offset by `base`.
pub(crate) fn extract_bits(word: Bvec, base: usize, limit: usize) -> Vec<u32> {
    let mut result = Vec::new();
    let mut w = word;
    while w != 0 {
        let pos = base + w.trailing_zeros() as usize;
        if pos < limit {
            result.push(pos as u32);
        }
        w &= w - 1; // clear lowest set bit
    }
    result
}
