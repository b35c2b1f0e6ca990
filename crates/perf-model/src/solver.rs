//! Least-squares solvers behind a common trait.
//!
//! Both solvers are sequential and allocation-deterministic, so the same
//! design matrix always yields bit-identical coefficients. Neither falls
//! back to a pseudo-inverse: a rank-deficient design is an error.

use crate::schema::SolverKind;

/// Relative pivot tolerance below which a column is treated as dependent.
pub const RANK_TOLERANCE: f64 = 1e-10;

/// Row-major design matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl DesignMatrix {
    /// Build `[1 | features]` from one feature vector per row.
    ///
    /// # Panics
    /// Panics if the feature vectors have different lengths.
    pub fn with_intercept(features: &[Vec<f64>]) -> Self {
        let width = features.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(features.len() * (width + 1));
        for row in features {
            assert_eq!(row.len(), width, "feature vectors must share a length");
            data.push(1.0);
            data.extend_from_slice(row);
        }
        Self {
            rows: features.len(),
            cols: width + 1,
            data,
        }
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    /// Fewer rows than unknowns.
    Underdetermined { rows: usize, cols: usize },
    /// Column `column` is (numerically) a combination of earlier columns.
    RankDeficient { column: usize },
    /// Target length does not match the number of rows.
    ShapeMismatch { rows: usize, targets: usize },
}

impl std::fmt::Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Underdetermined { rows, cols } => {
                write!(f, "{rows} row(s) for {cols} unknown(s)")
            }
            Self::RankDeficient { column } => {
                write!(f, "design matrix is rank-deficient at column {column}")
            }
            Self::ShapeMismatch { rows, targets } => {
                write!(f, "{rows} row(s) but {targets} target(s)")
            }
        }
    }
}

impl std::error::Error for SolveError {}

/// Ordinary least squares: minimise `||X b - y||²`.
pub trait LeastSquaresSolver {
    fn name(&self) -> &'static str;

    fn solve(&self, design: &DesignMatrix, target: &[f64]) -> Result<Vec<f64>, SolveError>;
}

/// Return the solver for a pipeline's configured kind.
pub fn solver_for(kind: SolverKind) -> Box<dyn LeastSquaresSolver> {
    match kind {
        SolverKind::Qr => Box::new(HouseholderQr),
        SolverKind::Normal => Box::new(NormalEquations),
    }
}

fn check_shape(design: &DesignMatrix, target: &[f64]) -> Result<(), SolveError> {
    if target.len() != design.rows {
        return Err(SolveError::ShapeMismatch {
            rows: design.rows,
            targets: target.len(),
        });
    }
    if design.rows < design.cols {
        return Err(SolveError::Underdetermined {
            rows: design.rows,
            cols: design.cols,
        });
    }
    Ok(())
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

/// Householder QR without pivoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct HouseholderQr;

impl LeastSquaresSolver for HouseholderQr {
    fn name(&self) -> &'static str {
        "qr"
    }

    fn solve(&self, design: &DesignMatrix, target: &[f64]) -> Result<Vec<f64>, SolveError> {
        check_shape(design, target)?;
        let (n, p) = (design.rows, design.cols);

        // Column-major working copy so each reflection walks contiguous memory.
        let mut cols: Vec<Vec<f64>> = (0..p)
            .map(|j| (0..n).map(|i| design.at(i, j)).collect())
            .collect();
        let col_norms: Vec<f64> = cols.iter().map(|c| dot(c, c).sqrt()).collect();
        let mut qtb = target.to_vec();

        for k in 0..p {
            let norm = dot(&cols[k][k..], &cols[k][k..]).sqrt();
            if col_norms[k] == 0.0 || norm <= RANK_TOLERANCE * col_norms[k] {
                return Err(SolveError::RankDeficient { column: k });
            }
            let alpha = if cols[k][k] > 0.0 { -norm } else { norm };

            let mut v = cols[k][k..].to_vec();
            v[0] -= alpha;
            let v_norm2 = dot(&v, &v);

            for col in cols.iter_mut().skip(k) {
                let scale = 2.0 * dot(&v, &col[k..]) / v_norm2;
                for (c, vi) in col[k..].iter_mut().zip(&v) {
                    *c -= scale * vi;
                }
            }
            let scale = 2.0 * dot(&v, &qtb[k..]) / v_norm2;
            for (b, vi) in qtb[k..].iter_mut().zip(&v) {
                *b -= scale * vi;
            }
        }

        let mut x = vec![0.0; p];
        for i in (0..p).rev() {
            let mut sum = qtb[i];
            for j in i + 1..p {
                sum -= cols[j][i] * x[j];
            }
            x[i] = sum / cols[i][i];
        }
        Ok(x)
    }
}

/// Cholesky factorisation of `XᵀX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalEquations;

impl LeastSquaresSolver for NormalEquations {
    fn name(&self) -> &'static str {
        "normal"
    }

    fn solve(&self, design: &DesignMatrix, target: &[f64]) -> Result<Vec<f64>, SolveError> {
        check_shape(design, target)?;
        let (n, p) = (design.rows, design.cols);

        let mut gram = vec![0.0; p * p];
        let mut rhs = vec![0.0; p];
        for i in 0..n {
            let row = design.row(i);
            for a in 0..p {
                rhs[a] += row[a] * target[i];
                for b in 0..=a {
                    gram[a * p + b] += row[a] * row[b];
                }
            }
        }

        // Lower-triangular L with gram = L Lᵀ, stored in place.
        let mut l = vec![0.0; p * p];
        for j in 0..p {
            let diag = gram[j * p + j];
            let pivot = diag - dot(&l[j * p..j * p + j], &l[j * p..j * p + j]);
            if diag == 0.0 || pivot <= RANK_TOLERANCE * diag {
                return Err(SolveError::RankDeficient { column: j });
            }
            let ljj = pivot.sqrt();
            l[j * p + j] = ljj;
            for i in j + 1..p {
                let s = gram[i * p + j] - dot(&l[i * p..i * p + j], &l[j * p..j * p + j]);
                l[i * p + j] = s / ljj;
            }
        }

        // Forward then backward substitution.
        let mut z = vec![0.0; p];
        for i in 0..p {
            z[i] = (rhs[i] - dot(&l[i * p..i * p + i], &z[..i])) / l[i * p + i];
        }
        let mut x = vec![0.0; p];
        for i in (0..p).rev() {
            let mut sum = z[i];
            for k in i + 1..p {
                sum -= l[k * p + i] * x[k];
            }
            x[i] = sum / l[i * p + i];
        }
        Ok(x)
    }
}
