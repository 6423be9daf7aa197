use nalgebra::{DMatrix, RowDVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use thiserror::Error;

/// Two samples closer than this are treated as identical when fitting n == 2.
const DEGENERATE_NORM: f32 = 1e-12;

#[derive(Debug, Error)]
pub enum PcaError {
    #[error("Cannot fit a basis from an empty sample")]
    EmptySample,

    #[error("Projection dim must be at least 2, got {0}")]
    DimTooSmall(usize),

    #[error("SVD did not converge")]
    SvdFailed,
}

/// A fitted basis: per-dimension mean (length d) and a d×dim matrix with the
/// projection directions as columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaModel {
    pub mean: Vec<f32>,
    pub components: DMatrix<f32>,
}

/// Fit a projection basis for the n×d sample matrix, in f32 throughout.
///
/// - n == 1: the sample is the mean; a seeded orthonormal basis maps it to
///   the origin deterministically.
/// - n == 2: the first direction is the normalized difference between the
///   two samples; identical samples fall back to the seeded basis.
/// - n >= 3: standard PCA via thin SVD of the centered matrix.
///
/// The result always has exactly `dim` columns, zero-padded on the right
/// when fewer directions exist. `dim` must be at least 1.
pub fn fit_pca(x: &DMatrix<f32>, dim: usize) -> Result<PcaModel, PcaError> {
    let (n, d) = x.shape();
    if n == 0 || d == 0 {
        return Err(PcaError::EmptySample);
    }

    if n == 1 {
        let mean = x.row(0).iter().copied().collect();
        return Ok(PcaModel {
            mean,
            components: fixed_orthonormal_basis(d, dim),
        });
    }

    let mean_row = x.row_mean();
    let mean: Vec<f32> = mean_row.iter().copied().collect();

    if n == 2 {
        let v = x.row(1) - x.row(0);
        let norm = v.norm();
        if norm < DEGENERATE_NORM {
            return Ok(PcaModel {
                mean,
                components: fixed_orthonormal_basis(d, dim),
            });
        }

        // First column is the normalized difference; the rest come from the
        // seeded Gaussian, orthonormalized against it by QR.
        let u1 = v.transpose() / norm;
        let extra = dim.max(2) - 1;
        let mut rng = StdRng::seed_from_u64(0);
        let mut b = DMatrix::zeros(d, 1 + extra);
        b.column_mut(0).copy_from(&u1);
        for j in 1..=extra {
            for i in 0..d {
                b[(i, j)] = rng.sample(StandardNormal);
            }
        }
        let q = b.qr().q();
        return Ok(PcaModel {
            mean,
            components: pad_columns(&q, dim),
        });
    }

    let mut centered = x.clone_owned();
    for mut row in centered.row_iter_mut() {
        row -= &mean_row;
    }

    let svd = centered
        .try_svd(false, true, f32::EPSILON, 0)
        .ok_or(PcaError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(PcaError::SvdFailed)?;

    // Right-singular vectors come sorted by descending singular value; take
    // the top min(dim, min(n, d)) as columns.
    let k = dim.min(v_t.nrows());
    let w = v_t.rows(0, k).transpose();

    Ok(PcaModel {
        mean,
        components: pad_columns(&w, dim),
    })
}

/// Deterministic orthonormal d×dim basis: seed-0 Gaussian matrix, QR, first
/// `dim` columns of Q.
pub fn fixed_orthonormal_basis(d: usize, dim: usize) -> DMatrix<f32> {
    let mut rng = StdRng::seed_from_u64(0);
    let cols = dim.min(d);
    let mut g = DMatrix::zeros(d, cols);
    for j in 0..cols {
        for i in 0..d {
            g[(i, j)] = rng.sample(StandardNormal);
        }
    }
    let q = g.qr().q();
    pad_columns(&q, dim)
}

/// Z = (X − mean) · W, one row of scores per sample.
pub fn project_all(x: &DMatrix<f32>, model: &PcaModel) -> DMatrix<f32> {
    let mean = RowDVector::from_row_slice(&model.mean);
    let mut centered = x.clone_owned();
    for mut row in centered.row_iter_mut() {
        row -= &mean;
    }
    &centered * &model.components
}

/// Flatten row-major: out[i * dim + j] = W[(i, j)]. Downstream readers
/// reconstruct the matrix with that layout.
pub fn flatten_row_major(w: &DMatrix<f32>) -> Vec<f32> {
    let mut out = Vec::with_capacity(w.nrows() * w.ncols());
    for i in 0..w.nrows() {
        for j in 0..w.ncols() {
            out.push(w[(i, j)]);
        }
    }
    out
}

/// Take the first `dim` columns, zero-padding on the right when fewer exist.
fn pad_columns(m: &DMatrix<f32>, dim: usize) -> DMatrix<f32> {
    if m.ncols() >= dim {
        return m.columns(0, dim).into_owned();
    }
    let mut out = DMatrix::zeros(m.nrows(), dim);
    out.view_mut((0, 0), (m.nrows(), m.ncols())).copy_from(m);
    out
}
