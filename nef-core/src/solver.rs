//! L2-regularised least-squares decoder solver (dense Cholesky)

use nalgebra::{Cholesky, DMatrix, Dyn};
use ndarray::{Array2, ArrayView2};

use crate::error::{NefError, NefResult};

/// Solves `(AᵀA + m·σ²·I) D = AᵀY` with `σ = reg · max(A)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LstsqL2 {
    pub reg: f64,
}

impl Default for LstsqL2 {
    fn default() -> Self {
        Self { reg: 0.1 }
    }
}

/// Cholesky factor of the regularised Gram matrix of one activity matrix.
/// One factorisation serves every decoded function of the same population.
#[derive(Clone, Debug)]
pub struct GramFactor {
    chol: Cholesky<f64, Dyn>,
}

impl LstsqL2 {
    /// `activities` is `eval_points × neurons`.
    pub fn factorize(&self, activities: ArrayView2<'_, f64>) -> NefResult<GramFactor> {
        let m = activities.nrows() as f64;
        let max_rate = activities.iter().cloned().fold(0.0f64, f64::max);
        if max_rate <= 0.0 {
            return Err(NefError::Solver("no neuron is active over the evaluation points".into()));
        }
        let sigma = self.reg * max_rate;

        let mut gram = activities.t().dot(&activities);
        gram.diag_mut().mapv_inplace(|g| g + m * sigma * sigma);
        Ok(GramFactor { chol: factor(&gram)? })
    }
}

impl GramFactor {
    /// Decoders (`neurons × target_dims`) mapping `activities` onto `targets`
    /// (`eval_points × target_dims`), plus the RMS decoding error.
    pub fn solve(
        &self,
        activities: ArrayView2<'_, f64>,
        targets: ArrayView2<'_, f64>,
    ) -> NefResult<(Array2<f64>, f64)> {
        if activities.nrows() != targets.nrows() {
            return Err(NefError::DimensionMismatch(format!(
                "{} evaluation points but {} targets",
                activities.nrows(),
                targets.nrows()
            )));
        }
        let rhs = activities.t().dot(&targets);
        let solved = self.chol.solve(&to_nalgebra(&rhs));
        let decoders = Array2::from_shape_fn(rhs.dim(), |(i, j)| solved[(i, j)]);

        let residual = activities.dot(&decoders) - &targets;
        let rmse = if residual.is_empty() {
            0.0
        } else {
            (residual.iter().map(|r| r * r).sum::<f64>() / residual.len() as f64).sqrt()
        };
        Ok((decoders, rmse))
    }
}

fn to_nalgebra(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn factor(gram: &Array2<f64>) -> NefResult<Cholesky<f64, Dyn>> {
    Cholesky::new(to_nalgebra(gram))
        .ok_or_else(|| NefError::Solver("Gram matrix is not positive definite".into()))
}
