//! Diagonal Gaussian density estimator, the log-likelihood scoring variant of
//! the window model.

use crate::error::{EngineError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

const VAR_FLOOR: f32 = 1e-6;
const LN_2PI: f32 = 1.837_877_1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianDensity {
    mean: Vec<f32>,
    var: Vec<f32>,
}

impl GaussianDensity {
    /// Fit per-dimension mean and variance over the window matrix. Constant
    /// columns are kept at the variance floor, so unlike the forest this fit
    /// only rejects empty windows.
    pub fn fit(data: &Array2<f32>) -> Result<Self> {
        let rows = data.nrows();
        let cols = data.ncols();
        if rows == 0 || cols == 0 {
            return Err(EngineError::DegenerateFit(cols));
        }
        let mut mean = vec![0.0f32; cols];
        let mut var = vec![0.0f32; cols];
        for (j, col) in data.axis_iter(Axis(1)).enumerate() {
            let m = col.sum() / rows as f32;
            let v = col.iter().map(|x| (x - m) * (x - m)).sum::<f32>() / rows as f32;
            mean[j] = m;
            var[j] = v.max(VAR_FLOOR);
        }
        Ok(GaussianDensity { mean, var })
    }

    /// Mean per-dimension log-density of `x`. Large negative values mark
    /// outliers; dimensions missing from `x` read as 0.
    pub fn score_samples(&self, x: &[f32]) -> f32 {
        if self.mean.is_empty() {
            return 0.0;
        }
        let mut ll = 0.0f32;
        for j in 0..self.mean.len() {
            let v = x.get(j).copied().unwrap_or(0.0);
            let d = v - self.mean[j];
            ll += -0.5 * (LN_2PI + self.var[j].ln() + d * d / self.var[j]);
        }
        ll / self.mean.len() as f32
    }
}
