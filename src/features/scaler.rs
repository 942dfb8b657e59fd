//! Per-dimension standardization fitted over a sample matrix.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Dimensions whose spread falls below this are treated as constant and get
/// unit scale, keeping the transform total.
const STD_FLOOR: f32 = 1e-8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl StandardScaler {
    /// Fit mean and scale per column of `data`.
    pub fn fit(data: &Array2<f32>) -> Self {
        let (rows, cols) = data.dim();
        let mut mean = vec![0.0f32; cols];
        let mut scale = vec![1.0f32; cols];
        if rows == 0 {
            return Self { mean, scale };
        }
        for (j, col) in data.axis_iter(Axis(1)).enumerate() {
            let m = col.sum() / rows as f32;
            let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / rows as f32;
            let std = var.sqrt();
            mean[j] = m;
            if std > STD_FLOOR {
                scale[j] = std;
            }
        }
        Self { mean, scale }
    }

    /// Standardize one vector. Dimensions beyond the fitted width pass
    /// through unchanged.
    pub fn transform(&self, x: &[f32]) -> Vec<f32> {
        x.iter()
            .enumerate()
            .map(|(j, v)| {
                let m = self.mean.get(j).copied().unwrap_or(0.0);
                let s = self.scale.get(j).copied().unwrap_or(1.0);
                (v - m) / s
            })
            .collect()
    }

    /// Standardize a whole matrix row by row.
    pub fn transform_matrix(&self, data: &Array2<f32>) -> Array2<f32> {
        let mut out = data.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                let m = self.mean.get(j).copied().unwrap_or(0.0);
                let s = self.scale.get(j).copied().unwrap_or(1.0);
                *v = (*v - m) / s;
            }
        }
        out
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }
}
