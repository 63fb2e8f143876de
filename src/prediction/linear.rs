//! Ridge-stabilised least squares on standardised features
//!
//! Each feature column is centred and scaled with its sample mean and
//! standard deviation (statrs). The intercept is the target mean; the
//! slopes solve
//!
//! ```text
//! (ZᵀZ + λI) β = Zᵀ(y − ȳ)
//! ```
//!
//! A small λ keeps the system well-conditioned with short histories or
//! collinear features (PUE and cooling ratio move together in practice).

use statrs::statistics::Statistics;

use super::features::{FeatureVector, FEATURE_COUNT};
use super::PredictionError;

/// Below this a pivot is treated as zero
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    intercept: f64,
    coefficients: [f64; FEATURE_COUNT],
    means: [f64; FEATURE_COUNT],
    scales: [f64; FEATURE_COUNT],
}

impl LinearModel {
    pub fn fit(x: &[FeatureVector], y: &[f64], lambda: f64) -> Result<Self, PredictionError> {
        let n = x.len();
        let mut means = [0.0; FEATURE_COUNT];
        let mut scales = [1.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            let column: Vec<f64> = x.iter().map(|row| row[j]).collect();
            means[j] = column.iter().mean();
            let sd = column.iter().std_dev();
            // constant column: leave unscaled, it standardises to all zeros
            if sd.is_finite() && sd > PIVOT_EPSILON {
                scales[j] = sd;
            }
        }

        let y_mean = y.iter().mean();
        let z: Vec<FeatureVector> = x
            .iter()
            .map(|row| std::array::from_fn(|j| (row[j] - means[j]) / scales[j]))
            .collect();

        // Normal equations
        let mut a = [[0.0; FEATURE_COUNT]; FEATURE_COUNT];
        let mut b = [0.0; FEATURE_COUNT];
        for i in 0..n {
            let centred = y[i] - y_mean;
            for r in 0..FEATURE_COUNT {
                b[r] += z[i][r] * centred;
                for c in 0..FEATURE_COUNT {
                    a[r][c] += z[i][r] * z[i][c];
                }
            }
        }
        for (d, row) in a.iter_mut().enumerate() {
            row[d] += lambda;
        }

        let coefficients = solve(a, b)?;
        Ok(Self {
            intercept: y_mean,
            coefficients,
            means,
            scales,
        })
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .map(|(j, beta)| beta * (features[j] - self.means[j]) / self.scales[j])
            .sum::<f64>()
            + self.intercept
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Slopes in standardised units
    pub fn coefficients(&self) -> &[f64; FEATURE_COUNT] {
        &self.coefficients
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(
    mut a: [[f64; FEATURE_COUNT]; FEATURE_COUNT],
    mut b: [f64; FEATURE_COUNT],
) -> Result<[f64; FEATURE_COUNT], PredictionError> {
    for col in 0..FEATURE_COUNT {
        let pivot = (col..FEATURE_COUNT)
            .max_by(|&i, &k| a[i][col].abs().total_cmp(&a[k][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(PredictionError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..FEATURE_COUNT {
            let factor = a[row][col] / a[col][col];
            for k in col..FEATURE_COUNT {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; FEATURE_COUNT];
    for row in (0..FEATURE_COUNT).rev() {
        let tail: f64 = ((row + 1)..FEATURE_COUNT).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}
