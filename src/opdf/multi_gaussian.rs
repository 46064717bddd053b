use std::f64::consts::PI;
use std::fmt;

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::{check_fit_args, Opdf, OpdfFactory};
use crate::error::{HmmError, Result};

/// Value added to the diagonal of fitted covariance matrices.
pub const COVARIANCE_FLOOR: f64 = 1e-8;

/// Largest relative gap allowed between mirrored covariance entries.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// A multivariate normal distribution with a full covariance matrix.
#[derive(Debug, Clone)]
pub struct OpdfMultiGaussian {
    mean: Array1<f64>,
    covariance: Array2<f64>,
    /// Lower Cholesky factor of `covariance`.
    cholesky: Array2<f64>,
    log_det: f64,
}

impl OpdfMultiGaussian {
    pub fn new(mean: Array1<f64>, covariance: Array2<f64>) -> Result<Self> {
        let dimension = mean.len();
        if dimension == 0 {
            return Err(HmmError::invalid_input(
                "a multivariate gaussian needs at least one dimension",
            ));
        }
        HmmError::check_len(dimension, covariance.nrows())?;
        HmmError::check_len(dimension, covariance.ncols())?;
        if mean.iter().any(|m| !m.is_finite()) {
            return Err(HmmError::invalid_input("gaussian mean must be finite"));
        }
        for r in 0..dimension {
            for c in 0..r {
                let (lower, upper) = (covariance[[r, c]], covariance[[c, r]]);
                let scale = lower.abs().max(upper.abs()).max(1.0);
                if (lower - upper).abs() > SYMMETRY_TOLERANCE * scale {
                    return Err(HmmError::invalid_input("covariance must be symmetric"));
                }
            }
        }

        let cholesky = cholesky(&covariance)?;
        let log_det = 2.0 * cholesky.diag().mapv(f64::ln).sum();
        Ok(Self {
            mean,
            covariance,
            cholesky,
            log_det,
        })
    }

    /// Standard normal distribution in `dimension` dimensions.
    pub fn standard(dimension: usize) -> Result<Self> {
        Self::new(Array1::zeros(dimension), Array2::eye(dimension))
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    /// Solves `L y = v` by forward substitution.
    fn solve_lower(&self, v: &Array1<f64>) -> Array1<f64> {
        let d = self.dimension();
        let mut y = Array1::zeros(d);
        for r in 0..d {
            let mut acc = v[r];
            for c in 0..r {
                acc -= self.cholesky[[r, c]] * y[c];
            }
            y[r] = acc / self.cholesky[[r, r]];
        }
        y
    }
}

/// Cholesky decomposition of a symmetric positive definite matrix.
fn cholesky(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let d = matrix.nrows();
    let mut lower = Array2::<f64>::zeros((d, d));
    for r in 0..d {
        for c in 0..=r {
            let mut sum = matrix[[r, c]];
            for k in 0..c {
                sum -= lower[[r, k]] * lower[[c, k]];
            }
            if r == c {
                if !(sum.is_finite() && sum > 0.0) {
                    return Err(HmmError::invalid_input(
                        "covariance must be positive definite",
                    ));
                }
                lower[[r, c]] = sum.sqrt();
            } else {
                lower[[r, c]] = sum / lower[[c, c]];
            }
        }
    }
    Ok(lower)
}

impl Opdf for OpdfMultiGaussian {
    type Observation = Array1<f64>;

    fn probability(&self, observation: &Array1<f64>) -> f64 {
        if observation.len() != self.dimension() {
            return 0.0;
        }
        let y = self.solve_lower(&(observation - &self.mean));
        let mahalanobis = y.dot(&y);
        let d = self.dimension() as f64;
        (-0.5 * (mahalanobis + self.log_det + d * (2.0 * PI).ln())).exp()
    }

    fn fit(&mut self, observations: &[Array1<f64>], weights: &[f64]) -> Result<()> {
        check_fit_args(observations, weights)?;
        let d = self.dimension();
        for o in observations {
            HmmError::check_len(d, o.len())?;
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(HmmError::invalid_input("fit weights sum to zero"));
        }

        let mut mean = Array1::<f64>::zeros(d);
        for (o, &w) in observations.iter().zip(weights) {
            mean.scaled_add(w / total, o);
        }

        let mut covariance = Array2::<f64>::zeros((d, d));
        for (o, &w) in observations.iter().zip(weights) {
            let diff = o - &mean;
            for r in 0..d {
                for c in r..d {
                    covariance[[r, c]] += w / total * diff[r] * diff[c];
                }
            }
        }
        for r in 0..d {
            covariance[[r, r]] += COVARIANCE_FLOOR;
            for c in 0..r {
                covariance[[r, c]] = covariance[[c, r]];
            }
        }

        *self = Self::new(mean, covariance)?;
        Ok(())
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<f64> {
        let z: Array1<f64> = (0..self.dimension())
            .map(|_| {
                let z: f64 = StandardNormal.sample(&mut *rng);
                z
            })
            .collect();
        &self.mean + &self.cholesky.dot(&z)
    }
}

impl fmt::Display for OpdfMultiGaussian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MultiGaussianOPDF [ [")?;
        for m in &self.mean {
            write!(f, " {}", m)?;
        }
        write!(f, " ] [")?;
        for row in self.covariance.rows() {
            write!(f, " [")?;
            for c in row {
                write!(f, " {}", c)?;
            }
            write!(f, " ]")?;
        }
        write!(f, " ] ]")
    }
}

/// Generates standard multivariate normal opdfs of a fixed dimension.
#[derive(Debug, Clone, Copy)]
pub struct OpdfMultiGaussianFactory {
    dimension: usize,
}

impl OpdfMultiGaussianFactory {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(HmmError::invalid_input(
                "a multivariate gaussian needs at least one dimension",
            ));
        }
        Ok(Self { dimension })
    }
}

impl OpdfFactory for OpdfMultiGaussianFactory {
    type Opdf = OpdfMultiGaussian;

    fn generate(&self) -> OpdfMultiGaussian {
        let d = self.dimension;
        OpdfMultiGaussian {
            mean: Array1::zeros(d),
            covariance: Array2::eye(d),
            cholesky: Array2::eye(d),
            log_det: 0.0,
        }
    }
}
