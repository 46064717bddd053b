use std::f64::consts::PI;
use std::fmt;

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::{check_fit_args, Opdf, OpdfFactory};
use crate::error::{HmmError, Result};

/// Lower bound applied to fitted variances.
pub const VARIANCE_FLOOR: f64 = 1e-8;

/// A univariate normal distribution over `f64` observations.
#[derive(Debug, Clone, PartialEq)]
pub struct OpdfGaussian {
    mean: f64,
    variance: f64,
}

impl OpdfGaussian {
    pub fn new(mean: f64, variance: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(HmmError::invalid_input("gaussian mean must be finite"));
        }
        if !(variance.is_finite() && variance > 0.0) {
            return Err(HmmError::invalid_input(format!(
                "gaussian variance must be positive and finite, got {}",
                variance
            )));
        }
        Ok(Self { mean, variance })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Default for OpdfGaussian {
    fn default() -> Self {
        Self {
            mean: 0.0,
            variance: 1.0,
        }
    }
}

impl Opdf for OpdfGaussian {
    type Observation = f64;

    fn probability(&self, observation: &f64) -> f64 {
        let diff = observation - self.mean;
        (-diff * diff / (2.0 * self.variance)).exp() / (2.0 * PI * self.variance).sqrt()
    }

    fn fit(&mut self, observations: &[f64], weights: &[f64]) -> Result<()> {
        check_fit_args(observations, weights)?;
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(HmmError::invalid_input("fit weights sum to zero"));
        }

        let mean = observations
            .iter()
            .zip(weights)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            / total;
        let variance = observations
            .iter()
            .zip(weights)
            .map(|(x, w)| w * (x - mean).powi(2))
            .sum::<f64>()
            / total;

        self.mean = mean;
        self.variance = variance.max(VARIANCE_FLOOR);
        Ok(())
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let z: f64 = StandardNormal.sample(rng);
        self.mean + z * self.variance.sqrt()
    }
}

impl fmt::Display for OpdfGaussian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GaussianOPDF [ {} {} ]", self.mean, self.variance)
    }
}

/// Generates identical [`OpdfGaussian`] instances, standard normal by default.
#[derive(Debug, Clone, Default)]
pub struct OpdfGaussianFactory {
    template: OpdfGaussian,
}

impl OpdfGaussianFactory {
    pub fn new(mean: f64, variance: f64) -> Result<Self> {
        Ok(Self {
            template: OpdfGaussian::new(mean, variance)?,
        })
    }
}

impl OpdfFactory for OpdfGaussianFactory {
    type Opdf = OpdfGaussian;

    fn generate(&self) -> OpdfGaussian {
        self.template.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_standard_density() {
        let opdf = OpdfGaussian::default();
        assert_relative_eq!(
            opdf.probability(&0.0),
            1.0 / (2.0 * PI).sqrt(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            opdf.probability(&1.0),
            (-0.5f64).exp() / (2.0 * PI).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_weighted_fit() {
        let mut opdf = OpdfGaussian::default();
        opdf.fit(&[1.0, 3.0, 100.0], &[0.5, 0.5, 0.0]).unwrap();
        assert_relative_eq!(opdf.mean(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(opdf.variance(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_fit_is_floored() {
        let mut opdf = OpdfGaussian::default();
        opdf.fit(&[4.0, 4.0], &[0.5, 0.5]).unwrap();
        assert_relative_eq!(opdf.mean(), 4.0);
        assert_eq!(opdf.variance(), VARIANCE_FLOOR);
        assert!(opdf.probability(&4.0).is_finite());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(OpdfGaussian::new(0.0, 0.0).is_err());
        assert!(OpdfGaussian::new(f64::NAN, 1.0).is_err());
        assert!(OpdfGaussianFactory::new(0.0, -1.0).is_err());
    }

    #[test]
    fn test_sample_moments() {
        let opdf = OpdfGaussian::new(3.0, 4.0).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let samples: Vec<f64> = (0..20_000).map(|_| opdf.sample(&mut rng)).collect();
        let weights = vec![1.0 / samples.len() as f64; samples.len()];
        let mut fitted = OpdfGaussian::default();
        fitted.fit(&samples, &weights).unwrap();
        assert_relative_eq!(fitted.mean(), 3.0, epsilon = 0.1);
        assert_relative_eq!(fitted.variance(), 4.0, epsilon = 0.2);
    }

    #[test]
    fn test_display() {
        let opdf = OpdfGaussian::new(1.5, 2.0).unwrap();
        assert_eq!(opdf.to_string(), "GaussianOPDF [ 1.5 2 ]");
    }
}
