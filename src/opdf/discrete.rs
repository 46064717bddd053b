use std::fmt;

use ndarray::Array1;
use rand::Rng;

use super::{check_fit_args, Opdf, OpdfFactory};
use crate::error::{HmmError, Result};
use crate::hmm::structure::check_stochastic;

/// A categorical distribution over the symbols `0..nb_entries`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpdfDiscrete {
    probabilities: Array1<f64>,
}

impl OpdfDiscrete {
    /// Builds a distribution from explicit symbol probabilities.
    pub fn new(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(HmmError::invalid_input(
                "a discrete opdf needs at least one symbol",
            ));
        }
        let probabilities = Array1::from(probabilities);
        check_stochastic(probabilities.view(), "discrete opdf")?;
        Ok(Self { probabilities })
    }

    /// Uniform distribution over `nb_entries` symbols.
    pub fn uniform(nb_entries: usize) -> Result<Self> {
        if nb_entries == 0 {
            return Err(HmmError::invalid_input(
                "a discrete opdf needs at least one symbol",
            ));
        }
        Ok(Self {
            probabilities: Array1::from_elem(nb_entries, 1.0 / nb_entries as f64),
        })
    }

    pub fn nb_entries(&self) -> usize {
        self.probabilities.len()
    }

    pub fn probabilities(&self) -> &Array1<f64> {
        &self.probabilities
    }
}

impl Opdf for OpdfDiscrete {
    type Observation = usize;

    fn probability(&self, observation: &usize) -> f64 {
        self.probabilities.get(*observation).copied().unwrap_or(0.0)
    }

    fn fit(&mut self, observations: &[usize], weights: &[f64]) -> Result<()> {
        check_fit_args(observations, weights)?;

        let mut counts = Array1::<f64>::zeros(self.nb_entries());
        for (&o, &w) in observations.iter().zip(weights) {
            if o >= counts.len() {
                return Err(HmmError::invalid_input(format!(
                    "symbol {} is out of range for a discrete opdf of {} entries",
                    o,
                    counts.len()
                )));
            }
            counts[o] += w;
        }

        let total = counts.sum();
        if total <= 0.0 {
            return Err(HmmError::invalid_input("fit weights sum to zero"));
        }
        self.probabilities = counts / total;
        Ok(())
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let mut threshold = rng.gen::<f64>();
        for (symbol, &p) in self.probabilities.iter().enumerate() {
            if threshold < p {
                return symbol;
            }
            threshold -= p;
        }
        // Rounding left a sliver of mass past the last entry.
        self.nb_entries() - 1
    }
}

impl fmt::Display for OpdfDiscrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiscreteOPDF [")?;
        for p in &self.probabilities {
            write!(f, " {}", p)?;
        }
        write!(f, " ]")
    }
}

/// Generates uniform [`OpdfDiscrete`] instances over a fixed alphabet size.
#[derive(Debug, Clone, Copy)]
pub struct OpdfDiscreteFactory {
    nb_entries: usize,
}

impl OpdfDiscreteFactory {
    pub fn new(nb_entries: usize) -> Result<Self> {
        if nb_entries == 0 {
            return Err(HmmError::invalid_input(
                "a discrete opdf needs at least one symbol",
            ));
        }
        Ok(Self { nb_entries })
    }
}

impl OpdfFactory for OpdfDiscreteFactory {
    type Opdf = OpdfDiscrete;

    fn generate(&self) -> OpdfDiscrete {
        OpdfDiscrete {
            probabilities: Array1::from_elem(self.nb_entries, 1.0 / self.nb_entries as f64),
        }
    }
}
