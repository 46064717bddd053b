//! Observation probability distribution functions (opdfs).
//!
//! Every hidden state of an HMM owns one opdf. The learning engine only talks
//! to them through the [`Opdf`] trait, so any distribution family can be
//! plugged in without touching the forward-backward or Baum-Welch code.

pub mod discrete;
pub mod gaussian;
pub mod multi_gaussian;

pub use discrete::{OpdfDiscrete, OpdfDiscreteFactory};
pub use gaussian::{OpdfGaussian, OpdfGaussianFactory};
pub use multi_gaussian::{OpdfMultiGaussian, OpdfMultiGaussianFactory};

use rand::Rng;

use crate::error::{HmmError, Result};

/// An emission distribution attached to a hidden state.
pub trait Opdf: Clone + Send + Sync {
    /// The type of value this distribution emits.
    type Observation: Clone + Send + Sync;

    /// Likelihood (density or mass) of `observation`. Never negative.
    fn probability(&self, observation: &Self::Observation) -> f64;

    /// Refits the distribution to `observations`, where `weights[n]` is the
    /// weight of `observations[n]`.
    ///
    /// Weights are non-negative and sum to one.
    fn fit(&mut self, observations: &[Self::Observation], weights: &[f64]) -> Result<()>;

    /// Draws one observation from the distribution.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Observation;
}

/// Builds fresh opdf instances, typically for the initial guess of a model.
pub trait OpdfFactory {
    type Opdf: Opdf;

    fn generate(&self) -> Self::Opdf;
}

/// Shared argument checks for [`Opdf::fit`] implementations.
pub(crate) fn check_fit_args<O>(observations: &[O], weights: &[f64]) -> Result<()> {
    HmmError::check_len(observations.len(), weights.len())?;
    if observations.is_empty() {
        return Err(HmmError::invalid_input("cannot fit an opdf to no observations"));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(HmmError::invalid_input(format!(
            "fit weights must be finite and non-negative, got {}",
            w
        )));
    }
    Ok(())
}
