//! The contract shared by every HMM variant.
//!
//! A plain HMM is treated as an input-conditioned HMM over a single input
//! symbol: transitions are always addressed as `a(i, k, j)` and the input
//! bucket `k` of a step is given by [`HmmStructure::input_index`]. The
//! forward-backward calculator, the Baum-Welch learner and Viterbi are written
//! once against this trait.

use approx::abs_diff_eq;
use ndarray::ArrayView1;

use crate::error::{HmmError, Result};
use crate::opdf::Opdf;

/// Tolerance used when checking that probability vectors sum to one.
pub const STOCHASTIC_TOLERANCE: f64 = 1e-6;

pub trait HmmStructure: Clone + Send + Sync {
    /// Emission distribution family shared by all states.
    type Opdf: Opdf;
    /// One element of an observation sequence.
    type Step: Send + Sync;

    fn nb_states(&self) -> usize;

    /// Size of the input alphabet; 1 for a plain HMM.
    fn nb_inputs(&self) -> usize;

    /// Dense input bucket `k` in `[0, nb_inputs())` that conditions the
    /// transition into `step` and the emission of `step`.
    fn input_index(&self, step: &Self::Step) -> usize;

    fn observation<'a>(&self, step: &'a Self::Step) -> &'a <Self::Opdf as Opdf>::Observation;

    /// Rejects steps the model cannot evaluate (e.g. an out-of-range input).
    fn check_step(&self, _step: &Self::Step) -> Result<()> {
        Ok(())
    }

    fn pi(&self, state: usize) -> f64;

    fn set_pi(&mut self, state: usize, value: f64);

    /// Probability of moving from `from` to `to` under input bucket `input`.
    fn a(&self, from: usize, input: usize, to: usize) -> f64;

    fn set_a(&mut self, from: usize, input: usize, to: usize, value: f64);

    fn opdf(&self, state: usize, input: usize) -> &Self::Opdf;

    fn opdf_mut(&mut self, state: usize, input: usize) -> &mut Self::Opdf;

    /// Transition lookup for the move `from -> to` that lands on `step`.
    fn transition_probability(&self, from: usize, step: &Self::Step, to: usize) -> f64 {
        self.a(from, self.input_index(step), to)
    }

    fn emission_probability(&self, state: usize, step: &Self::Step) -> f64 {
        self.opdf(state, self.input_index(step))
            .probability(self.observation(step))
    }

    /// Checks that `pi` and every transition row are probability vectors.
    fn validate(&self) -> Result<()> {
        let n = self.nb_states();
        if n == 0 {
            return Err(HmmError::invalid_input("number of states must be positive"));
        }
        let pi: Vec<f64> = (0..n).map(|i| self.pi(i)).collect();
        check_stochastic(ArrayView1::from(&pi[..]), "initial distribution")?;
        for i in 0..n {
            for k in 0..self.nb_inputs() {
                let row: Vec<f64> = (0..n).map(|j| self.a(i, k, j)).collect();
                check_stochastic(
                    ArrayView1::from(&row[..]),
                    &format!("transition row ({}, {})", i, k),
                )?;
            }
        }
        Ok(())
    }
}

/// Fails unless `values` is non-negative and sums to one.
pub(crate) fn check_stochastic(values: ArrayView1<f64>, what: &str) -> Result<()> {
    if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(HmmError::invalid_input(format!(
            "{} contains an invalid probability {}",
            what, v
        )));
    }
    let sum = values.sum();
    if !abs_diff_eq!(sum, 1.0, epsilon = STOCHASTIC_TOLERANCE) {
        return Err(HmmError::invalid_input(format!(
            "{} must sum to 1, got {}",
            what, sum
        )));
    }
    Ok(())
}
