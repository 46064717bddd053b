//! Sampling of state and observation sequences from a model.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::input::{InputHmm, InputObservation};
use super::plain::Hmm;
use super::structure::HmmStructure;
use crate::error::{HmmError, Result};
use crate::opdf::Opdf;

/// Draws sequences from HMMs.
pub struct MarkovGenerator {
    rng: ChaCha20Rng,
}

impl Default for MarkovGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkovGenerator {
    /// Create a generator seeded from system entropy.
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Create a generator whose output is fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Samples `len` steps, returning the hidden states and the observations.
    ///
    /// # Errors
    /// * `InvalidInput` if `len` is zero
    pub fn states_and_observations<D: Opdf>(
        &mut self,
        hmm: &Hmm<D>,
        len: usize,
    ) -> Result<(Vec<usize>, Vec<D::Observation>)> {
        if len == 0 {
            return Err(HmmError::invalid_input("sequence length must be positive"));
        }
        Ok(self.walk(hmm, std::iter::repeat(0).take(len)))
    }

    /// Samples a single observation sequence of `len` steps.
    ///
    /// # Arguments
    /// * `hmm` - The model to sample from
    /// * `len` - Number of steps to draw
    ///
    /// # Errors
    /// * `InvalidInput` if `len` is zero
    pub fn observation_sequence<D: Opdf>(
        &mut self,
        hmm: &Hmm<D>,
        len: usize,
    ) -> Result<Vec<D::Observation>> {
        self.states_and_observations(hmm, len)
            .map(|(_, observations)| observations)
    }

    /// Samples `count` independent observation sequences of `len` steps each.
    ///
    /// # Arguments
    /// * `hmm` - The model to sample from
    /// * `count` - Number of sequences
    /// * `len` - Number of steps in every sequence
    ///
    /// # Errors
    /// * `InvalidInput` if `len` is zero
    pub fn observation_sequences<D: Opdf>(
        &mut self,
        hmm: &Hmm<D>,
        count: usize,
        len: usize,
    ) -> Result<Vec<Vec<D::Observation>>> {
        (0..count)
            .map(|_| self.observation_sequence(hmm, len))
            .collect()
    }

    /// Samples one step per entry of `inputs` from an input-conditioned model.
    ///
    /// # Errors
    /// * `InvalidInput` if `inputs` is empty or holds an index outside the
    ///   model's input range
    pub fn input_observation_sequence<D: Opdf>(
        &mut self,
        hmm: &InputHmm<D>,
        inputs: &[usize],
    ) -> Result<Vec<InputObservation<D::Observation>>> {
        if inputs.is_empty() {
            return Err(HmmError::invalid_input("sequence length must be positive"));
        }
        if let Some(&k) = inputs.iter().find(|&&k| k >= hmm.nb_inputs()) {
            return Err(HmmError::invalid_input(format!(
                "input index {} is out of range for {} inputs",
                k,
                hmm.nb_inputs()
            )));
        }
        let (_, observations) = self.walk(hmm, inputs.iter().copied());
        Ok(inputs
            .iter()
            .zip(observations)
            .map(|(&k, o)| InputObservation::new(k, o))
            .collect())
    }

    fn walk<H, I>(
        &mut self,
        hmm: &H,
        inputs: I,
    ) -> (Vec<usize>, Vec<<H::Opdf as Opdf>::Observation>)
    where
        H: HmmStructure,
        I: Iterator<Item = usize>,
    {
        let n = hmm.nb_states();
        let mut states = Vec::new();
        let mut observations = Vec::new();
        let mut current: Option<usize> = None;

        for k in inputs {
            let state = match current {
                None => self.pick((0..n).map(|i| hmm.pi(i))),
                Some(prev) => self.pick((0..n).map(|j| hmm.a(prev, k, j))),
            };
            observations.push(hmm.opdf(state, k).sample(&mut self.rng));
            states.push(state);
            current = Some(state);
        }
        (states, observations)
    }

    /// Draws an index from a probability vector.
    fn pick(&mut self, probabilities: impl Iterator<Item = f64>) -> usize {
        let mut threshold = self.rng.gen::<f64>();
        let mut last = 0;
        for (i, p) in probabilities.enumerate() {
            if threshold < p {
                return i;
            }
            threshold -= p;
            last = i;
        }
        last
    }
}
