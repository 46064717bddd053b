//! Baum-Welch (EM) learning for plain and input-conditioned HMMs.
//!
//! One iteration:
//! 1. run forward-backward on every training sequence against an immutable
//!    snapshot of the model (in parallel, one task per sequence),
//! 2. turn `α`/`β` into the posteriors `γ` and `ξ`,
//! 3. sum the per-sequence statistics,
//! 4. write the re-estimated parameters into a fresh copy of the model.
//!
//! Transition statistics are bucketed by the input of the step the transition
//! lands on, which is the input the forward pass used for that transition.

use log::{debug, info, trace};
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;

use super::forward_backward::{log_likelihood, ForwardBackward, ForwardBackwardResult};
use super::structure::HmmStructure;
use crate::error::{HmmError, Result};
use crate::opdf::Opdf;

/// Stopping rule of the Baum-Welch loop.
#[derive(Debug, Clone)]
pub struct BaumWelchConfig {
    /// Maximum number of parameter updates.
    pub max_iterations: usize,
    /// Stop once an iteration improves the total log-likelihood by less than
    /// this amount.
    pub tolerance: f64,
}

impl Default for BaumWelchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

impl BaumWelchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// # Errors
    /// * `InvalidInput` if `max_iterations` is zero or `tolerance` is not a
    ///   positive finite number
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(HmmError::invalid_input("max_iterations must be at least 1"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(HmmError::invalid_input(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Outcome of [`BaumWelchLearner::learn`].
#[derive(Debug, Clone, PartialEq)]
pub struct LearningReport {
    /// Number of parameter updates applied to the initial model.
    pub iterations: usize,
    /// Total log-likelihood of the model before each update, followed by that
    /// of the returned model.
    pub log_likelihoods: Vec<f64>,
    /// Whether the loop stopped on `tolerance` rather than `max_iterations`.
    pub converged: bool,
}

impl LearningReport {
    /// Log-likelihood of the returned model.
    pub fn final_log_likelihood(&self) -> f64 {
        self.log_likelihoods.last().copied().unwrap_or(f64::NEG_INFINITY)
    }
}

/// Sufficient statistics gathered over a training set in one E-step.
#[derive(Debug, Clone)]
pub struct SufficientStatistics {
    pi: Array1<f64>,
    a_numerator: Array3<f64>,
    a_denominator: Array2<f64>,
    gammas: Vec<Array2<f64>>,
    log_likelihood: f64,
}

impl SufficientStatistics {
    fn empty(nb_states: usize, nb_inputs: usize) -> Self {
        Self {
            pi: Array1::zeros(nb_states),
            a_numerator: Array3::zeros((nb_states, nb_inputs, nb_states)),
            a_denominator: Array2::zeros((nb_states, nb_inputs)),
            gammas: Vec::new(),
            log_likelihood: 0.0,
        }
    }

    fn absorb(&mut self, other: SufficientStatistics) {
        self.pi += &other.pi;
        self.a_numerator += &other.a_numerator;
        self.a_denominator += &other.a_denominator;
        self.gammas.extend(other.gammas);
        self.log_likelihood += other.log_likelihood;
    }

    /// `Σ_seq γ[0][i]`.
    pub fn pi(&self) -> &Array1<f64> {
        &self.pi
    }

    /// `[i][k][j]`: `Σ ξ[t][i][j]` over transitions taken under input `k`.
    pub fn a_numerator(&self) -> &Array3<f64> {
        &self.a_numerator
    }

    /// `[i][k]`: `Σ γ[t][i]` over transitions taken under input `k`.
    pub fn a_denominator(&self) -> &Array2<f64> {
        &self.a_denominator
    }

    /// `γ` of every training sequence, in order.
    pub fn gammas(&self) -> &[Array2<f64>] {
        &self.gammas
    }

    /// Total log-likelihood of the training set under the model the
    /// statistics were computed from.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }
}

/// `γ[t][i]`: posterior probability of being in state `i` at step `t`.
pub fn estimate_gamma(fb: &ForwardBackwardResult) -> Array2<f64> {
    fb.alpha() * fb.beta()
}

/// `ξ[t][i][j]`: posterior probability of being in `i` at `t` and in `j` at
/// `t + 1`, for `t` in `[0, T - 2]`.
///
/// # Errors
///
/// `InvalidInput` if `sequence` has fewer than two steps, `DimensionMismatch`
/// if `fb` was computed on a sequence of another length or on a model with
/// another number of states.
pub fn estimate_xi<H: HmmStructure>(
    hmm: &H,
    sequence: &[H::Step],
    fb: &ForwardBackwardResult,
) -> Result<Array3<f64>> {
    if sequence.len() < 2 {
        return Err(HmmError::invalid_input(
            "observation sequence too short: at least two steps are needed",
        ));
    }
    HmmError::check_len(sequence.len(), fb.len())?;
    let n = hmm.nb_states();
    HmmError::check_len(n, fb.alpha().ncols())?;

    let alpha = fb.alpha();
    let beta = fb.beta();
    let mut xi = Array3::zeros((sequence.len() - 1, n, n));
    for t in 0..sequence.len() - 1 {
        let next = &sequence[t + 1];
        let scale = fb.scaling()[t + 1];
        for j in 0..n {
            let tail = hmm.emission_probability(j, next) * beta[[t + 1, j]] / scale;
            for i in 0..n {
                xi[[t, i, j]] = alpha[[t, i]] * hmm.transition_probability(i, next, j) * tail;
            }
        }
    }
    Ok(xi)
}

/// Baum-Welch learner.
#[derive(Debug, Clone, Default)]
pub struct BaumWelchLearner {
    config: BaumWelchConfig,
}

impl BaumWelchLearner {
    /// Creates a learner driven by `config`.
    ///
    /// # Arguments
    /// * `config` - Stopping rule; validated when learning starts
    ///
    /// # Examples
    /// ```
    /// use hmm_em::hmm::{BaumWelchConfig, BaumWelchLearner};
    ///
    /// let learner = BaumWelchLearner::new(BaumWelchConfig::new().with_max_iterations(20));
    /// assert_eq!(learner.config().max_iterations, 20);
    /// ```
    pub fn new(config: BaumWelchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BaumWelchConfig {
        &self.config
    }

    /// Runs EM from `hmm` until the log-likelihood gain drops below
    /// `tolerance` or `max_iterations` updates have been applied.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an invalid config, an empty training set or a
    /// sequence shorter than two steps; any error of the forward-backward pass
    /// or of an opdf refit.
    pub fn learn<H, S>(&self, mut hmm: H, sequences: &[S]) -> Result<(H, LearningReport)>
    where
        H: HmmStructure,
        S: AsRef<[H::Step]> + Sync,
    {
        self.config.validate()?;
        check_training_set::<H, S>(sequences)?;

        let mut log_likelihoods = Vec::with_capacity(self.config.max_iterations + 1);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            let (next, ll) = self.iterate(&hmm, sequences)?;
            if let Some(&previous) = log_likelihoods.last() {
                let gain = ll - previous;
                debug!(
                    "baum-welch iteration {}: log-likelihood {:.6} (gain {:.3e})",
                    iterations, ll, gain
                );
                if gain < self.config.tolerance {
                    log_likelihoods.push(ll);
                    converged = true;
                    break;
                }
            } else {
                debug!("baum-welch iteration 0: log-likelihood {:.6}", ll);
            }
            log_likelihoods.push(ll);
            hmm = next;
            iterations += 1;
        }

        if converged {
            info!(
                "baum-welch converged after {} iterations, log-likelihood {:.6}",
                iterations,
                log_likelihoods[log_likelihoods.len() - 1]
            );
        } else {
            let ll = log_likelihood(&hmm, sequences)?;
            if let Some(&previous) = log_likelihoods.last() {
                converged = ll - previous < self.config.tolerance;
            }
            log_likelihoods.push(ll);
            info!(
                "baum-welch stopped after {} iterations, log-likelihood {:.6}",
                iterations, ll
            );
        }

        Ok((
            hmm,
            LearningReport {
                iterations,
                log_likelihoods,
                converged,
            },
        ))
    }

    /// One EM step. Returns the re-estimated model and the total
    /// log-likelihood of `hmm` on `sequences`.
    ///
    /// # Arguments
    /// * `hmm` - Current model; left untouched
    /// * `sequences` - Training sequences, each at least two steps long
    ///
    /// # Errors
    /// * `InvalidInput` for an empty training set or a sequence that is too short
    /// * `ZeroLikelihood` if a sequence is impossible under `hmm`
    pub fn iterate<H, S>(&self, hmm: &H, sequences: &[S]) -> Result<(H, f64)>
    where
        H: HmmStructure,
        S: AsRef<[H::Step]> + Sync,
    {
        let stats = self.statistics(hmm, sequences)?;
        let ll = stats.log_likelihood();
        let next = commit(hmm, sequences, &stats)?;
        Ok((next, ll))
    }

    /// E-step: per-sequence statistics computed in parallel and summed.
    pub fn statistics<H, S>(&self, hmm: &H, sequences: &[S]) -> Result<SufficientStatistics>
    where
        H: HmmStructure,
        S: AsRef<[H::Step]> + Sync,
    {
        check_training_set::<H, S>(sequences)?;
        let per_sequence = sequences
            .par_iter()
            .map(|s| sequence_statistics(hmm, s.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut total = SufficientStatistics::empty(hmm.nb_states(), hmm.nb_inputs());
        for stats in per_sequence {
            total.absorb(stats);
        }
        Ok(total)
    }
}

fn check_training_set<H, S>(sequences: &[S]) -> Result<()>
where
    H: HmmStructure,
    S: AsRef<[H::Step]>,
{
    if sequences.is_empty() {
        return Err(HmmError::invalid_input("training set is empty"));
    }
    if let Some(idx) = sequences.iter().position(|s| s.as_ref().len() < 2) {
        return Err(HmmError::invalid_input(format!(
            "training sequence {} is too short: at least two steps are needed",
            idx
        )));
    }
    Ok(())
}

fn sequence_statistics<H: HmmStructure>(
    hmm: &H,
    sequence: &[H::Step],
) -> Result<SufficientStatistics> {
    let fb = ForwardBackward::compute(hmm, sequence)?;
    let gamma = estimate_gamma(&fb);
    let xi = estimate_xi(hmm, sequence, &fb)?;

    let n = hmm.nb_states();
    let mut stats = SufficientStatistics::empty(n, hmm.nb_inputs());
    stats.pi.assign(&gamma.row(0));
    for t in 0..sequence.len() - 1 {
        let k = hmm.input_index(&sequence[t + 1]);
        for i in 0..n {
            stats.a_denominator[[i, k]] += gamma[[t, i]];
            for j in 0..n {
                stats.a_numerator[[i, k, j]] += xi[[t, i, j]];
            }
        }
    }
    stats.log_likelihood = fb.log_probability();
    stats.gammas.push(gamma);
    Ok(stats)
}

/// M-step: writes the re-estimated parameters into a copy of `hmm`.
fn commit<H, S>(hmm: &H, sequences: &[S], stats: &SufficientStatistics) -> Result<H>
where
    H: HmmStructure,
    S: AsRef<[H::Step]>,
{
    let n = hmm.nb_states();
    let m = hmm.nb_inputs();
    let mut next = hmm.clone();

    let pi_total = stats.pi.sum();
    for i in 0..n {
        next.set_pi(i, stats.pi[i] / pi_total);
    }

    for i in 0..n {
        for k in 0..m {
            let den = stats.a_denominator[[i, k]];
            if den > 0.0 {
                for j in 0..n {
                    next.set_a(i, k, j, stats.a_numerator[[i, k, j]] / den);
                }
            } else {
                // No transition out of i was observed under k.
                trace!("keeping transition row ({}, {})", i, k);
            }
        }
    }

    for k in 0..m {
        let mut observations = Vec::new();
        let mut positions = Vec::new();
        for (s, sequence) in sequences.iter().enumerate() {
            for (t, step) in sequence.as_ref().iter().enumerate() {
                if hmm.input_index(step) == k {
                    observations.push(hmm.observation(step).clone());
                    positions.push((s, t));
                }
            }
        }
        if observations.is_empty() {
            trace!("input {} never observed, keeping its opdfs", k);
            continue;
        }

        for i in 0..n {
            let mut weights: Vec<f64> = positions
                .iter()
                .map(|&(s, t)| stats.gammas[s][[t, i]])
                .collect();
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                trace!("state {} has no weight under input {}, keeping its opdf", i, k);
                continue;
            }
            weights.iter_mut().for_each(|w| *w /= total);
            next.opdf_mut(i, k).fit(&observations, &weights)?;
        }
    }

    Ok(next)
}
