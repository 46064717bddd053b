//! Scaled forward-backward computation.
//!
//! Each forward row is normalised by its sum `c_t` and the backward row at `t`
//! is divided by `c_{t+1}`, so with `α̂` and `β̂` the scaled tables:
//!
//! - `α̂[t][i] β̂[t][i]` is the posterior `γ[t][i]` directly,
//! - `ln P(O) = Σ_t ln c_t`,
//!
//! and nothing underflows no matter how long the sequence is.

use ndarray::{Array1, Array2};

use super::structure::HmmStructure;
use crate::error::{HmmError, Result};

/// Scaled forward and backward tables of one sequence.
#[derive(Debug, Clone)]
pub struct ForwardBackwardResult {
    alpha: Array2<f64>,
    beta: Array2<f64>,
    scaling: Array1<f64>,
    log_probability: f64,
}

impl ForwardBackwardResult {
    /// Scaled forward table, `T x N`. Each row sums to one.
    pub fn alpha(&self) -> &Array2<f64> {
        &self.alpha
    }

    /// Scaled backward table, `T x N`.
    pub fn beta(&self) -> &Array2<f64> {
        &self.beta
    }

    /// Per-step scaling factors `c_t`.
    pub fn scaling(&self) -> &Array1<f64> {
        &self.scaling
    }

    /// `ln P(O | model)`.
    pub fn log_probability(&self) -> f64 {
        self.log_probability
    }

    /// `P(O | model)`. Underflows to zero on long sequences; prefer
    /// [`ForwardBackwardResult::log_probability`].
    pub fn probability(&self) -> f64 {
        self.log_probability.exp()
    }

    pub fn len(&self) -> usize {
        self.alpha.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.nrows() == 0
    }
}

/// Forward-backward calculator, generic over plain and input-conditioned HMMs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardBackward;

impl ForwardBackward {
    /// Runs both passes over `sequence`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `sequence` is empty, the model has no states, or a
    ///   step is rejected by the model
    /// - `ZeroLikelihood` if some prefix of `sequence` is impossible
    pub fn compute<H: HmmStructure>(
        hmm: &H,
        sequence: &[H::Step],
    ) -> Result<ForwardBackwardResult> {
        let n = hmm.nb_states();
        if n == 0 {
            return Err(HmmError::invalid_input("number of states must be positive"));
        }
        if sequence.is_empty() {
            return Err(HmmError::invalid_input("observation sequence is empty"));
        }
        for step in sequence {
            hmm.check_step(step)?;
        }

        let t_len = sequence.len();
        let emissions = Array2::from_shape_fn((t_len, n), |(t, i)| {
            hmm.emission_probability(i, &sequence[t])
        });

        // Forward pass
        let mut alpha = Array2::<f64>::zeros((t_len, n));
        let mut scaling = Array1::<f64>::zeros(t_len);
        for i in 0..n {
            alpha[[0, i]] = hmm.pi(i) * emissions[[0, i]];
        }
        normalize_row(&mut alpha, &mut scaling, 0)?;

        for t in 1..t_len {
            let step = &sequence[t];
            for j in 0..n {
                let mut sum = 0.0;
                for i in 0..n {
                    sum += alpha[[t - 1, i]] * hmm.transition_probability(i, step, j);
                }
                alpha[[t, j]] = sum * emissions[[t, j]];
            }
            normalize_row(&mut alpha, &mut scaling, t)?;
        }

        // Backward pass
        let mut beta = Array2::<f64>::zeros((t_len, n));
        beta.row_mut(t_len - 1).fill(1.0);
        for t in (0..t_len - 1).rev() {
            let next = &sequence[t + 1];
            for i in 0..n {
                let mut sum = 0.0;
                for j in 0..n {
                    sum += hmm.transition_probability(i, next, j)
                        * emissions[[t + 1, j]]
                        * beta[[t + 1, j]];
                }
                beta[[t, i]] = sum / scaling[t + 1];
            }
        }

        let log_probability: f64 = scaling.iter().map(|c| c.ln()).sum();
        Ok(ForwardBackwardResult {
            alpha,
            beta,
            scaling,
            log_probability,
        })
    }
}

/// Divides row `t` of `alpha` by its sum and records the sum in `scaling`.
fn normalize_row(alpha: &mut Array2<f64>, scaling: &mut Array1<f64>, t: usize) -> Result<()> {
    let sum = alpha.row(t).sum();
    if sum.is_nan() || sum <= 0.0 {
        return Err(HmmError::ZeroLikelihood { position: t });
    }
    alpha.row_mut(t).mapv_inplace(|v| v / sum);
    scaling[t] = sum;
    Ok(())
}

/// Total `ln P(O | model)` over several sequences.
pub fn log_likelihood<H, S>(hmm: &H, sequences: &[S]) -> Result<f64>
where
    H: HmmStructure,
    S: AsRef<[H::Step]>,
{
    sequences
        .iter()
        .map(|s| ForwardBackward::compute(hmm, s.as_ref()).map(|fb| fb.log_probability()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::input::{InputHmm, InputObservation};
    use crate::hmm::plain::Hmm;
    use crate::opdf::{Opdf, OpdfDiscrete, OpdfDiscreteFactory, OpdfGaussian};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn two_state() -> Hmm<OpdfDiscrete> {
        Hmm::new(
            array![0.5, 0.5],
            array![[0.9, 0.1], [0.2, 0.8]],
            vec![
                OpdfDiscrete::new(vec![0.7, 0.3]).unwrap(),
                OpdfDiscrete::new(vec![0.2, 0.8]).unwrap(),
            ],
        )
        .unwrap()
    }

    /// Sums the joint probability of every state path.
    fn brute_force(hmm: &Hmm<OpdfDiscrete>, obs: &[usize]) -> f64 {
        let n = hmm.nb_states();
        let t_len = obs.len();
        let mut total = 0.0;
        for code in 0..n.pow(t_len as u32) {
            let mut path = Vec::with_capacity(t_len);
            let mut c = code;
            for _ in 0..t_len {
                path.push(c % n);
                c /= n;
            }
            let mut p = hmm.pi(path[0]) * hmm.emission_probability(path[0], &obs[0]);
            for t in 1..t_len {
                p *= hmm.a(path[t - 1], 0, path[t]) * hmm.emission_probability(path[t], &obs[t]);
            }
            total += p;
        }
        total
    }

    #[test]
    fn test_probability_matches_enumeration() {
        let hmm = two_state();
        let obs = [0usize, 0, 1, 0];
        let fb = ForwardBackward::compute(&hmm, &obs).unwrap();
        assert_relative_eq!(
            fb.probability(),
            brute_force(&hmm, &obs),
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_single_observation() {
        let hmm = two_state();
        let fb = ForwardBackward::compute(&hmm, &[1usize]).unwrap();
        assert_relative_eq!(fb.probability(), 0.5 * 0.3 + 0.5 * 0.8, epsilon = 1e-12);
        assert_eq!(fb.len(), 1);
        assert_relative_eq!(fb.beta()[[0, 0]], 1.0);
    }

    #[test]
    fn test_forward_backward_agree() {
        let hmm = two_state();
        let obs = [1usize, 0, 0, 1, 1, 0, 1];
        let fb = ForwardBackward::compute(&hmm, &obs).unwrap();

        // P(O) recovered from t = 0 of the backward pass
        let head: f64 = (0..2)
            .map(|i| hmm.pi(i) * hmm.emission_probability(i, &obs[0]) * fb.beta()[[0, i]])
            .sum();
        let tail: f64 = fb.scaling().iter().skip(1).map(|c| c.ln()).sum();
        assert_relative_eq!(head.ln() + tail, fb.log_probability(), epsilon = 1e-10);
    }

    #[test]
    fn test_alpha_rows_are_normalised() {
        let hmm = two_state();
        let fb = ForwardBackward::compute(&hmm, &[0usize, 1, 1, 0]).unwrap();
        for row in fb.alpha().rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_long_sequence_does_not_underflow() {
        let hmm = two_state();
        let obs: Vec<usize> = (0..5000).map(|t| (t / 7) % 2).collect();
        let fb = ForwardBackward::compute(&hmm, &obs).unwrap();
        assert!(fb.log_probability().is_finite());
        assert!(fb.log_probability() < -1000.0);
        assert_eq!(fb.probability(), 0.0);
        assert!(fb.alpha().iter().all(|v| v.is_finite()));
        assert!(fb.beta().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_empty_sequence_fails() {
        let hmm = two_state();
        let empty: [usize; 0] = [];
        assert!(matches!(
            ForwardBackward::compute(&hmm, &empty),
            Err(HmmError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_impossible_sequence() {
        let hmm = Hmm::new(
            array![1.0, 0.0],
            array![[1.0, 0.0], [0.0, 1.0]],
            vec![
                OpdfDiscrete::new(vec![1.0, 0.0]).unwrap(),
                OpdfDiscrete::new(vec![0.0, 1.0]).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(
            ForwardBackward::compute(&hmm, &[0usize, 0, 1]).unwrap_err(),
            HmmError::ZeroLikelihood { position: 2 }
        );
    }

    #[test]
    fn test_gaussian_emissions() {
        let hmm = Hmm::new(array![1.0], array![[1.0]], vec![OpdfGaussian::default()]).unwrap();
        let obs = [0.0, 1.0, -1.0];
        let fb = ForwardBackward::compute(&hmm, &obs).unwrap();
        let expected: f64 = obs.iter().map(|x| OpdfGaussian::default().probability(x).ln()).sum();
        assert_relative_eq!(fb.log_probability(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_input_hmm_with_constant_input_matches_plain() {
        let plain = two_state();
        let input = InputHmm::with_shared_opdfs(
            array![0.5, 0.5],
            array![[[0.9, 0.1], [0.3, 0.7]], [[0.2, 0.8], [0.5, 0.5]]],
            plain.opdfs().to_vec(),
        )
        .unwrap();
        let obs = [0usize, 0, 1, 0, 1, 1];
        let steps: Vec<_> = obs.iter().map(|&o| InputObservation::new(0, o)).collect();

        let a = ForwardBackward::compute(&plain, &obs).unwrap();
        let b = ForwardBackward::compute(&input, &steps).unwrap();
        assert_relative_eq!(a.log_probability(), b.log_probability(), epsilon = 1e-12);
        for (x, y) in a.alpha().iter().zip(b.alpha().iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
        for (x, y) in a.beta().iter().zip(b.beta().iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_input_out_of_range() {
        let input = InputHmm::uniform(2, 2, &OpdfDiscreteFactory::new(2).unwrap()).unwrap();
        let steps = vec![InputObservation::new(0, 0usize), InputObservation::new(5, 1)];
        assert!(ForwardBackward::compute(&input, &steps).is_err());
    }

    #[test]
    fn test_log_likelihood_sums_sequences() {
        let hmm = two_state();
        let seqs = vec![vec![0usize, 1], vec![1, 1, 0]];
        let total = log_likelihood(&hmm, &seqs).unwrap();
        let expected = ForwardBackward::compute(&hmm, &seqs[0]).unwrap().log_probability()
            + ForwardBackward::compute(&hmm, &seqs[1]).unwrap().log_probability();
        assert_relative_eq!(total, expected, epsilon = 1e-12);
    }
}
