use ndarray::Array2;

use super::structure::HmmStructure;
use crate::error::{HmmError, Result};

/// Runs the Viterbi algorithm for `hmm` over `sequence`.
///
/// Returns the most likely hidden state path together with its joint
/// log-probability `ln P(path, sequence)`. Works in log-space, so the length
/// of the sequence does not matter.
///
/// # Errors
///
/// `InvalidInput` if `sequence` is empty, the model has no states or a step is
/// rejected by the model.
///
/// # Example
///
/// ```
/// use hmm_em::hmm::{viterbi, Hmm};
/// use hmm_em::opdf::OpdfDiscrete;
/// use ndarray::array;
///
/// let hmm = Hmm::new(
///     array![0.6, 0.4],
///     array![[0.7, 0.3], [0.4, 0.6]],
///     vec![
///         OpdfDiscrete::new(vec![0.5, 0.4, 0.1]).unwrap(),
///         OpdfDiscrete::new(vec![0.1, 0.3, 0.6]).unwrap(),
///     ],
/// )
/// .unwrap();
///
/// let (path, _) = viterbi(&hmm, &[0, 1, 2]).unwrap();
/// assert_eq!(path, vec![0, 0, 1]);
/// ```
pub fn viterbi<H: HmmStructure>(hmm: &H, sequence: &[H::Step]) -> Result<(Vec<usize>, f64)> {
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

    // delta[t][s]: highest log-probability of any path that ends in state s at time t
    // psi[t][s]: which state at time t-1 led to the best path ending in s at time t
    let mut delta = Array2::from_elem((t_len, n), f64::NEG_INFINITY);
    let mut psi = Array2::<usize>::zeros((t_len, n));

    for s in 0..n {
        delta[[0, s]] = hmm.pi(s).ln() + hmm.emission_probability(s, &sequence[0]).ln();
    }

    for t in 1..t_len {
        let step = &sequence[t];
        for s in 0..n {
            let emit_log = hmm.emission_probability(s, step).ln();

            let mut best_val = f64::NEG_INFINITY;
            let mut best_prev = 0_usize;
            for s_prev in 0..n {
                let candidate =
                    delta[[t - 1, s_prev]] + hmm.transition_probability(s_prev, step, s).ln();
                if candidate > best_val {
                    best_val = candidate;
                    best_prev = s_prev;
                }
            }
            delta[[t, s]] = best_val + emit_log;
            psi[[t, s]] = best_prev;
        }
    }

    let mut best_final_score = f64::NEG_INFINITY;
    let mut best_final_state = 0_usize;
    for s in 0..n {
        if delta[[t_len - 1, s]] > best_final_score {
            best_final_score = delta[[t_len - 1, s]];
            best_final_state = s;
        }
    }

    let mut path = vec![0_usize; t_len];
    path[t_len - 1] = best_final_state;
    for t in (1..t_len).rev() {
        path[t - 1] = psi[[t, path[t]]];
    }

    Ok((path, best_final_score))
}
