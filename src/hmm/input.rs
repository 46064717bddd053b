//! Input-conditioned HMMs.
//!
//! At every step an input symbol is observed alongside the emitted value. The
//! transition into that step and the emission of that step are both selected
//! by the input, so transitions form an `[N][M][N]` tensor and each state owns
//! one opdf per input.

use std::collections::HashMap;
use std::hash::Hash;

use ndarray::{Array1, Array3};

use super::structure::HmmStructure;
use crate::error::{HmmError, Result};
use crate::opdf::{Opdf, OpdfFactory};

/// One step of an input-conditioned sequence: the dense input index and the
/// observation emitted under it.
#[derive(Debug, Clone, PartialEq)]
pub struct InputObservation<O> {
    pub input: usize,
    pub observation: O,
}

impl<O> InputObservation<O> {
    pub fn new(input: usize, observation: O) -> Self {
        Self { input, observation }
    }
}

/// Maps input symbols of any hashable type onto dense indices `0..M`.
#[derive(Debug, Clone)]
pub struct InputAlphabet<I> {
    symbols: Vec<I>,
    indices: HashMap<I, usize>,
}

impl<I: Eq + Hash + Clone> InputAlphabet<I> {
    /// Assigns each symbol its position in `symbols` as input index.
    ///
    /// # Errors
    /// * `InvalidInput` if `symbols` is empty or holds a duplicate
    pub fn new(symbols: Vec<I>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(HmmError::invalid_input(
                "input alphabet needs at least one symbol",
            ));
        }
        let mut indices = HashMap::with_capacity(symbols.len());
        for (k, s) in symbols.iter().enumerate() {
            if indices.insert(s.clone(), k).is_some() {
                return Err(HmmError::invalid_input(format!(
                    "input symbol at position {} is a duplicate",
                    k
                )));
            }
        }
        Ok(Self { symbols, indices })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn index(&self, symbol: &I) -> Option<usize> {
        self.indices.get(symbol).copied()
    }

    pub fn symbol(&self, index: usize) -> Option<&I> {
        self.symbols.get(index)
    }

    /// Converts `(symbol, observation)` pairs into dense input observations.
    ///
    /// # Errors
    /// * `InvalidInput` if a symbol is not part of the alphabet
    pub fn encode<O: Clone>(&self, sequence: &[(I, O)]) -> Result<Vec<InputObservation<O>>> {
        sequence
            .iter()
            .enumerate()
            .map(|(t, (symbol, o))| {
                self.index(symbol)
                    .map(|k| InputObservation::new(k, o.clone()))
                    .ok_or_else(|| {
                        HmmError::invalid_input(format!("unknown input symbol at step {}", t))
                    })
            })
            .collect()
    }
}

/// An HMM whose transitions and emissions depend on an observed input.
///
/// - `pi[i]`: probability of starting in state `i`
/// - `a[[i, k, j]]`: probability of moving from `i` to `j` when input `k` is observed
/// - `opdfs[i][k]`: emission distribution of state `i` under input `k`
#[derive(Debug, Clone)]
pub struct InputHmm<D: Opdf> {
    pi: Array1<f64>,
    a: Array3<f64>,
    opdfs: Vec<Vec<D>>,
}

impl<D: Opdf> InputHmm<D> {
    /// # Errors
    ///
    /// `InvalidInput` on zero states or inputs or on non-stochastic rows,
    /// `DimensionMismatch` if `a` or `opdfs` disagree with `pi`.
    pub fn new(pi: Array1<f64>, a: Array3<f64>, opdfs: Vec<Vec<D>>) -> Result<Self> {
        let (n, m, n2) = a.dim();
        if pi.is_empty() {
            return Err(HmmError::invalid_input("number of states must be positive"));
        }
        if m == 0 {
            return Err(HmmError::invalid_input("number of inputs must be positive"));
        }
        HmmError::check_len(pi.len(), n)?;
        HmmError::check_len(pi.len(), n2)?;
        HmmError::check_len(pi.len(), opdfs.len())?;
        for row in &opdfs {
            HmmError::check_len(m, row.len())?;
        }

        let hmm = Self { pi, a, opdfs };
        hmm.validate()?;
        Ok(hmm)
    }

    /// Like [`InputHmm::new`] with one opdf per state, reused for every input.
    pub fn with_shared_opdfs(pi: Array1<f64>, a: Array3<f64>, opdfs: Vec<D>) -> Result<Self> {
        let m = a.dim().1;
        let opdfs = opdfs.into_iter().map(|o| vec![o; m]).collect();
        Self::new(pi, a, opdfs)
    }

    /// A model with uniform initial and transition probabilities for every
    /// input, with one opdf per `(state, input)` produced by `factory`.
    ///
    /// # Arguments
    /// * `nb_states` - Number of hidden states
    /// * `nb_inputs` - Size of the input alphabet
    /// * `factory` - Source of the initial emission distributions
    ///
    /// # Errors
    /// * `InvalidInput` if `nb_states` or `nb_inputs` is zero
    pub fn uniform<F>(nb_states: usize, nb_inputs: usize, factory: &F) -> Result<Self>
    where
        F: OpdfFactory<Opdf = D>,
    {
        if nb_states == 0 {
            return Err(HmmError::invalid_input("number of states must be positive"));
        }
        if nb_inputs == 0 {
            return Err(HmmError::invalid_input("number of inputs must be positive"));
        }
        let p = 1.0 / nb_states as f64;
        Ok(Self {
            pi: Array1::from_elem(nb_states, p),
            a: Array3::from_elem((nb_states, nb_inputs, nb_states), p),
            opdfs: (0..nb_states)
                .map(|_| (0..nb_inputs).map(|_| factory.generate()).collect())
                .collect(),
        })
    }

    pub fn pi_vector(&self) -> &Array1<f64> {
        &self.pi
    }

    pub fn transitions(&self) -> &Array3<f64> {
        &self.a
    }

    pub fn opdfs(&self) -> &[Vec<D>] {
        &self.opdfs
    }
}

impl<D: Opdf> HmmStructure for InputHmm<D> {
    type Opdf = D;
    type Step = InputObservation<D::Observation>;

    fn nb_states(&self) -> usize {
        self.pi.len()
    }

    fn nb_inputs(&self) -> usize {
        self.a.dim().1
    }

    fn input_index(&self, step: &Self::Step) -> usize {
        step.input
    }

    fn observation<'a>(&self, step: &'a Self::Step) -> &'a D::Observation {
        &step.observation
    }

    fn check_step(&self, step: &Self::Step) -> Result<()> {
        if step.input >= self.nb_inputs() {
            return Err(HmmError::invalid_input(format!(
                "input index {} is out of range for {} inputs",
                step.input,
                self.nb_inputs()
            )));
        }
        Ok(())
    }

    fn pi(&self, state: usize) -> f64 {
        self.pi[state]
    }

    fn set_pi(&mut self, state: usize, value: f64) {
        self.pi[state] = value;
    }

    fn a(&self, from: usize, input: usize, to: usize) -> f64 {
        self.a[[from, input, to]]
    }

    fn set_a(&mut self, from: usize, input: usize, to: usize, value: f64) {
        self.a[[from, input, to]] = value;
    }

    fn opdf(&self, state: usize, input: usize) -> &D {
        &self.opdfs[state][input]
    }

    fn opdf_mut(&mut self, state: usize, input: usize) -> &mut D {
        &mut self.opdfs[state][input]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opdf::{OpdfDiscrete, OpdfDiscreteFactory};
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_alphabet_round_trip() {
        let alphabet = InputAlphabet::new(vec!["left", "right"]).unwrap();
        assert_eq!(alphabet.len(), 2);
        assert_eq!(alphabet.index(&"right"), Some(1));
        assert_eq!(alphabet.symbol(0), Some(&"left"));
        assert_eq!(alphabet.index(&"up"), None);

        let encoded = alphabet.encode(&[("right", 3usize), ("left", 1)]).unwrap();
        assert_eq!(encoded, vec![InputObservation::new(1, 3), InputObservation::new(0, 1)]);
        assert!(alphabet.encode(&[("up", 0usize)]).is_err());
    }

    #[test]
    fn test_alphabet_rejects_duplicates() {
        assert!(InputAlphabet::new(vec!['a', 'b', 'a']).is_err());
        assert!(InputAlphabet::<char>::new(vec![]).is_err());
    }

    #[test]
    fn test_transition_depends_on_input() {
        let hmm = InputHmm::with_shared_opdfs(
            array![0.5, 0.5],
            array![[[0.9, 0.1], [0.1, 0.9]], [[0.2, 0.8], [0.6, 0.4]]],
            vec![
                OpdfDiscrete::new(vec![0.7, 0.3]).unwrap(),
                OpdfDiscrete::new(vec![0.2, 0.8]).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(hmm.nb_inputs(), 2);
        let step = InputObservation::new(1, 0usize);
        assert_relative_eq!(hmm.transition_probability(0, &step, 1), 0.9);
        assert_relative_eq!(hmm.transition_probability(1, &step, 0), 0.6);
        assert_relative_eq!(hmm.emission_probability(1, &step), 0.2);
        assert!(hmm.check_step(&InputObservation::new(2, 0usize)).is_err());
    }

    #[test]
    fn test_invalid_construction() {
        let factory = OpdfDiscreteFactory::new(2).unwrap();
        assert!(InputHmm::uniform(0, 2, &factory).is_err());
        assert!(InputHmm::uniform(2, 0, &factory).is_err());

        let opdfs = vec![OpdfDiscrete::uniform(2).unwrap(); 2];
        // row (0, 1) does not sum to one
        assert!(InputHmm::with_shared_opdfs(
            array![0.5, 0.5],
            array![[[0.5, 0.5], [0.5, 0.6]], [[0.5, 0.5], [0.5, 0.5]]],
            opdfs
        )
        .is_err());
    }

    #[test]
    fn test_uniform_is_valid() {
        let hmm = InputHmm::uniform(3, 2, &OpdfDiscreteFactory::new(2).unwrap()).unwrap();
        assert!(hmm.validate().is_ok());
        assert_eq!(hmm.opdfs().len(), 3);
        assert_eq!(hmm.opdfs()[0].len(), 2);
    }
}
