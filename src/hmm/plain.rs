use std::fmt;

use ndarray::{Array1, Array2};

use super::structure::HmmStructure;
use crate::error::{HmmError, Result};
use crate::opdf::{Opdf, OpdfFactory};

/// A Hidden Markov Model whose observations are emitted by opdfs of type `D`.
///
/// - `pi[i]`: probability of starting in state `i`
/// - `a[[i, j]]`: probability of moving from state `i` to state `j`
/// - `opdfs[i]`: emission distribution of state `i`
///
/// Constructors check that `pi` and each row of `a` are probability vectors;
/// the Baum-Welch learner preserves that between iterations.
#[derive(Debug, Clone)]
pub struct Hmm<D: Opdf> {
    pi: Array1<f64>,
    a: Array2<f64>,
    opdfs: Vec<D>,
}

impl<D: Opdf> Hmm<D> {
    /// Creates a new `Hmm` from explicit parameters.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if there are no states or if `pi` or a row of `a` is not
    /// a probability vector; `DimensionMismatch` if the shapes disagree.
    pub fn new(pi: Array1<f64>, a: Array2<f64>, opdfs: Vec<D>) -> Result<Self> {
        let n = pi.len();
        if n == 0 {
            return Err(HmmError::invalid_input("number of states must be positive"));
        }
        HmmError::check_len(n, a.nrows())?;
        HmmError::check_len(n, a.ncols())?;
        HmmError::check_len(n, opdfs.len())?;

        let hmm = Self { pi, a, opdfs };
        hmm.validate()?;
        Ok(hmm)
    }

    /// A model with uniform initial and transition probabilities whose opdfs
    /// are produced by `factory`.
    ///
    /// # Arguments
    /// * `nb_states` - Number of hidden states
    /// * `factory` - Source of the initial emission distribution of every state
    ///
    /// # Errors
    /// * `InvalidInput` if `nb_states` is zero
    pub fn uniform<F>(nb_states: usize, factory: &F) -> Result<Self>
    where
        F: OpdfFactory<Opdf = D>,
    {
        if nb_states == 0 {
            return Err(HmmError::invalid_input("number of states must be positive"));
        }
        let p = 1.0 / nb_states as f64;
        Ok(Self {
            pi: Array1::from_elem(nb_states, p),
            a: Array2::from_elem((nb_states, nb_states), p),
            opdfs: (0..nb_states).map(|_| factory.generate()).collect(),
        })
    }

    pub fn pi_vector(&self) -> &Array1<f64> {
        &self.pi
    }

    pub fn transitions(&self) -> &Array2<f64> {
        &self.a
    }

    pub fn opdfs(&self) -> &[D] {
        &self.opdfs
    }
}

impl<D: Opdf> HmmStructure for Hmm<D> {
    type Opdf = D;
    type Step = D::Observation;

    fn nb_states(&self) -> usize {
        self.pi.len()
    }

    fn nb_inputs(&self) -> usize {
        1
    }

    fn input_index(&self, _step: &D::Observation) -> usize {
        0
    }

    fn observation<'a>(&self, step: &'a D::Observation) -> &'a D::Observation {
        step
    }

    fn pi(&self, state: usize) -> f64 {
        self.pi[state]
    }

    fn set_pi(&mut self, state: usize, value: f64) {
        self.pi[state] = value;
    }

    fn a(&self, from: usize, _input: usize, to: usize) -> f64 {
        self.a[[from, to]]
    }

    fn set_a(&mut self, from: usize, _input: usize, to: usize, value: f64) {
        self.a[[from, to]] = value;
    }

    fn opdf(&self, state: usize, _input: usize) -> &D {
        &self.opdfs[state]
    }

    fn opdf_mut(&mut self, state: usize, _input: usize) -> &mut D {
        &mut self.opdfs[state]
    }
}

impl<D: Opdf + fmt::Display> fmt::Display for Hmm<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hmm v1.0")?;
        writeln!(f)?;
        writeln!(f, "NbStates {}", self.nb_states())?;
        for i in 0..self.nb_states() {
            writeln!(f)?;
            writeln!(f, "State")?;
            writeln!(f, "Pi {}", self.pi[i])?;
            write!(f, "A")?;
            for j in 0..self.nb_states() {
                write!(f, " {}", self.a[[i, j]])?;
            }
            writeln!(f)?;
            writeln!(f, "{}", self.opdfs[i])?;
        }
        Ok(())
    }
}
