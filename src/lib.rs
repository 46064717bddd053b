//! Hidden Markov Models learned with the Baum-Welch algorithm.
//!
//! - [`hmm::Hmm`] and [`hmm::InputHmm`] hold the model parameters; the latter
//!   conditions transitions and emissions on an input observed at each step.
//! - [`hmm::ForwardBackward`] computes scaled forward/backward tables.
//! - [`hmm::BaumWelchLearner`] re-estimates a model from training sequences.
//! - [`opdf`] holds the emission distributions a model can use.

pub mod error;
pub mod hmm;
pub mod opdf;

pub use error::{HmmError, HmmError as Error, Result};
pub use hmm::{BaumWelchConfig, BaumWelchLearner, ForwardBackward, Hmm, HmmStructure, InputHmm};
