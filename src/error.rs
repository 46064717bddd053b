use thiserror::Error;

/// Errors raised while building, evaluating or learning a Hidden Markov Model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HmmError {
    /// A caller-supplied argument violates a documented precondition.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two collections that must agree in size do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The observation sequence is impossible under the model.
    #[error("observation sequence has zero probability at position {position}")]
    ZeroLikelihood { position: usize },
}

impl HmmError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        HmmError::InvalidInput(msg.into())
    }

    pub(crate) fn check_len(expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(HmmError::DimensionMismatch { expected, found })
        }
    }
}

pub type Result<T> = std::result::Result<T, HmmError>;
