pub mod baum_welch;
pub mod forward_backward;
pub mod generator;
pub mod input;
pub mod plain;
pub mod structure;
pub mod viterbi;

// Re-export the model types and algorithms with descriptive names
pub use baum_welch::{
    estimate_gamma, estimate_xi, BaumWelchConfig, BaumWelchLearner, LearningReport,
    SufficientStatistics,
};
pub use forward_backward::{log_likelihood, ForwardBackward, ForwardBackwardResult};
pub use generator::MarkovGenerator;
pub use input::{InputAlphabet, InputHmm, InputObservation};
pub use plain::Hmm;
pub use structure::HmmStructure;
pub use viterbi::viterbi;
