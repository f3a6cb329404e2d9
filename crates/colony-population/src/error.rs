//! Error types for the colony-population crate.

/// Errors that can occur while evaluating population dynamics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PopulationError {
    /// An arithmetic overflow occurred during a population computation.
    #[error("arithmetic overflow in population computation: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },

    /// The population configuration is unusable.
    #[error("invalid population config: {0}")]
    InvalidConfig(&'static str),
}

impl PopulationError {
    pub(crate) fn overflow(context: &str) -> Self {
        Self::ArithmeticOverflow {
            context: String::from(context),
        }
    }
}
