//! Error types for the `colony-world` crate.
//!
//! Expected player-facing refusals (Town Hall gate, area, cost) are not
//! errors; they are [`BuildRejection`](crate::validation::BuildRejection)
//! values. [`WorldError`] covers requests that reference missing entities
//! and internal arithmetic failures.

use colony_types::{QueueItemId, StructureId, StructureType};

/// Errors that can occur while applying settlement rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// A structure was not found in the settlement.
    #[error("structure not found: {0}")]
    StructureNotFound(StructureId),

    /// A construction queue item was not found in the settlement.
    #[error("construction queue item not found: {0}")]
    QueueItemNotFound(QueueItemId),

    /// The queue item has already completed and can no longer be cancelled.
    #[error("construction queue item {0} is already complete")]
    QueueItemComplete(QueueItemId),

    /// The structure kind may not be demolished.
    #[error("{0} cannot be demolished")]
    ProtectedStructure(StructureType),

    /// No disaster aftermath is waiting for acknowledgement.
    #[error("no disaster aftermath to acknowledge")]
    NoAftermath,

    /// A configured value makes a rule impossible to evaluate.
    #[error("invalid rule parameter: {0}")]
    InvalidRule(&'static str),

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in settlement calculation")]
    ArithmeticOverflow,
}
