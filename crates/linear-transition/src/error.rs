//! Error types for transition runs.

use thiserror::Error;

/// Errors that abort a request group.
///
/// The messages are matched by downstream automation parsing CI logs and must
/// stay stable.
#[derive(Debug, Error)]
pub enum RunError {
    /// A lookup returned a different number of entities than were requested
    #[error("Number of resources fetched from Linear does not match number of provided identifiers. See debug logs for more details.")]
    CountMismatch,

    /// No way to select issues was configured
    #[error("Neither issue numbers nor filter label provided.")]
    NothingToSelect,

    /// Label creation returned no entity
    #[error("Label {name} was not created! Failing")]
    LabelNotCreated { name: String },

    /// Configuration could not be turned into request groups
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Linear API or transport failure
    #[error("Action failed: {0:#}")]
    Remote(#[from] anyhow::Error),
}
