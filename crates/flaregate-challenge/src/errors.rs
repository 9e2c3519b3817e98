//! Error types for the flaregate-challenge crate.
use thiserror::Error;

/// Errors that can occur during challenge detection or solving.
#[derive(Error, Debug)]
pub enum ChallengeError {
    /// The driver reported an error while probing or evaluating the page.
    #[error("driver error: {0}")]
    Driver(#[from] flaregate_core::Error),

    /// No configured solver was able to handle the detected challenge kind.
    #[error("no solver available for {0:?}")]
    NoSolverAvailable(crate::detector::ChallengeKind),

    /// Every solver attempted timed out without producing a token.
    #[error("solver timed out after {0:?}")]
    SolverTimeout(std::time::Duration),

    /// A solver ran but failed to produce a usable solution.
    #[error("solver '{solver}' failed: {reason}")]
    SolverFailed { solver: String, reason: String },

    /// A paid solver reported insufficient account balance.
    #[error("solver '{0}' reported insufficient funds")]
    InsufficientFunds(String),

    /// The external provider's API returned a terminal (non-retryable) error.
    #[error("provider '{provider}' terminal error: {message}")]
    ProviderTerminal { provider: String, message: String },

    /// The external provider's API returned a transient error worth retrying.
    #[error("provider '{provider}' transient error: {message}")]
    ProviderTransient { provider: String, message: String },

    /// Error performing the HTTP call to an external solver provider.
    #[error("provider HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ChallengeError>;
