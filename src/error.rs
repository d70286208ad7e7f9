//! Error types for the Turnstile engine.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// Configuration-time variants (`Config`, `InvalidRule`, `DuplicateRuleName`)
/// fail fast at startup. Request-time variants never escape
/// [`Evaluator::evaluate`](crate::evaluator::Evaluator::evaluate); they are
/// converted into a fail-closed deny decision with the error text attached.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(String),

    /// A rule definition with non-positive parameters
    #[error("invalid rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    /// A rule name registered twice in the same catalog
    #[error("duplicate rule name: '{0}'")]
    DuplicateRuleName(String),

    /// An annotation references a rule the catalog does not contain
    #[error("rule not found: '{0}'")]
    RuleNotFound(String),

    /// A required discriminator raw value is absent from the request context
    #[error("missing discriminator value: {0}")]
    MissingDiscriminatorValue(String),

    /// A rule uses a custom discriminator with no registered resolver
    #[error("unsupported custom discriminator: '{0}'")]
    UnsupportedCustomDiscriminator(String),

    /// Unexpected counter-store failure
    #[error("counter store error: {0}")]
    InternalStore(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
