//! crates/chat_auth_core/src/error.rs
//!
//! The error taxonomy for identity reconciliation. Each variant maps to a
//! distinct caller-visible failure class.

use crate::ports::PortError;

/// Errors produced by the Claim Validator and the reconcilers.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or incomplete identity claims. A client-facing failure;
    /// no partial state is created.
    #[error("Invalid identity claims: {0}")]
    Validation(String),

    /// A freshly generated session credential hashed to a value already in
    /// the sessions collection. Extremely low probability; treated as a
    /// randomness failure and never retried.
    #[error("Session credential hash collision")]
    SessionCollision,

    /// A store operation failed. Propagated untouched; retry, if any, is a
    /// caller concern.
    #[error("Store error: {0}")]
    Store(#[from] PortError),

    /// The provider end-session URL could not be constructed.
    #[error("Failed to build provider end-session URL: {0}")]
    ProviderLogout(String),
}

/// A convenience type alias for `Result<T, AuthError>`.
pub type AuthResult<T> = Result<T, AuthError>;
