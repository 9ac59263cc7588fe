//! crates/chat_auth_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or
//! identity providers.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{NewSession, Session, Settings, User, UserIdentity, UserProfileUpdate};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Collection-style access to the persistent store. Every operation is a
/// single atomic write or read; the reconcilers compose them without a
/// wrapping transaction.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    async fn find_user_by_subject(&self, subject: &str) -> PortResult<Option<User>>;

    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>>;

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: &UserProfileUpdate,
    ) -> PortResult<()>;

    /// Inserts a user built from the identity record and returns the
    /// generated user id.
    async fn insert_user(&self, identity: &UserIdentity) -> PortResult<Uuid>;

    // --- Sessions ---
    async fn find_session_by_hash(&self, token_hash: &str) -> PortResult<Option<Session>>;

    async fn find_session_by_id(&self, session_id: Uuid) -> PortResult<Option<Session>>;

    /// Deletes a session row. Deleting a session that does not exist is a
    /// no-op, not an error.
    async fn delete_session(&self, session_id: Uuid) -> PortResult<()>;

    async fn insert_session(&self, session: &NewSession) -> PortResult<Uuid>;

    // --- Settings ---
    /// Re-owns the settings record scoped to an anonymous session, clearing
    /// the anonymous reference. Returns the matched count (0 or 1).
    async fn migrate_settings(&self, anon_session_id: Uuid, user_id: Uuid) -> PortResult<u64>;

    async fn insert_settings(&self, settings: &Settings) -> PortResult<()>;

    // --- Conversations ---
    /// Re-owns all conversations scoped to an anonymous session, clearing the
    /// anonymous reference on each. Returns the number of migrated rows.
    async fn migrate_conversations(
        &self,
        anon_session_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<u64>;
}

/// The external OIDC provider, treated as a black box: it verifies a login
/// callback into a raw claim bag and builds provider-side logout URLs.
#[async_trait]
pub trait IdentityProviderService: Send + Sync {
    /// Exchanges the authorization code from the login callback and returns
    /// the verified claims plus the provider tokens.
    async fn verify_login(&self, code: &str, redirect_uri: &str) -> PortResult<ProviderLogin>;

    /// Builds the provider end-session URL for an RP-initiated logout.
    fn end_session_url(&self, id_token_hint: &str, post_logout_redirect: &str)
        -> PortResult<String>;
}

/// The result of a verified login callback: the untyped claim set for the
/// Claim Validator, plus the tokens the session record stores.
#[derive(Debug, Clone)]
pub struct ProviderLogin {
    pub claims: serde_json::Value,
    pub id_token: String,
    pub access_token: Option<String>,
}
