//! crates/chat_auth_core/src/domain.rs
//!
//! Defines the pure, core data structures for identity and session state.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The canonical identity record produced by the Claim Validator from a raw
/// provider claim set. Everything downstream (user upsert, session creation)
/// works from this, never from the raw claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Provider-issued stable subject identifier. Unique per person,
    /// independent of username/email.
    pub subject: String,
    pub username: Option<String>,
    /// Resolved display name. Guaranteed non-empty by the validator.
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub is_admin: bool,
    pub is_early_access: bool,
}

/// A persistent user account, created on first login for a subject id.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    /// Immutable once set; identifies returning users.
    pub subject: String,
    pub username: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub is_early_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The mutable profile fields refreshed from the provider on every login.
/// Subject id, email and created_at are deliberately not here.
#[derive(Debug, Clone)]
pub struct UserProfileUpdate {
    pub username: Option<String>,
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub is_early_access: bool,
}

/// Owner of a session-scoped record: exactly one of an authenticated user or
/// a pre-login anonymous session. Modeled as an enum so "exactly one owner"
/// holds structurally instead of via two nullable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    User(Uuid),
    AnonymousSession(Uuid),
}

impl Owner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Owner::User(id) => Some(*id),
            Owner::AnonymousSession(_) => None,
        }
    }
}

/// Optional client metadata captured at login time.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// A persistent browser session. The client holds the random secret in a
/// cookie; only its hash is stored here.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// SHA-256 hex digest of the session secret. Globally unique among
    /// non-expired sessions.
    pub token_hash: String,
    pub owner: Owner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    /// Provider id-token, kept so logout can pass it as an end-session hint.
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

/// A session row as handed to the store for insertion; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token_hash: String,
    pub owner: Owner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

/// Per-owner preferences. Created with defaults on first login when no
/// anonymous-session record exists to migrate.
#[derive(Debug, Clone)]
pub struct Settings {
    pub owner: Owner,
    pub share_conversations_with_model_authors: bool,
    pub active_model: Option<String>,
    pub custom_prompts: serde_json::Value,
    pub ethics_modal_accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    /// Default settings for a freshly created user, with the ethics modal
    /// considered accepted at login time.
    pub fn default_for_user(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            owner: Owner::User(user_id),
            share_conversations_with_model_authors: true,
            active_model: None,
            custom_prompts: serde_json::json!({}),
            ethics_modal_accepted_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A conversation record. Touched by this core only for login-time ownership
/// migration; its content lives elsewhere.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub owner: Owner,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
