//! crates/chat_auth_core/src/reconcile.rs
//!
//! The Session Reconciler: given a canonical identity from the Claim
//! Validator, creates or updates the local user record, rotates the session
//! credential, and migrates anonymous pre-login state (settings,
//! conversations) to the authenticated user. Also hosts the smaller Logout
//! Reconciler.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{ClientMeta, NewSession, Owner, Settings, UserIdentity, UserProfileUpdate};
use crate::error::{AuthError, AuthResult};
use crate::ports::{DatabaseService, IdentityProviderService};

/// Sessions expire a fixed two weeks after creation. Expiry is declarative;
/// whoever reads the session row later enforces it.
const SESSION_EXPIRY_WEEKS: i64 = 2;

/// The result of a successful login reconciliation. The secret goes back to
/// the client via the session cookie; only its hash was persisted.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub session_secret: String,
}

/// Where the caller should send the user after logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// No provider integration or no id-token on the session: go home.
    RedirectHome,
    /// Provider-side logout: redirect to the end-session URL.
    RedirectProvider(String),
}

/// Generates a fresh session secret from a cryptographically random UUID.
pub fn generate_session_secret() -> String {
    Uuid::new_v4().to_string()
}

/// Derives the storage hash for a session secret: SHA-256, hex encoded.
/// Deterministic, so a cookie secret can be re-verified on later requests.
pub fn hash_session_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reconciles a verified login against local state.
///
/// Looks up the user by provider subject id, creates or updates the record,
/// rotates the session credential, and migrates any state owned by the
/// caller's prior anonymous session. Returns the new secret for cookie
/// issuance and the resolved user id.
///
/// Store failures propagate untouched; a session-hash collision aborts the
/// whole operation before any state is mutated.
pub async fn reconcile_login(
    db: &dyn DatabaseService,
    identity: &UserIdentity,
    prior_session_id: Option<Uuid>,
    client: &ClientMeta,
    id_token: &str,
    access_token: Option<&str>,
) -> AuthResult<LoginOutcome> {
    let secret = generate_session_secret();
    reconcile_login_with_secret(db, identity, prior_session_id, client, id_token, access_token, &secret)
        .await
}

/// Inner reconciliation with the secret supplied by the caller; split out so
/// the collision path is testable with a known secret.
pub(crate) async fn reconcile_login_with_secret(
    db: &dyn DatabaseService,
    identity: &UserIdentity,
    prior_session_id: Option<Uuid>,
    client: &ClientMeta,
    id_token: &str,
    access_token: Option<&str>,
    secret: &str,
) -> AuthResult<LoginOutcome> {
    info!(
        login_sub = %identity.subject,
        login_username = identity.username.as_deref(),
        login_name = %identity.name,
        login_email = identity.email.as_deref(),
        login_roles = ?identity.roles,
        login_groups = ?identity.groups,
        "user login"
    );

    let existing_user = db.find_user_by_subject(&identity.subject).await?;

    let token_hash = hash_session_secret(secret);
    if db.find_session_by_hash(&token_hash).await?.is_some() {
        error!(login_sub = %identity.subject, "session credential hash collision");
        return Err(AuthError::SessionCollision);
    }

    let now = Utc::now();
    let new_session = |owner: Owner| NewSession {
        token_hash: token_hash.clone(),
        owner,
        created_at: now,
        updated_at: now,
        expires_at: now + Duration::weeks(SESSION_EXPIRY_WEEKS),
        user_agent: client.user_agent.clone(),
        ip: client.ip.clone(),
        id_token: Some(id_token.to_string()),
        access_token: access_token.map(str::to_string),
    };

    let (user_id, session_id) = match existing_user {
        Some(user) => {
            debug!(login_sub = %identity.subject, user_id = %user.id, "updating existing user");
            db.update_user_profile(
                user.id,
                &UserProfileUpdate {
                    username: identity.username.clone(),
                    name: identity.name.clone(),
                    avatar_url: identity.avatar_url.clone(),
                    is_admin: identity.is_admin,
                    is_early_access: identity.is_early_access,
                },
            )
            .await?;

            // Drop the prior session, if any. Absent is the normal case for a
            // first visit, so not an error.
            if let Some(prior) = prior_session_id {
                db.delete_session(prior).await?;
            }

            let session_id = db.insert_session(&new_session(Owner::User(user.id))).await?;
            (user.id, session_id)
        }
        None => {
            let user_id = db.insert_user(identity).await?;
            debug!(login_sub = %identity.subject, user_id = %user_id, "created new user");

            let session_id = db.insert_session(&new_session(Owner::User(user_id))).await?;

            // Move pre-login settings over; fall back to defaults when the
            // anonymous session never touched settings.
            let migrated = match prior_session_id {
                Some(prior) => db.migrate_settings(prior, user_id).await?,
                None => 0,
            };
            if migrated == 0 {
                db.insert_settings(&Settings::default_for_user(user_id, now)).await?;
            }

            (user_id, session_id)
        }
    };

    // Conversations migrate in both branches.
    if let Some(prior) = prior_session_id {
        let migrated = db.migrate_conversations(prior, user_id).await?;
        if migrated > 0 {
            debug!(user_id = %user_id, migrated, "migrated anonymous conversations");
        }
    }

    Ok(LoginOutcome {
        user_id,
        session_id,
        session_secret: secret.to_string(),
    })
}

/// Reconciles a logout: deletes the local session if it exists and decides
/// the redirect target. The caller clears the session cookie in all cases.
pub async fn reconcile_logout(
    db: &dyn DatabaseService,
    provider: Option<&dyn IdentityProviderService>,
    session_id: Option<Uuid>,
    post_logout_redirect: &str,
) -> AuthResult<LogoutOutcome> {
    let session = match session_id {
        Some(id) => db.find_session_by_id(id).await?,
        None => None,
    };

    if let Some(session) = &session {
        db.delete_session(session.id).await?;
    }

    let id_token = session.as_ref().and_then(|s| s.id_token.as_deref());
    let (Some(provider), Some(id_token)) = (provider, id_token) else {
        return Ok(LogoutOutcome::RedirectHome);
    };

    match provider.end_session_url(id_token, post_logout_redirect) {
        Ok(url) => {
            debug!(end_session_url = %url, "redirecting to provider end-session endpoint");
            Ok(LogoutOutcome::RedirectProvider(url))
        }
        Err(e) => {
            error!(session_id = ?session_id, error = %e, "failed to build provider end-session URL");
            Err(AuthError::ProviderLogout(e.to_string()))
        }
    }
}
