//! services/api/src/web/middleware.rs
//!
//! Session-resolution middleware: maps the session cookie to a stored
//! session row and attaches it to the request.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use chat_auth_core::ports::{DatabaseService, PortResult};
use chat_auth_core::reconcile::hash_session_secret;

use crate::web::state::AppState;

/// The caller's resolved session, inserted into request extensions when the
/// cookie maps to a live session row. `user_id` is `None` for anonymous
/// (pre-login) sessions.
#[derive(Clone, Copy, Debug)]
pub struct RequestSession {
    pub session_id: Uuid,
    pub user_id: Option<Uuid>,
}

/// Middleware that resolves the session cookie, if any.
///
/// A missing, unknown or expired cookie attaches no session — login and
/// logout must work either way, and expiry is enforced here at read time,
/// not by a background sweeper. A store failure is surfaced as a 500: a
/// login that proceeded as "no session" would rotate the cookie without
/// migrating the anonymous state, orphaning it for good.
pub async fn attach_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let resolved = resolve_session(
        state.db.as_ref(),
        cookie_header.as_deref(),
        &state.config.cookie_name,
    )
    .await
    .map_err(|e| {
        error!(error = %e, "failed to resolve session cookie");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to resolve session".to_string(),
        )
    })?;

    req.extensions_mut().insert(resolved);
    Ok(next.run(req).await)
}

/// Maps a `Cookie` header to the stored session it names, treating expired
/// sessions as absent. Store errors propagate untouched.
pub(crate) async fn resolve_session(
    db: &dyn DatabaseService,
    cookie_header: Option<&str>,
    cookie_name: &str,
) -> PortResult<Option<RequestSession>> {
    let prefix = format!("{cookie_name}=");
    let Some(secret) = cookie_header.and_then(|cookies| {
        cookies
            .split(';')
            .find_map(|c| c.trim().strip_prefix(prefix.as_str()))
    }) else {
        return Ok(None);
    };

    let token_hash = hash_session_secret(secret);
    let session = db.find_session_by_hash(&token_hash).await?;

    Ok(session
        .filter(|s| s.expires_at > Utc::now())
        .map(|s| RequestSession {
            session_id: s.id,
            user_id: s.owner.user_id(),
        }))
}
