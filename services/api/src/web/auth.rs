//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: the OIDC login callback and logout.

use axum::{
    extract::{Extension, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::error;

use chat_auth_core::domain::ClientMeta;
use chat_auth_core::error::AuthError;
use chat_auth_core::reconcile::{reconcile_login, reconcile_logout, LogoutOutcome};
use chat_auth_core::validate_claims;

use crate::web::cookies::{delete_session_cookie, refresh_session_cookie};
use crate::web::middleware::RequestSession;
use crate::web::state::AppState;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize)]
pub struct LoginCallbackParams {
    pub code: String,
    #[allow(dead_code)]
    pub state: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /login/callback - Complete a provider login.
///
/// Verifies the authorization code with the provider, validates the returned
/// claims, reconciles local user and session state, and sends the user home
/// with a fresh session cookie.
pub async fn login_callback_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Option<RequestSession>>,
    headers: HeaderMap,
    Query(params): Query<LoginCallbackParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let provider = state.provider.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Login is not configured".to_string(),
    ))?;

    // 1. Verify the callback with the identity provider.
    let login = provider
        .verify_login(&params.code, &state.config.redirect_uri())
        .await
        .map_err(|e| {
            error!(error = %e, "provider login verification failed");
            (StatusCode::BAD_GATEWAY, "Login verification failed".to_string())
        })?;

    // 2. Validate the claim set into a canonical identity.
    let identity = validate_claims(&login.claims, &state.config.claim).map_err(|e| {
        error!(error = %e, "rejecting login with invalid claims");
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    // 3. Reconcile user and session state.
    let client = ClientMeta {
        user_agent: header_value(&headers, header::USER_AGENT.as_str()),
        ip: forwarded_ip(&headers),
    };

    let outcome = reconcile_login(
        state.db.as_ref(),
        &identity,
        session.map(|s| s.session_id),
        &client,
        &login.id_token,
        login.access_token.as_deref(),
    )
    .await
    .map_err(|e| {
        error!(login_sub = %identity.subject, error = %e, "login reconciliation failed");
        match e {
            AuthError::SessionCollision => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session ID collision".to_string())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string()),
        }
    })?;

    // 4. Rotate the cookie and send the user home.
    let cookie = refresh_session_cookie(&state.config, &outcome.session_secret);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to(&state.config.home_url()),
    ))
}

/// POST /logout - Delete the local session and leave.
///
/// The cookie is cleared in every outcome, including a failed provider
/// logout — the local session row is gone by then and the browser must not
/// keep a dead credential. With a configured provider and a stored id-token
/// the user is sent to the provider end-session endpoint, otherwise home.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Option<RequestSession>>,
) -> Result<impl IntoResponse, Response> {
    let cookie = delete_session_cookie(&state.config);

    let outcome = reconcile_logout(
        state.db.as_ref(),
        state.provider.as_deref(),
        session.map(|s| s.session_id),
        &state.config.home_url(),
    )
    .await
    .map_err(|e| {
        error!(session_id = ?session.map(|s| s.session_id), error = %e, "logout failed");
        let message = match e {
            AuthError::ProviderLogout(_) => {
                "Failed to initiate logout. Please clear your cookies."
            }
            _ => "Logout failed",
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::SET_COOKIE, cookie.clone())],
            message.to_string(),
        )
            .into_response()
    })?;

    let target = match &outcome {
        LogoutOutcome::RedirectHome => state.config.home_url(),
        LogoutOutcome::RedirectProvider(url) => url.clone(),
    };

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&target)))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// First non-empty hop in `x-forwarded-for`; an empty or all-comma header
/// counts as absent.
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for").and_then(|v| {
        v.split(',')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use tracing::Level;
    use uuid::Uuid;

    use chat_auth_core::claims::ClaimConfig;
    use chat_auth_core::domain::{
        NewSession, Owner, Session, Settings, User, UserProfileUpdate,
    };
    use chat_auth_core::ports::{
        DatabaseService, IdentityProviderService, PortError, PortResult, ProviderLogin,
    };
    use chat_auth_core::UserIdentity;

    use crate::config::Config;

    fn config() -> Config {
        Config {
            bind_address: "127.0.0.1:3000".parse().unwrap(),
            database_url: "postgres://unused".to_string(),
            log_level: Level::INFO,
            public_origin: "https://chat.example".to_string(),
            cookie_name: "chat-auth-session".to_string(),
            allow_insecure_cookies: false,
            claim: ClaimConfig::default(),
            oidc: None,
        }
    }

    /// A store stub holding one session row; only the logout path is wired.
    struct StubDb {
        session: Session,
    }

    impl StubDb {
        fn with_id_token_session() -> Self {
            let now = Utc::now();
            Self {
                session: Session {
                    id: Uuid::new_v4(),
                    token_hash: "hash".to_string(),
                    owner: Owner::User(Uuid::new_v4()),
                    created_at: now,
                    updated_at: now,
                    expires_at: now + Duration::weeks(2),
                    user_agent: None,
                    ip: None,
                    id_token: Some("tok-123".to_string()),
                    access_token: None,
                },
            }
        }
    }

    #[async_trait]
    impl DatabaseService for StubDb {
        async fn find_user_by_subject(&self, _subject: &str) -> PortResult<Option<User>> {
            unreachable!("not exercised")
        }
        async fn find_user_by_id(&self, _user_id: Uuid) -> PortResult<Option<User>> {
            unreachable!("not exercised")
        }
        async fn update_user_profile(
            &self,
            _user_id: Uuid,
            _update: &UserProfileUpdate,
        ) -> PortResult<()> {
            unreachable!("not exercised")
        }
        async fn insert_user(&self, _identity: &UserIdentity) -> PortResult<Uuid> {
            unreachable!("not exercised")
        }
        async fn find_session_by_hash(&self, _token_hash: &str) -> PortResult<Option<Session>> {
            unreachable!("not exercised")
        }
        async fn find_session_by_id(&self, session_id: Uuid) -> PortResult<Option<Session>> {
            Ok((self.session.id == session_id).then(|| self.session.clone()))
        }
        async fn delete_session(&self, _session_id: Uuid) -> PortResult<()> {
            Ok(())
        }
        async fn insert_session(&self, _session: &NewSession) -> PortResult<Uuid> {
            unreachable!("not exercised")
        }
        async fn migrate_settings(&self, _anon: Uuid, _user: Uuid) -> PortResult<u64> {
            unreachable!("not exercised")
        }
        async fn insert_settings(&self, _settings: &Settings) -> PortResult<()> {
            unreachable!("not exercised")
        }
        async fn migrate_conversations(&self, _anon: Uuid, _user: Uuid) -> PortResult<u64> {
            unreachable!("not exercised")
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl IdentityProviderService for BrokenProvider {
        async fn verify_login(
            &self,
            _code: &str,
            _redirect_uri: &str,
        ) -> PortResult<ProviderLogin> {
            unreachable!("not exercised")
        }
        fn end_session_url(
            &self,
            _id_token_hint: &str,
            _post_logout_redirect: &str,
        ) -> PortResult<String> {
            Err(PortError::Unexpected("end-session endpoint unknown".to_string()))
        }
    }

    fn app_state(db: StubDb, provider: Option<Arc<dyn IdentityProviderService>>) -> AppState {
        AppState {
            db: Arc::new(db),
            provider,
            config: Arc::new(config()),
        }
    }

    #[tokio::test]
    async fn failed_provider_logout_still_clears_the_cookie() {
        let db = StubDb::with_id_token_session();
        let session = RequestSession {
            session_id: db.session.id,
            user_id: db.session.owner.user_id(),
        };
        let state = app_state(db, Some(Arc::new(BrokenProvider)));

        let response = match logout_handler(State(state), Extension(Some(session))).await {
            Err(response) => response,
            Ok(_) => panic!("expected the provider failure to surface"),
        };

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("cookie cleared despite the failure")
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("chat-auth-session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn logout_without_session_clears_cookie_and_goes_home() {
        let db = StubDb::with_id_token_session();
        let state = app_state(db, None);

        let response = logout_handler(State(state), Extension(None))
            .await
            .map(IntoResponse::into_response)
            .unwrap_or_else(|e| e);

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://chat.example/"
        );
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn forwarded_ip_skips_empty_segments() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", " , ,10.0.0.1, 192.168.0.1".parse().unwrap());
        assert_eq!(forwarded_ip(&headers).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn empty_forwarded_header_means_no_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", ",,".parse().unwrap());
        assert_eq!(forwarded_ip(&headers), None);
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }
}
