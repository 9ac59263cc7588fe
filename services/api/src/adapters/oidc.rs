//! services/api/src/adapters/oidc.rs
//!
//! Concrete implementation of the `IdentityProviderService` port against a
//! Keycloak-style OIDC provider: authorization-code exchange, userinfo
//! retrieval, and end-session URL construction.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use chat_auth_core::ports::{IdentityProviderService, PortError, PortResult, ProviderLogin};

use crate::config::OidcSettings;

/// An identity-provider adapter backed by `reqwest`.
#[derive(Clone)]
pub struct OidcAdapter {
    http: reqwest::Client,
    settings: OidcSettings,
}

/// The relevant subset of the provider token response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
}

impl OidcAdapter {
    /// Creates a new `OidcAdapter`.
    pub fn new(http: reqwest::Client, settings: OidcSettings) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl IdentityProviderService for OidcAdapter {
    async fn verify_login(&self, code: &str, redirect_uri: &str) -> PortResult<ProviderLogin> {
        // Exchange the authorization code for tokens at the token endpoint.
        debug!(endpoint = %self.settings.token_endpoint, "exchanging authorization code");
        let response = self
            .http
            .post(&self.settings.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", &self.settings.client_id),
                ("client_secret", &self.settings.client_secret),
            ])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("token endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            warn!(http_status = %response.status(), "token endpoint rejected the authorization code");
            return Err(PortError::Unexpected(format!(
                "token exchange failed with status {}",
                response.status()
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed token response: {e}")))?;

        // Fetch the verified claim set from the userinfo endpoint.
        debug!(endpoint = %self.settings.userinfo_endpoint, "fetching userinfo claims");
        let response = self
            .http
            .get(&self.settings.userinfo_endpoint)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("userinfo endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            warn!(http_status = %response.status(), "userinfo endpoint rejected the access token");
            return Err(PortError::Unexpected(format!(
                "userinfo request failed with status {}",
                response.status()
            )));
        }

        let claims: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed userinfo response: {e}")))?;

        Ok(ProviderLogin {
            claims,
            id_token: tokens.id_token,
            access_token: Some(tokens.access_token),
        })
    }

    fn end_session_url(
        &self,
        id_token_hint: &str,
        post_logout_redirect: &str,
    ) -> PortResult<String> {
        let url = Url::parse_with_params(
            &self.settings.end_session_endpoint,
            [
                ("id_token_hint", id_token_hint),
                ("post_logout_redirect_uri", post_logout_redirect),
            ],
        )
        .map_err(|e| PortError::Unexpected(format!("invalid end-session endpoint: {e}")))?;
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> OidcAdapter {
        OidcAdapter::new(
            reqwest::Client::new(),
            OidcSettings {
                client_id: "chat".to_string(),
                client_secret: "secret".to_string(),
                token_endpoint: "https://idp.example/token".to_string(),
                userinfo_endpoint: "https://idp.example/userinfo".to_string(),
                end_session_endpoint: "https://idp.example/logout".to_string(),
            },
        )
    }

    #[test]
    fn end_session_url_carries_hint_and_redirect() {
        let url = adapter()
            .end_session_url("tok-123", "https://app.example/")
            .unwrap();
        assert!(url.starts_with("https://idp.example/logout?"));
        assert!(url.contains("id_token_hint=tok-123"));
        assert!(url.contains("post_logout_redirect_uri=https%3A%2F%2Fapp.example%2F"));
    }

    #[test]
    fn invalid_end_session_endpoint_fails() {
        let mut bad = adapter();
        bad.settings.end_session_endpoint = "not a url".to_string();
        assert!(bad.end_session_url("tok", "https://app.example/").is_err());
    }
}
