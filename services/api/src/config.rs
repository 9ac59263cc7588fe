//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;

use chat_auth_core::claims::{
    ClaimConfig, ADMIN_ROLE_PLACEHOLDER, EARLY_ACCESS_ROLE_PLACEHOLDER,
};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Identity-provider endpoints and credentials. Present only when
/// `OPENID_CLIENT_ID` is set; absent means provider integration is disabled
/// and logout always redirects home.
#[derive(Clone, Debug)]
pub struct OidcSettings {
    pub client_id: String,
    pub client_secret: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub end_session_endpoint: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Outward-facing origin of the application, e.g. `https://chat.example.com`.
    pub public_origin: String,
    pub cookie_name: String,
    pub allow_insecure_cookies: bool,
    pub claim: ClaimConfig,
    pub oidc: Option<OidcSettings>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let public_origin = std::env::var("PUBLIC_ORIGIN")
            .unwrap_or_else(|_| format!("http://{}", bind_address));

        // --- Cookie Policy ---
        let cookie_name =
            std::env::var("COOKIE_NAME").unwrap_or_else(|_| "chat-auth-session".to_string());
        let allow_insecure_cookies = std::env::var("ALLOW_INSECURE_COOKIES")
            .map(|v| v == "true")
            .unwrap_or(false);

        // --- Claim Interpretation ---
        let claim = ClaimConfig {
            name_claim: std::env::var("OPENID_NAME_CLAIM").ok().filter(|v| !v.is_empty()),
            admin_role: std::env::var("KEYCLOAK_ADMIN_ROLE")
                .unwrap_or_else(|_| ADMIN_ROLE_PLACEHOLDER.to_string()),
            early_access_role: std::env::var("KEYCLOAK_EARLY_ACCESS_ROLE")
                .unwrap_or_else(|_| EARLY_ACCESS_ROLE_PLACEHOLDER.to_string()),
        };

        // --- Identity Provider (optional) ---
        let oidc = match std::env::var("OPENID_CLIENT_ID") {
            Ok(client_id) if !client_id.is_empty() => Some(OidcSettings {
                client_id,
                client_secret: require_var("OPENID_CLIENT_SECRET")?,
                token_endpoint: require_var("OPENID_TOKEN_ENDPOINT")?,
                userinfo_endpoint: require_var("OPENID_USERINFO_ENDPOINT")?,
                end_session_endpoint: require_var("OPENID_END_SESSION_ENDPOINT")?,
            }),
            _ => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            public_origin,
            cookie_name,
            allow_insecure_cookies,
            claim,
            oidc,
        })
    }

    /// The login-callback redirect URI registered with the provider.
    pub fn redirect_uri(&self) -> String {
        format!("{}/login/callback", self.public_origin)
    }

    /// Where users land after login or logout.
    pub fn home_url(&self) -> String {
        format!("{}/", self.public_origin)
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The process environment is shared mutable state; every test takes this
    // lock and starts from a known-clean variable set.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "BIND_ADDRESS",
        "DATABASE_URL",
        "RUST_LOG",
        "PUBLIC_ORIGIN",
        "COOKIE_NAME",
        "ALLOW_INSECURE_COOKIES",
        "OPENID_NAME_CLAIM",
        "KEYCLOAK_ADMIN_ROLE",
        "KEYCLOAK_EARLY_ACCESS_ROLE",
        "OPENID_CLIENT_ID",
        "OPENID_CLIENT_SECRET",
        "OPENID_TOKEN_ENDPOINT",
        "OPENID_USERINFO_ENDPOINT",
        "OPENID_END_SESSION_ENDPOINT",
    ];

    fn with_env(vars: &[(&str, &str)], check: impl FnOnce(Result<Config, ConfigError>)) {
        let _guard = ENV_LOCK.lock().unwrap();
        for name in ALL_VARS {
            std::env::remove_var(name);
        }
        std::env::set_var("DATABASE_URL", "postgres://localhost/chat_auth_test");
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        check(Config::from_env());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        for name in ALL_VARS {
            std::env::remove_var(name);
        }
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(v) if v == "DATABASE_URL"));
    }

    #[test]
    fn unset_client_id_disables_the_provider_block() {
        with_env(&[], |result| {
            assert!(result.unwrap().oidc.is_none());
        });
    }

    #[test]
    fn empty_client_id_disables_the_provider_block() {
        with_env(&[("OPENID_CLIENT_ID", "")], |result| {
            assert!(result.unwrap().oidc.is_none());
        });
    }

    #[test]
    fn client_id_requires_the_companion_variables() {
        with_env(
            &[
                ("OPENID_CLIENT_ID", "chat-ui"),
                ("OPENID_CLIENT_SECRET", "s3cret"),
                ("OPENID_TOKEN_ENDPOINT", "https://idp.example/token"),
                ("OPENID_USERINFO_ENDPOINT", "https://idp.example/userinfo"),
            ],
            |result| {
                let err = result.unwrap_err();
                assert!(matches!(
                    err,
                    ConfigError::MissingVar(v) if v == "OPENID_END_SESSION_ENDPOINT"
                ));
            },
        );
    }

    #[test]
    fn complete_provider_block_is_loaded() {
        with_env(
            &[
                ("OPENID_CLIENT_ID", "chat-ui"),
                ("OPENID_CLIENT_SECRET", "s3cret"),
                ("OPENID_TOKEN_ENDPOINT", "https://idp.example/token"),
                ("OPENID_USERINFO_ENDPOINT", "https://idp.example/userinfo"),
                ("OPENID_END_SESSION_ENDPOINT", "https://idp.example/logout"),
            ],
            |result| {
                let oidc = result.unwrap().oidc.expect("provider configured");
                assert_eq!(oidc.client_id, "chat-ui");
                assert_eq!(oidc.end_session_endpoint, "https://idp.example/logout");
            },
        );
    }

    #[test]
    fn insecure_cookies_require_the_literal_true() {
        with_env(&[("ALLOW_INSECURE_COOKIES", "true")], |result| {
            assert!(result.unwrap().allow_insecure_cookies);
        });
        with_env(&[("ALLOW_INSECURE_COOKIES", "1")], |result| {
            assert!(!result.unwrap().allow_insecure_cookies);
        });
        with_env(&[], |result| {
            assert!(!result.unwrap().allow_insecure_cookies);
        });
    }

    #[test]
    fn cookie_name_and_origin_have_defaults() {
        with_env(&[], |result| {
            let config = result.unwrap();
            assert_eq!(config.cookie_name, "chat-auth-session");
            assert_eq!(config.home_url(), "http://0.0.0.0:3000/");
        });
        with_env(
            &[
                ("PUBLIC_ORIGIN", "https://chat.example"),
                ("COOKIE_NAME", "sid"),
            ],
            |result| {
                let config = result.unwrap();
                assert_eq!(config.cookie_name, "sid");
                assert_eq!(config.redirect_uri(), "https://chat.example/login/callback");
            },
        );
    }

    #[test]
    fn empty_name_claim_counts_as_unset() {
        with_env(&[("OPENID_NAME_CLAIM", "")], |result| {
            assert!(result.unwrap().claim.name_claim.is_none());
        });
        with_env(&[("OPENID_NAME_CLAIM", "name")], |result| {
            assert_eq!(result.unwrap().claim.name_claim.as_deref(), Some("name"));
        });
    }
}
