//! services/api/src/web/cookies.rs
//!
//! Builds the outward-facing session cookie. The cookie carries the opaque
//! session secret; policy flags follow the deployment environment.

use crate::config::Config;

/// Two weeks, matching the stored session expiry.
const COOKIE_MAX_AGE_SECS: i64 = 14 * 24 * 60 * 60;

/// `Set-Cookie` value that installs (or rotates) the session secret.
pub fn refresh_session_cookie(config: &Config, secret: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite={}{}; Max-Age={}",
        config.cookie_name,
        secret,
        same_site(config),
        secure_flag(config),
        COOKIE_MAX_AGE_SECS,
    )
}

/// `Set-Cookie` value that clears the session cookie. Flags must match the
/// ones used when setting it, or browsers keep the old cookie around.
pub fn delete_session_cookie(config: &Config) -> String {
    format!(
        "{}=; HttpOnly; Path=/; SameSite={}{}; Max-Age=0",
        config.cookie_name,
        same_site(config),
        secure_flag(config),
    )
}

fn same_site(config: &Config) -> &'static str {
    // Cross-site cookies require Secure, so insecure deployments drop to Lax.
    if config.allow_insecure_cookies {
        "Lax"
    } else {
        "None"
    }
}

fn secure_flag(config: &Config) -> &'static str {
    if config.allow_insecure_cookies {
        ""
    } else {
        "; Secure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_auth_core::claims::ClaimConfig;
    use tracing::Level;

    fn config(allow_insecure: bool) -> Config {
        Config {
            bind_address: "127.0.0.1:3000".parse().unwrap(),
            database_url: "postgres://unused".to_string(),
            log_level: Level::INFO,
            public_origin: "https://chat.example".to_string(),
            cookie_name: "chat-auth-session".to_string(),
            allow_insecure_cookies: allow_insecure,
            claim: ClaimConfig::default(),
            oidc: None,
        }
    }

    #[test]
    fn secure_deployment_uses_none_and_secure() {
        let cookie = refresh_session_cookie(&config(false), "secret-value");
        assert!(cookie.starts_with("chat-auth-session=secret-value;"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=1209600"));
    }

    #[test]
    fn insecure_deployment_uses_lax_without_secure() {
        let cookie = refresh_session_cookie(&config(true), "secret-value");
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn delete_cookie_matches_flags_and_expires() {
        let cookie = delete_session_cookie(&config(false));
        assert!(cookie.starts_with("chat-auth-session=;"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
