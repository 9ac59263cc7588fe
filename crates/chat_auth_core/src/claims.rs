//! crates/chat_auth_core/src/claims.rs
//!
//! The Claim Validator: turns the untyped claim bag asserted by the identity
//! provider into a canonical `UserIdentity`. Pure function, no I/O.

use serde_json::Value;

use crate::domain::UserIdentity;
use crate::error::{AuthError, AuthResult};

/// Documented placeholder used when `KEYCLOAK_ADMIN_ROLE` is unset.
pub const ADMIN_ROLE_PLACEHOLDER: &str = "YOUR_KEYCLOAK_ADMIN_ROLE";
/// Documented placeholder used when `KEYCLOAK_EARLY_ACCESS_ROLE` is unset.
pub const EARLY_ACCESS_ROLE_PLACEHOLDER: &str = "YOUR_KEYCLOAK_EARLY_ACCESS_ROLE";

/// Process-wide claim interpretation settings, passed in explicitly so the
/// validator stays testable without environment simulation.
#[derive(Debug, Clone)]
pub struct ClaimConfig {
    /// Preferred source claim for the display name, if configured.
    pub name_claim: Option<String>,
    /// Role name granting the admin flag.
    pub admin_role: String,
    /// Role name granting the early-access flag.
    pub early_access_role: String,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            name_claim: None,
            admin_role: ADMIN_ROLE_PLACEHOLDER.to_string(),
            early_access_role: EARLY_ACCESS_ROLE_PLACEHOLDER.to_string(),
        }
    }
}

/// Validates a raw provider claim set into a canonical identity record.
///
/// Required: `sub` (string). Optional with type checks: `preferred_username`,
/// `email` (format checked), `picture`, `realm_access.roles`, `groups`.
/// The display name resolves through the configured name-claim, then
/// `preferred_username`, then `email`; if all are absent the claim set is
/// rejected.
pub fn validate_claims(claims: &Value, config: &ClaimConfig) -> AuthResult<UserIdentity> {
    let subject = claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::Validation("missing required claim 'sub'".to_string()))?
        .to_string();

    let username = optional_string(claims, "preferred_username")?;
    let avatar_url = optional_string(claims, "picture")?;

    let email = optional_string(claims, "email")?;
    if let Some(addr) = &email {
        if !is_valid_email(addr) {
            return Err(AuthError::Validation(format!(
                "claim 'email' is not a valid address: '{addr}'"
            )));
        }
    }

    // Keycloak nests realm roles under realm_access; groups sit at top level.
    // A realm_access container without a roles array is malformed.
    let roles = match claims.get("realm_access") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(container)) => {
            let roles = container.get("roles").ok_or_else(|| {
                AuthError::Validation("claim 'realm_access' is missing 'roles'".to_string())
            })?;
            string_array(Some(roles), "realm_access.roles")?
        }
        Some(other) => {
            return Err(AuthError::Validation(format!(
                "claim 'realm_access' must be an object, got {other}"
            )))
        }
    };
    let groups = string_array(claims.get("groups"), "groups")?;

    let configured_name = config
        .name_claim
        .as_deref()
        .and_then(|claim| claims.get(claim))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let name = configured_name
        .or_else(|| username.clone())
        .or_else(|| email.clone())
        .ok_or_else(|| {
            AuthError::Validation(
                "no display name: configured name claim, preferred_username and email are all absent"
                    .to_string(),
            )
        })?;

    let is_admin = roles.iter().any(|r| r == &config.admin_role);
    let is_early_access = roles.iter().any(|r| r == &config.early_access_role);

    Ok(UserIdentity {
        subject,
        username,
        name,
        email,
        avatar_url,
        roles,
        groups,
        is_admin,
        is_early_access,
    })
}

/// Reads an optional top-level string claim, rejecting non-string values.
fn optional_string(claims: &Value, key: &str) -> AuthResult<Option<String>> {
    match claims.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(AuthError::Validation(format!(
            "claim '{key}' must be a string, got {other}"
        ))),
    }
}

/// Reads an optional array-of-strings claim, rejecting mixed-type arrays.
fn string_array(value: Option<&Value>, key: &str) -> AuthResult<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    AuthError::Validation(format!("claim '{key}' must contain only strings"))
                })
            })
            .collect(),
        Some(other) => Err(AuthError::Validation(format!(
            "claim '{key}' must be an array, got {other}"
        ))),
    }
}

/// Structural email check: one '@', non-empty local part, dotted domain.
fn is_valid_email(addr: &str) -> bool {
    let mut parts = addr.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !addr.chars().any(char::is_whitespace)
}
