//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::middleware::RequestSession;
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        current_user_handler,
    ),
    components(
        schemas(UserResponse)
    ),
    tags(
        (name = "Chat Auth API", description = "Login, logout and session endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The authenticated user's profile as exposed to the frontend.
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub is_early_access: bool,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Returns the profile of the currently logged-in user.
///
/// Requires a session cookie that maps to a user-owned session; anonymous
/// sessions get 401 like missing ones.
#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "The current user", body = UserResponse),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn current_user_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Option<RequestSession>>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let user_id = session
        .and_then(|s| s.user_id)
        .ok_or((StatusCode::UNAUTHORIZED, "Not logged in".to_string()))?;

    let user = state
        .db
        .find_user_by_id(user_id)
        .await
        .map_err(|e| {
            error!(user_id = %user_id, error = %e, "failed to load current user");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load user".to_string())
        })?
        // A session pointing at a deleted user behaves like no session.
        .ok_or((StatusCode::UNAUTHORIZED, "Not logged in".to_string()))?;

    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        name: user.name,
        email: user.email,
        avatar_url: user.avatar_url,
        is_admin: user.is_admin,
        is_early_access: user.is_early_access,
    }))
}
