//! services/tracker/src/web/auth.rs
//!
//! The login endpoint. Credentials are checked against the local cache first
//! and then against the remote users collection; no session is issued.

use crate::web::rest::port_failure;
use crate::web::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use employee_tracker_core::domain::User;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Look up the user with these credentials
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials match a user", body = User),
        (status = 401, description = "Invalid email or password"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state
        .services
        .employees
        .login(&req.email, &req.password)
        .await
        .map_err(|e| port_failure("log in", e))?;

    match user {
        Some(user) => {
            info!(user_id = user.id, role = %user.role, "User logged in");
            Ok(Json(user))
        }
        None => Err((StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())),
    }
}
