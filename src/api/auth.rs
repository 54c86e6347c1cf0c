//! Login and logout endpoints. A successful login sets the `session`
//! cookie the admin middleware reads, and also returns the token as
//! JSON for clients that prefer the Authorization header.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};

use super::middleware::{ApiError, AppState};
use crate::services::AuthError;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: String,
}

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age_secs
    )
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let (session, user) = match state.auth.login(&form.username, &form.password).await {
        Ok(pair) => pair,
        Err(AuthError::InvalidCredentials) => {
            return Err(ApiError::unauthorized("Invalid username or password"));
        }
        Err(other) => {
            return Err(ApiError::internal_error(format!("Login failed: {}", other)));
        }
    };

    let max_age = (session.expires_at - chrono::Utc::now()).num_seconds().max(0);
    let body = Json(LoginResponse {
        token: session.id.clone(),
        username: user.username,
        role: user.role.to_string(),
    });

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session.id, max_age))],
        body,
    )
        .into_response())
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, request: Request) -> Response {
    if let Some(token) = super::middleware::extract_session_token(&request) {
        if let Err(err) = state.auth.logout(&token).await {
            tracing::warn!("Logout failed: {}", err);
        }
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie("", 0))],
        "OK",
    )
        .into_response()
}

/// GET /admin/login
pub async fn login_form(State(state): State<AppState>) -> Result<Response, ApiError> {
    state
        .templates
        .admin_login(None)
        .map(|html| axum::response::Html(html).into_response())
        .map_err(|e| ApiError::internal_error(format!("Failed to render login form: {}", e)))
}
