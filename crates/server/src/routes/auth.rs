//! Development sign-in and sign-out.

use axum::{
    Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::post,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use db::models::profile::Role;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    roles::{ADMIN_REDIRECTED_COOKIE, FORCE_MANAGER_VIEW_COOKIE, TEST_ROLE_COOKIE},
    session::SESSION_COOKIE,
};
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::guard::role_cookie};

const DEV_SESSION_HOURS: i64 = 24;

#[derive(Debug, Clone, Deserialize, TS)]
pub struct DevLoginRequest {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    /// Becomes the session's metadata role claim.
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct DevLoginResponse {
    pub user_id: Uuid,
    pub token: String,
}

/// POST /api/auth/dev-login
/// Issue a session for any user id. Only mounted in development.
pub async fn dev_login(
    State(deployment): State<DeploymentImpl>,
    jar: CookieJar,
    Json(payload): Json<DevLoginRequest>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<DevLoginResponse>>), ApiError> {
    if !deployment.config().is_development() {
        return Err(ApiError::NotFound("not found".to_string()));
    }

    let user_id = payload.user_id.unwrap_or_else(Uuid::new_v4);
    let token = deployment.session_keys().issue(
        user_id,
        payload.email,
        payload.role.map(|role| role.to_string()),
        chrono::Duration::hours(DEV_SESSION_HOURS),
    )?;
    info!(%user_id, "issued development session");

    let jar = jar.add(role_cookie(SESSION_COOKIE.to_string(), token.clone()));
    Ok((
        jar,
        ResponseJson(ApiResponse::success(DevLoginResponse { user_id, token })),
    ))
}

/// POST /api/auth/logout
/// Clear the session and role cookies
pub async fn logout(jar: CookieJar) -> (CookieJar, ResponseJson<ApiResponse<()>>) {
    let jar = [
        SESSION_COOKIE,
        TEST_ROLE_COOKIE,
        FORCE_MANAGER_VIEW_COOKIE,
        ADMIN_REDIRECTED_COOKIE,
    ]
    .into_iter()
    .fold(jar, |jar, name| jar.remove(Cookie::build(name).path("/")));
    (jar, ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/dev-login", post(dev_login))
        .route("/auth/logout", post(logout))
}
