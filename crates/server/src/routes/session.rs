use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use db::models::profile::Role;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    access::{AccessService, ResolvedUser},
    roles::{CookieUpdate, FORCE_MANAGER_VIEW_COOKIE, RoleResolution, SessionView, TEST_ROLE_COOKIE},
};
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::guard::{apply_cookie_updates, role_cookies},
};

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct SessionRole {
    pub user: ResolvedUser,
    pub resolution: RoleResolution,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SetTestRole {
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SetManagerView {
    pub enabled: bool,
}

/// GET /api/session/role
/// Resolve the caller's role as the guard would for `path`.
pub async fn get_role(
    State(deployment): State<DeploymentImpl>,
    Extension(session): Extension<SessionView>,
    jar: CookieJar,
    Query(query): Query<RoleQuery>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<SessionRole>>), ApiError> {
    let path = query.path.unwrap_or_else(|| "/dashboard".to_string());
    let (user, resolution) = AccessService::resolve(
        &deployment.db().pool,
        deployment.role_policy(),
        &session,
        &role_cookies(&jar),
        &path,
    )
    .await?;

    let jar = apply_cookie_updates(jar, &resolution.cookies);
    Ok((
        jar,
        ResponseJson(ApiResponse::success(SessionRole { user, resolution })),
    ))
}

/// POST /api/session/test-role
pub async fn set_test_role(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    jar: CookieJar,
    Json(payload): Json<SetTestRole>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<()>>), ApiError> {
    if !deployment.role_policy().impersonation_enabled {
        return Err(ApiError::Forbidden("role impersonation is disabled".to_string()));
    }

    let update = match payload.role {
        Some(role) => CookieUpdate::Set {
            name: TEST_ROLE_COOKIE.to_string(),
            value: role.to_string(),
        },
        None => CookieUpdate::Clear {
            name: TEST_ROLE_COOKIE.to_string(),
        },
    };
    info!(user_id = %user.user_id, role = ?payload.role, "changed test role");
    Ok((
        apply_cookie_updates(jar, &[update]),
        ResponseJson(ApiResponse::success(())),
    ))
}

/// POST /api/session/manager-view
/// Let an admin or manager browse as a manager. Agents cannot raise their view.
pub async fn set_manager_view(
    Extension(user): Extension<ResolvedUser>,
    jar: CookieJar,
    Json(payload): Json<SetManagerView>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<()>>), ApiError> {
    let update = if payload.enabled {
        if user.role == Role::Agent {
            return Err(ApiError::Forbidden("manager view requires a manager or admin".to_string()));
        }
        CookieUpdate::Set {
            name: FORCE_MANAGER_VIEW_COOKIE.to_string(),
            value: "true".to_string(),
        }
    } else {
        CookieUpdate::Clear {
            name: FORCE_MANAGER_VIEW_COOKIE.to_string(),
        }
    };
    Ok((
        apply_cookie_updates(jar, &[update]),
        ResponseJson(ApiResponse::success(())),
    ))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/session/role", get(get_role))
        .route("/session/test-role", post(set_test_role))
        .route("/session/manager-view", post(set_manager_view))
}
