use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::profile::Profile;
use deployment::Deployment;
use services::services::{
    access::ResolvedUser,
    profiles::{ProfileService, UpdateProfileOrganization, UpdateProfileRole},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

/// GET /api/profiles
/// Admin only
pub async fn list_profiles(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
) -> Result<ResponseJson<ApiResponse<Vec<Profile>>>, ApiError> {
    let profiles = ProfileService::list(&deployment.db().pool, &user).await?;
    Ok(ResponseJson(ApiResponse::success(profiles)))
}

/// GET /api/profiles/me
pub async fn my_profile(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = ProfileService::me(&deployment.db().pool, &user).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// PUT /api/profiles/{id}/role
/// Change a profile's stored role. Promotion to admin needs the allow-list.
pub async fn update_role(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfileRole>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = ProfileService::set_role(
        &deployment.db().pool,
        deployment.role_policy(),
        &user,
        id,
        payload.role,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// PUT /api/profiles/{id}/organization
pub async fn update_organization(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfileOrganization>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = ProfileService::set_organization(
        &deployment.db().pool,
        &user,
        id,
        payload.organization_id,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route("/profiles/me", get(my_profile))
        .route("/profiles/{id}/role", put(update_role))
        .route("/profiles/{id}/organization", put(update_organization))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::test_support::{TestApp, body_json, get, json};

    #[tokio::test]
    async fn admin_promotes_agent_to_manager() {
        let admin = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let app = TestApp::new(&[admin]).await;
        let admin_token = app.token(admin, Some("admin"));
        let agent_token = app.token(agent, None);

        // First request creates the agent's profile.
        let me = body_json(
            app.router()
                .oneshot(get("/api/profiles/me", Some(&agent_token)))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(me["data"]["role"], "agent");

        let response = app
            .router()
            .oneshot(get("/api/profiles", Some(&agent_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .router()
            .oneshot(json(
                "PUT",
                &format!("/api/profiles/{agent}/role"),
                &admin_token,
                json!({ "role": "admin" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .router()
            .oneshot(json(
                "PUT",
                &format!("/api/profiles/{agent}/role"),
                &admin_token,
                json!({ "role": "manager" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["role"], "manager");
    }
}
