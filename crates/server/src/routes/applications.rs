use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::agent_application::{
    AgentApplication, CreateAgentApplication, UpdateAgentApplication,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{access::ResolvedUser, applications::ApplicationService};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct CreateQuery {
    #[serde(default)]
    pub preview: bool,
}

/// GET /api/applications
/// List the applications visible to the caller
pub async fn list_applications(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
) -> Result<ResponseJson<ApiResponse<Vec<AgentApplication>>>, ApiError> {
    let applications = ApplicationService::list(&deployment.db().pool, &user).await?;
    Ok(ResponseJson(ApiResponse::success(applications)))
}

/// POST /api/applications
/// Create an application. With `?preview=true` (development only) the computed
/// row is returned without being stored.
pub async fn create_application(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Query(query): Query<CreateQuery>,
    Json(payload): Json<CreateAgentApplication>,
) -> Result<ResponseJson<ApiResponse<AgentApplication>>, ApiError> {
    if query.preview {
        if !deployment.config().is_development() {
            return Err(ApiError::BadRequest(
                "preview is only available in development".to_string(),
            ));
        }
        let application = ApplicationService::prepare(&user, &payload)?;
        return Ok(ResponseJson(ApiResponse::success(application)));
    }

    let application = ApplicationService::create(&deployment.db().pool, &user, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(application)))
}

/// GET /api/applications/{id}
pub async fn get_application(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<AgentApplication>>, ApiError> {
    let application = ApplicationService::get(&deployment.db().pool, &user, id).await?;
    Ok(ResponseJson(ApiResponse::success(application)))
}

/// PUT /api/applications/{id}
/// Merge the given fields and recompute financials
pub async fn update_application(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAgentApplication>,
) -> Result<ResponseJson<ApiResponse<AgentApplication>>, ApiError> {
    let application =
        ApplicationService::update(&deployment.db().pool, &user, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(application)))
}

/// DELETE /api/applications/{id}
pub async fn delete_application(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ApplicationService::delete(&deployment.db().pool, &user, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/applications",
            get(list_applications).post(create_application),
        )
        .route(
            "/applications/{id}",
            get(get_application)
                .put(update_application)
                .delete(delete_application),
        )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::test_support::{TestApp, body_json, get, json};

    #[tokio::test]
    async fn api_requires_session() {
        let app = TestApp::new(&[]).await;
        let response = app
            .router()
            .oneshot(get("/api/applications", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn create_computes_financials() {
        let app = TestApp::new(&[]).await;
        let token = app.token(Uuid::new_v4(), Some("agent"));

        let response = app
            .router()
            .oneshot(json(
                "POST",
                "/api/applications",
                &token,
                json!({ "client_name": "Ann Lee", "monthly_premium": 100.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["ap"], 1200.0);
        assert_eq!(body["data"]["commission_amount"], 540.0);
        assert_eq!(body["data"]["split_percentage"], 40.0);

        let listed = body_json(
            app.router()
                .oneshot(get("/api/applications", Some(&token)))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preview_does_not_persist() {
        let app = TestApp::new(&[]).await;
        let token = app.token(Uuid::new_v4(), Some("agent"));

        let response = app
            .router()
            .oneshot(json(
                "POST",
                "/api/applications?preview=true",
                &token,
                json!({ "client_name": "Ann Lee", "monthly_premium": 50.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["ap"], 600.0);

        let listed = body_json(
            app.router()
                .oneshot(get("/api/applications", Some(&token)))
                .await
                .unwrap(),
        )
        .await;
        assert!(listed["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_split_is_bad_request() {
        let app = TestApp::new(&[]).await;
        let token = app.token(Uuid::new_v4(), None);

        let response = app
            .router()
            .oneshot(json(
                "POST",
                "/api/applications",
                &token,
                json!({ "client_name": "Ann Lee", "monthly_premium": 50.0, "split_percentage": 150.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
