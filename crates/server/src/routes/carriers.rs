use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::carrier::{Carrier, CreateCarrier};
use deployment::Deployment;
use services::services::{access::ResolvedUser, commission_rates::CommissionRateService};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, routes::require_admin};

/// GET /api/carriers
pub async fn list_carriers(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Carrier>>>, ApiError> {
    let carriers = CommissionRateService::list_carriers(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(carriers)))
}

/// POST /api/carriers
/// Admin only
pub async fn create_carrier(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Json(payload): Json<CreateCarrier>,
) -> Result<ResponseJson<ApiResponse<Carrier>>, ApiError> {
    require_admin(&user)?;
    let carrier = CommissionRateService::create_carrier(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(carrier)))
}

/// DELETE /api/carriers/{id}
/// Delete a carrier together with its commission rates.
pub async fn delete_carrier(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require_admin(&user)?;
    CommissionRateService::delete_carrier(&deployment.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/carriers", get(list_carriers).post(create_carrier))
        .route("/carriers/{id}", delete(delete_carrier))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::test_support::{TestApp, body_json, get, json};

    #[tokio::test]
    async fn duplicate_carrier_conflicts() {
        let admin = Uuid::new_v4();
        let app = TestApp::new(&[admin]).await;
        let token = app.token(admin, Some("admin"));

        for expected in [StatusCode::OK, StatusCode::CONFLICT] {
            let response = app
                .router()
                .oneshot(json("POST", "/api/carriers", &token, json!({ "name": "Americo" })))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }

        let listed = body_json(
            app.router()
                .oneshot(get("/api/carriers", Some(&token)))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(listed["data"][0]["name"], "Americo");
    }
}
