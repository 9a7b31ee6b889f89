//! Role-scoped page endpoints. The guard has already redirected callers whose
//! effective role does not own the requested section.

use axum::{
    Extension, Router,
    extract::State,
    response::{Json as ResponseJson, Redirect},
    routing::get,
};
use deployment::Deployment;
use services::services::{
    access::ResolvedUser,
    dashboard::{DashboardService, DashboardSummary},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

/// GET /login
pub async fn login_page() -> ResponseJson<ApiResponse<String>> {
    ResponseJson(ApiResponse::success(
        "Sign in to continue; the session token goes in the Authorization header or session cookie"
            .to_string(),
    ))
}

/// GET /dashboard
/// Send the caller to their role's dashboard
pub async fn dashboard_redirect(Extension(user): Extension<ResolvedUser>) -> Redirect {
    Redirect::temporary(&user.role.dashboard_path())
}

/// GET /{role}/dashboard
/// Dashboard data for the role the guard resolved
pub async fn dashboard(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
) -> Result<ResponseJson<ApiResponse<DashboardSummary>>, ApiError> {
    let summary = DashboardService::summary(&deployment.db().pool, &user).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/login", get(login_page))
        .route("/dashboard", get(dashboard_redirect))
        .route("/admin/dashboard", get(dashboard))
        .route("/manager/dashboard", get(dashboard))
        .route("/agent/dashboard", get(dashboard))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use db::models::profile::{CreateProfile, Profile, Role};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::routes::test_support::{TestApp, body_json, get, location};

    async fn seed(app: &TestApp, user_id: Uuid, role: Role) {
        Profile::create(
            &app.deployment.db().pool,
            user_id,
            &CreateProfile {
                email: None,
                full_name: None,
                role,
                organization_id: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unauthenticated_page_redirects_to_login() {
        let app = TestApp::new(&[]).await;
        let response = app
            .router()
            .oneshot(get("/agent/dashboard", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login?from=%2Fagent%2Fdashboard");
    }

    #[tokio::test]
    async fn manager_on_agent_section_goes_to_manager_dashboard() {
        let app = TestApp::new(&[]).await;
        let user_id = Uuid::new_v4();
        seed(&app, user_id, Role::Manager).await;
        let token = app.token(user_id, None);

        let response = app
            .router()
            .oneshot(get("/agent/dashboard", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/manager/dashboard");

        let response = app
            .router()
            .oneshot(get("/manager/dashboard", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["role"], "manager");
    }

    #[tokio::test]
    async fn unlisted_admin_claim_is_corrected() {
        let app = TestApp::new(&[]).await;
        let user_id = Uuid::new_v4();
        let token = app.token(user_id, Some("admin"));

        let response = app
            .router()
            .oneshot(get("/admin/dashboard", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/agent/dashboard");

        let profile = Profile::find_by_id(&app.deployment.db().pool, user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.role, Role::Agent);
    }

    #[tokio::test]
    async fn signed_in_login_visit_goes_to_dashboard() {
        let admin = Uuid::new_v4();
        let app = TestApp::new(&[admin]).await;
        let token = app.token(admin, Some("admin"));

        let response = app
            .router()
            .oneshot(get("/login", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/admin/dashboard");
    }

    #[tokio::test]
    async fn public_paths_skip_the_guard() {
        let app = TestApp::new(&[]).await;
        let response = app.router().oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.router().oneshot(get("/login", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
