use axum::{Router, middleware::from_fn_with_state};
use db::models::profile::Role;
use services::services::access::ResolvedUser;
use tower_http::trace::TraceLayer;

use crate::{DeploymentImpl, error::ApiError, middleware::guard};

pub mod applications;
pub mod attachments;
pub mod auth;
pub mod calendar;
pub mod carriers;
pub mod commission_rates;
pub mod health;
pub mod pages;
pub mod profiles;
pub mod session;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(auth::router(&deployment))
        .merge(session::router(&deployment))
        .merge(applications::router(&deployment))
        .merge(attachments::router(&deployment))
        .merge(carriers::router(&deployment))
        .merge(commission_rates::router(&deployment))
        .merge(calendar::router(&deployment))
        .merge(profiles::router(&deployment));

    Router::new()
        .merge(health::router(&deployment))
        .merge(pages::router(&deployment))
        .nest("/api", api)
        .layer(from_fn_with_state(deployment.clone(), guard::require_session))
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

pub(crate) fn require_admin(user: &ResolvedUser) -> Result<(), ApiError> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin role required".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{collections::HashSet, sync::Arc};

    use axum::{
        body::{Body, to_bytes},
        http::{Request, Response, header},
    };
    use db::DBService;
    use deployment::Deployment;
    use local_deployment::LocalDeployment;
    use serde_json::Value;
    use services::services::{config::Config, storage::LocalObjectStore};
    use tempfile::TempDir;
    use uuid::Uuid;

    pub struct TestApp {
        pub deployment: LocalDeployment,
        _storage: TempDir,
    }

    impl TestApp {
        pub async fn new(admins: &[Uuid]) -> Self {
            let storage = TempDir::new().unwrap();
            let mut config = Config::from_lookup(|_| None).unwrap();
            config.role_policy.admin_user_ids = admins.iter().copied().collect::<HashSet<_>>();
            let deployment = LocalDeployment::with_parts(
                config,
                DBService::new_in_memory().await.unwrap(),
                Arc::new(LocalObjectStore::new(storage.path())),
            );
            Self {
                deployment,
                _storage: storage,
            }
        }

        pub fn token(&self, user_id: Uuid, metadata_role: Option<&str>) -> String {
            self.deployment
                .session_keys()
                .issue(
                    user_id,
                    Some(format!("{user_id}@example.com")),
                    metadata_role.map(str::to_string),
                    chrono::Duration::hours(1),
                )
                .unwrap()
        }

        pub fn router(&self) -> axum::Router {
            super::router(self.deployment.clone())
        }
    }

    pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    pub fn json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn location(response: &Response<Body>) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }
}
