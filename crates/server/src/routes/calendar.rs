use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::{DateTime, Utc};
use db::models::calendar_event::{CalendarEvent, CreateCalendarEvent, UpdateCalendarEvent};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{access::ResolvedUser, calendar::CalendarService};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// GET /api/calendar/events
/// Events overlapping `[from, to)`.
pub async fn list_events(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Query(range): Query<RangeQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<CalendarEvent>>>, ApiError> {
    let events =
        CalendarService::list_range(&deployment.db().pool, &user, range.from, range.to).await?;
    Ok(ResponseJson(ApiResponse::success(events)))
}

/// POST /api/calendar/events
pub async fn create_event(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Json(payload): Json<CreateCalendarEvent>,
) -> Result<ResponseJson<ApiResponse<CalendarEvent>>, ApiError> {
    let event = CalendarService::create(&deployment.db().pool, &user, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

/// GET /api/calendar/events/{id}
pub async fn get_event(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<CalendarEvent>>, ApiError> {
    let event = CalendarService::get(&deployment.db().pool, &user, id).await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

/// PUT /api/calendar/events/{id}
pub async fn update_event(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCalendarEvent>,
) -> Result<ResponseJson<ApiResponse<CalendarEvent>>, ApiError> {
    let event = CalendarService::update(&deployment.db().pool, &user, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

/// DELETE /api/calendar/events/{id}
pub async fn delete_event(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    CalendarService::delete(&deployment.db().pool, &user, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/calendar/events", get(list_events).post(create_event))
        .route(
            "/calendar/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
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
    async fn create_then_list_range() {
        let app = TestApp::new(&[]).await;
        let token = app.token(Uuid::new_v4(), None);

        let response = app
            .router()
            .oneshot(json(
                "POST",
                "/api/calendar/events",
                &token,
                json!({
                    "title": "Carrier call",
                    "start_at": "2025-03-10T15:00:00Z",
                    "end_at": "2025-03-10T16:00:00Z",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let listed = body_json(
            app.router()
                .oneshot(get(
                    "/api/calendar/events?from=2025-03-10T00:00:00Z&to=2025-03-11T00:00:00Z",
                    Some(&token),
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(listed["data"][0]["title"], "Carrier call");

        let response = app
            .router()
            .oneshot(get(
                "/api/calendar/events?from=2025-03-11T00:00:00Z&to=2025-03-10T00:00:00Z",
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
