use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use db::models::attachment::AttachmentWithDetails;
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    access::ResolvedUser,
    attachments::{
        AttachmentService, AttachmentWithUrl, CreateAttachment, CreatedAttachment, UploadedFile,
    },
    extract::Extraction,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

/// Uploads travel base64-encoded inside JSON, so allow for the inflation.
const MAX_UPLOAD_BODY: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, TS)]
pub struct FileUpload {
    pub name: String,
    pub content_type: Option<String>,
    pub data_base64: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UploadAttachmentRequest {
    #[serde(flatten)]
    #[ts(flatten)]
    pub details: CreateAttachment,
    pub file: Option<FileUpload>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ParseRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

impl FileUpload {
    fn decode(self) -> Result<UploadedFile, ApiError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("file name is required".to_string()));
        }
        let bytes = STANDARD
            .decode(self.data_base64.trim())
            .map_err(|err| ApiError::BadRequest(format!("invalid file data: {err}")))?;
        Ok(UploadedFile {
            file_name: name,
            content_type: self.content_type.filter(|value| !value.trim().is_empty()),
            bytes,
        })
    }
}

/// GET /api/attachments
/// Attachments with their parsed details
pub async fn list_attachments(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
) -> Result<ResponseJson<ApiResponse<Vec<AttachmentWithDetails>>>, ApiError> {
    let attachments = AttachmentService::list(&deployment.db().pool, &user).await?;
    Ok(ResponseJson(ApiResponse::success(attachments)))
}

/// GET /api/attachments/recent
/// Newest attachments with download links
pub async fn recent_attachments(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Query(query): Query<RecentQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<AttachmentWithUrl>>>, ApiError> {
    let attachments =
        AttachmentService::recent_with_urls(&deployment.db().pool, &user, query.limit).await?;
    Ok(ResponseJson(ApiResponse::success(attachments)))
}

/// POST /api/attachments
/// Store an attachment, its details and optional file
pub async fn create_attachment(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Json(payload): Json<UploadAttachmentRequest>,
) -> Result<ResponseJson<ApiResponse<CreatedAttachment>>, ApiError> {
    let file = payload.file.map(FileUpload::decode).transpose()?;
    let created = AttachmentService::create_with_details(
        &deployment.db().pool,
        deployment.storage().as_ref(),
        &user,
        payload.details,
        file,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(created)))
}

/// POST /api/attachments/parse
/// Run the extractor over pasted text. Nothing is stored.
pub async fn parse_attachment(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<ParseRequest>,
) -> Result<ResponseJson<ApiResponse<Extraction>>, ApiError> {
    let extraction = AttachmentService::parse(&deployment.db().pool, &payload.text).await?;
    Ok(ResponseJson(ApiResponse::success(extraction)))
}

/// GET /api/attachments/{id}
pub async fn get_attachment(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<AttachmentWithDetails>>, ApiError> {
    let attachment = AttachmentService::get(&deployment.db().pool, &user, id).await?;
    Ok(ResponseJson(ApiResponse::success(attachment)))
}

/// GET /api/attachments/{id}/file
/// Stream the stored file
pub async fn download_attachment(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (attachment, bytes) = AttachmentService::get_file(
        &deployment.db().pool,
        deployment.storage().as_ref(),
        &user,
        id,
    )
    .await?;

    let mut headers = HeaderMap::new();
    let content_type = attachment
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(name) = attachment.file_name.as_deref() {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            name.replace(['"', '\\'], "_")
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok((headers, bytes).into_response())
}

/// DELETE /api/attachments/{id}
/// Delete the stored file and the attachment rows
pub async fn delete_attachment(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    AttachmentService::delete(
        &deployment.db().pool,
        deployment.storage().as_ref(),
        &user,
        id,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/attachments",
            get(list_attachments)
                .post(create_attachment)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
        .route("/attachments/recent", get(recent_attachments))
        .route("/attachments/parse", post(parse_attachment))
        .route(
            "/attachments/{id}",
            get(get_attachment).delete(delete_attachment),
        )
        .route("/attachments/{id}/file", get(download_attachment))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::to_bytes,
        http::{StatusCode, header},
    };
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::test_support::{TestApp, body_json, get, json};

    #[tokio::test]
    async fn upload_download_delete() {
        let app = TestApp::new(&[]).await;
        let token = app.token(Uuid::new_v4(), Some("agent"));

        let response = app
            .router()
            .oneshot(json(
                "POST",
                "/api/attachments",
                &token,
                json!({
                    "raw_text": "Policy Number - AM02380192\nAmount - 48.59",
                    "file": {
                        "name": "notice.pdf",
                        "content_type": "application/pdf",
                        "data_base64": STANDARD.encode(b"%PDF-1.4"),
                    },
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let id = body["data"]["attachment"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["attachment"]["policy_number"], "AM02380192");
        assert_eq!(body["data"]["attachment"]["attachment_type"], "policy_update");

        let file_uri = format!("/api/attachments/{id}/file");
        let response = app
            .router()
            .oneshot(get(&file_uri, Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4");

        let recent = body_json(
            app.router()
                .oneshot(get("/api/attachments/recent?limit=5", Some(&token)))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(recent["data"][0]["url"], file_uri);

        let response = app
            .router()
            .oneshot(json(
                "DELETE",
                &format!("/api/attachments/{id}"),
                &token,
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .router()
            .oneshot(get(&file_uri, Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn parse_reports_missing_fields() {
        let app = TestApp::new(&[]).await;
        let token = app.token(Uuid::new_v4(), None);

        let response = app
            .router()
            .oneshot(json(
                "POST",
                "/api/attachments/parse",
                &token,
                json!({ "text": "Amount - 48.59" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["fields"]["amount"], 48.59);
        assert!(!body["data"]["missing"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_base64() {
        let app = TestApp::new(&[]).await;
        let token = app.token(Uuid::new_v4(), None);

        let response = app
            .router()
            .oneshot(json(
                "POST",
                "/api/attachments",
                &token,
                json!({ "file": { "name": "a.txt", "data_base64": "***" } }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
