use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::carrier_commission_rate::{
    CarrierCommissionRate, CommissionRateFilter, CreateCommissionRate, UpdateCommissionRate,
};
use deployment::Deployment;
use services::services::{
    access::ResolvedUser,
    commission_rates::{CommissionRateService, RateLookup},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, routes::require_admin};

/// GET /api/commission-rates
pub async fn list_rates(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<CommissionRateFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<CarrierCommissionRate>>>, ApiError> {
    let rates = CommissionRateService::list_rates(&deployment.db().pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(rates)))
}

/// GET /api/commission-rates/lookup
/// The rate in force for one policy, or `null` when none applies.
pub async fn lookup_rate(
    State(deployment): State<DeploymentImpl>,
    Query(lookup): Query<RateLookup>,
) -> Result<ResponseJson<ApiResponse<Option<CarrierCommissionRate>>>, ApiError> {
    let rate = CommissionRateService::lookup_rate(&deployment.db().pool, &lookup).await?;
    Ok(ResponseJson(ApiResponse::success(rate)))
}

/// GET /api/commission-rates/{id}
pub async fn get_rate(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<CarrierCommissionRate>>, ApiError> {
    let rate = CommissionRateService::get_rate(&deployment.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(rate)))
}

/// POST /api/commission-rates
/// Admin only
pub async fn create_rate(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Json(payload): Json<CreateCommissionRate>,
) -> Result<ResponseJson<ApiResponse<CarrierCommissionRate>>, ApiError> {
    require_admin(&user)?;
    let rate = CommissionRateService::create_rate(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(rate)))
}

/// PUT /api/commission-rates/{id}
/// Admin only
pub async fn update_rate(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCommissionRate>,
) -> Result<ResponseJson<ApiResponse<CarrierCommissionRate>>, ApiError> {
    require_admin(&user)?;
    let rate = CommissionRateService::update_rate(&deployment.db().pool, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(rate)))
}

/// DELETE /api/commission-rates/{id}
/// Admin only
pub async fn delete_rate(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<ResolvedUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require_admin(&user)?;
    CommissionRateService::delete_rate(&deployment.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/commission-rates", get(list_rates).post(create_rate))
        .route("/commission-rates/lookup", get(lookup_rate))
        .route(
            "/commission-rates/{id}",
            get(get_rate).put(update_rate).delete(delete_rate),
        )
}
