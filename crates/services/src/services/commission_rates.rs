//! Carriers and the commission rates they pay.

use chrono::{NaiveDate, Utc};
use db::models::{
    carrier::{Carrier, CreateCarrier},
    carrier_commission_rate::{
        CarrierCommissionRate, CommissionRateFilter, CreateCommissionRate, UpdateCommissionRate,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

pub const MAX_PERCENTAGE: f64 = 200.0;

#[derive(Debug, Error)]
pub enum RateError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("carrier {0} not found")]
    CarrierNotFound(Uuid),
    #[error("commission rate {0} not found")]
    RateNotFound(Uuid),
    #[error("carrier {0} already exists")]
    DuplicateCarrier(String),
    #[error("{0}")]
    Validation(String),
}

/// Parameters for finding the rate in force for one policy.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RateLookup {
    pub carrier_id: Uuid,
    pub product_type: String,
    pub policy_year: Option<i64>,
    pub face_amount: Option<f64>,
    pub as_of: Option<NaiveDate>,
}

fn validate_rate(
    product_type: &str,
    policy_year: i64,
    percentage: f64,
    min_face_amount: Option<f64>,
    max_face_amount: Option<f64>,
    effective_date: NaiveDate,
    expiration_date: Option<NaiveDate>,
) -> Result<(), RateError> {
    let invalid = |message: &str| Err(RateError::Validation(message.to_string()));

    if product_type.trim().is_empty() {
        return invalid("product type is required");
    }
    if policy_year < 1 {
        return invalid("policy year starts at 1");
    }
    if !percentage.is_finite() || !(0.0..=MAX_PERCENTAGE).contains(&percentage) {
        return invalid("percentage must be between 0 and 200");
    }
    for amount in [min_face_amount, max_face_amount].into_iter().flatten() {
        if !amount.is_finite() || amount < 0.0 {
            return invalid("face amounts must be zero or more");
        }
    }
    if let (Some(min), Some(max)) = (min_face_amount, max_face_amount) {
        if min > max {
            return invalid("minimum face amount exceeds maximum");
        }
    }
    if let Some(expiration) = expiration_date {
        if expiration <= effective_date {
            return invalid("expiration date must be after the effective date");
        }
    }
    Ok(())
}

pub struct CommissionRateService;

impl CommissionRateService {
    pub async fn list_carriers(pool: &SqlitePool) -> Result<Vec<Carrier>, RateError> {
        Ok(Carrier::find_all(pool).await?)
    }

    pub async fn create_carrier(pool: &SqlitePool, data: &CreateCarrier) -> Result<Carrier, RateError> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(RateError::Validation("carrier name is required".into()));
        }
        if Carrier::find_by_name(pool, name).await?.is_some() {
            return Err(RateError::DuplicateCarrier(name.to_string()));
        }

        let carrier = Carrier::create(pool, Uuid::new_v4(), data).await?;
        info!(carrier_id = %carrier.id, name = %carrier.name, "created carrier");
        Ok(carrier)
    }

    /// Deleting a carrier also deletes its rates.
    pub async fn delete_carrier(pool: &SqlitePool, id: Uuid) -> Result<(), RateError> {
        if Carrier::delete(pool, id).await? == 0 {
            return Err(RateError::CarrierNotFound(id));
        }
        info!(carrier_id = %id, "deleted carrier");
        Ok(())
    }

    pub async fn list_rates(
        pool: &SqlitePool,
        filter: &CommissionRateFilter,
    ) -> Result<Vec<CarrierCommissionRate>, RateError> {
        Ok(CarrierCommissionRate::find(pool, filter).await?)
    }

    pub async fn get_rate(pool: &SqlitePool, id: Uuid) -> Result<CarrierCommissionRate, RateError> {
        CarrierCommissionRate::find_by_id(pool, id)
            .await?
            .ok_or(RateError::RateNotFound(id))
    }

    pub async fn create_rate(
        pool: &SqlitePool,
        data: &CreateCommissionRate,
    ) -> Result<CarrierCommissionRate, RateError> {
        validate_rate(
            &data.product_type,
            data.policy_year.unwrap_or(1),
            data.percentage,
            data.min_face_amount,
            data.max_face_amount,
            data.effective_date,
            data.expiration_date,
        )?;
        if Carrier::find_by_id(pool, data.carrier_id).await?.is_none() {
            return Err(RateError::CarrierNotFound(data.carrier_id));
        }

        let rate = CarrierCommissionRate::create(pool, Uuid::new_v4(), data).await?;
        info!(rate_id = %rate.id, carrier_id = %rate.carrier_id, "created commission rate");
        Ok(rate)
    }

    pub async fn update_rate(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateCommissionRate,
    ) -> Result<CarrierCommissionRate, RateError> {
        let rate = data.merge_into(Self::get_rate(pool, id).await?);
        validate_rate(
            &rate.product_type,
            rate.policy_year,
            rate.percentage,
            rate.min_face_amount,
            rate.max_face_amount,
            rate.effective_date,
            rate.expiration_date,
        )?;
        Ok(CarrierCommissionRate::update(pool, &rate).await?)
    }

    pub async fn delete_rate(pool: &SqlitePool, id: Uuid) -> Result<(), RateError> {
        if CarrierCommissionRate::delete(pool, id).await? == 0 {
            return Err(RateError::RateNotFound(id));
        }
        Ok(())
    }

    /// The rate in force for `lookup`, defaulting to policy year 1 and today.
    pub async fn lookup_rate(
        pool: &SqlitePool,
        lookup: &RateLookup,
    ) -> Result<Option<CarrierCommissionRate>, RateError> {
        Ok(CarrierCommissionRate::find_applicable(
            pool,
            lookup.carrier_id,
            lookup.product_type.trim(),
            lookup.policy_year.unwrap_or(1),
            lookup.face_amount,
            lookup.as_of.unwrap_or_else(|| Utc::now().date_naive()),
        )
        .await?)
    }
}
