use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

const RATE_COLUMNS: &str = "r.id, r.carrier_id, c.name AS carrier_name, r.product_type, r.policy_year, \
     r.percentage, r.min_face_amount, r.max_face_amount, r.effective_date, r.expiration_date, \
     r.created_at, r.updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CarrierCommissionRate {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub carrier_name: String,
    pub product_type: String,
    pub policy_year: i64,
    pub percentage: f64,
    pub min_face_amount: Option<f64>,
    pub max_face_amount: Option<f64>,
    pub effective_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCommissionRate {
    pub carrier_id: Uuid,
    pub product_type: String,
    pub policy_year: Option<i64>,
    pub percentage: f64,
    pub min_face_amount: Option<f64>,
    pub max_face_amount: Option<f64>,
    pub effective_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCommissionRate {
    pub product_type: Option<String>,
    pub policy_year: Option<i64>,
    pub percentage: Option<f64>,
    pub min_face_amount: Option<f64>,
    pub max_face_amount: Option<f64>,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

/// Browse filters; unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CommissionRateFilter {
    pub carrier_id: Option<Uuid>,
    pub product_type: Option<String>,
    pub policy_year: Option<i64>,
}

impl CarrierCommissionRate {
    pub async fn find(
        pool: &SqlitePool,
        filter: &CommissionRateFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {RATE_COLUMNS} FROM carrier_commission_rates r JOIN carriers c ON c.id = r.carrier_id WHERE 1 = 1"
        ));
        if let Some(carrier_id) = filter.carrier_id {
            builder.push(" AND r.carrier_id = ").push_bind(carrier_id);
        }
        if let Some(product_type) = &filter.product_type {
            builder
                .push(" AND r.product_type = ")
                .push_bind(product_type.clone())
                .push(" COLLATE NOCASE");
        }
        if let Some(policy_year) = filter.policy_year {
            builder.push(" AND r.policy_year = ").push_bind(policy_year);
        }
        builder.push(
            " ORDER BY c.name COLLATE NOCASE ASC, r.product_type ASC, r.policy_year ASC, r.effective_date DESC",
        );
        builder.build_query_as::<Self>().fetch_all(pool).await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {RATE_COLUMNS} FROM carrier_commission_rates r JOIN carriers c ON c.id = r.carrier_id WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// The rate in force for a policy: bounds contain `face_amount`, the
    /// effective window contains `as_of`, and the latest effective date wins.
    pub async fn find_applicable(
        pool: &SqlitePool,
        carrier_id: Uuid,
        product_type: &str,
        policy_year: i64,
        face_amount: Option<f64>,
        as_of: NaiveDate,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"SELECT {RATE_COLUMNS}
               FROM carrier_commission_rates r
               JOIN carriers c ON c.id = r.carrier_id
               WHERE r.carrier_id = $1
                 AND r.product_type = $2 COLLATE NOCASE
                 AND r.policy_year = $3
                 AND r.effective_date <= $4
                 AND (r.expiration_date IS NULL OR r.expiration_date > $4)
                 AND ($5 IS NULL OR r.min_face_amount IS NULL OR r.min_face_amount <= $5)
                 AND ($5 IS NULL OR r.max_face_amount IS NULL OR r.max_face_amount >= $5)
               ORDER BY r.effective_date DESC
               LIMIT 1"#
        ))
        .bind(carrier_id)
        .bind(product_type)
        .bind(policy_year)
        .bind(as_of)
        .bind(face_amount)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateCommissionRate,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO carrier_commission_rates
                   (id, carrier_id, product_type, policy_year, percentage, min_face_amount, max_face_amount, effective_date, expiration_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(id)
        .bind(data.carrier_id)
        .bind(data.product_type.trim())
        .bind(data.policy_year.unwrap_or(1))
        .bind(data.percentage)
        .bind(data.min_face_amount)
        .bind(data.max_face_amount)
        .bind(data.effective_date)
        .bind(data.expiration_date)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Overwrites every column of an existing rate with the merged values.
    pub async fn update(pool: &SqlitePool, rate: &Self) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"UPDATE carrier_commission_rates
               SET product_type = $2, policy_year = $3, percentage = $4, min_face_amount = $5,
                   max_face_amount = $6, effective_date = $7, expiration_date = $8,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(rate.id)
        .bind(&rate.product_type)
        .bind(rate.policy_year)
        .bind(rate.percentage)
        .bind(rate.min_face_amount)
        .bind(rate.max_face_amount)
        .bind(rate.effective_date)
        .bind(rate.expiration_date)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, rate.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM carrier_commission_rates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl UpdateCommissionRate {
    /// Apply the set fields on top of `rate`.
    pub fn merge_into(&self, mut rate: CarrierCommissionRate) -> CarrierCommissionRate {
        if let Some(product_type) = &self.product_type {
            rate.product_type = product_type.trim().to_string();
        }
        if let Some(policy_year) = self.policy_year {
            rate.policy_year = policy_year;
        }
        if let Some(percentage) = self.percentage {
            rate.percentage = percentage;
        }
        if self.min_face_amount.is_some() {
            rate.min_face_amount = self.min_face_amount;
        }
        if self.max_face_amount.is_some() {
            rate.max_face_amount = self.max_face_amount;
        }
        if let Some(effective_date) = self.effective_date {
            rate.effective_date = effective_date;
        }
        if self.expiration_date.is_some() {
            rate.expiration_date = self.expiration_date;
        }
        rate
    }
}
