use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::Visibility;

const APPLICATION_COLUMNS: &str = "id, agent_id, organization_id, client_name, client_email, client_phone, \
     carrier, product, policy_number, monthly_premium, ap, split_percentage, commission_amount, \
     status, payment_status, effective_date, notes, created_at, updated_at";

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "application_status")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Declined,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "payment_status")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
    Partial,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AgentApplication {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub carrier: Option<String>,
    pub product: Option<String>,
    pub policy_number: Option<String>,
    pub monthly_premium: f64,
    pub ap: f64, // annual premium
    pub split_percentage: f64,
    pub commission_amount: f64,
    pub status: ApplicationStatus,
    pub payment_status: PaymentStatus,
    pub effective_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAgentApplication {
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub carrier: Option<String>,
    pub product: Option<String>,
    pub policy_number: Option<String>,
    pub monthly_premium: f64,
    pub split_percentage: Option<f64>,
    pub status: Option<ApplicationStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub effective_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateAgentApplication {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub carrier: Option<String>,
    pub product: Option<String>,
    pub policy_number: Option<String>,
    pub monthly_premium: Option<f64>,
    pub split_percentage: Option<f64>,
    pub status: Option<ApplicationStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub effective_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl AgentApplication {
    pub async fn find_all(
        pool: &SqlitePool,
        visibility: Visibility,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {APPLICATION_COLUMNS} FROM agent_applications"
        ));
        visibility.push_filter(&mut builder, "agent_id", "organization_id", false);
        builder.push(" ORDER BY created_at DESC");
        builder.build_query_as::<Self>().fetch_all(pool).await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {APPLICATION_COLUMNS} FROM agent_applications WHERE id = "
        ));
        builder.push_bind(id);
        visibility.push_filter(&mut builder, "agent_id", "organization_id", true);
        builder.build_query_as::<Self>().fetch_optional(pool).await
    }

    /// Insert a fully-populated row; derived amounts are computed by the caller.
    pub async fn insert<'e, E>(executor: E, application: &Self) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r#"INSERT INTO agent_applications
                   (id, agent_id, organization_id, client_name, client_email, client_phone, carrier,
                    product, policy_number, monthly_premium, ap, split_percentage, commission_amount,
                    status, payment_status, effective_date, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
               RETURNING {APPLICATION_COLUMNS}"#
        ))
        .bind(application.id)
        .bind(application.agent_id)
        .bind(application.organization_id)
        .bind(&application.client_name)
        .bind(&application.client_email)
        .bind(&application.client_phone)
        .bind(&application.carrier)
        .bind(&application.product)
        .bind(&application.policy_number)
        .bind(application.monthly_premium)
        .bind(application.ap)
        .bind(application.split_percentage)
        .bind(application.commission_amount)
        .bind(application.status)
        .bind(application.payment_status)
        .bind(application.effective_date)
        .bind(&application.notes)
        .fetch_one(executor)
        .await
    }

    /// Persist every mutable column of `application`.
    pub async fn save(pool: &SqlitePool, application: &Self) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"UPDATE agent_applications
               SET client_name = $2, client_email = $3, client_phone = $4, carrier = $5, product = $6,
                   policy_number = $7, monthly_premium = $8, ap = $9, split_percentage = $10,
                   commission_amount = $11, status = $12, payment_status = $13, effective_date = $14,
                   notes = $15, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {APPLICATION_COLUMNS}"#
        ))
        .bind(application.id)
        .bind(&application.client_name)
        .bind(&application.client_email)
        .bind(&application.client_phone)
        .bind(&application.carrier)
        .bind(&application.product)
        .bind(&application.policy_number)
        .bind(application.monthly_premium)
        .bind(application.ap)
        .bind(application.split_percentage)
        .bind(application.commission_amount)
        .bind(application.status)
        .bind(application.payment_status)
        .bind(application.effective_date)
        .bind(&application.notes)
        .fetch_one(pool)
        .await
    }

    /// Mark every application carrying `policy_number` that `visibility` allows
    /// as unpaid and append `note`. Returns the ids of the touched applications.
    pub async fn mark_draft_returned<'e, E>(
        executor: E,
        policy_number: &str,
        note: &str,
        visibility: Visibility,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
            "UPDATE agent_applications SET payment_status = 'Unpaid', notes = CASE \
             WHEN notes IS NULL OR notes = '' THEN ",
        );
        builder
            .push_bind(note.to_string())
            .push(" ELSE notes || char(10) || ")
            .push_bind(note.to_string())
            .push(" END, updated_at = datetime('now', 'subsec') WHERE policy_number = ")
            .push_bind(policy_number.trim().to_string())
            .push(" COLLATE NOCASE");
        visibility.push_filter(&mut builder, "agent_id", "organization_id", true);
        builder.push(" RETURNING id");

        let rows: Vec<(Uuid,)> = builder.build_query_as().fetch_all(executor).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid, visibility: Visibility) -> Result<u64, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new("DELETE FROM agent_applications WHERE id = ");
        builder.push_bind(id);
        visibility.push_filter(&mut builder, "agent_id", "organization_id", true);
        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }
}

impl UpdateAgentApplication {
    /// Apply the set fields on top of `application`. Derived amounts are not touched.
    pub fn merge_into(&self, mut application: AgentApplication) -> AgentApplication {
        if let Some(client_name) = &self.client_name {
            application.client_name = client_name.clone();
        }
        if self.client_email.is_some() {
            application.client_email = self.client_email.clone();
        }
        if self.client_phone.is_some() {
            application.client_phone = self.client_phone.clone();
        }
        if self.carrier.is_some() {
            application.carrier = self.carrier.clone();
        }
        if self.product.is_some() {
            application.product = self.product.clone();
        }
        if self.policy_number.is_some() {
            application.policy_number = self.policy_number.clone();
        }
        if let Some(monthly_premium) = self.monthly_premium {
            application.monthly_premium = monthly_premium;
        }
        if let Some(split_percentage) = self.split_percentage {
            application.split_percentage = split_percentage;
        }
        if let Some(status) = self.status {
            application.status = status;
        }
        if let Some(payment_status) = self.payment_status {
            application.payment_status = payment_status;
        }
        if self.effective_date.is_some() {
            application.effective_date = self.effective_date;
        }
        if self.notes.is_some() {
            application.notes = self.notes.clone();
        }
        application
    }

    pub fn changes_financials(&self) -> bool {
        self.monthly_premium.is_some() || self.split_percentage.is_some()
    }
}
