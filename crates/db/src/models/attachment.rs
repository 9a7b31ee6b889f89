use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::Visibility;

const JOINED_COLUMNS: &str = "a.id, a.uploaded_by, a.organization_id, a.file_name, a.storage_path, \
     a.content_type, a.size_bytes, a.created_at, \
     d.id AS details_id, d.attachment_type, d.carrier_id, d.carrier_name, d.policy_number, \
     d.insured_name, d.reason, d.amount, d.effective_date, d.raw_text, d.application_id";

/// Kind of document or notification an attachment carries
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "attachment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttachmentType {
    DraftReturn,
    PolicyUpdate,
    ClientCommunication,
    #[default]
    Other,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Attachment {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub organization_id: Option<Uuid>,
    pub file_name: Option<String>,
    pub storage_path: Option<String>, // object key inside the attachments bucket
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Structured fields parsed from (or typed into) an attachment
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS)]
pub struct AttachmentDetails {
    pub attachment_type: AttachmentType,
    pub carrier_id: Option<Uuid>,
    pub carrier_name: Option<String>,
    pub policy_number: Option<String>,
    pub insured_name: Option<String>,
    pub reason: Option<String>,
    pub amount: Option<f64>,
    pub effective_date: Option<NaiveDate>,
    pub raw_text: Option<String>,
    pub application_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AttachmentWithDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub attachment: Attachment,
    pub details_id: Uuid,
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub details: AttachmentDetails,
}

impl std::ops::Deref for AttachmentWithDetails {
    type Target = Attachment;
    fn deref(&self) -> &Self::Target {
        &self.attachment
    }
}

impl Attachment {
    pub async fn insert<'e, E>(executor: E, attachment: &Self) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"INSERT INTO attachments (id, uploaded_by, organization_id, file_name, storage_path, content_type, size_bytes, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(attachment.id)
        .bind(attachment.uploaded_by)
        .bind(attachment.organization_id)
        .bind(&attachment.file_name)
        .bind(&attachment.storage_path)
        .bind(&attachment.content_type)
        .bind(attachment.size_bytes)
        .bind(attachment.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        // attachment_details rows cascade
        let result = sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl AttachmentDetails {
    pub async fn insert<'e, E>(
        executor: E,
        id: Uuid,
        attachment_id: Uuid,
        details: &Self,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"INSERT INTO attachment_details
                   (id, attachment_id, attachment_type, carrier_id, carrier_name, policy_number,
                    insured_name, reason, amount, effective_date, raw_text, application_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(id)
        .bind(attachment_id)
        .bind(details.attachment_type)
        .bind(details.carrier_id)
        .bind(&details.carrier_name)
        .bind(&details.policy_number)
        .bind(&details.insured_name)
        .bind(&details.reason)
        .bind(details.amount)
        .bind(details.effective_date)
        .bind(&details.raw_text)
        .bind(details.application_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}

impl AttachmentWithDetails {
    pub async fn find_all(
        pool: &SqlitePool,
        visibility: Visibility,
        limit: Option<i64>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {JOINED_COLUMNS} FROM attachments a JOIN attachment_details d ON d.attachment_id = a.id"
        ));
        visibility.push_filter(&mut builder, "a.uploaded_by", "a.organization_id", false);
        builder.push(" ORDER BY a.created_at DESC");
        if let Some(limit) = limit {
            builder.push(" LIMIT ").push_bind(limit);
        }
        builder.build_query_as::<Self>().fetch_all(pool).await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {JOINED_COLUMNS} FROM attachments a JOIN attachment_details d ON d.attachment_id = a.id WHERE a.id = "
        ));
        builder.push_bind(id);
        visibility.push_filter(&mut builder, "a.uploaded_by", "a.organization_id", true);
        builder.build_query_as::<Self>().fetch_optional(pool).await
    }
}
