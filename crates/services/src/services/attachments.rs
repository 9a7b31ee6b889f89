//! Attachments, their parsed details and the stored files behind them.

use chrono::{NaiveDate, Utc};
use db::models::{
    attachment::{Attachment, AttachmentDetails, AttachmentType, AttachmentWithDetails},
    carrier::Carrier,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    access::ResolvedUser,
    applications::{ApplicationError, ApplicationService},
    extract::{Extraction, extract},
    storage::{ObjectStore, StorageError, attachment_key},
};

pub const DEFAULT_RECENT_LIMIT: i64 = 10;
pub const MAX_RECENT_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("attachment {0} not found")]
    NotFound(Uuid),
    #[error("attachment {0} has no stored file")]
    NoFile(Uuid),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

/// Details typed into (or pasted into) the attachment form. Fields left unset
/// are filled from `raw_text` when it parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateAttachment {
    pub attachment_type: Option<AttachmentType>,
    pub carrier_id: Option<Uuid>,
    pub carrier_name: Option<String>,
    pub policy_number: Option<String>,
    pub insured_name: Option<String>,
    pub reason: Option<String>,
    pub amount: Option<f64>,
    pub effective_date: Option<NaiveDate>,
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatedAttachment {
    pub attachment: AttachmentWithDetails,
    /// Applications marked unpaid by a draft return.
    pub updated_applications: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AttachmentWithUrl {
    #[serde(flatten)]
    #[ts(flatten)]
    pub attachment: AttachmentWithDetails,
    pub url: Option<String>,
}

pub fn download_url(attachment_id: Uuid) -> String {
    format!("/api/attachments/{attachment_id}/file")
}

impl CreateAttachment {
    /// Merge typed fields over whatever the pasted text yields.
    fn into_details(self, extraction: Option<Extraction>) -> AttachmentDetails {
        let parsed = extraction
            .map(|extraction| extraction.into_details(None))
            .unwrap_or_default();

        AttachmentDetails {
            attachment_type: self.attachment_type.unwrap_or(parsed.attachment_type),
            carrier_id: self.carrier_id.or(parsed.carrier_id),
            carrier_name: non_empty(self.carrier_name).or(parsed.carrier_name),
            policy_number: non_empty(self.policy_number)
                .map(|number| number.to_ascii_uppercase())
                .or(parsed.policy_number),
            insured_name: non_empty(self.insured_name).or(parsed.insured_name),
            reason: non_empty(self.reason).or(parsed.reason),
            amount: self.amount.or(parsed.amount),
            effective_date: self.effective_date.or(parsed.effective_date),
            raw_text: self.raw_text,
            application_id: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub struct AttachmentService;

impl AttachmentService {
    /// Run the extractor against the known carriers. Nothing is stored.
    pub async fn parse(pool: &SqlitePool, text: &str) -> Result<Extraction, AttachmentError> {
        let carriers = Carrier::find_all(pool).await?;
        Ok(extract(text, &carriers))
    }

    /// Store the file (if any), then write the attachment, its details and any
    /// draft-return side effects in one transaction.
    pub async fn create_with_details(
        pool: &SqlitePool,
        store: &dyn ObjectStore,
        user: &ResolvedUser,
        input: CreateAttachment,
        file: Option<UploadedFile>,
    ) -> Result<CreatedAttachment, AttachmentError> {
        let extraction = match input.raw_text.as_deref() {
            Some(text) if !text.trim().is_empty() => Some(Self::parse(pool, text).await?),
            _ => None,
        };
        let mut details = input.into_details(extraction);

        if details.carrier_id.is_none() {
            if let Some(name) = details.carrier_name.as_deref() {
                details.carrier_id = Carrier::find_by_name(pool, name).await?.map(|c| c.id);
            }
        }

        let id = Uuid::new_v4();
        let mut attachment = Attachment {
            id,
            uploaded_by: user.user_id,
            organization_id: user.organization_id,
            file_name: None,
            storage_path: None,
            content_type: None,
            size_bytes: None,
            created_at: Utc::now(),
        };

        if let Some(file) = &file {
            let key = attachment_key(id, &file.file_name);
            store.put(&key, &file.bytes).await?;
            attachment.file_name = Some(file.file_name.clone());
            attachment.storage_path = Some(key);
            attachment.content_type = file.content_type.clone();
            attachment.size_bytes = Some(file.bytes.len() as i64);
        }

        match Self::write_rows(pool, user, &attachment, details).await {
            Ok(updated_applications) => {
                let stored = AttachmentWithDetails::find_by_id(pool, id, db::models::Visibility::All)
                    .await?
                    .ok_or(AttachmentError::NotFound(id))?;
                info!(
                    attachment_id = %id,
                    attachment_type = %stored.details.attachment_type,
                    updated = updated_applications.len(),
                    "created attachment"
                );
                Ok(CreatedAttachment {
                    attachment: stored,
                    updated_applications,
                })
            }
            Err(err) => {
                if let Some(key) = &attachment.storage_path {
                    if let Err(cleanup) = store.delete(key).await {
                        warn!(key = %key, error = %cleanup, "failed to remove orphaned upload");
                    }
                }
                Err(err)
            }
        }
    }

    async fn write_rows(
        pool: &SqlitePool,
        user: &ResolvedUser,
        attachment: &Attachment,
        mut details: AttachmentDetails,
    ) -> Result<Vec<Uuid>, AttachmentError> {
        let mut tx = pool.begin().await?;
        Attachment::insert(&mut *tx, attachment).await?;

        let mut updated = Vec::new();
        let draft_policy = match details.attachment_type {
            AttachmentType::DraftReturn => details.policy_number.clone(),
            _ => None,
        };
        if let Some(policy_number) = draft_policy {
            updated = ApplicationService::update_on_draft_return(
                &mut *tx,
                user.visibility(),
                &policy_number,
                details.reason.as_deref(),
                Utc::now().date_naive(),
            )
            .await?;
            details.application_id = updated.first().copied();
        }

        AttachmentDetails::insert(&mut *tx, Uuid::new_v4(), attachment.id, &details).await?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn list(
        pool: &SqlitePool,
        user: &ResolvedUser,
    ) -> Result<Vec<AttachmentWithDetails>, AttachmentError> {
        Ok(AttachmentWithDetails::find_all(pool, user.visibility(), None).await?)
    }

    pub async fn recent_with_urls(
        pool: &SqlitePool,
        user: &ResolvedUser,
        limit: Option<i64>,
    ) -> Result<Vec<AttachmentWithUrl>, AttachmentError> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);
        let rows = AttachmentWithDetails::find_all(pool, user.visibility(), Some(limit)).await?;
        Ok(rows
            .into_iter()
            .map(|attachment| AttachmentWithUrl {
                url: attachment
                    .storage_path
                    .as_ref()
                    .map(|_| download_url(attachment.id)),
                attachment,
            })
            .collect())
    }

    pub async fn get(
        pool: &SqlitePool,
        user: &ResolvedUser,
        id: Uuid,
    ) -> Result<AttachmentWithDetails, AttachmentError> {
        AttachmentWithDetails::find_by_id(pool, id, user.visibility())
            .await?
            .ok_or(AttachmentError::NotFound(id))
    }

    pub async fn get_file(
        pool: &SqlitePool,
        store: &dyn ObjectStore,
        user: &ResolvedUser,
        id: Uuid,
    ) -> Result<(AttachmentWithDetails, Vec<u8>), AttachmentError> {
        let attachment = Self::get(pool, user, id).await?;
        let key = attachment
            .storage_path
            .as_deref()
            .ok_or(AttachmentError::NoFile(id))?;
        let bytes = store.get(key).await?.ok_or(AttachmentError::NoFile(id))?;
        Ok((attachment, bytes))
    }

    /// Remove the stored file and both rows.
    pub async fn delete(
        pool: &SqlitePool,
        store: &dyn ObjectStore,
        user: &ResolvedUser,
        id: Uuid,
    ) -> Result<(), AttachmentError> {
        let attachment = Self::get(pool, user, id).await?;

        if let Some(key) = attachment.storage_path.as_deref() {
            if !store.delete(key).await? {
                warn!(attachment_id = %id, key, "stored file already missing");
            }
        }

        Attachment::delete(pool, id).await?;
        info!(attachment_id = %id, "deleted attachment");
        Ok(())
    }
}
