use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::Visibility;

const EVENT_COLUMNS: &str = "id, organizer_id, organization_id, title, description, start_at, end_at, \
     all_day, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub all_day: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCalendarEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCalendarEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
}

impl CalendarEvent {
    /// Events overlapping the half-open window `[from, to)`.
    pub async fn find_in_range(
        pool: &SqlitePool,
        visibility: Visibility,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE start_at < "
        ));
        builder.push_bind(to).push(" AND end_at > ").push_bind(from);
        visibility.push_filter(&mut builder, "organizer_id", "organization_id", true);
        builder.push(" ORDER BY start_at ASC");
        builder.build_query_as::<Self>().fetch_all(pool).await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = "
        ));
        builder.push_bind(id);
        visibility.push_filter(&mut builder, "organizer_id", "organization_id", true);
        builder.build_query_as::<Self>().fetch_optional(pool).await
    }

    pub async fn insert(pool: &SqlitePool, event: &Self) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"INSERT INTO calendar_events (id, organizer_id, organization_id, title, description, start_at, end_at, all_day)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {EVENT_COLUMNS}"#
        ))
        .bind(event.id)
        .bind(event.organizer_id)
        .bind(event.organization_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_at)
        .bind(event.end_at)
        .bind(event.all_day)
        .fetch_one(pool)
        .await
    }

    pub async fn save(pool: &SqlitePool, event: &Self) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"UPDATE calendar_events
               SET title = $2, description = $3, start_at = $4, end_at = $5, all_day = $6,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {EVENT_COLUMNS}"#
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_at)
        .bind(event.end_at)
        .bind(event.all_day)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM calendar_events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl UpdateCalendarEvent {
    pub fn merge_into(&self, mut event: CalendarEvent) -> CalendarEvent {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if self.description.is_some() {
            event.description = self.description.clone();
        }
        if let Some(start_at) = self.start_at {
            event.start_at = start_at;
        }
        if let Some(end_at) = self.end_at {
            event.end_at = end_at;
        }
        if let Some(all_day) = self.all_day {
            event.all_day = all_day;
        }
        event
    }
}
