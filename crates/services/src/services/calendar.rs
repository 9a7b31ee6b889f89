use chrono::{DateTime, Days, NaiveTime, Utc};
use db::models::calendar_event::{CalendarEvent, CreateCalendarEvent, UpdateCalendarEvent};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::access::ResolvedUser;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("event {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Validation(String),
}

fn midnight(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Stretch an all-day event to whole UTC days, covering at least one day.
pub fn normalize_all_day(
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let next_day = |at: DateTime<Utc>| at.checked_add_days(Days::new(1)).unwrap_or(at);
    let start = midnight(start_at);
    let mut end = midnight(end_at);
    if end < end_at {
        end = next_day(end);
    }
    if end <= start {
        end = next_day(start);
    }
    (start, end)
}

fn prepare(event: &mut CalendarEvent) -> Result<(), CalendarError> {
    event.title = event.title.trim().to_string();
    if event.title.is_empty() {
        return Err(CalendarError::Validation("title is required".into()));
    }
    if event.end_at < event.start_at {
        return Err(CalendarError::Validation(
            "event cannot end before it starts".into(),
        ));
    }
    if event.all_day {
        (event.start_at, event.end_at) = normalize_all_day(event.start_at, event.end_at);
    }
    Ok(())
}

pub struct CalendarService;

impl CalendarService {
    /// Events overlapping `[from, to)`.
    pub async fn list_range(
        pool: &SqlitePool,
        user: &ResolvedUser,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        if to <= from {
            return Err(CalendarError::Validation(
                "range end must be after its start".into(),
            ));
        }
        Ok(CalendarEvent::find_in_range(pool, user.visibility(), from, to).await?)
    }

    pub async fn get(
        pool: &SqlitePool,
        user: &ResolvedUser,
        id: Uuid,
    ) -> Result<CalendarEvent, CalendarError> {
        CalendarEvent::find_by_id(pool, id, user.visibility())
            .await?
            .ok_or(CalendarError::NotFound(id))
    }

    pub async fn create(
        pool: &SqlitePool,
        user: &ResolvedUser,
        data: &CreateCalendarEvent,
    ) -> Result<CalendarEvent, CalendarError> {
        let now = Utc::now();
        let mut event = CalendarEvent {
            id: Uuid::new_v4(),
            organizer_id: user.user_id,
            organization_id: user.organization_id,
            title: data.title.clone(),
            description: data.description.clone(),
            start_at: data.start_at,
            end_at: data.end_at,
            all_day: data.all_day,
            created_at: now,
            updated_at: now,
        };
        prepare(&mut event)?;

        let event = CalendarEvent::insert(pool, &event).await?;
        info!(event_id = %event.id, organizer_id = %event.organizer_id, "created calendar event");
        Ok(event)
    }

    pub async fn update(
        pool: &SqlitePool,
        user: &ResolvedUser,
        id: Uuid,
        data: &UpdateCalendarEvent,
    ) -> Result<CalendarEvent, CalendarError> {
        let mut event = data.merge_into(Self::get(pool, user, id).await?);
        prepare(&mut event)?;
        Ok(CalendarEvent::save(pool, &event).await?)
    }

    pub async fn delete(
        pool: &SqlitePool,
        user: &ResolvedUser,
        id: Uuid,
    ) -> Result<(), CalendarError> {
        Self::get(pool, user, id).await?;
        CalendarEvent::delete(pool, id).await?;
        Ok(())
    }
}
