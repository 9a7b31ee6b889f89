use chrono::{Duration, Utc};
use db::models::{
    agent_application::{AgentApplication, ApplicationStatus, PaymentStatus},
    calendar_event::CalendarEvent,
    profile::Role,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;

use super::{
    access::ResolvedUser,
    applications::round_cents,
    attachments::{AttachmentError, AttachmentService, AttachmentWithUrl},
};

const RECENT_ATTACHMENTS: i64 = 5;
const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Attachments(#[from] AttachmentError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct ApplicationTotals {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub declined: usize,
    pub unpaid: usize,
    pub total_ap: f64,
    pub total_commission: f64,
}

impl ApplicationTotals {
    pub fn from_applications(applications: &[AgentApplication]) -> Self {
        let mut totals = applications.iter().fold(Self::default(), |mut totals, app| {
            totals.total += 1;
            match app.status {
                ApplicationStatus::Pending => totals.pending += 1,
                ApplicationStatus::Approved => totals.approved += 1,
                ApplicationStatus::Declined => totals.declined += 1,
            }
            if app.payment_status == PaymentStatus::Unpaid {
                totals.unpaid += 1;
            }
            totals.total_ap += app.ap;
            totals.total_commission += app.commission_amount;
            totals
        });
        totals.total_ap = round_cents(totals.total_ap);
        totals.total_commission = round_cents(totals.total_commission);
        totals
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DashboardSummary {
    pub role: Role,
    pub applications: ApplicationTotals,
    pub recent_attachments: Vec<AttachmentWithUrl>,
    pub upcoming_events: Vec<CalendarEvent>,
}

pub struct DashboardService;

impl DashboardService {
    /// Summary scoped to what `user` may see in their current role.
    pub async fn summary(
        pool: &SqlitePool,
        user: &ResolvedUser,
    ) -> Result<DashboardSummary, DashboardError> {
        let visibility = user.visibility();
        let applications = AgentApplication::find_all(pool, visibility).await?;
        let recent_attachments =
            AttachmentService::recent_with_urls(pool, user, Some(RECENT_ATTACHMENTS)).await?;
        let now = Utc::now();
        let upcoming_events =
            CalendarEvent::find_in_range(pool, visibility, now, now + Duration::days(UPCOMING_DAYS))
                .await?;

        Ok(DashboardSummary {
            role: user.role,
            applications: ApplicationTotals::from_applications(&applications),
            recent_attachments,
            upcoming_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::agent_application::CreateAgentApplication};
    use uuid::Uuid;

    use super::*;
    use crate::services::applications::ApplicationService;

    #[tokio::test]
    async fn summary_totals_visible_applications() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = ResolvedUser {
            user_id: Uuid::new_v4(),
            email: None,
            role: Role::Agent,
            organization_id: None,
        };

        for (premium, status) in [
            (100.0, ApplicationStatus::Approved),
            (50.0, ApplicationStatus::Pending),
        ] {
            ApplicationService::create(
                &db.pool,
                &user,
                &CreateAgentApplication {
                    client_name: "Client".to_string(),
                    client_email: None,
                    client_phone: None,
                    carrier: None,
                    product: None,
                    policy_number: None,
                    monthly_premium: premium,
                    split_percentage: None,
                    status: Some(status),
                    payment_status: None,
                    effective_date: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        }

        let summary = DashboardService::summary(&db.pool, &user).await.unwrap();
        assert_eq!(summary.role, Role::Agent);
        assert_eq!(summary.applications.total, 2);
        assert_eq!(summary.applications.approved, 1);
        assert_eq!(summary.applications.pending, 1);
        assert_eq!(summary.applications.unpaid, 2);
        assert_eq!(summary.applications.total_ap, 1800.0);
        assert_eq!(summary.applications.total_commission, 810.0);
        assert!(summary.recent_attachments.is_empty());
    }
}
