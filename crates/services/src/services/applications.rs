//! Agent applications: financial derivation, role scoping and draft returns.

use chrono::{NaiveDate, Utc};
use db::models::{
    Visibility,
    agent_application::{
        AgentApplication, CreateAgentApplication, PaymentStatus, UpdateAgentApplication,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::access::ResolvedUser;

pub const DEFAULT_SPLIT_PERCENTAGE: f64 = 40.0;
/// Months of premium paid up front as commission advance.
pub const ADVANCE_MONTHS: f64 = 9.0;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("application {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct Financials {
    pub ap: f64,
    pub commission_amount: f64,
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Annual premium and the agent's advance after the agency split.
pub fn compute_financials(monthly_premium: f64, split_percentage: f64) -> Financials {
    Financials {
        ap: round_cents(monthly_premium * 12.0),
        commission_amount: round_cents(
            monthly_premium * ADVANCE_MONTHS * (100.0 - split_percentage) / 100.0,
        ),
    }
}

fn validate(client_name: &str, monthly_premium: f64, split_percentage: f64) -> Result<(), ApplicationError> {
    if client_name.trim().is_empty() {
        return Err(ApplicationError::Validation("client name is required".into()));
    }
    if !monthly_premium.is_finite() || monthly_premium < 0.0 {
        return Err(ApplicationError::Validation(
            "monthly premium must be zero or more".into(),
        ));
    }
    if !split_percentage.is_finite() || !(0.0..=100.0).contains(&split_percentage) {
        return Err(ApplicationError::Validation(
            "split percentage must be between 0 and 100".into(),
        ));
    }
    Ok(())
}

/// Note appended to an application whose premium draft bounced.
pub fn draft_return_note(date: NaiveDate, reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|reason| !reason.is_empty()) {
        Some(reason) => format!("[{}] Draft returned: {reason}", date.format("%Y-%m-%d")),
        None => format!("[{}] Draft returned", date.format("%Y-%m-%d")),
    }
}

pub struct ApplicationService;

impl ApplicationService {
    pub async fn list(
        pool: &SqlitePool,
        user: &ResolvedUser,
    ) -> Result<Vec<AgentApplication>, ApplicationError> {
        Ok(AgentApplication::find_all(pool, user.visibility()).await?)
    }

    pub async fn get(
        pool: &SqlitePool,
        user: &ResolvedUser,
        id: Uuid,
    ) -> Result<AgentApplication, ApplicationError> {
        AgentApplication::find_by_id(pool, id, user.visibility())
            .await?
            .ok_or(ApplicationError::NotFound(id))
    }

    /// Build the row a create would insert, without touching the database.
    pub fn prepare(
        user: &ResolvedUser,
        data: &CreateAgentApplication,
    ) -> Result<AgentApplication, ApplicationError> {
        let split_percentage = data.split_percentage.unwrap_or(DEFAULT_SPLIT_PERCENTAGE);
        validate(&data.client_name, data.monthly_premium, split_percentage)?;
        let financials = compute_financials(data.monthly_premium, split_percentage);
        let now = Utc::now();

        Ok(AgentApplication {
            id: Uuid::new_v4(),
            agent_id: user.user_id,
            organization_id: user.organization_id,
            client_name: data.client_name.trim().to_string(),
            client_email: data.client_email.clone(),
            client_phone: data.client_phone.clone(),
            carrier: data.carrier.clone(),
            product: data.product.clone(),
            policy_number: data
                .policy_number
                .as_deref()
                .map(|number| number.trim().to_ascii_uppercase()),
            monthly_premium: data.monthly_premium,
            ap: financials.ap,
            split_percentage,
            commission_amount: financials.commission_amount,
            status: data.status.unwrap_or_default(),
            payment_status: data.payment_status.unwrap_or_default(),
            effective_date: data.effective_date,
            notes: data.notes.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn create(
        pool: &SqlitePool,
        user: &ResolvedUser,
        data: &CreateAgentApplication,
    ) -> Result<AgentApplication, ApplicationError> {
        let application = Self::prepare(user, data)?;
        let application = AgentApplication::insert(pool, &application).await?;
        info!(application_id = %application.id, agent_id = %application.agent_id, "created application");
        Ok(application)
    }

    pub async fn update(
        pool: &SqlitePool,
        user: &ResolvedUser,
        id: Uuid,
        data: &UpdateAgentApplication,
    ) -> Result<AgentApplication, ApplicationError> {
        let existing = Self::get(pool, user, id).await?;
        let mut application = data.merge_into(existing);
        validate(
            &application.client_name,
            application.monthly_premium,
            application.split_percentage,
        )?;

        if data.changes_financials() {
            let financials =
                compute_financials(application.monthly_premium, application.split_percentage);
            application.ap = financials.ap;
            application.commission_amount = financials.commission_amount;
        }

        Ok(AgentApplication::save(pool, &application).await?)
    }

    pub async fn delete(
        pool: &SqlitePool,
        user: &ResolvedUser,
        id: Uuid,
    ) -> Result<(), ApplicationError> {
        if AgentApplication::delete(pool, id, user.visibility()).await? == 0 {
            return Err(ApplicationError::NotFound(id));
        }
        info!(application_id = %id, "deleted application");
        Ok(())
    }

    /// Mark the applications for `policy_number` that the caller can see as
    /// unpaid and log the returned draft.
    pub async fn update_on_draft_return<'e, E>(
        executor: E,
        visibility: Visibility,
        policy_number: &str,
        reason: Option<&str>,
        date: NaiveDate,
    ) -> Result<Vec<Uuid>, ApplicationError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let note = draft_return_note(date, reason);
        let updated =
            AgentApplication::mark_draft_returned(executor, policy_number, &note, visibility)
                .await?;
        info!(
            policy_number,
            count = updated.len(),
            payment_status = %PaymentStatus::Unpaid,
            "applied draft return"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{agent_application::ApplicationStatus, profile::Role},
    };

    use super::*;

    fn agent(organization_id: Option<Uuid>) -> ResolvedUser {
        ResolvedUser {
            user_id: Uuid::new_v4(),
            email: None,
            role: Role::Agent,
            organization_id,
        }
    }

    fn new_application(client_name: &str, monthly_premium: f64) -> CreateAgentApplication {
        CreateAgentApplication {
            client_name: client_name.to_string(),
            client_email: None,
            client_phone: None,
            carrier: Some("Americo".to_string()),
            product: Some("Final Expense".to_string()),
            policy_number: None,
            monthly_premium,
            split_percentage: None,
            status: None,
            payment_status: None,
            effective_date: None,
            notes: None,
        }
    }

    #[test]
    fn financials_use_nine_month_advance() {
        let financials = compute_financials(100.0, DEFAULT_SPLIT_PERCENTAGE);
        assert_eq!(financials.ap, 1200.0);
        assert_eq!(financials.commission_amount, 540.0);

        let odd = compute_financials(33.33, 25.0);
        assert_eq!(odd.ap, 399.96);
        assert_eq!(odd.commission_amount, 224.98);
    }

    #[tokio::test]
    async fn create_applies_default_split() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = agent(None);

        let created = ApplicationService::create(&db.pool, &user, &new_application("Ann Lee", 100.0))
            .await
            .unwrap();
        assert_eq!(created.split_percentage, 40.0);
        assert_eq!(created.ap, 1200.0);
        assert_eq!(created.commission_amount, 540.0);
        assert_eq!(created.status, ApplicationStatus::Pending);
        assert_eq!(created.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn rejects_out_of_range_split() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut data = new_application("Ann Lee", 100.0);
        data.split_percentage = Some(120.0);

        let err = ApplicationService::create(&db.pool, &agent(None), &data)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));
    }

    #[tokio::test]
    async fn update_recomputes_financials() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = agent(None);
        let created = ApplicationService::create(&db.pool, &user, &new_application("Ann Lee", 100.0))
            .await
            .unwrap();

        let updated = ApplicationService::update(
            &db.pool,
            &user,
            created.id,
            &UpdateAgentApplication {
                monthly_premium: Some(200.0),
                split_percentage: Some(50.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.ap, 2400.0);
        assert_eq!(updated.commission_amount, 900.0);
    }

    #[tokio::test]
    async fn agents_only_see_their_own_rows() {
        let db = DBService::new_in_memory().await.unwrap();
        let org = Uuid::new_v4();
        let first = agent(Some(org));
        let second = agent(Some(org));

        let mine = ApplicationService::create(&db.pool, &first, &new_application("Mine", 50.0))
            .await
            .unwrap();
        ApplicationService::create(&db.pool, &second, &new_application("Theirs", 60.0))
            .await
            .unwrap();

        let visible = ApplicationService::list(&db.pool, &first).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, mine.id);

        let manager = ResolvedUser {
            role: Role::Manager,
            ..agent(Some(org))
        };
        assert_eq!(manager.visibility(), Visibility::Organization(org));
        assert_eq!(ApplicationService::list(&db.pool, &manager).await.unwrap().len(), 2);

        let err = ApplicationService::delete(&db.pool, &second, mine.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn draft_return_marks_unpaid_and_appends_note() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = agent(None);
        let mut data = new_application("Ann Lee", 100.0);
        data.policy_number = Some("am02380192".to_string());
        data.payment_status = Some(PaymentStatus::Paid);
        data.notes = Some("Sold by phone".to_string());
        let created = ApplicationService::create(&db.pool, &user, &data).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let updated = ApplicationService::update_on_draft_return(
            &db.pool,
            user.visibility(),
            "AM02380192",
            Some("Insufficient funds"),
            date,
        )
        .await
        .unwrap();
        assert_eq!(updated, vec![created.id]);

        let reloaded = ApplicationService::get(&db.pool, &user, created.id).await.unwrap();
        assert_eq!(reloaded.payment_status, PaymentStatus::Unpaid);
        assert_eq!(
            reloaded.notes.as_deref(),
            Some("Sold by phone\n[2025-06-01] Draft returned: Insufficient funds")
        );
    }
}
