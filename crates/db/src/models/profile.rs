use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::Visibility;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
    Default,
)]
#[sqlx(type_name = "role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Agent,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Agent];

    /// URL prefix owning this role's pages, e.g. `/manager`.
    pub fn path_prefix(&self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Manager => "/manager",
            Role::Agent => "/agent",
        }
    }

    pub fn dashboard_path(&self) -> String {
        format!("{}/dashboard", self.path_prefix())
    }

    /// The role whose section contains `path`, if any.
    pub fn from_path(path: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| {
            let prefix = role.path_prefix();
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Rows this role may see when acting as `user_id` inside `organization_id`.
    pub fn visibility(&self, user_id: Uuid, organization_id: Option<Uuid>) -> Visibility {
        match (self, organization_id) {
            (Role::Admin, _) => Visibility::All,
            (Role::Manager, Some(org)) => Visibility::Organization(org),
            _ => Visibility::Owner(user_id),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProfile {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
    pub organization_id: Option<Uuid>,
}

impl Profile {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"SELECT id, email, full_name, role, organization_id, created_at, updated_at
               FROM profiles
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(
        pool: &SqlitePool,
        visibility: Visibility,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(
            "SELECT id, email, full_name, role, organization_id, created_at, updated_at FROM profiles",
        );
        visibility.push_filter(&mut builder, "id", "organization_id", false);
        builder.push(" ORDER BY created_at ASC");
        builder.build_query_as::<Profile>().fetch_all(pool).await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateProfile,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Profile>(
            r#"INSERT INTO profiles (id, email, full_name, role, organization_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, email, full_name, role, organization_id, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&data.email)
        .bind(&data.full_name)
        .bind(data.role)
        .bind(data.organization_id)
        .fetch_one(executor)
        .await
    }

    pub async fn update_role(
        pool: &SqlitePool,
        id: Uuid,
        role: Role,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"UPDATE profiles
               SET role = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, email, full_name, role, organization_id, created_at, updated_at"#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_organization(
        pool: &SqlitePool,
        id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"UPDATE profiles
               SET organization_id = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, email, full_name, role, organization_id, created_at, updated_at"#,
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[test]
    fn role_from_path_matches_whole_segments() {
        assert_eq!(Role::from_path("/admin"), Some(Role::Admin));
        assert_eq!(Role::from_path("/manager/dashboard"), Some(Role::Manager));
        assert_eq!(Role::from_path("/agent/applications/new"), Some(Role::Agent));
        assert_eq!(Role::from_path("/administrator"), None);
        assert_eq!(Role::from_path("/login"), None);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Manager".parse::<Role>().ok(), Some(Role::Manager));
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::Agent.dashboard_path(), "/agent/dashboard");
    }

    #[tokio::test]
    async fn create_and_update_role() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        let created = Profile::create(
            &db.pool,
            id,
            &CreateProfile {
                email: Some("agent@example.com".to_string()),
                full_name: None,
                role: Role::Agent,
                organization_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.role, Role::Agent);

        let updated = Profile::update_role(&db.pool, id, Role::Manager)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.role, Role::Manager);

        let missing = Profile::update_role(&db.pool, Uuid::new_v4(), Role::Manager)
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
