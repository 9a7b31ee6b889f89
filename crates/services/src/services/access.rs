//! Turns a verified session into the caller's effective role.

use db::models::{
    Visibility,
    profile::{CreateProfile, Profile, Role},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::roles::{
    ProfileAction, RoleContext, RoleCookies, RolePolicy, RoleResolution, SessionView,
    resolve_role,
};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("profile {0} disappeared during role repair")]
    ProfileVanished(Uuid),
}

/// The authenticated caller as seen by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ResolvedUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub organization_id: Option<Uuid>,
}

impl ResolvedUser {
    pub fn visibility(&self) -> Visibility {
        self.role.visibility(self.user_id, self.organization_id)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub struct AccessService;

impl AccessService {
    /// Resolve the role for `path` and persist any profile creation or repair.
    pub async fn resolve(
        pool: &SqlitePool,
        policy: &RolePolicy,
        session: &SessionView,
        cookies: &RoleCookies,
        path: &str,
    ) -> Result<(ResolvedUser, RoleResolution), AccessError> {
        let profile = Profile::find_by_id(pool, session.user_id).await?;
        let resolution = resolve_role(
            policy,
            &RoleContext {
                session,
                cookies,
                stored_role: profile.as_ref().map(|p| p.role),
                path,
            },
        );

        let profile = Self::apply_profile_action(pool, session, profile, resolution.profile_action)
            .await?;

        let user = ResolvedUser {
            user_id: session.user_id,
            email: session.email.clone().or(profile.email),
            role: resolution.role,
            organization_id: profile.organization_id,
        };
        Ok((user, resolution))
    }

    async fn apply_profile_action(
        pool: &SqlitePool,
        session: &SessionView,
        existing: Option<Profile>,
        action: ProfileAction,
    ) -> Result<Profile, AccessError> {
        let user_id = session.user_id;
        match (action, existing) {
            (ProfileAction::Create { role }, _) => {
                let data = CreateProfile {
                    email: session.email.clone(),
                    full_name: None,
                    role,
                    organization_id: None,
                };
                match Profile::create(pool, user_id, &data).await {
                    Ok(profile) => {
                        info!(%user_id, %role, "created profile");
                        Ok(profile)
                    }
                    // A concurrent request created it first.
                    Err(e)
                        if e.as_database_error()
                            .is_some_and(|db_err| db_err.is_unique_violation()) =>
                    {
                        Profile::find_by_id(pool, user_id)
                            .await?
                            .ok_or(AccessError::ProfileVanished(user_id))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            (ProfileAction::Repair { from, to }, _) => {
                warn!(%user_id, %from, %to, "repairing stored role");
                Profile::update_role(pool, user_id, to)
                    .await?
                    .ok_or(AccessError::ProfileVanished(user_id))
            }
            (ProfileAction::None, Some(profile)) => Ok(profile),
            (ProfileAction::None, None) => Err(AccessError::ProfileVanished(user_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use db::DBService;

    use super::*;
    use crate::services::{profiles::ProfileService, roles::Navigation};

    fn session(user_id: Uuid, metadata_role: Option<&str>) -> SessionView {
        SessionView {
            user_id,
            email: Some("someone@example.com".to_string()),
            metadata_role: metadata_role.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn first_visit_creates_agent_profile() {
        let db = DBService::new_in_memory().await.unwrap();
        let user_id = Uuid::new_v4();

        let (user, resolution) = AccessService::resolve(
            &db.pool,
            &RolePolicy::default(),
            &session(user_id, None),
            &RoleCookies::default(),
            "/agent/dashboard",
        )
        .await
        .unwrap();

        assert_eq!(user.role, Role::Agent);
        assert_eq!(resolution.navigation, Navigation::Stay);
        let stored = Profile::find_by_id(&db.pool, user_id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Agent);
        assert_eq!(stored.email.as_deref(), Some("someone@example.com"));
    }

    #[tokio::test]
    async fn unauthorized_admin_profile_is_downgraded() {
        let db = DBService::new_in_memory().await.unwrap();
        let user_id = Uuid::new_v4();
        Profile::create(
            &db.pool,
            user_id,
            &CreateProfile {
                email: None,
                full_name: None,
                role: Role::Admin,
                organization_id: None,
            },
        )
        .await
        .unwrap();

        let (user, resolution) = AccessService::resolve(
            &db.pool,
            &RolePolicy::default(),
            &session(user_id, Some("admin")),
            &RoleCookies::default(),
            "/admin/dashboard",
        )
        .await
        .unwrap();

        assert_eq!(user.role, Role::Agent);
        assert_eq!(
            resolution.navigation,
            Navigation::Redirect("/agent/dashboard".to_string())
        );
        let stored = Profile::find_by_id(&db.pool, user_id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Agent);
    }

    #[tokio::test]
    async fn admin_role_change_survives_metadata_claim() {
        let db = DBService::new_in_memory().await.unwrap();
        let user_id = Uuid::new_v4();
        let policy = RolePolicy::default();
        let session = session(user_id, Some("agent"));

        AccessService::resolve(
            &db.pool,
            &policy,
            &session,
            &RoleCookies::default(),
            "/agent/dashboard",
        )
        .await
        .unwrap();

        let admin = ResolvedUser {
            user_id: Uuid::new_v4(),
            email: None,
            role: Role::Admin,
            organization_id: None,
        };
        ProfileService::set_role(&db.pool, &policy, &admin, user_id, Role::Manager)
            .await
            .unwrap();

        let (user, resolution) = AccessService::resolve(
            &db.pool,
            &policy,
            &session,
            &RoleCookies::default(),
            "/manager/dashboard",
        )
        .await
        .unwrap();

        assert_eq!(user.role, Role::Manager);
        assert_eq!(resolution.profile_action, ProfileAction::None);
        assert_eq!(resolution.navigation, Navigation::Stay);
        let stored = Profile::find_by_id(&db.pool, user_id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Manager);
    }

    #[tokio::test]
    async fn allow_listed_admin_sees_everything() {
        let db = DBService::new_in_memory().await.unwrap();
        let user_id = Uuid::new_v4();
        let policy = RolePolicy {
            admin_user_ids: HashSet::from([user_id]),
            ..Default::default()
        };

        let (user, _) = AccessService::resolve(
            &db.pool,
            &policy,
            &session(user_id, Some("admin")),
            &RoleCookies::default(),
            "/admin/dashboard",
        )
        .await
        .unwrap();

        assert!(user.is_admin());
        assert_eq!(user.visibility(), Visibility::All);
    }
}
