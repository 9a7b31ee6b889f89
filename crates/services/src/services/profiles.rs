//! Admin management of user profiles.

use db::models::{
    Visibility,
    profile::{Profile, Role},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{access::ResolvedUser, roles::RolePolicy};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("profile {0} not found")]
    NotFound(Uuid),
    #[error("only admins can manage profiles")]
    Forbidden,
    #[error("user {0} is not on the admin allow-list")]
    AdminNotAllowed(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateProfileRole {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateProfileOrganization {
    pub organization_id: Option<Uuid>,
}

pub struct ProfileService;

impl ProfileService {
    fn require_admin(actor: &ResolvedUser) -> Result<(), ProfileError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(ProfileError::Forbidden)
        }
    }

    pub async fn me(pool: &SqlitePool, actor: &ResolvedUser) -> Result<Profile, ProfileError> {
        Profile::find_by_id(pool, actor.user_id)
            .await?
            .ok_or(ProfileError::NotFound(actor.user_id))
    }

    pub async fn list(pool: &SqlitePool, actor: &ResolvedUser) -> Result<Vec<Profile>, ProfileError> {
        Self::require_admin(actor)?;
        Ok(Profile::find_all(pool, Visibility::All).await?)
    }

    pub async fn set_role(
        pool: &SqlitePool,
        policy: &RolePolicy,
        actor: &ResolvedUser,
        id: Uuid,
        role: Role,
    ) -> Result<Profile, ProfileError> {
        Self::require_admin(actor)?;
        if role == Role::Admin && !policy.may_be_admin(id) {
            return Err(ProfileError::AdminNotAllowed(id));
        }

        let profile = Profile::update_role(pool, id, role)
            .await?
            .ok_or(ProfileError::NotFound(id))?;
        info!(actor = %actor.user_id, profile_id = %id, %role, "changed profile role");
        Ok(profile)
    }

    pub async fn set_organization(
        pool: &SqlitePool,
        actor: &ResolvedUser,
        id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Profile, ProfileError> {
        Self::require_admin(actor)?;
        Profile::update_organization(pool, id, organization_id)
            .await?
            .ok_or(ProfileError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use db::{DBService, models::profile::CreateProfile};

    use super::*;

    fn user(role: Role) -> ResolvedUser {
        ResolvedUser {
            user_id: Uuid::new_v4(),
            email: None,
            role,
            organization_id: None,
        }
    }

    async fn seed(pool: &SqlitePool, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        Profile::create(
            pool,
            id,
            &CreateProfile {
                email: None,
                full_name: None,
                role,
                organization_id: None,
            },
        )
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn only_admins_manage_roles() {
        let db = DBService::new_in_memory().await.unwrap();
        let target = seed(&db.pool, Role::Agent).await;
        let policy = RolePolicy::default();

        let err = ProfileService::set_role(&db.pool, &policy, &user(Role::Manager), target, Role::Manager)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::Forbidden));

        let updated = ProfileService::set_role(&db.pool, &policy, &user(Role::Admin), target, Role::Manager)
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Manager);
    }

    #[tokio::test]
    async fn admin_promotion_requires_allow_list() {
        let db = DBService::new_in_memory().await.unwrap();
        let listed = seed(&db.pool, Role::Manager).await;
        let unlisted = seed(&db.pool, Role::Manager).await;
        let policy = RolePolicy {
            admin_user_ids: HashSet::from([listed]),
            ..Default::default()
        };
        let admin = user(Role::Admin);

        let err = ProfileService::set_role(&db.pool, &policy, &admin, unlisted, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::AdminNotAllowed(id) if id == unlisted));

        let promoted = ProfileService::set_role(&db.pool, &policy, &admin, listed, Role::Admin)
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert_eq!(ProfileService::list(&db.pool, &admin).await.unwrap().len(), 2);
    }
}
