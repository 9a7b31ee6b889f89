use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    config::Config,
    session::SessionKeys,
    storage::{LocalObjectStore, ObjectStore},
};
use tracing::{info, warn};

/// Single-process deployment: SQLite file plus a storage directory on disk.
#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    storage: Arc<dyn ObjectStore>,
    session_keys: Arc<SessionKeys>,
}

impl LocalDeployment {
    pub fn with_parts(config: Config, db: DBService, storage: Arc<dyn ObjectStore>) -> Self {
        let session_keys = Arc::new(SessionKeys::new(&config.session_secret));
        Self {
            config: Arc::new(config),
            db,
            storage,
            session_keys,
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::from_env()?;

        tokio::fs::create_dir_all(&config.storage_dir).await?;
        let storage = Arc::new(LocalObjectStore::new(config.storage_dir.clone()));
        let db = DBService::new(&config.database_url).await?;

        info!(
            environment = %config.environment,
            storage_dir = %config.storage_dir.display(),
            admins = config.role_policy.admin_user_ids.len(),
            overrides = config.role_policy.role_overrides.len(),
            "deployment ready"
        );
        if config.role_policy.impersonation_enabled {
            warn!("role impersonation via test_role cookie is enabled");
        }

        Ok(Self::with_parts(config, db, storage))
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn storage(&self) -> &Arc<dyn ObjectStore> {
        &self.storage
    }

    fn session_keys(&self) -> &SessionKeys {
        &self.session_keys
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn parts_share_session_keys_with_config() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_lookup(|_| None).unwrap();
        let deployment = LocalDeployment::with_parts(
            config,
            DBService::new_in_memory().await.unwrap(),
            Arc::new(LocalObjectStore::new(dir.path())),
        );

        let user_id = uuid::Uuid::new_v4();
        let token = deployment
            .session_keys()
            .issue(user_id, None, None, chrono::Duration::minutes(5))
            .unwrap();
        assert_eq!(deployment.session_keys().verify(&token).unwrap().user_id, user_id);
        assert!(deployment.role_policy().admin_user_ids.is_empty());
    }
}
