use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use services::services::{
    config::{Config, ConfigError},
    roles::RolePolicy,
    session::SessionKeys,
    storage::ObjectStore,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a request handler needs from the running process.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn storage(&self) -> &Arc<dyn ObjectStore>;

    fn session_keys(&self) -> &SessionKeys;

    fn role_policy(&self) -> &RolePolicy {
        &self.config().role_policy
    }
}
