//! Process configuration read from the environment.

use std::{
    collections::{HashMap, HashSet},
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use db::models::profile::Role;
use secrecy::SecretString;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

use super::roles::RolePolicy;

const DEFAULT_DATABASE_URL: &str = "sqlite://agency.db";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_STORAGE_DIR: &str = "storage";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("impersonation cannot be enabled in production")]
    ImpersonationInProduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Default)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub session_secret: SecretString,
    pub storage_dir: PathBuf,
    pub role_policy: RolePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment = match get("APP_ENV") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "APP_ENV",
                reason: format!("expected development or production, got {value}"),
            })?,
            None => Environment::default(),
        };

        let host = get("HOST")
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
            .trim()
            .parse()
            .map_err(|e| ConfigError::Invalid {
                key: "HOST",
                reason: format!("{e}"),
            })?;

        let port = match get("PORT") {
            Some(value) => value.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: format!("{e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let session_secret = match get("SESSION_JWT_SECRET") {
            Some(secret) => SecretString::from(secret),
            None if environment == Environment::Development => {
                SecretString::from("development-only-session-secret".to_string())
            }
            None => return Err(ConfigError::Missing("SESSION_JWT_SECRET")),
        };

        let admin_user_ids = match get("ADMIN_USER_IDS") {
            Some(value) => parse_uuid_list(&value)?,
            None => HashSet::new(),
        };

        let role_overrides = match get("ROLE_OVERRIDES") {
            Some(value) => parse_role_overrides(&value)?,
            None => HashMap::new(),
        };

        let impersonation_enabled = match get("IMPERSONATION_ENABLED") {
            Some(value) => parse_bool("IMPERSONATION_ENABLED", &value)?,
            None => false,
        };
        if impersonation_enabled && environment == Environment::Production {
            return Err(ConfigError::ImpersonationInProduction);
        }

        Ok(Self {
            environment,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            host,
            port,
            session_secret,
            storage_dir: get("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
            role_policy: RolePolicy {
                admin_user_ids,
                role_overrides,
                impersonation_enabled,
            },
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {other}"),
        }),
    }
}

fn parse_uuid_list(value: &str) -> Result<HashSet<Uuid>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            Uuid::parse_str(item).map_err(|e| ConfigError::Invalid {
                key: "ADMIN_USER_IDS",
                reason: format!("{item}: {e}"),
            })
        })
        .collect()
}

/// `uuid=role` pairs separated by commas.
fn parse_role_overrides(value: &str) -> Result<HashMap<Uuid, Role>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "ROLE_OVERRIDES",
        reason,
    };

    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (id, role) = item
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected uuid=role, got {item}")))?;
            let id = Uuid::parse_str(id.trim()).map_err(|e| invalid(format!("{id}: {e}")))?;
            let role = role
                .trim()
                .parse::<Role>()
                .map_err(|_| invalid(format!("unknown role {role}")))?;
            Ok((id, role))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_development() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.session_secret.expose_secret().is_empty());
        assert!(config.role_policy.admin_user_ids.is_empty());
        assert!(!config.role_policy.impersonation_enabled);
    }

    #[test]
    fn production_requires_a_session_secret() {
        let err = Config::from_lookup(lookup(&[("APP_ENV", "production")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SESSION_JWT_SECRET")));
    }

    #[test]
    fn impersonation_is_refused_in_production() {
        let err = Config::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("SESSION_JWT_SECRET", "s3cret"),
            ("IMPERSONATION_ENABLED", "true"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::ImpersonationInProduction));
    }

    #[test]
    fn parses_role_policy() {
        let admin = Uuid::new_v4();
        let managed = Uuid::new_v4();
        let admins = format!(" {admin} ,");
        let overrides = format!("{managed}=manager");
        let config = Config::from_lookup(lookup(&[
            ("ADMIN_USER_IDS", admins.as_str()),
            ("ROLE_OVERRIDES", overrides.as_str()),
            ("IMPERSONATION_ENABLED", "yes"),
        ]))
        .unwrap();

        assert!(config.role_policy.admin_user_ids.contains(&admin));
        assert_eq!(
            config.role_policy.role_overrides.get(&managed),
            Some(&Role::Manager)
        );
        assert!(config.role_policy.impersonation_enabled);
    }

    #[test]
    fn rejects_malformed_overrides() {
        let err = Config::from_lookup(lookup(&[("ROLE_OVERRIDES", "not-a-pair")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "ROLE_OVERRIDES",
                ..
            }
        ));
    }
}
