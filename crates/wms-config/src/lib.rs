//! Typed process configuration loaded from the environment.
//!
//! `.env.local` is loaded first as a dev convenience; production is
//! expected to inject real environment variables and never ship that
//! file.

use anyhow::{Context, Result};
use wms_core::generation::GenerationDefaults;

#[derive(Debug, Clone)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DbSettings {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone)]
pub struct PubSubSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl PubSubSettings {
    pub fn url(&self) -> String {
        match &self.password {
            Some(p) if !p.is_empty() => format!("redis://:{}@{}:{}", p, self.host, self.port),
            _ => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: Option<String>,
    pub jwt_lifetime_seconds: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone)]
pub struct AssignmentSettings {
    pub interval_seconds: u64,
    pub batch_size: i64,
}

#[derive(Debug, Clone)]
pub struct MetricsSettings {
    pub run_hour: u32,
    pub run_minute: u32,
    pub run_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub db: DbSettings,
    pub pubsub: PubSubSettings,
    pub auth: AuthSettings,
    pub generation: GenerationDefaults,
    pub assignment: AssignmentSettings,
    pub metrics: MetricsSettings,
    pub bind_addr: String,
}

impl Settings {
    /// Loads `.env.local` if present (silently skipped otherwise), then
    /// reads every documented variable, applying the documented
    /// defaults.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");

        Ok(Self {
            db: DbSettings {
                host: env_or("WMS_DB_HOST", "localhost"),
                port: env_parse_or("WMS_DB_PORT", 5432)?,
                name: env_or("WMS_DB_NAME", "wms"),
                user: env_or("WMS_DB_USER", "wms"),
                password: env_or("WMS_DB_PASSWORD", ""),
            },
            pubsub: PubSubSettings {
                host: env_or("WMS_PUBSUB_HOST", "localhost"),
                port: env_parse_or("WMS_PUBSUB_PORT", 6379)?,
                password: std::env::var("WMS_PUBSUB_PASSWORD").ok(),
            },
            auth: AuthSettings {
                jwt_secret: std::env::var("WMS_JWT_SECRET").ok().filter(|s| !s.is_empty()),
                jwt_lifetime_seconds: env_parse_or("WMS_JWT_LIFETIME_SECONDS", 8 * 3600)?,
                bcrypt_cost: env_parse_or("WMS_BCRYPT_COST", 12)?,
            },
            generation: GenerationDefaults {
                pick_base_seconds: env_parse_or("WMS_GEN_PICK_BASE_SECONDS", 90)?,
                pick_per_unit_seconds: env_parse_or("WMS_GEN_PICK_PER_UNIT_SECONDS", 12)?,
                putaway_base_seconds: env_parse_or("WMS_GEN_PUTAWAY_BASE_SECONDS", 75)?,
                putaway_per_unit_seconds: env_parse_or("WMS_GEN_PUTAWAY_PER_UNIT_SECONDS", 10)?,
                putaway_priority: env_parse_or("WMS_GEN_PUTAWAY_PRIORITY", 60)?,
            },
            assignment: AssignmentSettings {
                interval_seconds: env_parse_or("WMS_ASSIGNMENT_INTERVAL_SECONDS", 10)?,
                batch_size: env_parse_or("WMS_ASSIGNMENT_BATCH_SIZE", 200)?,
            },
            metrics: MetricsSettings {
                run_hour: env_parse_or("WMS_METRICS_RUN_HOUR", 23)?,
                run_minute: env_parse_or("WMS_METRICS_RUN_MINUTE", 59)?,
                run_on_startup: env_parse_or("WMS_METRICS_RUN_ON_STARTUP", false)?,
            },
            bind_addr: env_or("WMS_DAEMON_ADDR", "127.0.0.1:8080"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_url_composes_postgres_dsn() {
        let db = DbSettings {
            host: "db".to_string(),
            port: 5432,
            name: "wms".to_string(),
            user: "u".to_string(),
            password: "p".to_string(),
        };
        assert_eq!(db.url(), "postgres://u:p@db:5432/wms");
    }

    #[test]
    fn pubsub_url_omits_password_when_absent() {
        let ps = PubSubSettings {
            host: "cache".to_string(),
            port: 6379,
            password: None,
        };
        assert_eq!(ps.url(), "redis://cache:6379");
    }

    #[test]
    fn pubsub_url_includes_password_when_present() {
        let ps = PubSubSettings {
            host: "cache".to_string(),
            port: 6379,
            password: Some("secret".to_string()),
        };
        assert_eq!(ps.url(), "redis://:secret@cache:6379");
    }
}
