use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::isolation::DEFAULT_TENANT_COLUMN;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub isolation: IsolationConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationConfig {
    pub tenant_column: String,
    pub policy_file: Option<PathBuf>,
    pub warn_unknown_resources: bool,
    pub log_resolutions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_audit_logging: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Isolation overrides
        if let Ok(v) = env::var("ISOLATION_TENANT_COLUMN") {
            let v = v.trim();
            if !v.is_empty() {
                self.isolation.tenant_column = v.to_string();
            }
        }
        if let Ok(v) = env::var("ISOLATION_POLICY_FILE") {
            self.isolation.policy_file = if v.trim().is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Ok(v) = env::var("ISOLATION_WARN_UNKNOWN_RESOURCES") {
            self.isolation.warn_unknown_resources = v.parse().unwrap_or(self.isolation.warn_unknown_resources);
        }
        if let Ok(v) = env::var("ISOLATION_LOG_RESOLUTIONS") {
            self.isolation.log_resolutions = v.parse().unwrap_or(self.isolation.log_resolutions);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            isolation: IsolationConfig {
                tenant_column: DEFAULT_TENANT_COLUMN.to_string(),
                policy_file: None,
                warn_unknown_resources: true,
                log_resolutions: true,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                enable_query_logging: true,
            },
            security: SecurityConfig {
                enable_audit_logging: false,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            isolation: IsolationConfig {
                tenant_column: DEFAULT_TENANT_COLUMN.to_string(),
                policy_file: None,
                warn_unknown_resources: true,
                log_resolutions: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                enable_query_logging: true,
            },
            security: SecurityConfig {
                enable_audit_logging: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            isolation: IsolationConfig {
                tenant_column: DEFAULT_TENANT_COLUMN.to_string(),
                policy_file: None,
                warn_unknown_resources: false,
                log_resolutions: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                enable_query_logging: false,
            },
            security: SecurityConfig {
                enable_audit_logging: true,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.isolation.tenant_column, "tenant_id");
        assert!(config.isolation.log_resolutions);
        assert!(!config.security.enable_audit_logging);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.isolation.log_resolutions);
        assert!(!config.isolation.warn_unknown_resources);
        assert!(config.security.enable_audit_logging);
        assert_eq!(config.database.max_connections, 50);
    }
}
