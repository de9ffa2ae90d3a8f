use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres,
    InMemory,
}

impl DatabaseBackend {
    fn from_env(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "in-memory" | "inmemory" => Ok(Self::InMemory),
            _ => Err(anyhow::anyhow!(
                "DATABASE_BACKEND must be one of: postgres, memory"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_backend: DatabaseBackend,
    /// Always set for the postgres backend.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub api_key: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let database_backend = DatabaseBackend::from_env(
            &env::var("DATABASE_BACKEND").unwrap_or_else(|_| "postgres".to_string()),
        )?;

        let database_url = match database_backend {
            DatabaseBackend::Postgres => Some(database_url_from_env()?),
            DatabaseBackend::InMemory => env::var("DATABASE_URL").ok(),
        };

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid u32")?;

        let api_key = env::var("API_KEY").context("API_KEY must be set")?;
        if api_key.trim().is_empty() {
            anyhow::bail!("API_KEY must not be blank");
        }

        Ok(Self {
            host,
            port,
            database_backend,
            database_url,
            db_max_connections,
            api_key,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads `DATABASE_URL`, which has no default: a missing connection string is
/// a startup failure.
pub fn database_url_from_env() -> Result<String> {
    dotenvy::dotenv().ok();
    env::var("DATABASE_URL").context("DATABASE_URL must be set for the postgres backend")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_are_case_insensitive() {
        assert_eq!(
            DatabaseBackend::from_env("PostgreSQL").unwrap(),
            DatabaseBackend::Postgres
        );
        assert_eq!(
            DatabaseBackend::from_env("memory").unwrap(),
            DatabaseBackend::InMemory
        );
        assert!(DatabaseBackend::from_env("mysql").is_err());
    }
}
