use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};

const DEFAULT_NUTRITION_API_URL: &str = "https://interview.workcentrix.de/ingredients.php";

/// Where recipes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("unknown RECIPE_STORE {other:?}, expected postgres or memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NutritionApiConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    /// Serve the offline dataset without contacting the upstream.
    pub mock_mode: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nutrition: NutritionApiConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store = match get("RECIPE_STORE") {
            Some(v) => v.parse()?,
            None => StoreBackend::Postgres,
        };
        let database_url = get("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if store == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL is required when RECIPE_STORE=postgres");
        }

        let nutrition = NutritionApiConfig {
            url: get("NUTRITION_API_URL").unwrap_or_else(|| DEFAULT_NUTRITION_API_URL.into()),
            username: get("NUTRITION_API_USERNAME").unwrap_or_else(|| "name".into()),
            password: get("NUTRITION_API_PASSWORD").unwrap_or_else(|| "password".into()),
            timeout: Duration::from_secs(parsed(&get, "NUTRITION_API_TIMEOUT_SECS", 10)?),
            mock_mode: get("NUTRITION_API_MOCK_MODE").is_some_and(|v| truthy(&v)),
        };

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&get, "APP_PORT", 8080)?,
            store,
            database_url,
            database_max_connections: parsed(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            nutrition,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(v) => v.trim().parse().with_context(|| format!("{key} has invalid value {v:?}")),
        None => Ok(default),
    }
}

fn truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/recipes")]).unwrap();
        assert_eq!(cfg.store, StoreBackend::Postgres);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.database_max_connections, 10);
        assert_eq!(cfg.nutrition.url, DEFAULT_NUTRITION_API_URL);
        assert_eq!(cfg.nutrition.username, "name");
        assert_eq!(cfg.nutrition.timeout, Duration::from_secs(10));
        assert!(!cfg.nutrition.mock_mode);
    }

    #[test]
    fn postgres_needs_a_database_url() {
        assert!(config(&[]).is_err());
        let cfg = config(&[("RECIPE_STORE", "Memory")]).unwrap();
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("RECIPE_STORE", "memory"),
            ("APP_PORT", "3000"),
            ("NUTRITION_API_TIMEOUT_SECS", "3"),
            ("NUTRITION_API_MOCK_MODE", "TRUE"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.nutrition.timeout, Duration::from_secs(3));
        assert!(cfg.nutrition.mock_mode);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(config(&[("RECIPE_STORE", "sqlite")]).is_err());
        let err = config(&[("RECIPE_STORE", "memory"), ("APP_PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }
}
