use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Result, anyhow, bail};
use tracing::{info, warn};

use tandem_db::PageSizePolicy;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub page_size: PageSizePolicy,
    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("TANDEM_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TANDEM_JWT_SECRET is unset or still a placeholder");
        }

        let ttl_hours: i64 = try_load("TANDEM_TOKEN_TTL_HOURS", "336")?;
        let default_page: u32 = try_load("TANDEM_PAGE_SIZE_DEFAULT", "10")?;
        let max_page: u32 = try_load("TANDEM_PAGE_SIZE_MAX", "99")?;
        if default_page == 0 || max_page < default_page {
            bail!("page size bounds out of order: default {default_page}, max {max_page}");
        }

        Ok(Self {
            host: try_load("TANDEM_HOST", "0.0.0.0")?,
            port: try_load("TANDEM_PORT", "4545")?,
            db_path: try_load::<String>("TANDEM_DB_PATH", "tandem.db")?.into(),
            jwt_secret,
            token_ttl: chrono::Duration::hours(ttl_hours),
            page_size: PageSizePolicy {
                default: default_page,
                max: max_page,
            },
            api_prefix: try_load("TANDEM_API_PREFIX", "/api")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("invalid {key} value {raw:?}: {e}")
    })
}
