use appin_common::error::{AppinError, AppinResult};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Requests per second allowed for each client.
    pub rate_limit_per_second: u32,
    pub graph: GraphConfig,
    pub tuning: OverviewTuning,
}

/// Credentials and list coordinates for the Microsoft Graph record source.
#[derive(Clone, Deserialize)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_id: String,
    pub list_id: String,
    pub ca_final_list_id: String,
    pub base_url: String,
    pub login_url: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("site_id", &self.site_id)
            .field("list_id", &self.list_id)
            .field("ca_final_list_id", &self.ca_final_list_id)
            .field("base_url", &self.base_url)
            .field("login_url", &self.login_url)
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Knobs for the overview aggregation. Unset values fall back to the
/// engine defaults of the selected profile.
#[derive(Debug, Clone, Deserialize)]
pub struct OverviewTuning {
    pub profile: String,
    pub stale_after_minutes: i64,
    pub fast_within_minutes: Option<i64>,
    pub best_time_floor_secs: i64,
    pub product_aliases_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> AppinResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let rate_limit_per_second: u32 = parse_var_or("RATE_LIMIT_PER_SECOND", 30)?;
        if rate_limit_per_second == 0 {
            return Err(AppinError::Config(
                "RATE_LIMIT_PER_SECOND must be positive".to_string(),
            ));
        }

        Ok(Self {
            host: get_var_or("HOST", "0.0.0.0"),
            port: parse_var_or("PORT", 8890)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            rate_limit_per_second,
            graph: GraphConfig::from_env()?,
            tuning: OverviewTuning::from_env()?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl GraphConfig {
    pub fn from_env() -> AppinResult<Self> {
        Ok(Self {
            tenant_id: get_var("GRAPH_TENANT_ID")?,
            client_id: get_var("GRAPH_CLIENT_ID")?,
            client_secret: get_var("GRAPH_CLIENT_SECRET")?,
            site_id: get_var("GRAPH_SITE_ID")?,
            list_id: get_var("GRAPH_LIST_ID")?,
            ca_final_list_id: get_var("GRAPH_CA_FINAL_LIST_ID")?,
            base_url: get_var_or("GRAPH_BASE_URL", "https://graph.microsoft.com/v1.0"),
            login_url: get_var_or("GRAPH_LOGIN_URL", "https://login.microsoftonline.com"),
            max_retries: parse_var_or("GRAPH_MAX_RETRIES", 3)?,
            timeout_secs: parse_var_or("GRAPH_TIMEOUT_SECS", 30)?,
        })
    }
}

impl OverviewTuning {
    pub fn from_env() -> AppinResult<Self> {
        let stale_after_minutes: i64 = parse_var_or("STALE_AFTER_MINUTES", 300)?;
        if stale_after_minutes <= 0 {
            return Err(AppinError::Config(
                "STALE_AFTER_MINUTES must be positive".to_string(),
            ));
        }

        let fast_within_minutes = match optional_var("FAST_WITHIN_MINUTES") {
            Some(raw) => Some(parse_value::<i64>("FAST_WITHIN_MINUTES", &raw)?),
            None => None,
        };

        Ok(Self {
            profile: get_var_or("OVERVIEW_PROFILE", "standard"),
            stale_after_minutes,
            fast_within_minutes,
            best_time_floor_secs: parse_var_or("BEST_TIME_FLOOR_SECS", 60)?,
            product_aliases_path: optional_var("PRODUCT_ALIASES_PATH"),
        })
    }
}

/// Blank values count as unset.
fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_var(key: &str) -> AppinResult<String> {
    optional_var(key).ok_or_else(|| AppinError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    optional_var(key).unwrap_or_else(|| default.to_owned())
}

fn parse_var_or<T>(key: &str, default: T) -> AppinResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional_var(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> AppinResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppinError::Config(format!("invalid {key}: {e}")))
}
