use crate::error::{config_error, env_error, AppResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default creator written into generated calendars
pub const DEFAULT_CREATOR: &str = "elphi-calendar";
/// Default suggested calendar name
pub const DEFAULT_CALENDAR_NAME: &str = "Elbphilharmonie Merkliste";
/// Default address the server listens on
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
/// Favorites service base URL
pub const DEFAULT_FAVORITES_BASE_URL: &str = "https://merkliste.elbphilharmonie.de/api/";
/// Event detail service base URL
pub const DEFAULT_EVENTS_BASE_URL: &str = "https://www.elbphilharmonie.de/de/api/booking/evis/";
/// Cached sub-resources expire after one day
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
/// The event API locks up with too many parallel requests
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;
/// Overall deadline for building one calendar
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Time zone used for upstream timestamps without an offset
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";
/// Location of the optional configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config/elphi-calendar.toml";

/// Main configuration structure for the calendar server
#[derive(Debug, Clone)]
pub struct Config {
    /// Creator (PRODID) of generated calendars
    pub creator: String,
    /// Suggested calendar name
    pub calendar_name: String,
    /// Address the HTTP server binds to
    pub bind_address: SocketAddr,
    /// Base URL of the favorites service
    pub favorites_base_url: String,
    /// Base URL of the event detail service
    pub events_base_url: String,
    /// Time-to-live of cached event details and feeds
    pub cache_ttl: Duration,
    /// Maximum number of events fetched in parallel for one request
    pub fetch_concurrency: usize,
    /// Deadline for building one calendar
    pub request_timeout: Duration,
    /// Time zone for naive timestamps
    pub timezone: Tz,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            creator: DEFAULT_CREATOR.to_string(),
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            favorites_base_url: DEFAULT_FAVORITES_BASE_URL.to_string(),
            events_base_url: DEFAULT_EVENTS_BASE_URL.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            timezone: chrono_tz::Europe::Berlin,
        }
    }
}

/// Values that may be provided by the configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    creator: Option<String>,
    calendar_name: Option<String>,
    bind_address: Option<String>,
    favorites_base_url: Option<String>,
    events_base_url: Option<String>,
    cache_ttl_secs: Option<u64>,
    fetch_concurrency: Option<usize>,
    request_timeout_secs: Option<u64>,
    timezone: Option<String>,
}

impl Config {
    /// Load configuration from the config file and environment
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let path = env::var("ELPHI_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let file = if Path::new(&path).exists() {
            toml::from_str::<FileConfig>(&fs::read_to_string(&path)?)?
        } else {
            FileConfig::default()
        };

        Self::from_sources(file, |key| env::var(key).ok())
    }

    /// Build a configuration from file values, overridden by `lookup`
    fn from_sources(file: FileConfig, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let value = |key: &str, from_file: Option<String>, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .or(from_file)
                .unwrap_or_else(|| default.to_string())
        };

        let creator = value("ICS_CREATOR", file.creator, DEFAULT_CREATOR);
        let calendar_name = value("CALENDAR_NAME", file.calendar_name, DEFAULT_CALENDAR_NAME);

        let bind_address = value("BIND_ADDRESS", file.bind_address, DEFAULT_BIND_ADDRESS);
        let bind_address = bind_address
            .parse::<SocketAddr>()
            .map_err(|e| env_error("BIND_ADDRESS", &e.to_string()))?;

        let favorites_base_url = value(
            "FAVORITES_BASE_URL",
            file.favorites_base_url,
            DEFAULT_FAVORITES_BASE_URL,
        );
        let events_base_url = value("EVENTS_BASE_URL", file.events_base_url, DEFAULT_EVENTS_BASE_URL);
        for (key, url) in [
            ("FAVORITES_BASE_URL", &favorites_base_url),
            ("EVENTS_BASE_URL", &events_base_url),
        ] {
            url::Url::parse(url).map_err(|e| env_error(key, &e.to_string()))?;
        }

        let cache_ttl_secs = parse_number(
            "CACHE_TTL_SECS",
            lookup("CACHE_TTL_SECS"),
            file.cache_ttl_secs,
            DEFAULT_CACHE_TTL_SECS,
        )?;
        let fetch_concurrency = parse_number(
            "FETCH_CONCURRENCY",
            lookup("FETCH_CONCURRENCY"),
            file.fetch_concurrency,
            DEFAULT_FETCH_CONCURRENCY,
        )?;
        if fetch_concurrency == 0 {
            return Err(config_error("FETCH_CONCURRENCY must be at least 1"));
        }
        let request_timeout_secs = parse_number(
            "REQUEST_TIMEOUT_SECS",
            lookup("REQUEST_TIMEOUT_SECS"),
            file.request_timeout_secs,
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        let timezone = value("TIMEZONE", file.timezone, DEFAULT_TIMEZONE);
        let timezone = timezone
            .parse::<Tz>()
            .map_err(|e| env_error("TIMEZONE", &e.to_string()))?;

        Ok(Config {
            creator,
            calendar_name,
            bind_address,
            favorites_base_url,
            events_base_url,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            fetch_concurrency,
            request_timeout: Duration::from_secs(request_timeout_secs),
            timezone,
        })
    }
}

/// Parse a numeric setting, preferring the environment over the file
fn parse_number<T: std::str::FromStr + Copy>(
    key: &str,
    from_env: Option<String>,
    from_file: Option<T>,
    default: T,
) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    match from_env.filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| env_error(key, &e.to_string())),
        None => Ok(from_file.unwrap_or(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)], file: FileConfig) -> AppResult<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources(file, |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load_with(&[], FileConfig::default()).unwrap();
        assert_eq!(config.creator, "elphi-calendar");
        assert_eq!(config.calendar_name, "Elbphilharmonie Merkliste");
        assert_eq!(config.cache_ttl, Duration::from_secs(86400));
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.bind_address.port(), 8080);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            creator = "from-file"
            calendar_name = "File Calendar"
            fetch_concurrency = 2
            "#,
        )
        .unwrap();
        let config = load_with(&[("ICS_CREATOR", "from-env")], file).unwrap();
        assert_eq!(config.creator, "from-env");
        assert_eq!(config.calendar_name, "File Calendar");
        assert_eq!(config.fetch_concurrency, 2);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(load_with(&[("CACHE_TTL_SECS", "soon")], FileConfig::default()).is_err());
        assert!(load_with(&[("TIMEZONE", "Mars/Olympus")], FileConfig::default()).is_err());
        assert!(load_with(&[("FETCH_CONCURRENCY", "0")], FileConfig::default()).is_err());
        assert!(load_with(&[("EVENTS_BASE_URL", "not a url")], FileConfig::default()).is_err());
    }
}
