use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use ember_gesture::SwipeConfig;

/// User id used when `EMBER_USER_ID` is not set.
pub const DEMO_USER_ID: Uuid = Uuid::from_u128(0x0e3b_ffff);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub user_id: Uuid,
    pub test_data: bool,
    pub swipe: SwipeConfig,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("EMBER_API_URL").filter(|v| !v.trim().is_empty());
        let api_token = lookup("EMBER_API_TOKEN").filter(|v| !v.trim().is_empty());
        let user_id = parse(&lookup, "EMBER_USER_ID")?.unwrap_or(DEMO_USER_ID);
        let test_data = match lookup("EMBER_TEST_DATA") {
            Some(v) => parse_flag("EMBER_TEST_DATA", &v)?,
            None => false,
        };

        let defaults = SwipeConfig::default();
        let swipe = SwipeConfig {
            threshold: parse(&lookup, "EMBER_SWIPE_THRESHOLD")?.unwrap_or(defaults.threshold),
            settle: parse(&lookup, "EMBER_SWIPE_SETTLE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle),
            scroll_step: parse(&lookup, "EMBER_SCROLL_STEP")?.unwrap_or(defaults.scroll_step),
        };
        let request_timeout = Duration::from_secs(
            parse(&lookup, "EMBER_REQUEST_TIMEOUT_SECS")?.unwrap_or(10),
        );

        Ok(Self {
            api_url,
            api_token,
            user_id,
            test_data,
            swipe,
            request_timeout,
        })
    }

    /// Test-data mode is forced when no backend URL is configured.
    pub fn use_test_data(&self) -> bool {
        self.test_data || self.api_url.is_none()
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}
