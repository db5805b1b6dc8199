use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::config::schema::{OcrSettings, QueueSettings, Settings, MAX_RETRIES_LIMIT};
use crate::error::ConfigError;
use crate::secrets::resolve_secret_optional;

pub const ENV_API_URL: &str = "OCR_API_URL";
pub const ENV_API_KEY: &str = "OCR_API_KEY";
pub const ENV_API_KEY_FILE: &str = "OCR_API_KEY_FILE";
pub const ENV_FALLBACK_URL: &str = "OCR_FALLBACK_URL";
pub const ENV_DEV_MODE: &str = "OCR_DEV_MODE";
pub const ENV_USE_MOCK_DATA: &str = "OCR_USE_MOCK_DATA";
pub const ENV_MAX_RETRIES: &str = "OCR_MAX_RETRIES";
pub const ENV_TIMEOUT_SECS: &str = "OCR_TIMEOUT_SECS";
pub const ENV_WORKERS: &str = "OCR_WORKERS";
pub const ENV_STATUS_CAPACITY: &str = "OCR_STATUS_CAPACITY";
pub const ENV_STATUS_TTL_SECS: &str = "OCR_STATUS_TTL_SECS";
pub const ENV_BUFFER_TTL_SECS: &str = "OCR_BUFFER_TTL_SECS";

/// Loads settings from the process environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(|name| std::env::var(name).ok())
}

/// Loads settings through an arbitrary variable lookup.
pub fn load_settings_from<F>(lookup: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let primary_url = get(ENV_API_URL).ok_or(ConfigError::MissingVar { name: ENV_API_URL })?;
    validate_url(ENV_API_URL, &primary_url)?;

    let fallback_url = get(ENV_FALLBACK_URL);
    if let Some(ref url) = fallback_url {
        validate_url(ENV_FALLBACK_URL, url)?;
    }

    let api_key = resolve_secret_optional(
        get(ENV_API_KEY).as_deref(),
        get(ENV_API_KEY_FILE).as_deref(),
    )?;

    let mut ocr = OcrSettings::new(primary_url);
    ocr.fallback_url = fallback_url;
    ocr.api_key = api_key;
    if let Some(v) = get(ENV_MAX_RETRIES) {
        ocr.max_retries = parse_number(ENV_MAX_RETRIES, &v)?;
        if ocr.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::InvalidValue {
                name: ENV_MAX_RETRIES,
                value: v,
                reason: format!("retry budget must be at most {}", MAX_RETRIES_LIMIT),
            });
        }
    }
    if let Some(v) = get(ENV_TIMEOUT_SECS) {
        ocr.request_timeout = parse_secs(ENV_TIMEOUT_SECS, &v)?;
    }

    let mut queue = QueueSettings::default();
    if let Some(v) = get(ENV_WORKERS) {
        queue.worker_count = parse_number(ENV_WORKERS, &v)?;
        if queue.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                name: ENV_WORKERS,
                value: v,
                reason: "worker count must be at least 1".to_string(),
            });
        }
    }
    if let Some(v) = get(ENV_STATUS_CAPACITY) {
        queue.status_capacity = parse_number(ENV_STATUS_CAPACITY, &v)?;
    }
    if let Some(v) = get(ENV_STATUS_TTL_SECS) {
        queue.status_ttl = parse_secs(ENV_STATUS_TTL_SECS, &v)?;
    }
    if let Some(v) = get(ENV_BUFFER_TTL_SECS) {
        queue.buffer_ttl = parse_secs(ENV_BUFFER_TTL_SECS, &v)?;
    }

    let development = match get(ENV_DEV_MODE) {
        Some(v) => parse_flag(ENV_DEV_MODE, &v)?,
        None => false,
    };
    let use_mock_data = match get(ENV_USE_MOCK_DATA) {
        Some(v) => parse_flag(ENV_USE_MOCK_DATA, &v)?,
        None => false,
    };

    Ok(Settings {
        ocr,
        queue,
        development,
        use_mock_data,
    })
}

fn validate_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_secs(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_number(name, value)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "duration must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "expected a boolean (true/false)".to_string(),
        }),
    }
}
