use std::time::Duration;

use secrecy::SecretString;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Largest retry budget the loader accepts.
pub const MAX_RETRIES_LIMIT: u32 = 100;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_WORKER_COUNT: usize = 3;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_HEARTBEAT_STEP: u8 = 5;
pub const DEFAULT_STATUS_CAPACITY: u64 = 10_000;
pub const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_BUFFER_TTL: Duration = Duration::from_secs(60 * 60);

/// Process-wide settings, read once at startup and passed into the engine.
#[derive(Debug)]
pub struct Settings {
    pub ocr: OcrSettings,
    pub queue: QueueSettings,
    /// Development mode. Permits synthetic data when every endpoint fails.
    pub development: bool,
    /// Explicit opt-in to synthetic data outside development mode.
    pub use_mock_data: bool,
}

impl Settings {
    /// Settings for a single primary endpoint with every other value defaulted.
    pub fn new(primary_url: impl Into<String>) -> Self {
        Self {
            ocr: OcrSettings::new(primary_url),
            queue: QueueSettings::default(),
            development: false,
            use_mock_data: false,
        }
    }

    /// Whether a total upstream failure may be masked with synthetic data.
    pub fn allows_synthetic_data(&self) -> bool {
        self.development || self.use_mock_data
    }
}

#[derive(Debug)]
pub struct OcrSettings {
    pub primary_url: String,
    pub fallback_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl OcrSettings {
    pub fn new(primary_url: impl Into<String>) -> Self {
        Self {
            primary_url: primary_url.into(),
            fallback_url: None,
            api_key: None,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// The fallback endpoint, if one is configured and differs from the primary.
    pub fn distinct_fallback(&self) -> Option<&str> {
        self.fallback_url
            .as_deref()
            .filter(|fallback| fallback.trim_end_matches('/') != self.primary_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub worker_count: usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_step: u8,
    pub status_capacity: u64,
    pub status_ttl: Duration,
    pub buffer_ttl: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_step: DEFAULT_HEARTBEAT_STEP,
            status_capacity: DEFAULT_STATUS_CAPACITY,
            status_ttl: DEFAULT_STATUS_TTL,
            buffer_ttl: DEFAULT_BUFFER_TTL,
        }
    }
}
