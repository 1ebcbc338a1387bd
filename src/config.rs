use std::env;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Fetching
    pub fetch_timeout_ms: u64,
    pub max_retries: u32,
    pub user_agent: String,

    // EPG
    pub epg_retention_days: u32,
    pub epg_fetch_concurrency: usize,
    pub epg_fetch_pause_ms: u64,

    // Optional JSON file overriding the classifier keyword/pattern sets
    pub classifier_rules_path: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            fetch_timeout_ms: env_parse("FETCH_TIMEOUT_MS", 30_000),
            max_retries: env_parse("MAX_RETRIES", 3),

            // VLC user agent avoids IPTV server blocks
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "VLC/3.0.20 LibVLC/3.0.20".to_string()),

            epg_retention_days: env_parse("EPG_RETENTION_DAYS", 7),
            epg_fetch_concurrency: env_parse("EPG_FETCH_CONCURRENCY", 5),
            epg_fetch_pause_ms: env_parse("EPG_FETCH_PAUSE_MS", 250),

            classifier_rules_path: env::var("CLASSIFIER_RULES_PATH").ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
