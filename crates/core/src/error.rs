#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Could not build HTTP client: {0}")]
    Client(String),

    #[error("Detail page has no JSON-LD block")]
    MissingJsonLd,

    #[error("Malformed JSON-LD block: {0}")]
    MalformedJsonLd(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid publication date: {0:?}")]
    InvalidDate(String),
}

impl LookupError {
    /// True for failures of the network fetch itself, as opposed to parsing.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LookupError::Network { .. } | LookupError::Timeout { .. } | LookupError::Status { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cover cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cover cache file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
