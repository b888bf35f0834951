use std::path::PathBuf;

use pricewatch_core::AppError;

pub const DEFAULT_STATE_DIR: &str = ".pricewatch";

/// Where the file-backed stores keep their state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub state_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// Read configuration from environment variables.
    ///
    /// - `PRICEWATCH_STATE_DIR` (optional, defaults to `./.pricewatch`)
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var("PRICEWATCH_STATE_DIR") {
            Err(_) => Ok(Self::new(DEFAULT_STATE_DIR)),
            Ok(raw) if raw.trim().is_empty() => Err(AppError::ConfigError(
                "PRICEWATCH_STATE_DIR is set but empty".into(),
            )),
            Ok(raw) => Ok(Self::new(raw)),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_DIR)
    }
}
