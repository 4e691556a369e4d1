#![cfg(feature = "web")]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SheetError;
use crate::sheets::{GoogleSheets, MemorySheets, SpreadsheetService};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_USER_TAB: &str = "info";
const DEFAULT_SESSION_HOURS: u64 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Google { access_token: String },
    Memory,
}

/// Runtime settings, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub static_dir: String,
    /// Spreadsheet holding the user accounts
    pub user_sheet_id: String,
    pub user_tab: String,
    /// Spreadsheet the dashboard opens when none is given
    pub data_sheet_id: Option<String>,
    pub backend: Backend,
    pub session_duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            static_dir: "public".to_string(),
            user_sheet_id: "users".to_string(),
            user_tab: DEFAULT_USER_TAB.to_string(),
            data_sheet_id: None,
            backend: Backend::Memory,
            session_duration: Duration::from_secs(DEFAULT_SESSION_HOURS * 60 * 60),
        }
    }
}

impl Config {
    /// Load settings, reading `.env` first when one exists
    pub fn from_env() -> Result<Self, SheetError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SheetError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let backend = match get("FPM_BACKEND").as_deref().unwrap_or("google") {
            "memory" => Backend::Memory,
            "google" => Backend::Google {
                access_token: get("GOOGLE_ACCESS_TOKEN").ok_or_else(|| {
                    SheetError::Config("GOOGLE_ACCESS_TOKEN is required for the google backend".to_string())
                })?,
            },
            other => return Err(SheetError::Config(format!("unknown FPM_BACKEND '{}'", other))),
        };

        let user_sheet_id = match (&backend, get("FPM_USER_SHEET_ID")) {
            (_, Some(id)) => id,
            (Backend::Memory, None) => defaults.user_sheet_id,
            (Backend::Google { .. }, None) => {
                return Err(SheetError::Config("FPM_USER_SHEET_ID is not set".to_string()));
            }
        };

        let session_hours = match get("FPM_SESSION_HOURS") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| SheetError::Config(format!("FPM_SESSION_HOURS is not a number: {}", v)))?,
            None => DEFAULT_SESSION_HOURS,
        };

        Ok(Config {
            bind: get("FPM_BIND").unwrap_or(defaults.bind),
            static_dir: get("FPM_STATIC_DIR").unwrap_or(defaults.static_dir),
            user_sheet_id,
            user_tab: get("FPM_USER_TAB").unwrap_or(defaults.user_tab),
            data_sheet_id: get("FPM_DATA_SHEET_ID"),
            backend,
            session_duration: Duration::from_secs(session_hours * 60 * 60),
        })
    }

    pub fn build_service(&self) -> Arc<dyn SpreadsheetService> {
        match &self.backend {
            Backend::Google { access_token } => Arc::new(GoogleSheets::new(access_token.clone())),
            Backend::Memory => Arc::new(MemorySheets::new()),
        }
    }
}
