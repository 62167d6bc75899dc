use crate::error::WorkbenchError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub timeout: Duration,
    pub store_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout = match get("WORKBENCH_TIMEOUT_SECS").map(|v| v.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => secs,
            Some(_) => {
                log::warn!("Ignoring invalid WORKBENCH_TIMEOUT_SECS, using {DEFAULT_TIMEOUT_SECS}s");
                DEFAULT_TIMEOUT_SECS
            }
            None => DEFAULT_TIMEOUT_SECS,
        };

        let store_dir = get("WORKBENCH_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_store_dir);

        Self {
            api_key: get("GEMINI_API_KEY"),
            api_url: get("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_secs(timeout),
            store_dir,
        }
    }

    /// The key is only needed once a stage actually calls out.
    pub fn require_api_key(&self) -> Result<&str, WorkbenchError> {
        self.api_key.as_deref().ok_or_else(|| {
            WorkbenchError::Config(
                "Gemini API key is missing. Please set the GEMINI_API_KEY environment variable."
                    .into(),
            )
        })
    }
}

fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prompt-workbench")
}
