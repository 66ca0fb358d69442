use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::amounts::AmountConvention;
use crate::assembler::SignPolicy;
use crate::dates::DateLocale;
use crate::engine::ErrorPolicy;
use crate::error::{ConfigError, Result, TxnormError};
use crate::names::NoisePatternDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub date_locale: DateLocale,
    pub error_policy: ErrorPolicy,
    /// JSON rule file evaluated before the built-in rules.
    pub rules_file: Option<String>,
    pub replace_default_rules: bool,
    pub sign_policy: SignPolicy,
    pub amount_convention: AmountConvention,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Appended after the built-in noise classes.
    pub extra_noise_patterns: Vec<NoisePatternDef>,
    pub brand_exceptions: Vec<String>,
}

fn default_workers() -> usize {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            date_locale: DateLocale::default(),
            error_policy: ErrorPolicy::default(),
            rules_file: None,
            replace_default_rules: false,
            sign_policy: SignPolicy::default(),
            amount_convention: AmountConvention::default(),
            workers: default_workers(),
            extra_noise_patterns: Vec::new(),
            brand_exceptions: Vec::new(),
        }
    }
}

impl Settings {
    pub fn worker_count(&self) -> std::result::Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.workers).ok_or(ConfigError::ZeroWorkers)
    }

    pub fn rules_path(&self) -> Option<PathBuf> {
        self.rules_file
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(expand_home(p)))
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("txnorm")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Load settings from `path`, or the default location. A missing file yields
/// defaults; a file that exists but does not parse is an error.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| TxnormError::Settings(format!("{}: {e}", path.display())))
}

/// Write settings as pretty JSON, creating the parent directory. Returns the path written.
pub fn save_settings(settings: &Settings, path: Option<&Path>) -> Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TxnormError::Settings(e.to_string()))?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(path)
}

pub fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}
