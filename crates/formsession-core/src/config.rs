//! Form session configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FormSessionError, Result};
use crate::session::Mode;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Changes saved successfully";
pub const DEFAULT_VALIDATION_MESSAGE: &str = "Please correct the errors below";

/// Settings accepted by [`crate::session::FormSession`].
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// success_message = "Profile updated"
/// initial_mode = "editing"
/// auto_save_delay_ms = 1500
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FormSessionConfig {
    /// Message shown after a successful save.
    pub success_message: String,
    /// Top-level message shown when validation blocks a save.
    pub validation_message: String,
    /// Mode the session starts in.
    pub initial_mode: Mode,
    /// Debounce delay for auto-save. `None` disables auto-save.
    pub auto_save_delay_ms: Option<u64>,
}

impl Default for FormSessionConfig {
    fn default() -> Self {
        Self {
            success_message: DEFAULT_SUCCESS_MESSAGE.to_string(),
            validation_message: DEFAULT_VALIDATION_MESSAGE.to_string(),
            initial_mode: Mode::Viewing,
            auto_save_delay_ms: None,
        }
    }
}

impl FormSessionConfig {
    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }

    pub fn with_initial_mode(mut self, mode: Mode) -> Self {
        self.initial_mode = mode;
        self
    }

    pub fn with_auto_save(mut self, delay: Duration) -> Self {
        self.auto_save_delay_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn auto_save_delay(&self) -> Option<Duration> {
        self.auto_save_delay_ms.map(Duration::from_millis)
    }

    /// Rejects blank messages and a zero auto-save delay.
    pub fn validate(&self) -> Result<()> {
        if self.success_message.trim().is_empty() {
            return Err(FormSessionError::configuration(
                "success_message must not be empty",
            ));
        }
        if self.validation_message.trim().is_empty() {
            return Err(FormSessionError::configuration(
                "validation_message must not be empty",
            ));
        }
        if self.auto_save_delay_ms == Some(0) {
            return Err(FormSessionError::configuration(
                "auto_save_delay_ms must be greater than zero (omit it to disable auto-save)",
            ));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads a config file. A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                tracing::debug!("Loading form session config from {:?}", path);
                Self::from_toml_str(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Config file {:?} not found, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
