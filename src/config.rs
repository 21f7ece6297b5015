//! Configuration management
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Validation happens in phases: serde rejects malformed values at parse
//! time, `validate()` enforces semantic bounds before a config is handed
//! to the routing stack.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub fallback: FallbackSettings,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Fallback manager tuning
///
/// Fields are private to prevent post-validation mutation; use the typed
/// accessors. `probe_timeout_seconds` is deliberately required (no serde
/// default): one unresponsive provider must never be able to stall an
/// entire fallback sequence, so the bound has to be an explicit operator
/// decision.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackSettings {
    /// Maximum number of chain candidates examined per execute_fallback call
    #[serde(default = "default_max_attempts")]
    max_attempts: usize,
    /// Minimum spacing between real recovery-monitoring sweeps
    #[serde(default = "default_recovery_check_interval")]
    recovery_check_interval_seconds: u64,
    /// How long a provider must have been failing before recovery probing
    /// starts touching it
    #[serde(default = "default_recovery_threshold")]
    recovery_threshold_minutes: u64,
    /// Per-candidate evaluation timeout (required, no default)
    probe_timeout_seconds: u64,
}

fn default_max_attempts() -> usize {
    5
}

fn default_recovery_check_interval() -> u64 {
    300
}

fn default_recovery_threshold() -> u64 {
    10
}

impl FallbackSettings {
    /// Create settings with the given per-candidate probe timeout and
    /// defaults for everything else
    ///
    /// # Errors
    /// Returns an error if the timeout is outside (0, 300] seconds.
    pub fn new(probe_timeout: Duration) -> crate::error::RouteResult<Self> {
        let settings = Self {
            max_attempts: default_max_attempts(),
            recovery_check_interval_seconds: default_recovery_check_interval(),
            recovery_threshold_minutes: default_recovery_threshold(),
            probe_timeout_seconds: probe_timeout.as_secs(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Override the attempt budget
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the recovery sweep spacing
    pub fn with_recovery_check_interval(mut self, interval: Duration) -> Self {
        self.recovery_check_interval_seconds = interval.as_secs();
        self
    }

    /// Override the recovery probing threshold
    pub fn with_recovery_threshold(mut self, threshold: Duration) -> Self {
        self.recovery_threshold_minutes = threshold.as_secs() / 60;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn recovery_check_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_check_interval_seconds)
    }

    pub fn recovery_threshold(&self) -> Duration {
        Duration::from_secs(self.recovery_threshold_minutes * 60)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Validate semantic bounds
    pub fn validate(&self) -> crate::error::RouteResult<()> {
        if self.max_attempts == 0 {
            return Err(crate::error::RouteError::Config(
                "fallback.max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.max_attempts > 100 {
            return Err(crate::error::RouteError::Config(format!(
                "fallback.max_attempts cannot exceed 100, got {}. \
                A chain longer than this indicates a misconfigured registry.",
                self.max_attempts
            )));
        }

        if self.probe_timeout_seconds == 0 {
            return Err(crate::error::RouteError::Config(
                "fallback.probe_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.probe_timeout_seconds > 300 {
            return Err(crate::error::RouteError::Config(format!(
                "fallback.probe_timeout_seconds cannot exceed 300 seconds (5 minutes), got {}. \
                This limit prevents a hung provider from stalling fallback indefinitely.",
                self.probe_timeout_seconds
            )));
        }

        if self.recovery_check_interval_seconds > 3600 {
            return Err(crate::error::RouteError::Config(format!(
                "fallback.recovery_check_interval_seconds cannot exceed 3600 (1 hour), got {}",
                self.recovery_check_interval_seconds
            )));
        }

        if self.recovery_threshold_minutes > 1440 {
            return Err(crate::error::RouteError::Config(format!(
                "fallback.recovery_threshold_minutes cannot exceed 1440 (24 hours), got {}",
                self.recovery_threshold_minutes
            )));
        }

        Ok(())
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::RouteResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            crate::error::RouteError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| {
            crate::error::RouteError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config.validate().map_err(|e| {
            crate::error::RouteError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            }
        })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> crate::error::RouteResult<()> {
        self.fallback.validate()
    }
}

impl FromStr for Config {
    type Err = crate::error::RouteError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| {
            crate::error::RouteError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            }
        })?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: &str = r#"
[fallback]
max_attempts = 5
recovery_check_interval_seconds = 300
recovery_threshold_minutes = 10
probe_timeout_seconds = 5

[observability]
log_level = "info"
"#;

    #[test]
    fn test_config_from_str_parses_successfully() {
        let config = Config::from_str(TEST_CONFIG).expect("should parse config");
        assert_eq!(config.fallback.max_attempts(), 5);
        assert_eq!(
            config.fallback.recovery_check_interval(),
            Duration::from_secs(300)
        );
        assert_eq!(
            config.fallback.recovery_threshold(),
            Duration::from_secs(600)
        );
        assert_eq!(config.fallback.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_config_defaults_apply_when_fields_omitted() {
        let minimal = r#"
[fallback]
probe_timeout_seconds = 10
"#;
        let config = Config::from_str(minimal).expect("should parse minimal config");
        assert_eq!(config.fallback.max_attempts(), 5);
        assert_eq!(
            config.fallback.recovery_check_interval(),
            Duration::from_secs(300)
        );
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_probe_timeout_is_required() {
        let missing = r#"
[fallback]
max_attempts = 3
"#;
        let result = Config::from_str(missing);
        assert!(result.is_err(), "probe_timeout_seconds must be required");
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("probe_timeout_seconds"));
    }

    #[test]
    fn test_zero_probe_timeout_fails_validation() {
        let zero = r#"
[fallback]
probe_timeout_seconds = 0
"#;
        let result = Config::from_str(zero);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("probe_timeout_seconds must be greater than 0")
        );
    }

    #[test]
    fn test_excessive_probe_timeout_fails_validation() {
        let excessive = r#"
[fallback]
probe_timeout_seconds = 301
"#;
        let result = Config::from_str(excessive);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("300"));
    }

    #[test]
    fn test_zero_max_attempts_fails_validation() {
        let zero = r#"
[fallback]
max_attempts = 0
probe_timeout_seconds = 5
"#;
        let result = Config::from_str(zero);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("max_attempts must be greater than 0")
        );
    }

    #[test]
    fn test_settings_constructor_validates() {
        assert!(FallbackSettings::new(Duration::from_secs(5)).is_ok());
        assert!(FallbackSettings::new(Duration::from_secs(0)).is_err());
        assert!(FallbackSettings::new(Duration::from_secs(301)).is_err());
    }

    #[test]
    fn test_settings_builder_overrides() {
        let settings = FallbackSettings::new(Duration::from_secs(5))
            .unwrap()
            .with_max_attempts(3)
            .with_recovery_check_interval(Duration::from_secs(60))
            .with_recovery_threshold(Duration::from_secs(120));

        assert_eq!(settings.max_attempts(), 3);
        assert_eq!(settings.recovery_check_interval(), Duration::from_secs(60));
        assert_eq!(settings.recovery_threshold(), Duration::from_secs(120));
    }

    #[test]
    fn test_config_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEST_CONFIG.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).expect("should load config from file");
        assert_eq!(config.fallback.probe_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_from_missing_file_preserves_path() {
        let result = Config::from_file("/nonexistent/routeguard.toml");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("/nonexistent/routeguard.toml")
        );
    }
}
