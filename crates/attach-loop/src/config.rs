//! Attach loop configuration management
//!
//! Two layers live here: [`LoopConfig`] is the optional TOML file holding
//! defaults, and [`RunConfig`] is the resolved, immutable set of values a
//! single run works with.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default upper bound for the random delay between attach and detach
pub const DEFAULT_MAX_DELAY_SECS: u64 = 3;

/// Default number of attach/detach cycles
pub const DEFAULT_COUNT: u64 = 0xFFFF;

/// Default log level when neither the CLI nor the config file sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Platform-specific install location of the usbip client
pub fn default_program_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\APK Token Redirector Client\usbip.exe")
    } else {
        PathBuf::from("/usr/sbin/usbip")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub usbip: UsbipSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbipSettings {
    /// Path to the usbip executable, `~` is expanded
    #[serde(default = "default_program_path")]
    pub program: PathBuf,
    /// Upper bound (inclusive) of the delay before detach, in seconds
    #[serde(default = "default_max_delay")]
    pub max_delay: u64,
    /// Number of attach/detach cycles
    #[serde(default = "default_count")]
    pub count: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_max_delay() -> u64 {
    DEFAULT_MAX_DELAY_SECS
}

fn default_count() -> u64 {
    DEFAULT_COUNT
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for UsbipSettings {
    fn default() -> Self {
        Self {
            program: default_program_path(),
            max_delay: DEFAULT_MAX_DELAY_SECS,
            count: DEFAULT_COUNT,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            usbip: UsbipSettings::default(),
        }
    }
}

impl LoopConfig {
    /// Load configuration from the specified path
    ///
    /// Without an explicit path the standard locations are tried in order and
    /// an error is returned when none exists.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_file(&p),
            None => Self::load_first(&Self::candidate_paths())?
                .ok_or_else(|| anyhow!("No configuration file found")),
        }
    }

    /// Load the first existing file among `candidates`
    ///
    /// `Ok(None)` when none of them exists.
    pub fn load_first(candidates: &[PathBuf]) -> Result<Option<Self>> {
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load_file(path).map(Some),
            None => Ok(None),
        }
    }

    fn load_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        tracing::debug!(
            "Config: program={}, max_delay={}s, count={}",
            config.usbip.program.display(),
            config.usbip.max_delay,
            config.usbip.count
        );
        Ok(config)
    }

    /// Load configuration from the standard locations or return defaults
    ///
    /// A missing file is the normal case and stays silent; only a file that
    /// exists but cannot be loaded is reported.
    pub fn load_or_default() -> Self {
        match Self::load_first(&Self::candidate_paths()) {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                // Logging is not initialized yet
                eprintln!("Config: {:#}", e);
                Self::default()
            }
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: LoopConfig = toml::from_str(content)?;
        config.usbip.program = expand_tilde(&config.usbip.program);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbip-attach-loop").join("config.toml")
        } else {
            PathBuf::from(".config/usbip-attach-loop/config.toml")
        }
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = vec![Self::default_path()];
        if !cfg!(windows) {
            candidates.push(PathBuf::from("/etc/usbip-attach-loop/config.toml"));
        }
        candidates
    }

    fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        if self.usbip.program.as_os_str().is_empty() {
            return Err(anyhow!("usbip.program must not be empty"));
        }

        Ok(())
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}

/// Values for one run, fixed once resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// usbip server address
    pub remote: String,
    /// Bus id of the device on the remote host
    pub bus_id: String,
    /// Upper bound (inclusive) of the delay before detach, in seconds
    pub max_delay: u64,
    /// Path to the usbip executable
    pub program: PathBuf,
    /// Number of attach/detach cycles
    pub count: u64,
}

/// Values supplied on the command line; `None` falls back to the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub max_delay: Option<u64>,
    pub program: Option<PathBuf>,
    pub count: Option<u64>,
}

impl RunConfig {
    /// Resolve a run from CLI values layered over the config file
    pub fn resolve(
        remote: String,
        bus_id: String,
        overrides: Overrides,
        file: &LoopConfig,
    ) -> Result<Self> {
        let config = Self {
            remote,
            bus_id,
            max_delay: overrides.max_delay.unwrap_or(file.usbip.max_delay),
            program: overrides
                .program
                .map(|p| expand_tilde(&p))
                .unwrap_or_else(|| file.usbip.program.clone()),
            count: overrides.count.unwrap_or(file.usbip.count),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.remote.trim().is_empty() {
            return Err(anyhow!("Remote host must not be empty"));
        }
        if self.bus_id.trim().is_empty() {
            return Err(anyhow!("Bus id must not be empty"));
        }
        if self.program.as_os_str().is_empty() {
            return Err(anyhow!("usbip program path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoopConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.usbip.max_delay, 3);
        assert_eq!(config.usbip.count, 65535);
        assert_eq!(config.usbip.program, default_program_path());
    }

    #[test]
    fn test_config_serialization() {
        let config = LoopConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: LoopConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.usbip.program, parsed.usbip.program);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = LoopConfig::from_toml("").unwrap();
        assert_eq!(config.usbip.max_delay, DEFAULT_MAX_DELAY_SECS);
        assert_eq!(config.usbip.count, DEFAULT_COUNT);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = LoopConfig::default();
        assert!(config.validate().is_ok());

        config.general.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.general.log_level = "trace".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_program() {
        let mut config = LoopConfig::default();
        config.usbip.program = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_prefers_overrides() {
        let file = LoopConfig::default();
        let overrides = Overrides {
            max_delay: Some(0),
            program: Some(PathBuf::from("/opt/usbip/usbip")),
            count: Some(2),
        };
        let run = RunConfig::resolve("host".into(), "1-1".into(), overrides, &file).unwrap();
        assert_eq!(run.max_delay, 0);
        assert_eq!(run.count, 2);
        assert_eq!(run.program, PathBuf::from("/opt/usbip/usbip"));
    }

    #[test]
    fn test_resolve_rejects_blank_remote() {
        let file = LoopConfig::default();
        let result = RunConfig::resolve("  ".into(), "1-1".into(), Overrides::default(), &file);
        assert!(result.is_err());
    }
}
