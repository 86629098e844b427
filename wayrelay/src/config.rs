//! Configuration file support.
//!
//! Settings live in an INI file at `~/.wayrelay/config.ini`. A missing file
//! yields defaults; missing keys fall back to their defaults individually.
//!
//! ```ini
//! [routing]
//! osrm_url = https://router.project-osrm.org
//! mode = walking
//!
//! [guidance]
//! step_threshold_m = 25
//!
//! [peripheral]
//! device_pattern = ^rfcomm
//! ```
//!
//! Every setting is addressable as `section.key` through [`ConfigKey`], which
//! is what `wayrelay config get|set|list` use.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::feed::{FeedConfig, DEFAULT_MIN_DISTANCE_M, DEFAULT_MIN_INTERVAL};
use crate::peripheral::{
    DeviceMatcher, PeripheralConfig, DEFAULT_DEVICE_DIR, DEFAULT_DEVICE_PATTERN,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_WRITE_TIMEOUT,
};
use crate::provider::{
    default_user_agent, RoutingConfig, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_NOMINATIM_URL,
    DEFAULT_OSRM_URL,
};
use crate::route::TravelMode;
use crate::session::{GuidanceConfig, DEFAULT_DEVIATION_THRESHOLD_M, DEFAULT_REROUTE_COOLDOWN};
use crate::tracker::DEFAULT_STEP_THRESHOLD_M;

/// Directory under the home directory holding wayrelay state.
pub const CONFIG_DIR_NAME: &str = ".wayrelay";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors from loading, saving or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// `~/.wayrelay`, or `./.wayrelay` when no home directory is known.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// `~/.wayrelay/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSettings {
    pub osrm_url: String,
    pub nominatim_url: String,
    pub mode: TravelMode,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            mode: TravelMode::default(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceSettings {
    pub step_threshold_m: f64,
    pub deviation_threshold_m: f64,
    pub reroute_cooldown_secs: u64,
}

impl Default for GuidanceSettings {
    fn default() -> Self {
        Self {
            step_threshold_m: DEFAULT_STEP_THRESHOLD_M,
            deviation_threshold_m: DEFAULT_DEVIATION_THRESHOLD_M,
            reroute_cooldown_secs: DEFAULT_REROUTE_COOLDOWN.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeripheralSettings {
    pub enabled: bool,
    pub device_pattern: String,
    pub device_dir: PathBuf,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub queue_capacity: usize,
}

impl Default for PeripheralSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            device_pattern: DEFAULT_DEVICE_PATTERN.to_string(),
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub min_interval_ms: u64,
    pub min_distance_m: f64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL.as_millis() as u64,
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive, e.g. `info` or `wayrelay=debug`.
    pub level: String,
    /// Directory for daily log files; `None` logs to stderr only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// The parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub routing: RoutingSettings,
    pub guidance: GuidanceSettings,
    pub peripheral: PeripheralSettings,
    pub feed: FeedSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads `~/.wayrelay/config.ini`, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(e) => ConfigError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
            e => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Parses INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Writes to `~/.wayrelay/config.ini`, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |reason: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| write_error(e.to_string()))
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }
}

impl RoutingConfig {
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let settings = &config.routing;
        Self {
            osrm_url: settings.osrm_url.clone(),
            nominatim_url: settings.nominatim_url.clone(),
            mode: settings.mode,
            timeout_secs: settings.timeout_secs,
            user_agent: settings.user_agent.clone(),
        }
    }
}

impl GuidanceConfig {
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let settings = &config.guidance;
        Self::default()
            .with_step_threshold_m(settings.step_threshold_m)
            .with_deviation_threshold_m(settings.deviation_threshold_m)
            .with_reroute_cooldown(Duration::from_secs(settings.reroute_cooldown_secs))
    }
}

impl PeripheralConfig {
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let settings = &config.peripheral;
        Self {
            enabled: settings.enabled,
            device_pattern: settings.device_pattern.clone(),
            device_dir: settings.device_dir.clone(),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            write_timeout: Duration::from_millis(settings.write_timeout_ms),
            queue_capacity: settings.queue_capacity,
        }
    }
}

impl FeedConfig {
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self::default()
            .with_min_interval(Duration::from_millis(config.feed.min_interval_ms))
            .with_min_distance_m(config.feed.min_distance_m)
    }
}

/// A `section.key` setting name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    RoutingOsrmUrl,
    RoutingNominatimUrl,
    RoutingMode,
    RoutingTimeoutSecs,
    RoutingUserAgent,
    GuidanceStepThresholdM,
    GuidanceDeviationThresholdM,
    GuidanceRerouteCooldownSecs,
    PeripheralEnabled,
    PeripheralDevicePattern,
    PeripheralDeviceDir,
    PeripheralConnectTimeoutMs,
    PeripheralWriteTimeoutMs,
    PeripheralQueueCapacity,
    FeedMinIntervalMs,
    FeedMinDistanceM,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// All keys, in file order.
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            RoutingOsrmUrl,
            RoutingNominatimUrl,
            RoutingMode,
            RoutingTimeoutSecs,
            RoutingUserAgent,
            GuidanceStepThresholdM,
            GuidanceDeviationThresholdM,
            GuidanceRerouteCooldownSecs,
            PeripheralEnabled,
            PeripheralDevicePattern,
            PeripheralDeviceDir,
            PeripheralConnectTimeoutMs,
            PeripheralWriteTimeoutMs,
            PeripheralQueueCapacity,
            FeedMinIntervalMs,
            FeedMinDistanceM,
            LoggingLevel,
            LoggingDirectory,
        ]
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            RoutingOsrmUrl | RoutingNominatimUrl | RoutingMode | RoutingTimeoutSecs
            | RoutingUserAgent => "routing",
            GuidanceStepThresholdM | GuidanceDeviationThresholdM | GuidanceRerouteCooldownSecs => {
                "guidance"
            }
            PeripheralEnabled
            | PeripheralDevicePattern
            | PeripheralDeviceDir
            | PeripheralConnectTimeoutMs
            | PeripheralWriteTimeoutMs
            | PeripheralQueueCapacity => "peripheral",
            FeedMinIntervalMs | FeedMinDistanceM => "feed",
            LoggingLevel | LoggingDirectory => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            RoutingOsrmUrl => "osrm_url",
            RoutingNominatimUrl => "nominatim_url",
            RoutingMode => "mode",
            RoutingTimeoutSecs => "timeout_secs",
            RoutingUserAgent => "user_agent",
            GuidanceStepThresholdM => "step_threshold_m",
            GuidanceDeviationThresholdM => "deviation_threshold_m",
            GuidanceRerouteCooldownSecs => "reroute_cooldown_secs",
            PeripheralEnabled => "enabled",
            PeripheralDevicePattern => "device_pattern",
            PeripheralDeviceDir => "device_dir",
            PeripheralConnectTimeoutMs => "connect_timeout_ms",
            PeripheralWriteTimeoutMs => "write_timeout_ms",
            PeripheralQueueCapacity => "queue_capacity",
            FeedMinIntervalMs => "min_interval_ms",
            FeedMinDistanceM => "min_distance_m",
            LoggingLevel => "level",
            LoggingDirectory => "directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        match self {
            RoutingOsrmUrl => config.routing.osrm_url.clone(),
            RoutingNominatimUrl => config.routing.nominatim_url.clone(),
            RoutingMode => config.routing.mode.to_string(),
            RoutingTimeoutSecs => config.routing.timeout_secs.to_string(),
            RoutingUserAgent => config.routing.user_agent.clone(),
            GuidanceStepThresholdM => config.guidance.step_threshold_m.to_string(),
            GuidanceDeviationThresholdM => config.guidance.deviation_threshold_m.to_string(),
            GuidanceRerouteCooldownSecs => config.guidance.reroute_cooldown_secs.to_string(),
            PeripheralEnabled => config.peripheral.enabled.to_string(),
            PeripheralDevicePattern => config.peripheral.device_pattern.clone(),
            PeripheralDeviceDir => config.peripheral.device_dir.display().to_string(),
            PeripheralConnectTimeoutMs => config.peripheral.connect_timeout_ms.to_string(),
            PeripheralWriteTimeoutMs => config.peripheral.write_timeout_ms.to_string(),
            PeripheralQueueCapacity => config.peripheral.queue_capacity.to_string(),
            FeedMinIntervalMs => config.feed.min_interval_ms.to_string(),
            FeedMinDistanceM => config.feed.min_distance_m.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validates `value` and stores it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            RoutingOsrmUrl => config.routing.osrm_url = self.parse_url(value)?,
            RoutingNominatimUrl => config.routing.nominatim_url = self.parse_url(value)?,
            RoutingMode => {
                config.routing.mode = value.parse().map_err(|e| self.invalid(value, e))?;
            }
            RoutingTimeoutSecs => config.routing.timeout_secs = self.parse_positive_u64(value)?,
            RoutingUserAgent => {
                if value.is_empty() {
                    return Err(self.invalid(value, "must not be empty"));
                }
                config.routing.user_agent = value.to_string();
            }
            GuidanceStepThresholdM => {
                config.guidance.step_threshold_m = self.parse_positive_f64(value)?;
            }
            GuidanceDeviationThresholdM => {
                config.guidance.deviation_threshold_m = self.parse_positive_f64(value)?;
            }
            GuidanceRerouteCooldownSecs => {
                config.guidance.reroute_cooldown_secs =
                    value.parse().map_err(|e| self.invalid(value, e))?;
            }
            PeripheralEnabled => config.peripheral.enabled = self.parse_bool(value)?,
            PeripheralDevicePattern => {
                DeviceMatcher::new(value).map_err(|e| self.invalid(value, e))?;
                config.peripheral.device_pattern = value.to_string();
            }
            PeripheralDeviceDir => {
                if value.is_empty() {
                    return Err(self.invalid(value, "must not be empty"));
                }
                config.peripheral.device_dir = PathBuf::from(value);
            }
            PeripheralConnectTimeoutMs => {
                config.peripheral.connect_timeout_ms = self.parse_positive_u64(value)?;
            }
            PeripheralWriteTimeoutMs => {
                config.peripheral.write_timeout_ms = self.parse_positive_u64(value)?;
            }
            PeripheralQueueCapacity => {
                config.peripheral.queue_capacity = self.parse_positive_u64(value)? as usize;
            }
            FeedMinIntervalMs => {
                config.feed.min_interval_ms = value.parse().map_err(|e| self.invalid(value, e))?;
            }
            FeedMinDistanceM => {
                let meters: f64 = value.parse().map_err(|e| self.invalid(value, e))?;
                if !meters.is_finite() || meters < 0.0 {
                    return Err(self.invalid(value, "must be a non-negative number"));
                }
                config.feed.min_distance_m = meters;
            }
            LoggingLevel => {
                EnvFilter::try_new(value).map_err(|e| self.invalid(value, e))?;
                config.logging.level = value.to_string();
            }
            LoggingDirectory => {
                config.logging.directory = (!value.is_empty()).then(|| PathBuf::from(value));
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: impl fmt::Display) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse_url(&self, value: &str) -> Result<String, ConfigError> {
        reqwest::Url::parse(value).map_err(|e| self.invalid(value, e))?;
        Ok(value.trim_end_matches('/').to_string())
    }

    fn parse_positive_u64(&self, value: &str) -> Result<u64, ConfigError> {
        match value.parse::<u64>() {
            Ok(0) => Err(self.invalid(value, "must be greater than zero")),
            Ok(n) => Ok(n),
            Err(e) => Err(self.invalid(value, e)),
        }
    }

    fn parse_positive_f64(&self, value: &str) -> Result<f64, ConfigError> {
        let n: f64 = value.parse().map_err(|e| self.invalid(value, e))?;
        if !n.is_finite() || n <= 0.0 {
            return Err(self.invalid(value, "must be a positive number"));
        }
        Ok(n)
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = ConfigFile::parse(
            "[routing]\nmode = walking\n\n[guidance]\nstep_threshold_m = 25\n\n[logging]\nlevel = wayrelay=debug\n",
        )
        .unwrap();
        assert_eq!(config.routing.mode, TravelMode::Walking);
        assert_eq!(config.guidance.step_threshold_m, 25.0);
        assert_eq!(config.guidance.deviation_threshold_m, 50.0);
        assert_eq!(config.logging.level, "wayrelay=debug");
        assert_eq!(config.routing.osrm_url, DEFAULT_OSRM_URL);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let err = ConfigFile::parse("[guidance]\nstep_threshold_m = -3\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "guidance.step_threshold_m"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        ConfigKey::PeripheralDevicePattern
            .set(&mut config, "^rfcomm[0-9]+$")
            .unwrap();
        ConfigKey::LoggingDirectory
            .set(&mut config, "/var/log/wayrelay")
            .unwrap();
        ConfigKey::PeripheralEnabled.set(&mut config, "no").unwrap();
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!loaded.peripheral.enabled);
        assert_eq!(
            loaded.logging.directory,
            Some(PathBuf::from("/var/log/wayrelay"))
        );
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert!(matches!(
            "routing.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_validation() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::RoutingMode.set(&mut config, "bicycle").is_err());
        assert!(ConfigKey::RoutingOsrmUrl.set(&mut config, "not a url").is_err());
        assert!(ConfigKey::PeripheralQueueCapacity.set(&mut config, "0").is_err());
        assert!(ConfigKey::PeripheralDevicePattern.set(&mut config, "(").is_err());
        assert!(ConfigKey::PeripheralEnabled.set(&mut config, "maybe").is_err());
        assert!(ConfigKey::PeripheralConnectTimeoutMs.set(&mut config, "0").is_err());

        ConfigKey::RoutingOsrmUrl
            .set(&mut config, "http://localhost:5000/")
            .unwrap();
        assert_eq!(config.routing.osrm_url, "http://localhost:5000");
        assert_eq!(config, {
            let mut expected = ConfigFile::default();
            expected.routing.osrm_url = "http://localhost:5000".to_string();
            expected
        });
    }

    #[test]
    fn test_runtime_configs_from_file() {
        let config = ConfigFile::parse(
            "[guidance]\nreroute_cooldown_secs = 4\n[peripheral]\nwrite_timeout_ms = 250\nconnect_timeout_ms = 1500\n[feed]\nmin_interval_ms = 0\n",
        )
        .unwrap();

        let guidance = GuidanceConfig::from_config_file(&config);
        assert_eq!(guidance.reroute_cooldown, Duration::from_secs(4));
        assert_eq!(guidance.step_threshold_m, 30.0);

        let peripheral = PeripheralConfig::from_config_file(&config);
        assert_eq!(peripheral.write_timeout, Duration::from_millis(250));
        assert_eq!(peripheral.connect_timeout, Duration::from_millis(1500));

        let feed = FeedConfig::from_config_file(&config);
        assert_eq!(feed.min_interval, Duration::ZERO);

        let routing = RoutingConfig::from_config_file(&config);
        assert_eq!(routing, RoutingConfig::default());
    }
}
