//! Configuration loading with Figment.
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Built-in defaults ([`Settings::default`])
//! 2. A TOML file (`config/rc_daq.toml` unless another path is given)
//! 3. Environment variables prefixed with `RC_DAQ_`, nested with `__`
//!    (e.g. `RC_DAQ_DEVICE__NAME=cDAQ2`, `RC_DAQ_APPLICATION__LOG_LEVEL=debug`)
//!
//! # Example
//! ```no_run
//! use rc_daq::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Device: {}", settings.device.name);
//! # Ok::<(), rc_daq::config::ConfigError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rc_core::circuit::DischargeResistor;
use rc_driver_mock::MockMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::OutputFormat;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/rc_daq.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RC_DAQ_";

/// Shortest settle allowed between the charge ON batch and its unwind.
pub const MIN_CHARGE_SETTLE_MS: u64 = 500;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration and logging setup errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A provider failed to parse or merge
    #[error("Failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    /// Values loaded but failed [`Settings::validate`]
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The tracing subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// `[application]`
    pub application: ApplicationSettings,
    /// `[device]`
    pub device: DeviceSettings,
    /// `[acquisition]`
    pub acquisition: AcquisitionSettings,
    /// `[sequencer]`
    pub sequencer: SequencerSettings,
    /// `[streaming]`
    pub streaming: StreamingSettings,
}

/// Application identity and logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Name reported in the startup log
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log line format
    pub log_format: OutputFormat,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            name: "rc-daq".to_string(),
            log_level: "info".to_string(),
            log_format: OutputFormat::Compact,
        }
    }
}

/// DAQ chassis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Chassis name, also the channel address prefix (`cDAQ1` gives `cDAQ1Mod2/port0/line0`)
    pub name: String,
    /// Whether digital outputs can be read back
    pub digital_readback: bool,
    /// Timing of the simulated chassis
    pub mode: MockMode,
    /// Seed for simulated sample noise
    pub seed: Option<u64>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: "cDAQ1".to_string(),
            digital_readback: false,
            mode: MockMode::Realistic,
            seed: None,
        }
    }
}

/// Analog acquisition bounds and defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Rate used when a request names none, in Hz
    pub default_sample_rate: f64,
    /// Samples per channel used when a request names none
    pub default_samples: usize,
    /// Smallest accepted sample count per channel
    pub min_samples: usize,
    /// Largest accepted sample count per channel
    pub max_samples: usize,
    /// Slowest accepted sample rate in Hz
    pub min_sample_rate: f64,
    /// Fastest accepted sample rate in Hz
    pub max_sample_rate: f64,
    /// Longest measurement window accepted in seconds
    pub max_measurement_time: f64,
    /// Extra buffer over the nominal sample count, in percent
    pub buffer_margin_percent: u32,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            default_sample_rate: 100.0,
            default_samples: 500,
            min_samples: 100,
            max_samples: 500_000,
            min_sample_rate: 1.0,
            max_sample_rate: 1_000_000.0,
            max_measurement_time: 10.0,
            buffer_margin_percent: 15,
        }
    }
}

/// Charge/discharge sequencing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSettings {
    /// Settle time between the ON batch and the unwind of a charge, in
    /// milliseconds. May be lengthened but not shortened below
    /// [`MIN_CHARGE_SETTLE_MS`].
    pub charge_settle_ms: u64,
    /// Discharge resistor switched in while charging
    pub charge_discharge_resistor: DischargeResistor,
    /// Shortest discharge in seconds; shorter requests are clamped up
    pub min_discharge_secs: f64,
    /// Longest discharge in seconds; longer requests are clamped down
    pub max_discharge_secs: f64,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            charge_settle_ms: MIN_CHARGE_SETTLE_MS,
            charge_discharge_resistor: DischargeResistor::Rz1,
            min_discharge_secs: 0.1,
            max_discharge_secs: 10.0,
        }
    }
}

impl SequencerSettings {
    /// Settle between the charge ON batch and its unwind.
    pub fn charge_settle(&self) -> Duration {
        Duration::from_millis(self.charge_settle_ms)
    }
}

/// Live streaming loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Samples per channel taken by each streaming read
    pub samples_per_read: usize,
    /// Pause between reads when a start command names none, in milliseconds
    pub default_interval_ms: u64,
    /// How long to wait for a command while streaming
    pub command_poll_ms: u64,
    /// How long to wait for a command while idle
    pub idle_poll_ms: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            samples_per_read: 10,
            default_interval_ms: 100,
            command_poll_ms: 10,
            idle_poll_ms: 100,
        }
    }
}

impl StreamingSettings {
    /// See [`StreamingSettings::default_interval_ms`].
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }

    /// Command wait while streaming.
    pub fn command_poll(&self) -> Duration {
        Duration::from_millis(self.command_poll_ms)
    }

    /// Command wait while idle.
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

impl Settings {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The provider stack used by [`Settings::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !VALID_LOG_LEVELS.contains(&self.application.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        if self.device.name.trim().is_empty() {
            return invalid("device.name must not be empty".to_string());
        }

        let acq = &self.acquisition;
        if acq.min_samples == 0 || acq.min_samples > acq.max_samples {
            return invalid(format!(
                "Invalid sample bounds {}..={}",
                acq.min_samples, acq.max_samples
            ));
        }
        if !(acq.min_sample_rate > 0.0 && acq.min_sample_rate <= acq.max_sample_rate) {
            return invalid(format!(
                "Invalid sample rate bounds {}..={}",
                acq.min_sample_rate, acq.max_sample_rate
            ));
        }
        if !(acq.min_samples..=acq.max_samples).contains(&acq.default_samples) {
            return invalid(format!("default_samples {} outside bounds", acq.default_samples));
        }
        if !(acq.min_sample_rate..=acq.max_sample_rate).contains(&acq.default_sample_rate) {
            return invalid(format!(
                "default_sample_rate {} outside bounds",
                acq.default_sample_rate
            ));
        }
        if acq.max_measurement_time <= 0.0 {
            return invalid("max_measurement_time must be positive".to_string());
        }

        let seq = &self.sequencer;
        if seq.charge_settle_ms < MIN_CHARGE_SETTLE_MS {
            return invalid(format!(
                "charge_settle_ms {} is below the {} ms minimum",
                seq.charge_settle_ms, MIN_CHARGE_SETTLE_MS
            ));
        }
        if !(seq.min_discharge_secs > 0.0 && seq.min_discharge_secs <= seq.max_discharge_secs) {
            return invalid(format!(
                "Invalid discharge duration bounds {}..={}",
                seq.min_discharge_secs, seq.max_discharge_secs
            ));
        }

        let stream = &self.streaming;
        if stream.samples_per_read == 0 || stream.command_poll_ms == 0 || stream.idle_poll_ms == 0 {
            return invalid("streaming read size and poll intervals must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.device.name, "cDAQ1");
        assert_eq!(settings.sequencer.charge_settle(), Duration::from_millis(500));
        assert_eq!(settings.sequencer.charge_discharge_resistor, DischargeResistor::Rz1);
        assert_eq!(settings.streaming.samples_per_read, 10);
        assert_eq!(settings.streaming.command_poll(), Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.application.log_level = "verbose".to_string();
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut settings = Settings::default();
        settings.acquisition.min_samples = 1000;
        settings.acquisition.max_samples = 10;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.sequencer.min_discharge_secs = 5.0;
        settings.sequencer.max_discharge_secs = 1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_short_charge_settle_rejected() {
        let mut settings = Settings::default();
        settings.sequencer.charge_settle_ms = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("charge_settle_ms")));

        settings.sequencer.charge_settle_ms = MIN_CHARGE_SETTLE_MS - 1;
        assert!(settings.validate().is_err());

        settings.sequencer.charge_settle_ms = 750;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "rc_daq.toml",
                r#"
                [application]
                log_level = "debug"

                [device]
                name = "cDAQ2"
                digital_readback = true
                mode = "instant"

                [sequencer]
                charge_discharge_resistor = "rz3"
                "#,
            )?;
            jail.set_env("RC_DAQ_DEVICE__NAME", "cDAQ7");
            jail.set_env("RC_DAQ_STREAMING__SAMPLES_PER_READ", "20");

            let settings = Settings::load_from("rc_daq.toml").map_err(|e| e.to_string())?;
            assert_eq!(settings.application.log_level, "debug");
            assert_eq!(settings.device.name, "cDAQ7");
            assert!(settings.device.digital_readback);
            assert_eq!(settings.device.mode, MockMode::Instant);
            assert_eq!(settings.sequencer.charge_discharge_resistor, DischargeResistor::Rz3);
            assert_eq!(settings.streaming.samples_per_read, 20);
            // Untouched sections keep their defaults
            assert_eq!(settings.acquisition, AcquisitionSettings::default());
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load_from("does-not-exist.toml").map_err(|e| e.to_string())?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_file_value_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[application]\nlog_level = \"loud\"\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }
}
