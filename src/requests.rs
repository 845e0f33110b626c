//! Caller-facing request types.
//!
//! Requests arrive loosely typed (selector codes as strings, optional fields)
//! and are resolved against the configured bounds into plans the core can
//! execute. Range problems become [`RigError::InvalidRequest`]; unknown
//! selector codes become [`RigError::InvalidSelector`].

use std::time::Duration;

use rc_core::circuit::{Capacitor, DischargeResistor};
use rc_core::error::{RigError, RigResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::acquisition::BufferPolicy;
use crate::config::{AcquisitionSettings, SequencerSettings};

/// Start a continuous acquisition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Minimum samples per channel
    pub samples: Option<usize>,
    /// Sample clock rate in Hz
    pub sample_rate: Option<f64>,
    /// Target measurement window in seconds; sizes the buffer when given
    pub measurement_time: Option<f64>,
}

/// Validated parameters for [`SessionManager::start`](crate::acquisition::SessionManager::start).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartPlan {
    /// Continuous buffer size per channel
    pub buffer_size: usize,
    /// Sample clock rate in Hz
    pub sample_rate: f64,
}

impl StartRequest {
    /// Fill defaults from `settings`, check bounds and size the buffer.
    pub fn resolve(&self, settings: &AcquisitionSettings) -> RigResult<StartPlan> {
        let samples = self.samples.unwrap_or(settings.default_samples);
        let sample_rate = self.sample_rate.unwrap_or(settings.default_sample_rate);
        check_samples(samples, settings)?;
        check_rate(sample_rate, settings)?;

        if let Some(time) = self.measurement_time {
            if !(time > 0.0 && time <= settings.max_measurement_time) {
                return Err(RigError::InvalidRequest(format!(
                    "measurement_time {} s must be in (0, {}]",
                    time, settings.max_measurement_time
                )));
            }
        }

        let policy = BufferPolicy::new(settings.buffer_margin_percent);
        let buffer_size = policy.effective(samples, sample_rate, self.measurement_time);
        debug!(samples, sample_rate, buffer_size, "Resolved start request");
        Ok(StartPlan {
            buffer_size,
            sample_rate,
        })
    }
}

/// Discharge a capacitor through a resistor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DischargeRequest {
    /// Capacitor code (`cs1`..`cs4`)
    pub capacitor: String,
    /// Discharge resistor code (`rz1`..`rz4`)
    pub resistor: String,
    /// Seconds; clamped into the configured bounds
    pub duration: f64,
}

/// Validated discharge parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DischargePlan {
    /// Capacitor to discharge
    pub capacitor: Capacitor,
    /// Resistor to bleed it through
    pub resistor: DischargeResistor,
    /// Clamped hold time
    pub duration: Duration,
}

impl DischargeRequest {
    /// Parse the codes and clamp the duration into the configured bounds.
    pub fn resolve(&self, settings: &SequencerSettings) -> RigResult<DischargePlan> {
        let capacitor: Capacitor = self.capacitor.parse()?;
        let resistor: DischargeResistor = self.resistor.parse()?;
        if !self.duration.is_finite() {
            return Err(RigError::InvalidRequest(format!(
                "Invalid discharge duration: {}",
                self.duration
            )));
        }
        let secs = self
            .duration
            .clamp(settings.min_discharge_secs, settings.max_discharge_secs);
        if secs != self.duration {
            debug!(requested = self.duration, clamped = secs, "Discharge duration clamped");
        }
        Ok(DischargePlan {
            capacitor,
            resistor,
            duration: Duration::from_secs_f64(secs),
        })
    }
}

/// One-shot finite read, optionally charging a capacitor first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiniteReadRequest {
    /// Samples per channel
    pub samples: Option<usize>,
    /// Sample clock rate in Hz
    pub sample_rate: Option<f64>,
    /// Capacitor code to charge before reading
    pub charge: Option<String>,
}

/// Validated finite read parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiniteReadPlan {
    /// Samples per channel
    pub samples: usize,
    /// Sample clock rate in Hz
    pub sample_rate: f64,
    /// Capacitor to charge first
    pub charge: Option<Capacitor>,
}

impl FiniteReadRequest {
    /// Fill defaults from `settings`, check bounds and parse the capacitor.
    pub fn resolve(&self, settings: &AcquisitionSettings) -> RigResult<FiniteReadPlan> {
        let samples = self.samples.unwrap_or(settings.default_samples);
        let sample_rate = self.sample_rate.unwrap_or(settings.default_sample_rate);
        check_samples(samples, settings)?;
        check_rate(sample_rate, settings)?;
        let charge = self.charge.as_deref().map(str::parse::<Capacitor>).transpose()?;
        Ok(FiniteReadPlan {
            samples,
            sample_rate,
            charge,
        })
    }
}

fn check_samples(samples: usize, settings: &AcquisitionSettings) -> RigResult<()> {
    if !(settings.min_samples..=settings.max_samples).contains(&samples) {
        return Err(RigError::InvalidRequest(format!(
            "samples {} must be in {}..={}",
            samples, settings.min_samples, settings.max_samples
        )));
    }
    Ok(())
}

pub(crate) fn check_rate(sample_rate: f64, settings: &AcquisitionSettings) -> RigResult<()> {
    if !(settings.min_sample_rate..=settings.max_sample_rate).contains(&sample_rate) {
        return Err(RigError::InvalidRequest(format!(
            "sample_rate {} must be in {}..={}",
            sample_rate, settings.min_sample_rate, settings.max_sample_rate
        )));
    }
    Ok(())
}
