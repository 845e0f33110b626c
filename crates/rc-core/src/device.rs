//! Device capability interface.
//!
//! The core never talks to a driver directly. Everything it needs from the
//! hardware is expressed by three traits:
//!
//! - [`Device`] opens tasks and reports what the hardware can do
//! - [`DigitalTask`] writes (and, where supported, reads back) one relay line
//! - [`AnalogTask`] samples the four ADC channels in finite or continuous mode
//!
//! All calls are blocking. Async callers move them onto the blocking pool
//! (`tokio::task::spawn_blocking`).
//!
//! Settle delays go through [`Delay`] so simulated hardware can observe and
//! shorten them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, RigError};
use crate::relay::ChannelAddress;

/// Number of analog input channels on the front end.
pub const ADC_CHANNELS: usize = 4;

/// Sample timing mode of an analog task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// Acquire exactly `samples_per_channel` samples, then stop.
    Finite,
    /// Keep filling a circular buffer of `samples_per_channel` until stopped.
    Continuous,
}

/// How many samples a read should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCount {
    /// Block until this many samples per channel are available.
    Samples(usize),
    /// Return whatever is buffered right now without waiting.
    All,
}

/// Configuration for opening an analog input task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogTaskConfig {
    /// Channel spec covering the inputs (e.g. `cDAQ1Mod1/ai0:3`)
    pub channels: ChannelAddress,
    /// Sample clock rate per channel in Hz
    pub sample_rate: f64,
    /// Finite or continuous sample timing
    pub mode: AcquisitionMode,
    /// Samples per channel (finite) or buffer size per channel (continuous)
    pub samples_per_channel: usize,
}

/// Per-channel voltages from one read of the four ADC inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelData {
    /// Samples from `ai0`
    pub adc1: Vec<f64>,
    /// Samples from `ai1`
    pub adc2: Vec<f64>,
    /// Samples from `ai2`
    pub adc3: Vec<f64>,
    /// Samples from `ai3`
    pub adc4: Vec<f64>,
}

impl ChannelData {
    /// Number of samples in the first channel.
    pub fn len(&self) -> usize {
        self.adc1.len()
    }

    /// True when no channel holds a sample.
    pub fn is_empty(&self) -> bool {
        self.channels().iter().all(|c| c.is_empty())
    }

    /// Channel arrays in input order.
    pub fn channels(&self) -> [&[f64]; ADC_CHANNELS] {
        [&self.adc1, &self.adc2, &self.adc3, &self.adc4]
    }
}

impl TryFrom<Vec<Vec<f64>>> for ChannelData {
    type Error = RigError;

    /// Split a raw driver read into the four channels.
    ///
    /// Channel arrays may differ in length (or be empty) but there must be
    /// exactly four of them.
    fn try_from(raw: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        let got = raw.len();
        let [adc1, adc2, adc3, adc4]: [Vec<f64>; ADC_CHANNELS] =
            raw.try_into().map_err(|_| RigError::MalformedRead {
                expected: ADC_CHANNELS,
                got,
            })?;
        Ok(Self {
            adc1,
            adc2,
            adc3,
            adc4,
        })
    }
}

/// An open analog input task.
///
/// Implementations release driver resources in `close`; callers must invoke
/// it exactly once on every path, which the acquisition layer guarantees with
/// a drop guard.
pub trait AnalogTask: Send {
    /// Arm the sample clock. Acquisition begins immediately.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Read samples from all channels, one array per channel.
    fn read(&mut self, count: ReadCount) -> Result<Vec<Vec<f64>>, DeviceError>;

    /// Stop the sample clock. Stopping an idle task is a no-op.
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Release the task. Further calls fail.
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// An open single-line digital output task.
pub trait DigitalTask: Send {
    /// Drive the line high (`true`) or low.
    fn write(&mut self, state: bool) -> Result<(), DeviceError>;

    /// Read the line state back. Fails with [`DeviceErrorKind::Unsupported`]
    /// on hardware that cannot read digital outputs.
    ///
    /// [`DeviceErrorKind::Unsupported`]: crate::error::DeviceErrorKind::Unsupported
    fn read(&mut self) -> Result<bool, DeviceError>;
}

/// A DAQ chassis able to open analog and digital tasks.
pub trait Device: Send + Sync {
    /// Device name, also used as the channel address prefix.
    fn name(&self) -> &str;

    /// Whether digital output lines can be read back from hardware.
    fn supports_digital_readback(&self) -> bool;

    /// Open an analog input task configured but not yet started.
    fn open_analog_task(&self, config: &AnalogTaskConfig) -> Result<Box<dyn AnalogTask>, DeviceError>;

    /// Open a task on one relay line.
    fn open_digital_task(&self, channel: &ChannelAddress) -> Result<Box<dyn DigitalTask>, DeviceError>;
}

/// Blocking wait used for relay settle delays.
pub trait Delay: Send + Sync {
    /// Block for `duration`.
    fn delay(&self, duration: Duration);
}

/// [`Delay`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
