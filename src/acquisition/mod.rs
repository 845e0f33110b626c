//! Analog acquisition.
//!
//! - [`session`]: single-flight continuous acquisition with guaranteed task release
//! - [`finite`]: stateless one-shot reads, optionally after charging a capacitor
//! - [`buffer`]: continuous buffer sizing for a target measurement window
//! - [`task`]: drop guard around an open analog task

pub mod buffer;
pub mod finite;
pub mod session;
pub mod task;

use chrono::{DateTime, Utc};
use rc_core::device::{ChannelData, ADC_CHANNELS};
use serde::Serialize;

pub use buffer::BufferPolicy;
pub use finite::read_with_charging;
pub use session::{SessionConfig, SessionManager};
pub use task::TaskGuard;

/// Samples returned by a finite read or a stopped session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionResult {
    /// When the data was read
    pub timestamp: DateTime<Utc>,
    /// Sample clock rate in Hz
    pub sample_rate: f64,
    /// Requested samples (finite) or buffer size (continuous) per channel
    pub samples_per_channel: usize,
    /// Always four
    pub channel_count: usize,
    /// Per-channel samples, flattened into `adc1..adc4`
    #[serde(flatten)]
    pub data: ChannelData,
}

impl AcquisitionResult {
    /// Stamp `data` with the current time.
    pub fn new(sample_rate: f64, samples_per_channel: usize, data: ChannelData) -> Self {
        Self {
            timestamp: Utc::now(),
            sample_rate,
            samples_per_channel,
            channel_count: ADC_CHANNELS,
            data,
        }
    }
}
