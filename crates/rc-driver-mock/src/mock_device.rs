//! Simulated CompactDAQ chassis.
//!
//! Implements the full device capability interface:
//!
//! - digital output lines that remember their state (optionally readable)
//! - a 4-channel analog input producing uniform noise
//! - finite tasks that block for `samples / rate` in realistic mode
//! - continuous tasks whose buffer fills with wall-clock time and is capped
//!   at the configured buffer size
//!
//! Every successful interaction is recorded in a shared [`Journal`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rc_core::device::{
    AcquisitionMode, AnalogTask, AnalogTaskConfig, Delay, Device, DigitalTask, ReadCount, ADC_CHANNELS,
};
use rc_core::error::{DeviceError, DeviceErrorKind};
use rc_core::relay::ChannelAddress;

use crate::common::{op, ErrorConfig, MockMode, MockRng, TimingConfig};
use crate::journal::{Journal, JournalEvent};

/// Default amplitude of the simulated ADC noise in volts.
pub const DEFAULT_NOISE_AMPLITUDE: f64 = 0.05;

struct Shared {
    name: String,
    mode: MockMode,
    timing: TimingConfig,
    digital_readback: bool,
    noise_amplitude: f64,
    errors: ErrorConfig,
    rng: MockRng,
    journal: Journal,
    lines: Mutex<HashMap<ChannelAddress, bool>>,
    open_analog: AtomicUsize,
}

impl Shared {
    fn pause(&self, duration: Duration) {
        if self.mode.is_realistic() && !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn invalid(&self, message: impl Into<String>) -> DeviceError {
        DeviceError::new(&self.name, DeviceErrorKind::InvalidParameter, message)
    }

    fn samples(&self, count: usize) -> Vec<Vec<f64>> {
        (0..ADC_CHANNELS)
            .map(|_| {
                let mut channel = vec![0.0; count];
                self.rng.fill_noise(&mut channel, self.noise_amplitude);
                channel
            })
            .collect()
    }
}

/// Simulated DAQ chassis.
///
/// # Example
///
/// ```rust,ignore
/// let device = MockDevice::builder()
///     .name("cDAQ1")
///     .digital_readback(true)
///     .build();
/// let journal = device.journal();
/// ```
#[derive(Clone)]
pub struct MockDevice {
    shared: Arc<Shared>,
}

impl MockDevice {
    /// Instant-mode device without digital readback.
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder().name(name).build()
    }

    /// Start configuring a device.
    pub fn builder() -> MockDeviceBuilder {
        MockDeviceBuilder::new()
    }

    /// Timing mode.
    pub fn mode(&self) -> MockMode {
        self.shared.mode
    }

    /// Handle to the shared event journal.
    pub fn journal(&self) -> Journal {
        self.shared.journal.clone()
    }

    /// Settle-delay handle sharing this device's journal and mode.
    pub fn delay(&self) -> MockDelay {
        MockDelay {
            journal: self.shared.journal.clone(),
            mode: self.shared.mode,
        }
    }

    /// Fault injection in effect.
    pub fn errors(&self) -> &ErrorConfig {
        &self.shared.errors
    }

    /// Physical state of a digital line, `None` if never written.
    pub fn line_state(&self, channel: &ChannelAddress) -> Option<bool> {
        self.shared.lines.lock().get(channel).copied()
    }

    /// Change a line behind the orchestration layer's back (manual switch, power cycle).
    pub fn set_line(&self, channel: ChannelAddress, state: bool) {
        self.shared.lines.lock().insert(channel, state);
    }

    /// Number of analog tasks opened and not yet closed.
    pub fn open_analog_tasks(&self) -> usize {
        self.shared.open_analog.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("name", &self.shared.name)
            .field("mode", &self.shared.mode)
            .field("digital_readback", &self.shared.digital_readback)
            .finish()
    }
}

impl Device for MockDevice {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn supports_digital_readback(&self) -> bool {
        self.shared.digital_readback
    }

    fn open_analog_task(&self, config: &AnalogTaskConfig) -> Result<Box<dyn AnalogTask>, DeviceError> {
        let shared = &self.shared;
        shared.errors.check_operation(&shared.name, op::ANALOG_OPEN)?;

        if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) {
            return Err(shared.invalid(format!("Invalid sample rate: {}", config.sample_rate)));
        }
        if config.samples_per_channel == 0 {
            return Err(shared.invalid("samples_per_channel must be positive"));
        }

        shared.pause(shared.timing.communication_delay());
        shared.journal.record(JournalEvent::AnalogOpen {
            mode: config.mode,
            sample_rate: config.sample_rate,
            samples_per_channel: config.samples_per_channel,
        });
        shared.open_analog.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            device = %shared.name,
            channels = %config.channels,
            mode = ?config.mode,
            rate = config.sample_rate,
            samples = config.samples_per_channel,
            "Opened simulated analog task"
        );

        Ok(Box::new(MockAnalogTask {
            shared: Arc::clone(shared),
            config: config.clone(),
            started_at: None,
            stopped_at: None,
            delivered: 0,
            closed: false,
        }))
    }

    fn open_digital_task(&self, channel: &ChannelAddress) -> Result<Box<dyn DigitalTask>, DeviceError> {
        self.shared.errors.check_operation(&self.shared.name, op::DIGITAL_OPEN)?;
        Ok(Box::new(MockDigitalTask {
            shared: Arc::clone(&self.shared),
            channel: channel.clone(),
        }))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockDeviceBuilder {
    name: String,
    mode: MockMode,
    timing: Option<TimingConfig>,
    digital_readback: bool,
    noise_amplitude: f64,
    errors: ErrorConfig,
    seed: Option<u64>,
}

impl MockDeviceBuilder {
    /// Defaults: `cDAQ1`, instant mode, no readback, no faults.
    pub fn new() -> Self {
        Self {
            name: "cDAQ1".to_string(),
            mode: MockMode::default(),
            timing: None,
            digital_readback: false,
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
            errors: ErrorConfig::none(),
            seed: None,
        }
    }

    /// Chassis name used in channel addresses.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Instant or realistic timing.
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the realistic-mode timing (defaults to [`TimingConfig::compact_daq`]).
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Allow digital tasks to read lines back.
    pub fn digital_readback(mut self, enabled: bool) -> Self {
        self.digital_readback = enabled;
        self
    }

    /// Peak noise added to every sample, in volts.
    pub fn noise_amplitude(mut self, volts: f64) -> Self {
        self.noise_amplitude = volts;
        self
    }

    /// Fault injection for every task the device opens.
    pub fn error_config(mut self, config: ErrorConfig) -> Self {
        self.errors = config;
        self
    }

    /// Seed for the sample noise generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Finish the device.
    pub fn build(self) -> MockDevice {
        let timing = self.timing.unwrap_or(match self.mode {
            MockMode::Instant => TimingConfig::default(),
            MockMode::Realistic => TimingConfig::compact_daq(),
        });
        MockDevice {
            shared: Arc::new(Shared {
                name: self.name,
                mode: self.mode,
                timing,
                digital_readback: self.digital_readback,
                noise_amplitude: self.noise_amplitude,
                errors: self.errors,
                rng: MockRng::new(self.seed),
                journal: Journal::new(),
                lines: Mutex::new(HashMap::new()),
                open_analog: AtomicUsize::new(0),
            }),
        }
    }
}

impl Default for MockDeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tasks
// =============================================================================

struct MockDigitalTask {
    shared: Arc<Shared>,
    channel: ChannelAddress,
}

impl DigitalTask for MockDigitalTask {
    fn write(&mut self, state: bool) -> Result<(), DeviceError> {
        let shared = &self.shared;
        shared.errors.check_write(&shared.name, &self.channel, state)?;
        shared.pause(shared.timing.relay_switch());
        shared.lines.lock().insert(self.channel.clone(), state);
        shared.journal.record(JournalEvent::Write {
            channel: self.channel.clone(),
            state,
        });
        tracing::trace!(channel = %self.channel, state, "Simulated line write");
        Ok(())
    }

    fn read(&mut self) -> Result<bool, DeviceError> {
        let shared = &self.shared;
        if !shared.digital_readback {
            return Err(DeviceError::unsupported(
                &shared.name,
                "Digital output readback is not supported by this device",
            ));
        }
        shared.errors.check_operation(&shared.name, op::DIGITAL_READ)?;
        let state = shared.lines.lock().get(&self.channel).copied().unwrap_or(false);
        shared.journal.record(JournalEvent::Read {
            channel: self.channel.clone(),
            state,
        });
        Ok(state)
    }
}

struct MockAnalogTask {
    shared: Arc<Shared>,
    config: AnalogTaskConfig,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    /// Samples per channel already handed out since start
    delivered: usize,
    closed: bool,
}

impl MockAnalogTask {
    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(self.shared.invalid("Analog task is closed"));
        }
        Ok(())
    }

    /// Samples per channel clocked in since start.
    fn produced(&self, started: Instant) -> usize {
        let end = self.stopped_at.unwrap_or_else(Instant::now);
        let elapsed = end.saturating_duration_since(started).as_secs_f64();
        (elapsed * self.config.sample_rate).floor() as usize
    }
}

impl AnalogTask for MockAnalogTask {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.shared.errors.check_operation(&self.shared.name, op::ANALOG_START)?;
        self.started_at = Some(Instant::now());
        self.stopped_at = None;
        self.delivered = 0;
        self.shared.journal.record(JournalEvent::AnalogStart);
        Ok(())
    }

    fn read(&mut self, count: ReadCount) -> Result<Vec<Vec<f64>>, DeviceError> {
        self.ensure_open()?;
        self.shared.errors.check_operation(&self.shared.name, op::ANALOG_READ)?;
        let started = self
            .started_at
            .ok_or_else(|| self.shared.invalid("Analog task has not been started"))?;
        let buffer = self.config.samples_per_channel;

        let n = match count {
            ReadCount::Samples(n) => {
                if self.config.mode == AcquisitionMode::Finite && self.delivered + n > buffer {
                    return Err(self.shared.invalid(format!(
                        "Requested {} samples but only {} remain in finite acquisition",
                        n,
                        buffer - self.delivered
                    )));
                }
                let ready_at = Duration::from_secs_f64((self.delivered + n) as f64 / self.config.sample_rate);
                let elapsed = started.elapsed();
                if ready_at > elapsed {
                    self.shared.pause(ready_at - elapsed);
                }
                self.delivered += n;
                n
            }
            ReadCount::All => {
                let produced = self.produced(started);
                match self.config.mode {
                    AcquisitionMode::Finite => {
                        let n = produced.min(buffer).saturating_sub(self.delivered);
                        self.delivered += n;
                        n
                    }
                    AcquisitionMode::Continuous => {
                        // Older samples are overwritten once the circular buffer wraps
                        let n = produced.saturating_sub(self.delivered).min(buffer);
                        self.delivered = self.delivered.max(produced);
                        n
                    }
                }
            }
        };

        self.shared.journal.record(JournalEvent::AnalogRead { samples: n });
        Ok(self.shared.samples(n))
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.shared.errors.check_operation(&self.shared.name, op::ANALOG_STOP)?;
        if self.started_at.is_some() && self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
        self.shared.journal.record(JournalEvent::AnalogStop);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        let result = self.shared.errors.check_operation(&self.shared.name, op::ANALOG_CLOSE);
        // Resources are released even when the driver reports an error
        self.closed = true;
        self.shared.open_analog.fetch_sub(1, Ordering::SeqCst);
        self.shared.journal.record(JournalEvent::AnalogClose);
        result
    }
}

impl Drop for MockAnalogTask {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(device = %self.shared.name, "Simulated analog task dropped without close");
        }
    }
}

// =============================================================================
// Delay
// =============================================================================

/// Settle delay that records into the device journal.
///
/// Sleeps only in [`MockMode::Realistic`].
#[derive(Debug, Clone)]
pub struct MockDelay {
    journal: Journal,
    mode: MockMode,
}

impl Delay for MockDelay {
    fn delay(&self, duration: Duration) {
        self.journal.record(JournalEvent::Settle(duration));
        if self.mode.is_realistic() {
            std::thread::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorScenario;

    fn finite(samples: usize, rate: f64) -> AnalogTaskConfig {
        AnalogTaskConfig {
            channels: ChannelAddress::new("cDAQ1Mod1/ai0:3"),
            sample_rate: rate,
            mode: AcquisitionMode::Finite,
            samples_per_channel: samples,
        }
    }

    #[test]
    fn test_digital_write_updates_line_and_journal() {
        let device = MockDevice::new("cDAQ1");
        let line = ChannelAddress::new("cDAQ1Mod2/port0/line0");
        let mut task = device.open_digital_task(&line).unwrap();
        task.write(true).unwrap();

        assert_eq!(device.line_state(&line), Some(true));
        assert_eq!(device.journal().writes(), vec![(line, true)]);
    }

    #[test]
    fn test_readback_unsupported_by_default() {
        let device = MockDevice::new("cDAQ1");
        let mut task = device.open_digital_task(&ChannelAddress::new("x")).unwrap();
        let err = task.read().unwrap_err();
        assert!(err.is_unsupported());
        assert!(!device.supports_digital_readback());
    }

    #[test]
    fn test_readback_reflects_external_change() {
        let device = MockDevice::builder().digital_readback(true).build();
        let line = ChannelAddress::new("cDAQ1Mod5/port0/line2");
        device.set_line(line.clone(), true);
        let mut task = device.open_digital_task(&line).unwrap();
        assert!(task.read().unwrap());
    }

    #[test]
    fn test_injected_write_failure_leaves_line_untouched() {
        let line = ChannelAddress::new("cDAQ1Mod5/port0/line4");
        let device = MockDevice::builder()
            .error_config(ErrorConfig::scenario(ErrorScenario::FailOnWrite {
                channel: line.clone(),
                state: true,
            }))
            .build();
        let mut task = device.open_digital_task(&line).unwrap();
        assert!(task.write(true).is_err());
        assert_eq!(device.line_state(&line), None);
        assert!(device.journal().writes().is_empty());
    }

    #[test]
    fn test_finite_read_returns_requested_samples() {
        let device = MockDevice::builder().seed(1).build();
        let mut task = device.open_analog_task(&finite(10, 1000.0)).unwrap();
        task.start().unwrap();
        let data = task.read(ReadCount::Samples(10)).unwrap();
        assert_eq!(data.len(), ADC_CHANNELS);
        assert!(data.iter().all(|c| c.len() == 10));
        assert!(data.iter().flatten().all(|v| v.abs() <= DEFAULT_NOISE_AMPLITUDE));

        assert!(task.read(ReadCount::Samples(1)).is_err());
        task.close().unwrap();
    }

    #[test]
    fn test_read_before_start_fails() {
        let device = MockDevice::new("cDAQ1");
        let mut task = device.open_analog_task(&finite(10, 100.0)).unwrap();
        let err = task.read(ReadCount::Samples(1)).unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::InvalidParameter);
        task.close().unwrap();
    }

    #[test]
    fn test_continuous_drain_is_capped_at_buffer() {
        let device = MockDevice::new("cDAQ1");
        let config = AnalogTaskConfig {
            mode: AcquisitionMode::Continuous,
            ..finite(5, 10_000.0)
        };
        let mut task = device.open_analog_task(&config).unwrap();
        task.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let data = task.read(ReadCount::All).unwrap();
        assert!(data.iter().all(|c| c.len() == 5));

        task.stop().unwrap();
        task.close().unwrap();
    }

    #[test]
    fn test_open_task_accounting() {
        let device = MockDevice::new("cDAQ1");
        let mut task = device.open_analog_task(&finite(10, 100.0)).unwrap();
        assert_eq!(device.open_analog_tasks(), 1);
        task.close().unwrap();
        assert_eq!(device.open_analog_tasks(), 0);
        assert!(task.close().is_err());
        assert_eq!(device.open_analog_tasks(), 0);
    }

    #[test]
    fn test_invalid_task_config_rejected() {
        let device = MockDevice::new("cDAQ1");
        assert!(device.open_analog_task(&finite(0, 100.0)).is_err());
        assert!(device.open_analog_task(&finite(10, 0.0)).is_err());
        assert!(device.open_analog_task(&finite(10, f64::NAN)).is_err());
        assert_eq!(device.open_analog_tasks(), 0);
    }

    #[test]
    fn test_delay_records_without_sleeping() {
        let device = MockDevice::new("cDAQ1");
        let started = Instant::now();
        device.delay().delay(Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(device.journal().settles(), vec![Duration::from_secs(5)]);
    }
}
