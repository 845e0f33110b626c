//! Single-flight continuous acquisition sessions.
//!
//! The manager is either Idle or Active. `start` opens a continuous analog
//! task over the four ADC inputs and moves to Active; `stop` drains the
//! buffer, tears the task down and always returns to Idle, even when the
//! drain read fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rc_core::device::{AcquisitionMode, AnalogTaskConfig, ChannelData, Device, ReadCount, ADC_CHANNELS};
use rc_core::error::{RigError, RigResult};
use rc_core::relay::RelayMap;
use serde::Serialize;
use tracing::{info, warn};

use super::finite::read_finite;
use super::task::TaskGuard;
use super::AcquisitionResult;

/// Configuration of the active session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    /// Buffer size per channel
    pub samples_per_channel: usize,
    /// Sample clock rate in Hz
    pub sample_rate: f64,
    /// Always four
    pub channel_count: usize,
    /// When the task was started
    pub started_at: DateTime<Utc>,
}

struct Session {
    config: SessionConfig,
    task: TaskGuard,
}

/// Owner of the one analog acquisition a chassis can run at a time.
///
/// Continuous sessions and finite reads share one lock, so neither can open a
/// task while a continuous session is active.
pub struct SessionManager {
    device: Arc<dyn Device>,
    map: RelayMap,
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    /// Idle manager for `device`.
    pub fn new(device: Arc<dyn Device>) -> Self {
        let map = RelayMap::new(device.name());
        Self {
            device,
            map,
            session: Mutex::new(None),
        }
    }

    /// Open and start a continuous acquisition.
    ///
    /// Fails with [`RigError::AlreadyRunning`] if a session is active. If the
    /// task opens but fails to start it is closed again before returning.
    pub fn start(&self, samples_per_channel: usize, sample_rate: f64) -> RigResult<SessionConfig> {
        let mut slot = self.session.lock();
        if slot.is_some() {
            return Err(RigError::AlreadyRunning);
        }

        let task_config = AnalogTaskConfig {
            channels: self.map.analog_inputs(),
            sample_rate,
            mode: AcquisitionMode::Continuous,
            samples_per_channel,
        };
        let mut task = TaskGuard::open(self.device.as_ref(), &task_config)?;
        task.start()?;

        let config = SessionConfig {
            samples_per_channel,
            sample_rate,
            channel_count: ADC_CHANNELS,
            started_at: Utc::now(),
        };
        info!(
            samples = samples_per_channel,
            rate = sample_rate,
            channels = %task_config.channels,
            "Continuous acquisition started"
        );
        *slot = Some(Session {
            config: config.clone(),
            task,
        });
        Ok(config)
    }

    /// Drain everything acquired so far and end the session.
    ///
    /// The task is stopped and closed and the manager returns to Idle before
    /// any read error is propagated.
    pub fn stop(&self) -> RigResult<AcquisitionResult> {
        let mut slot = self.session.lock();
        let Session { config, mut task } = slot.take().ok_or(RigError::NotRunning)?;

        let drained = task.read(ReadCount::All);
        let released = task.release();

        if let Err(err) = &released {
            warn!(error = %err, "Analog task teardown reported an error");
        }
        let data: ChannelData = match drained {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "Drain read failed, session closed");
                return Err(err);
            }
        };

        info!(samples = data.len(), "Continuous acquisition stopped");
        Ok(AcquisitionResult::new(config.sample_rate, config.samples_per_channel, data))
    }

    /// One-shot finite read over the four ADC inputs.
    ///
    /// Fails with [`RigError::AlreadyRunning`] while a continuous session
    /// owns the channels. The session lock is held for the whole read, so a
    /// concurrent `start` waits until the finite task is closed.
    pub fn read_finite(&self, samples: usize, sample_rate: f64) -> RigResult<AcquisitionResult> {
        let slot = self.session.lock();
        if slot.is_some() {
            return Err(RigError::AlreadyRunning);
        }
        read_finite(self.device.as_ref(), &self.map, samples, sample_rate)
    }

    /// Device the sessions run on.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Whether a continuous session is active.
    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Configuration of the active session, if any.
    pub fn active_config(&self) -> Option<SessionConfig> {
        self.session.lock().as_ref().map(|s| s.config.clone())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("device", &self.device.name())
            .field("running", &self.is_running())
            .finish()
    }
}
