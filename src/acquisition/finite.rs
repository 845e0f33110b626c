//! One-shot finite reads.

use rc_core::circuit::Capacitor;
use rc_core::device::{AcquisitionMode, AnalogTaskConfig, Device, ReadCount};
use rc_core::error::{RigError, RigResult};
use rc_core::relay::RelayMap;
use tracing::{debug, warn};

use super::session::SessionManager;
use super::task::TaskGuard;
use super::AcquisitionResult;
use crate::sequencer::{SafeOffGuard, Sequencer};

/// Acquire exactly `samples` per channel at `sample_rate` and close the task.
///
/// Blocks until the samples are captured. Only [`SessionManager::read_finite`]
/// calls this, under the session lock.
pub(crate) fn read_finite(device: &dyn Device, map: &RelayMap, samples: usize, sample_rate: f64) -> RigResult<AcquisitionResult> {
    let config = AnalogTaskConfig {
        channels: map.analog_inputs(),
        sample_rate,
        mode: AcquisitionMode::Finite,
        samples_per_channel: samples,
    };
    let mut task = TaskGuard::open(device, &config)?;
    task.start()?;
    let data = task.read(ReadCount::Samples(samples))?;
    if let Err(err) = task.release() {
        warn!(error = %err, "Finite read teardown reported an error");
    }
    debug!(samples, rate = sample_rate, "Finite read complete");
    Ok(AcquisitionResult::new(sample_rate, samples, data))
}

/// Charge `capacitor`, then read through `sessions`.
///
/// Refuses to touch any relay while a continuous session is active. Main
/// power and R2 are forced OFF afterwards whether the charge, the read, or
/// neither failed.
pub fn read_with_charging(
    sequencer: &Sequencer,
    sessions: &SessionManager,
    capacitor: Capacitor,
    samples: usize,
    sample_rate: f64,
) -> RigResult<AcquisitionResult> {
    if sessions.is_running() {
        return Err(RigError::AlreadyRunning);
    }
    let _safe_off = SafeOffGuard::arm(sequencer);
    sequencer.charge_quietly(capacitor)?;
    sessions.read_finite(samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rc_core::relay::Relay;
    use rc_driver_mock::{op, ErrorConfig, ErrorScenario, MockDevice};

    use crate::config::SequencerSettings;
    use crate::gateway::RelayGateway;

    fn sequencer(device: &MockDevice) -> Sequencer {
        let gateway = Arc::new(RelayGateway::new(Arc::new(device.clone())));
        Sequencer::new(gateway, Arc::new(device.delay()), SequencerSettings::default())
    }

    fn sessions(device: &MockDevice) -> SessionManager {
        SessionManager::new(Arc::new(device.clone()))
    }

    #[test]
    fn test_read_finite_returns_all_channels() {
        let device = MockDevice::builder().seed(3).build();
        let result = read_finite(&device, &RelayMap::new("cDAQ1"), 100, 1000.0).unwrap();
        assert_eq!(result.samples_per_channel, 100);
        assert!(result.data.channels().iter().all(|c| c.len() == 100));
        assert_eq!(device.open_analog_tasks(), 0);
    }

    #[test]
    fn test_read_with_charging_turns_power_off() {
        let device = MockDevice::new("cDAQ1");
        let seq = sequencer(&device);
        let result = read_with_charging(&seq, &sessions(&device), Capacitor::Cs2, 50, 500.0).unwrap();
        assert_eq!(result.data.len(), 50);

        let gw = seq.gateway();
        assert!(!gw.state(Relay::MAIN_POWER).unwrap());
        assert!(!gw.state(Relay::R2).unwrap());
        let writes = device.journal().writes();
        let last_two: Vec<_> = writes[writes.len() - 2..].to_vec();
        assert_eq!(
            last_two,
            vec![
                (gw.map().resolve(Relay::MAIN_POWER), false),
                (gw.map().resolve(Relay::R2), false),
            ]
        );
    }

    #[test]
    fn test_read_failure_still_turns_power_off() {
        let device = MockDevice::builder()
            .error_config(ErrorConfig::scenario(ErrorScenario::FailAfterN {
                operation: op::ANALOG_READ,
                count: 0,
            }))
            .build();
        let seq = sequencer(&device);
        let err = read_with_charging(&seq, &sessions(&device), Capacitor::Cs1, 50, 500.0).unwrap_err();
        assert!(matches!(err, RigError::HardwareIo(_)));
        assert!(!seq.gateway().state(Relay::MAIN_POWER).unwrap());
        assert!(!seq.gateway().state(Relay::R2).unwrap());
        assert_eq!(device.open_analog_tasks(), 0);
    }

    #[test]
    fn test_charging_read_refused_while_session_active() {
        let device = MockDevice::new("cDAQ1");
        let seq = sequencer(&device);
        let sessions = sessions(&device);
        sessions.start(1000, 100.0).unwrap();

        let err = read_with_charging(&seq, &sessions, Capacitor::Cs3, 50, 500.0).unwrap_err();
        assert_eq!(err, RigError::AlreadyRunning);
        assert!(device.journal().writes().is_empty());
        assert_eq!(device.open_analog_tasks(), 1);
        sessions.stop().unwrap();
    }
}
