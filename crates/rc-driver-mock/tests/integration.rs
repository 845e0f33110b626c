//! Integration tests for the simulated chassis through the capability traits only.

use std::sync::Arc;

use rc_core::device::{AcquisitionMode, AnalogTaskConfig, Device, ReadCount};
use rc_core::relay::{Relay, RelayMap};
use rc_driver_mock::*;

#[test]
fn test_device_usable_as_trait_object() {
    let mock = MockDevice::builder().name("cDAQ9").digital_readback(true).build();
    let device: Arc<dyn Device> = Arc::new(mock.clone());
    assert_eq!(device.name(), "cDAQ9");
    assert!(device.supports_digital_readback());

    let map = RelayMap::new(device.name());
    let line = map.resolve(Relay::GROUND);
    let mut task = device.open_digital_task(&line).unwrap();
    task.write(true).unwrap();
    assert!(task.read().unwrap());
    assert_eq!(mock.line_state(&line), Some(true));
}

#[test]
fn test_journal_records_analog_lifecycle() {
    let mock = MockDevice::new("cDAQ1");
    let config = AnalogTaskConfig {
        channels: RelayMap::new("cDAQ1").analog_inputs(),
        sample_rate: 100.0,
        mode: AcquisitionMode::Finite,
        samples_per_channel: 20,
    };
    let mut task = mock.open_analog_task(&config).unwrap();
    task.start().unwrap();
    task.read(ReadCount::Samples(20)).unwrap();
    task.stop().unwrap();
    task.close().unwrap();

    assert_eq!(
        mock.journal().analog_events(),
        vec![
            JournalEvent::AnalogOpen {
                mode: AcquisitionMode::Finite,
                sample_rate: 100.0,
                samples_per_channel: 20,
            },
            JournalEvent::AnalogStart,
            JournalEvent::AnalogRead { samples: 20 },
            JournalEvent::AnalogStop,
            JournalEvent::AnalogClose,
        ]
    );
}

#[test]
fn test_seeded_devices_produce_identical_samples() {
    let config = AnalogTaskConfig {
        channels: RelayMap::new("cDAQ1").analog_inputs(),
        sample_rate: 1000.0,
        mode: AcquisitionMode::Finite,
        samples_per_channel: 8,
    };
    let read = |seed: u64| {
        let device = MockDevice::builder().seed(seed).build();
        let mut task = device.open_analog_task(&config).unwrap();
        task.start().unwrap();
        let data = task.read(ReadCount::Samples(8)).unwrap();
        task.close().unwrap();
        data
    };
    assert_eq!(read(12345), read(12345));
}

#[test]
fn test_communication_loss_fails_everything() {
    let device = MockDevice::builder()
        .error_config(ErrorConfig::scenario(ErrorScenario::CommunicationLoss))
        .build();
    let line = RelayMap::new("cDAQ1").resolve(Relay::MAIN_POWER);
    assert!(device.open_digital_task(&line).is_err());
    assert!(device.open_digital_task(&line).is_err());
}

#[test]
fn test_realistic_finite_read_waits_for_clock() {
    let device = MockDevice::builder().mode(MockMode::Realistic).build();
    let config = AnalogTaskConfig {
        channels: RelayMap::new("cDAQ1").analog_inputs(),
        sample_rate: 1000.0,
        mode: AcquisitionMode::Finite,
        samples_per_channel: 50,
    };
    let mut task = device.open_analog_task(&config).unwrap();
    let started = std::time::Instant::now();
    task.start().unwrap();
    task.read(ReadCount::Samples(50)).unwrap();
    assert!(started.elapsed() >= std::time::Duration::from_millis(45));
    task.close().unwrap();
}
