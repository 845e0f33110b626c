//! Acquisition sessions, finite reads and streaming against the simulated chassis.

use std::sync::Arc;
use std::time::Duration;

use rc_core::error::{ErrorClass, RigError};
use rc_daq::config::Settings;
use rc_daq::requests::{FiniteReadRequest, StartRequest};
use rc_daq::rig::Rig;
use rc_daq::streaming::{StreamCommand, StreamEvent};
use rc_driver_mock::MockDevice;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn rig_with(device: &MockDevice) -> Rig {
    Rig::new(Settings::default(), Arc::new(device.clone()), Arc::new(device.delay()))
}

#[test]
fn session_start_stop_round() {
    let device = MockDevice::new("cDAQ1");
    let rig = rig_with(&device);

    let config = rig
        .start(&StartRequest {
            samples: Some(1000),
            sample_rate: Some(100.0),
            measurement_time: None,
        })
        .unwrap();
    assert_eq!(config.samples_per_channel, 1000);

    let err = rig.start(&StartRequest::default()).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Conflict);

    let result = rig.stop().unwrap();
    let lengths: Vec<usize> = result.data.channels().iter().map(|c| c.len()).collect();
    assert!(lengths.iter().all(|len| *len == lengths[0] && *len <= 1000));
    assert_eq!(device.open_analog_tasks(), 0);

    assert_eq!(rig.stop().unwrap_err(), RigError::NotRunning);
}

#[test]
fn short_window_keeps_requested_samples() {
    let device = MockDevice::new("cDAQ1");
    let rig = rig_with(&device);
    let config = rig
        .start(&StartRequest {
            samples: Some(500),
            sample_rate: Some(100.0),
            measurement_time: Some(2.0),
        })
        .unwrap();
    assert_eq!(config.samples_per_channel, 500);
    rig.stop().unwrap();
}

#[test]
fn finite_read_json_shape() {
    let device = MockDevice::new("cDAQ1");
    let rig = rig_with(&device);
    let result = rig
        .read(&FiniteReadRequest {
            samples: Some(100),
            sample_rate: Some(1000.0),
            charge: None,
        })
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    for key in ["adc1", "adc2", "adc3", "adc4"] {
        assert_eq!(json[key].as_array().map(Vec::len), Some(100));
    }
    assert_eq!(json["channel_count"], 4);
    assert!(device.journal().writes().is_empty());
}

#[test]
fn finite_reads_wait_for_session_stop() {
    let device = MockDevice::new("cDAQ1");
    let rig = rig_with(&device);
    rig.start(&StartRequest {
        samples: Some(1000),
        sample_rate: Some(100.0),
        measurement_time: None,
    })
    .unwrap();

    let plain = FiniteReadRequest {
        samples: Some(50),
        sample_rate: Some(1000.0),
        charge: None,
    };
    let charging = FiniteReadRequest {
        charge: Some("cs1".into()),
        ..plain.clone()
    };
    assert_eq!(rig.read(&plain).unwrap_err().class(), ErrorClass::Conflict);
    assert_eq!(rig.read(&charging).unwrap_err(), RigError::AlreadyRunning);
    // Refused before any relay moved
    assert!(device.journal().writes().is_empty());
    assert_eq!(device.open_analog_tasks(), 1);

    rig.stop().unwrap();
    assert_eq!(rig.read(&charging).unwrap().data.len(), 50);
}

#[test]
fn invalid_read_is_a_client_error() {
    let rig = rig_with(&MockDevice::new("cDAQ1"));
    let err = rig
        .read(&FiniteReadRequest {
            samples: Some(1_000_000),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Client);
}

#[tokio::test]
async fn stream_emits_data_until_channel_closes() {
    let rig = rig_with(&MockDevice::new("cDAQ1"));
    let (command_tx, command_rx) = mpsc::channel(4);
    let (event_tx, mut event_rx) = mpsc::channel(16);
    let handle = tokio::spawn(rig.stream_loop().run(command_rx, event_tx));

    let wait = Duration::from_secs(5);
    assert!(matches!(
        timeout(wait, event_rx.recv()).await.unwrap(),
        Some(StreamEvent::Connected { .. })
    ));

    command_tx
        .send(StreamCommand::Start {
            sample_rate: Some(500.0),
            interval_ms: Some(1),
        })
        .await
        .unwrap();

    let mut data_events = 0;
    while data_events < 3 {
        match timeout(wait, event_rx.recv()).await.unwrap() {
            Some(StreamEvent::Data { data, .. }) => {
                assert_eq!(data.len(), 10);
                data_events += 1;
            }
            Some(StreamEvent::Status { streaming, .. }) => assert!(streaming),
            other => panic!("unexpected event {:?}", other),
        }
    }

    drop(command_tx);
    timeout(wait, handle).await.unwrap().unwrap();
}
