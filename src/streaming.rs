//! Live streaming of small finite reads.
//!
//! [`StreamLoop`] is transport-agnostic: a connection handler feeds it
//! [`StreamCommand`]s over one mpsc channel and forwards the
//! [`StreamEvent`]s it emits on another. The loop is cooperative. It polls
//! for a command, performs one fixed-size finite read on the blocking pool
//! while streaming, then sleeps for the interval. One loop serves one
//! connection.
//!
//! Reads go through the rig's [`SessionManager`], so a stream read while a
//! continuous session is active reports `AlreadyRunning` as an error event.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rc_core::device::ChannelData;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::acquisition::SessionManager;
use crate::config::{AcquisitionSettings, StreamingSettings};
use crate::requests::check_rate;

/// Command from the client side of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamCommand {
    /// Begin (or retune) streaming
    Start {
        /// Sample clock rate in Hz
        #[serde(default)]
        sample_rate: Option<f64>,
        /// Pause between reads in milliseconds
        #[serde(default)]
        interval_ms: Option<u64>,
    },
    /// Stop streaming, keep the connection
    Stop,
}

/// Event emitted by the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// First event of every connection
    Connected {
        /// Chassis name
        device: String,
    },
    /// Reply to a command
    Status {
        /// Whether reads are running
        streaming: bool,
        /// Active rate while streaming
        #[serde(skip_serializing_if = "Option::is_none")]
        sample_rate: Option<f64>,
    },
    /// One streaming read
    Data {
        /// When the read finished
        timestamp: DateTime<Utc>,
        /// Samples flattened into `adc1..adc4`
        #[serde(flatten)]
        data: ChannelData,
    },
    /// Rejected command or failed read
    Error {
        /// Human-readable cause
        message: String,
    },
}

#[derive(Debug, Clone, Copy)]
struct Active {
    sample_rate: f64,
    interval: Duration,
}

/// Command-driven read loop serving one connection.
pub struct StreamLoop {
    sessions: Arc<SessionManager>,
    acquisition: AcquisitionSettings,
    settings: StreamingSettings,
}

impl StreamLoop {
    /// Loop reading through `sessions`.
    pub fn new(
        sessions: Arc<SessionManager>,
        acquisition: AcquisitionSettings,
        settings: StreamingSettings,
    ) -> Self {
        Self {
            sessions,
            acquisition,
            settings,
        }
    }

    /// Serve one connection until the command channel closes or the event
    /// receiver is dropped.
    pub async fn run(self, mut commands: mpsc::Receiver<StreamCommand>, events: mpsc::Sender<StreamEvent>) {
        let connected = StreamEvent::Connected {
            device: self.sessions.device().name().to_string(),
        };
        if events.send(connected).await.is_err() {
            return;
        }

        let mut active: Option<Active> = None;
        loop {
            if events.is_closed() {
                debug!("Stream event receiver dropped");
                break;
            }

            let poll = if active.is_some() {
                self.settings.command_poll()
            } else {
                self.settings.idle_poll()
            };
            match timeout(poll, commands.recv()).await {
                Ok(Some(command)) => {
                    let reply = self.apply(command, &mut active);
                    if events.send(reply).await.is_err() {
                        break;
                    }
                    continue;
                }
                Ok(None) => {
                    debug!("Stream command channel closed");
                    break;
                }
                Err(_elapsed) => {}
            }

            let Some(current) = active else {
                continue;
            };
            let event = match self.read_once(current.sample_rate).await {
                Ok(event) => event,
                Err(message) => {
                    warn!(error = %message, "Streaming read failed, stream stopped");
                    active = None;
                    StreamEvent::Error { message }
                }
            };
            if events.send(event).await.is_err() {
                break;
            }
            if active.is_some() {
                sleep(current.interval).await;
            }
        }
        info!("Stream loop ended");
    }

    fn apply(&self, command: StreamCommand, active: &mut Option<Active>) -> StreamEvent {
        match command {
            StreamCommand::Start {
                sample_rate,
                interval_ms,
            } => {
                let sample_rate = sample_rate.unwrap_or(self.acquisition.default_sample_rate);
                if let Err(err) = check_rate(sample_rate, &self.acquisition) {
                    return StreamEvent::Error {
                        message: err.to_string(),
                    };
                }
                let interval = interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| self.settings.default_interval());
                *active = Some(Active {
                    sample_rate,
                    interval,
                });
                info!(rate = sample_rate, interval_ms = interval.as_millis() as u64, "Streaming started");
                StreamEvent::Status {
                    streaming: true,
                    sample_rate: Some(sample_rate),
                }
            }
            StreamCommand::Stop => {
                if active.take().is_some() {
                    info!("Streaming stopped");
                }
                StreamEvent::Status {
                    streaming: false,
                    sample_rate: None,
                }
            }
        }
    }

    async fn read_once(&self, sample_rate: f64) -> Result<StreamEvent, String> {
        let sessions = Arc::clone(&self.sessions);
        let samples = self.settings.samples_per_read;
        let joined = tokio::task::spawn_blocking(move || sessions.read_finite(samples, sample_rate)).await;
        match joined {
            Ok(Ok(result)) => Ok(StreamEvent::Data {
                timestamp: result.timestamp,
                data: result.data,
            }),
            Ok(Err(err)) => Err(err.to_string()),
            Err(join_err) => Err(format!("Streaming read task failed: {}", join_err)),
        }
    }
}

impl std::fmt::Debug for StreamLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLoop")
            .field("device", &self.sessions.device().name())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_driver_mock::{op, ErrorConfig, ErrorScenario, MockDevice};

    const WAIT: Duration = Duration::from_secs(5);

    fn spawn(
        device: MockDevice,
    ) -> (
        mpsc::Sender<StreamCommand>,
        mpsc::Receiver<StreamEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        spawn_with(Arc::new(SessionManager::new(Arc::new(device))))
    }

    fn spawn_with(
        sessions: Arc<SessionManager>,
    ) -> (
        mpsc::Sender<StreamCommand>,
        mpsc::Receiver<StreamEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);
        let stream = StreamLoop::new(
            sessions,
            AcquisitionSettings::default(),
            StreamingSettings::default(),
        );
        let handle = tokio::spawn(stream.run(command_rx, event_tx));
        (command_tx, event_rx, handle)
    }

    async fn next(events: &mut mpsc::Receiver<StreamEvent>) -> StreamEvent {
        timeout(WAIT, events.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_stream_start_data_stop() {
        let (commands, mut events, handle) = spawn(MockDevice::new("cDAQ1"));
        assert_eq!(
            next(&mut events).await,
            StreamEvent::Connected {
                device: "cDAQ1".into()
            }
        );

        commands
            .send(StreamCommand::Start {
                sample_rate: Some(1000.0),
                interval_ms: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(
            next(&mut events).await,
            StreamEvent::Status {
                streaming: true,
                sample_rate: Some(1000.0)
            }
        );
        match next(&mut events).await {
            StreamEvent::Data { data, .. } => {
                assert_eq!(data.len(), 10);
                assert!(data.channels().iter().all(|c| c.len() == 10));
            }
            other => panic!("expected data, got {:?}", other),
        }

        commands.send(StreamCommand::Stop).await.unwrap();
        loop {
            match next(&mut events).await {
                StreamEvent::Data { .. } => continue,
                event => {
                    assert_eq!(
                        event,
                        StreamEvent::Status {
                            streaming: false,
                            sample_rate: None
                        }
                    );
                    break;
                }
            }
        }

        drop(commands);
        timeout(WAIT, handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_read_error_returns_to_idle() {
        let device = MockDevice::builder()
            .error_config(ErrorConfig::scenario(ErrorScenario::FailAfterN {
                operation: op::ANALOG_READ,
                count: 0,
            }))
            .build();
        let (commands, mut events, handle) = spawn(device.clone());
        next(&mut events).await;

        commands
            .send(StreamCommand::Start {
                sample_rate: None,
                interval_ms: None,
            })
            .await
            .unwrap();
        assert!(matches!(next(&mut events).await, StreamEvent::Status { streaming: true, .. }));
        assert!(matches!(next(&mut events).await, StreamEvent::Error { .. }));
        assert_eq!(device.open_analog_tasks(), 0);

        drop(commands);
        timeout(WAIT, handle).await.unwrap().unwrap();
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_read_refused_while_session_active() {
        let device = MockDevice::new("cDAQ1");
        let sessions = Arc::new(SessionManager::new(Arc::new(device.clone())));
        sessions.start(1000, 100.0).unwrap();

        let (commands, mut events, handle) = spawn_with(Arc::clone(&sessions));
        next(&mut events).await;
        commands
            .send(StreamCommand::Start {
                sample_rate: Some(1000.0),
                interval_ms: Some(1),
            })
            .await
            .unwrap();
        assert!(matches!(next(&mut events).await, StreamEvent::Status { streaming: true, .. }));
        match next(&mut events).await {
            StreamEvent::Error { message } => assert!(message.contains("already running"), "{}", message),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(device.open_analog_tasks(), 1);

        drop(commands);
        timeout(WAIT, handle).await.unwrap().unwrap();
        sessions.stop().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_rate_rejected() {
        let (commands, mut events, _handle) = spawn(MockDevice::new("cDAQ1"));
        next(&mut events).await;
        commands
            .send(StreamCommand::Start {
                sample_rate: Some(0.0),
                interval_ms: None,
            })
            .await
            .unwrap();
        assert!(matches!(next(&mut events).await, StreamEvent::Error { .. }));
    }

    #[test]
    fn test_command_wire_format() {
        let command: StreamCommand =
            serde_json::from_str(r#"{"type":"start","sample_rate":500.0,"interval_ms":50}"#).unwrap();
        assert_eq!(
            command,
            StreamCommand::Start {
                sample_rate: Some(500.0),
                interval_ms: Some(50)
            }
        );
        let stop: StreamCommand = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
        assert_eq!(stop, StreamCommand::Stop);

        let json = serde_json::to_value(StreamEvent::Status {
            streaming: false,
            sample_rate: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "status", "streaming": false}));
    }
}
