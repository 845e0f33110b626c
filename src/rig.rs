//! Rig facade wiring the relay gateway, sequencer and acquisition sessions.

use std::sync::Arc;

use rc_core::circuit::Capacitor;
use rc_core::device::{Delay, Device};
use rc_core::error::RigResult;
use rc_driver_mock::MockDevice;
use tracing::info;

use crate::acquisition::{read_with_charging, AcquisitionResult, SessionConfig, SessionManager};
use crate::config::Settings;
use crate::gateway::RelayGateway;
use crate::requests::{DischargePlan, DischargeRequest, FiniteReadRequest, StartRequest};
use crate::sequencer::Sequencer;
use crate::streaming::StreamLoop;

/// One DAQ chassis with its relay gateway, sequencer and session manager.
///
/// All components share the same device handle, so relay state and the
/// active acquisition session are owned in exactly one place.
pub struct Rig {
    settings: Settings,
    device: Arc<dyn Device>,
    gateway: Arc<RelayGateway>,
    sequencer: Sequencer,
    sessions: Arc<SessionManager>,
}

impl Rig {
    /// Wire a rig over `device`, sleeping settle delays through `delay`.
    pub fn new(settings: Settings, device: Arc<dyn Device>, delay: Arc<dyn Delay>) -> Self {
        let gateway = Arc::new(RelayGateway::new(Arc::clone(&device)));
        let sequencer = Sequencer::new(Arc::clone(&gateway), delay, settings.sequencer.clone());
        let sessions = Arc::new(SessionManager::new(Arc::clone(&device)));
        Self {
            settings,
            device,
            gateway,
            sequencer,
            sessions,
        }
    }

    /// Build a rig over the simulated chassis described by `settings.device`.
    pub fn simulated(settings: Settings) -> Self {
        let mut builder = MockDevice::builder()
            .name(settings.device.name.clone())
            .mode(settings.device.mode)
            .digital_readback(settings.device.digital_readback);
        if let Some(seed) = settings.device.seed {
            builder = builder.seed(seed);
        }
        let device = builder.build();
        info!(
            device = %settings.device.name,
            mode = ?settings.device.mode,
            readback = settings.device.digital_readback,
            "Simulated chassis ready"
        );
        let delay = Arc::new(device.delay());
        Self::new(settings, Arc::new(device), delay)
    }

    /// Settings the rig was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Shared device handle.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Relay gateway.
    pub fn gateway(&self) -> &Arc<RelayGateway> {
        &self.gateway
    }

    /// Charge/discharge sequencer.
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Acquisition session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Charge the capacitor with code `capacitor`, leaving it charging.
    pub fn charge(&self, capacitor: &str) -> RigResult<()> {
        let capacitor: Capacitor = capacitor.parse()?;
        self.sequencer.charge(capacitor)
    }

    /// Turn main power and R2 OFF after [`Rig::charge`].
    pub fn release(&self) -> RigResult<()> {
        self.sequencer.release_charge()
    }

    /// Validate `request` and run the discharge sequence.
    pub fn discharge(&self, request: &DischargeRequest) -> RigResult<DischargePlan> {
        let plan = request.resolve(&self.settings.sequencer)?;
        self.sequencer
            .discharge(plan.capacitor, plan.resistor, plan.duration)?;
        Ok(plan)
    }

    /// One-shot finite read, charging first when the request names a capacitor.
    ///
    /// Fails with `AlreadyRunning` while a continuous session is active.
    pub fn read(&self, request: &FiniteReadRequest) -> RigResult<AcquisitionResult> {
        let plan = request.resolve(&self.settings.acquisition)?;
        match plan.charge {
            Some(capacitor) => read_with_charging(
                &self.sequencer,
                &self.sessions,
                capacitor,
                plan.samples,
                plan.sample_rate,
            ),
            None => self.sessions.read_finite(plan.samples, plan.sample_rate),
        }
    }

    /// Validate `request` and start a continuous session.
    pub fn start(&self, request: &StartRequest) -> RigResult<SessionConfig> {
        let plan = request.resolve(&self.settings.acquisition)?;
        self.sessions.start(plan.buffer_size, plan.sample_rate)
    }

    /// Stop the continuous session and return its buffered data.
    pub fn stop(&self) -> RigResult<AcquisitionResult> {
        self.sessions.stop()
    }

    /// A streaming loop over this rig's device.
    pub fn stream_loop(&self) -> StreamLoop {
        StreamLoop::new(
            Arc::clone(&self.sessions),
            self.settings.acquisition.clone(),
            self.settings.streaming.clone(),
        )
    }
}

impl std::fmt::Debug for Rig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rig")
            .field("device", &self.device.name())
            .field("gateway", &self.gateway)
            .field("sessions", &self.sessions)
            .finish()
    }
}
