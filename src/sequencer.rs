//! Charge and discharge relay sequences.
//!
//! A [`Sequence`] is an ordered list of [`Step`]s, each a relay write with an
//! optional settle delay after it. The [`Sequencer`] executes steps strictly in
//! order through the [`RelayGateway`]; the first failed write aborts the
//! remaining steps and the error is returned as-is. Nothing is rolled back.
//!
//! ## Charge
//!
//! Connects the capacitor through the discharge path first, waits for it to
//! bleed down, then switches to the charging resistor R2 and turns main
//! power ON. The sequence ends with main power and R2 ON: either
//! [`Sequencer::release_charge`] or a [`SafeOffGuard`] turns them off again.
//!
//! ## Discharge
//!
//! Connects capacitor and discharge resistor, holds for the requested
//! duration and unwinds every relay it touched back to OFF.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rc_core::circuit::{Capacitor, DischargeResistor};
use rc_core::device::Delay;
use rc_core::error::RigResult;
use rc_core::relay::Relay;
use tracing::{debug, info, warn};

use crate::config::SequencerSettings;
use crate::gateway::RelayGateway;

/// One relay transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Relay to switch
    pub relay: Relay,
    /// Target state
    pub on: bool,
    /// Wait after the write completes
    pub settle_after: Option<Duration>,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.relay, if self.on { "ON" } else { "OFF" })?;
        if let Some(settle) = self.settle_after {
            write!(f, " (+{:?})", settle)?;
        }
        Ok(())
    }
}

/// Ordered relay steps, executed without reordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    name: &'static str,
    steps: Vec<Step>,
}

impl Sequence {
    /// Empty sequence labelled `name` in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// Append an ON step.
    pub fn on(mut self, relay: Relay) -> Self {
        self.push(relay, true);
        self
    }

    /// Append an OFF step.
    pub fn off(mut self, relay: Relay) -> Self {
        self.push(relay, false);
        self
    }

    /// Wait after the most recently added step.
    pub fn settle(mut self, duration: Duration) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.settle_after = Some(duration);
        }
        self
    }

    /// Log label.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn push(&mut self, relay: Relay, on: bool) {
        self.steps.push(Step {
            relay,
            on,
            settle_after: None,
        });
    }

    /// Charge `capacitor`, bleeding it through `resistor` for `settle` first.
    pub fn charge(capacitor: Capacitor, resistor: DischargeResistor, settle: Duration) -> Self {
        Sequence::new("charge")
            .off(Relay::MAIN_POWER)
            .on(Relay::ADC_ISOLATION)
            .on(Relay::R1)
            .off(Relay::R2)
            .on(capacitor.relay())
            .on(Relay::GROUND)
            .on(Relay::DISCHARGE_SHORT)
            .on(resistor.relay())
            .settle(settle)
            .off(Relay::DISCHARGE_SHORT)
            .off(resistor.relay())
            .off(Relay::R1)
            .on(Relay::R2)
            .on(Relay::MAIN_POWER)
    }

    /// Discharge `capacitor` through `resistor` for `duration`, then unwind.
    pub fn discharge(capacitor: Capacitor, resistor: DischargeResistor, duration: Duration) -> Self {
        Sequence::new("discharge")
            .off(Relay::MAIN_POWER)
            .on(Relay::ADC_ISOLATION)
            .on(Relay::R1)
            .on(capacitor.relay())
            .on(Relay::GROUND)
            .on(Relay::DISCHARGE_SHORT)
            .on(resistor.relay())
            .settle(duration)
            .off(Relay::DISCHARGE_SHORT)
            .off(resistor.relay())
            .off(Relay::R1)
            .off(Relay::ADC_ISOLATION)
            .off(capacitor.relay())
            .off(Relay::GROUND)
    }

    /// Turn off the relays a charge leaves ON.
    pub fn release_charge() -> Self {
        Sequence::new("release").off(Relay::MAIN_POWER).off(Relay::R2)
    }
}

/// Drives charge/discharge sequences through the relay gateway.
pub struct Sequencer {
    gateway: Arc<RelayGateway>,
    delay: Arc<dyn Delay>,
    settings: SequencerSettings,
}

impl Sequencer {
    /// Sequencer writing through `gateway` and settling through `delay`.
    pub fn new(gateway: Arc<RelayGateway>, delay: Arc<dyn Delay>, settings: SequencerSettings) -> Self {
        Self {
            gateway,
            delay,
            settings,
        }
    }

    /// Gateway the sequences write through.
    pub fn gateway(&self) -> &Arc<RelayGateway> {
        &self.gateway
    }

    /// Sequencing settings.
    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    /// Execute every step in order, stopping at the first failed write.
    pub fn run(&self, sequence: &Sequence) -> RigResult<()> {
        debug!(sequence = sequence.name(), steps = sequence.steps().len(), "Running relay sequence");
        for (index, step) in sequence.steps().iter().enumerate() {
            if let Err(err) = self.gateway.set(step.relay, step.on) {
                warn!(
                    sequence = sequence.name(),
                    step = index + 1,
                    relay = %step.relay,
                    on = step.on,
                    error = %err,
                    "Relay sequence aborted"
                );
                return Err(err);
            }
            debug!(sequence = sequence.name(), step = index + 1, "{}", step);
            if let Some(settle) = step.settle_after {
                self.delay.delay(settle);
            }
        }
        Ok(())
    }

    /// Charge a capacitor and leave it charging.
    ///
    /// Main power and R2 stay ON afterwards. Call [`Sequencer::release_charge`]
    /// once the measurement window has elapsed.
    ///
    /// If any step fails, main power and R2 are forced OFF before the error
    /// is returned.
    pub fn charge(&self, capacitor: Capacitor) -> RigResult<()> {
        if let Err(err) = self.charge_quietly(capacitor) {
            self.safe_off_after_failure("charge");
            return Err(err);
        }
        warn!(
            capacitor = %capacitor,
            "Capacitor left charging with main power and R2 ON until released"
        );
        Ok(())
    }

    /// Charge without the hand-off warning, for callers holding a [`SafeOffGuard`].
    pub(crate) fn charge_quietly(&self, capacitor: Capacitor) -> RigResult<()> {
        let sequence = Sequence::charge(
            capacitor,
            self.settings.charge_discharge_resistor,
            self.settings.charge_settle(),
        );
        self.run(&sequence)?;
        info!(capacitor = %capacitor, "Charge sequence complete");
        Ok(())
    }

    /// Turn main power and R2 OFF after a charge.
    pub fn release_charge(&self) -> RigResult<()> {
        self.run(&Sequence::release_charge())?;
        info!("Charge released");
        Ok(())
    }

    /// Discharge a capacitor through a resistor for `duration`.
    ///
    /// Every relay touched is OFF again when this returns `Ok`. On a failed
    /// step the remaining steps are skipped and main power and R2 are forced
    /// OFF before the error is returned.
    pub fn discharge(&self, capacitor: Capacitor, resistor: DischargeResistor, duration: Duration) -> RigResult<()> {
        if let Err(err) = self.run(&Sequence::discharge(capacitor, resistor, duration)) {
            self.safe_off_after_failure("discharge");
            return Err(err);
        }
        info!(
            capacitor = %capacitor,
            resistor = %resistor,
            duration_ms = duration.as_millis() as u64,
            "Discharge sequence complete"
        );
        Ok(())
    }

    /// [`Sequencer::discharge`] with selector codes (`cs1`, `rz2`).
    pub fn discharge_named(&self, capacitor: &str, resistor: &str, duration: Duration) -> RigResult<()> {
        let capacitor: Capacitor = capacitor.parse()?;
        let resistor: DischargeResistor = resistor.parse()?;
        self.discharge(capacitor, resistor, duration)
    }

    /// Best-effort OFF of main power and R2.
    ///
    /// Both writes are attempted even if the first fails; the first error is
    /// returned.
    pub fn force_safe_off(&self) -> RigResult<()> {
        let mut first_error = None;
        for relay in [Relay::MAIN_POWER, Relay::R2] {
            if let Err(err) = self.gateway.set(relay, false) {
                warn!(relay = %relay, error = %err, "Forced OFF failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                debug!("Main power and R2 forced OFF");
                Ok(())
            }
        }
    }

    fn safe_off_after_failure(&self, sequence: &'static str) {
        if let Err(err) = self.force_safe_off() {
            warn!(sequence, error = %err, "Safe-OFF after failed sequence did not complete");
        }
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Forces main power and R2 OFF when dropped.
///
/// Arm it before charging; whatever happens afterwards (charge failure, read
/// failure, early return) the charging path is switched off on scope exit.
#[must_use = "the guard switches the charging path off when dropped"]
pub struct SafeOffGuard<'a> {
    sequencer: &'a Sequencer,
}

impl<'a> SafeOffGuard<'a> {
    /// Arm the guard for `sequencer`.
    pub fn arm(sequencer: &'a Sequencer) -> Self {
        Self { sequencer }
    }
}

impl Drop for SafeOffGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.sequencer.force_safe_off() {
            warn!(error = %err, "Charging path may still be energized");
        }
    }
}
