//! Relay gateway: the only write path to the relay bank.
//!
//! [`RelayGateway`] owns the in-process relay state table. Every relay write
//! opens a digital task on the relay's line, writes it, and only then
//! updates the table. The table lock is held across the hardware write, so
//! the table never runs ahead of the hardware and concurrent writers are
//! serialized.
//!
//! On devices that can read back digital outputs the gateway reconciles the
//! table against hardware on every state query. Devices that cannot (most
//! simulated hardware) are answered from the table.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rc_core::device::Device;
use rc_core::error::{DeviceError, RigResult};
use rc_core::relay::{Relay, RelayMap, RelayModule};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Where the last known state of a relay came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateSource {
    /// Confirmed by a hardware readback
    Hardware,
    /// Last value written (or the power-on default), never read back
    Assumed,
}

/// Cached state of one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayState {
    /// Energized
    pub on: bool,
    /// Where the value came from
    pub source: StateSource,
}

impl RelayState {
    const OFF: RelayState = RelayState {
        on: false,
        source: StateSource::Assumed,
    };
}

/// Single owner of relay writes and the cached relay table.
pub struct RelayGateway {
    device: Arc<dyn Device>,
    map: RelayMap,
    states: Mutex<BTreeMap<Relay, RelayState>>,
}

impl RelayGateway {
    /// Create a gateway with every relay assumed OFF.
    pub fn new(device: Arc<dyn Device>) -> Self {
        let map = RelayMap::new(device.name());
        let states = Relay::all().map(|r| (r, RelayState::OFF)).collect();
        Self {
            device,
            map,
            states: Mutex::new(states),
        }
    }

    /// Relay-to-channel map for this chassis.
    pub fn map(&self) -> &RelayMap {
        &self.map
    }

    /// Write one relay.
    pub fn set(&self, relay: Relay, on: bool) -> RigResult<()> {
        let mut states = self.states.lock();
        let channel = self.map.resolve(relay);
        let mut task = self.device.open_digital_task(&channel)?;
        task.write(on)?;
        states.insert(
            relay,
            RelayState {
                on,
                source: StateSource::Assumed,
            },
        );
        debug!(relay = %relay, channel = %channel, on, "Relay written");
        Ok(())
    }

    /// Write one relay by name.
    pub fn set_relay(&self, name: &str, on: bool) -> RigResult<()> {
        self.set(name.parse()?, on)
    }

    /// Current state of one relay, reconciled with hardware when readable.
    ///
    /// A failed readback never fails the query: the cached value is returned
    /// and the failure logged.
    pub fn state(&self, relay: Relay) -> RigResult<bool> {
        let mut states = self.states.lock();
        let cached = states.get(&relay).copied().unwrap_or(RelayState::OFF);

        if !self.device.supports_digital_readback() {
            return Ok(cached.on);
        }

        match self.read_hardware(relay) {
            Ok(on) => {
                if on != cached.on {
                    info!(relay = %relay, cached = cached.on, hardware = on, "Relay state reconciled from hardware");
                }
                states.insert(
                    relay,
                    RelayState {
                        on,
                        source: StateSource::Hardware,
                    },
                );
                Ok(on)
            }
            Err(err) if err.is_unsupported() => {
                debug!(relay = %relay, "Readback unsupported, using cached state");
                Ok(cached.on)
            }
            Err(err) => {
                warn!(relay = %relay, error = %err, "Relay readback failed, using cached state");
                Ok(cached.on)
            }
        }
    }

    /// Current state of one relay by name.
    pub fn get_relay_state(&self, name: &str) -> RigResult<bool> {
        self.state(name.parse()?)
    }

    /// Apply a batch of writes in the given order.
    ///
    /// Every name is validated before the first write, so an unknown name
    /// leaves the relays untouched. A hardware failure part-way through stops
    /// the batch; writes already made stay applied.
    pub fn set_multiple<I, S>(&self, entries: I) -> RigResult<()>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let batch = entries
            .into_iter()
            .map(|(name, on)| name.as_ref().parse::<Relay>().map(|relay| (relay, on)))
            .collect::<RigResult<Vec<_>>>()?;

        for (relay, on) in batch {
            self.set(relay, on)?;
        }
        Ok(())
    }

    /// Turn OFF every relay currently ON and return those switched.
    ///
    /// Calling it again right away returns an empty list.
    pub fn disable_enabled(&self) -> RigResult<Vec<Relay>> {
        let mut enabled = Vec::new();
        for relay in Relay::all() {
            if self.state(relay)? {
                enabled.push(relay);
            }
        }
        for relay in &enabled {
            self.set(*relay, false)?;
        }
        if !enabled.is_empty() {
            info!(count = enabled.len(), "Disabled enabled relays");
        }
        Ok(enabled)
    }

    /// Write OFF to every relay regardless of its cached state.
    pub fn disable_all(&self) -> RigResult<Vec<Relay>> {
        let relays: Vec<Relay> = Relay::all().collect();
        for relay in &relays {
            self.set(*relay, false)?;
        }
        info!(count = relays.len(), "Disabled all relays");
        Ok(relays)
    }

    /// Overwrite the state table from hardware and return it.
    ///
    /// Without readback support this returns the current table unchanged.
    pub fn sync_with_hardware(&self) -> RigResult<BTreeMap<Relay, bool>> {
        let mut states = self.states.lock();
        if !self.device.supports_digital_readback() {
            debug!("Device cannot read back relays, returning cached table");
            return Ok(states.iter().map(|(r, s)| (*r, s.on)).collect());
        }

        for relay in Relay::all() {
            match self.read_hardware(relay) {
                Ok(on) => {
                    states.insert(
                        relay,
                        RelayState {
                            on,
                            source: StateSource::Hardware,
                        },
                    );
                }
                Err(err) if err.is_unsupported() => {
                    debug!(relay = %relay, "Readback unsupported, keeping cached state");
                }
                Err(err) => return Err(err.into()),
            }
        }
        info!("Relay table synchronized with hardware");
        Ok(states.iter().map(|(r, s)| (*r, s.on)).collect())
    }

    /// Snapshot of the state table without touching hardware.
    pub fn relay_states(&self) -> BTreeMap<Relay, RelayState> {
        self.states.lock().clone()
    }

    /// Every relay in catalogue order.
    pub fn list_relays(&self) -> Vec<Relay> {
        Relay::all().collect()
    }

    /// Relays grouped by module.
    pub fn relays_by_module(&self) -> BTreeMap<RelayModule, Vec<Relay>> {
        RelayModule::ALL.into_iter().map(|m| (m, m.relays().collect())).collect()
    }

    fn read_hardware(&self, relay: Relay) -> Result<bool, DeviceError> {
        let mut task = self.device.open_digital_task(&self.map.resolve(relay))?;
        task.read()
    }
}

impl std::fmt::Debug for RelayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayGateway")
            .field("device", &self.device.name())
            .finish()
    }
}
