//! Relay identity and the relay-name-to-channel map.
//!
//! The rig carries 40 relays split across six digital output modules. A relay
//! is identified by its module and 1-based position within the module, and is
//! written as `<module>_<position>` (e.g. `zs1_1`, `zk2_5`).
//!
//! | Module | Chassis slot | Width |
//! |--------|--------------|-------|
//! | `zs1`  | Mod2         | 4     |
//! | `zs2`  | Mod3         | 4     |
//! | `zk1`  | Mod4         | 8     |
//! | `zk2`  | Mod5         | 8     |
//! | `zk3`  | Mod6         | 8     |
//! | `zk4`  | Mod7         | 8     |
//!
//! A [`Relay`] can only be built for a position inside its module, so every
//! value of the type resolves to a physical line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RigError;

/// Digital output module holding a group of relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelayModule {
    /// Slot Mod2, 4 lines (main power, ADC isolation)
    Zs1,
    /// Slot Mod3, 4 lines (ground, discharge short)
    Zs2,
    /// Slot Mod4, 8 lines (R1, R2)
    Zk1,
    /// Slot Mod5, 8 lines (capacitors, discharge resistors)
    Zk2,
    /// Slot Mod6, 8 lines
    Zk3,
    /// Slot Mod7, 8 lines
    Zk4,
}

impl RelayModule {
    /// All modules in catalogue order.
    pub const ALL: [RelayModule; 6] = [
        RelayModule::Zs1,
        RelayModule::Zs2,
        RelayModule::Zk1,
        RelayModule::Zk2,
        RelayModule::Zk3,
        RelayModule::Zk4,
    ];

    /// Name prefix used in relay names.
    pub fn prefix(self) -> &'static str {
        match self {
            RelayModule::Zs1 => "zs1",
            RelayModule::Zs2 => "zs2",
            RelayModule::Zk1 => "zk1",
            RelayModule::Zk2 => "zk2",
            RelayModule::Zk3 => "zk3",
            RelayModule::Zk4 => "zk4",
        }
    }

    /// Chassis slot number (`ModN`) carrying this module.
    pub fn slot(self) -> u8 {
        match self {
            RelayModule::Zs1 => 2,
            RelayModule::Zs2 => 3,
            RelayModule::Zk1 => 4,
            RelayModule::Zk2 => 5,
            RelayModule::Zk3 => 6,
            RelayModule::Zk4 => 7,
        }
    }

    /// Number of relay lines on this module.
    pub fn width(self) -> u8 {
        match self {
            RelayModule::Zs1 | RelayModule::Zs2 => 4,
            RelayModule::Zk1 | RelayModule::Zk2 | RelayModule::Zk3 | RelayModule::Zk4 => 8,
        }
    }

    /// Iterate over every relay on this module.
    pub fn relays(self) -> impl Iterator<Item = Relay> {
        (1..=self.width()).map(move |position| Relay {
            module: self,
            position,
        })
    }
}

impl fmt::Display for RelayModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for RelayModule {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelayModule::ALL
            .into_iter()
            .find(|m| m.prefix().eq_ignore_ascii_case(s))
            .ok_or_else(|| RigError::InvalidRequest(format!("Unknown relay module: {}", s)))
    }
}

/// A single relay in the fixed catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relay {
    module: RelayModule,
    position: u8,
}

impl Relay {
    /// Main power supply relay.
    pub const MAIN_POWER: Relay = Relay::fixed(RelayModule::Zs1, 1);
    /// Isolates the analog front end during switching transients.
    pub const ADC_ISOLATION: Relay = Relay::fixed(RelayModule::Zs1, 2);
    /// Ground return.
    pub const GROUND: Relay = Relay::fixed(RelayModule::Zs2, 1);
    /// Shorts the discharge circuit.
    pub const DISCHARGE_SHORT: Relay = Relay::fixed(RelayModule::Zs2, 2);
    /// Fixed discharge-path resistor R1.
    pub const R1: Relay = Relay::fixed(RelayModule::Zk1, 5);
    /// Secondary (charging) resistor R2.
    pub const R2: Relay = Relay::fixed(RelayModule::Zk1, 8);

    pub(crate) const fn fixed(module: RelayModule, position: u8) -> Relay {
        Relay { module, position }
    }

    /// Build a relay from a module and 1-based position.
    pub fn new(module: RelayModule, position: u8) -> Result<Self, RigError> {
        if position == 0 || position > module.width() {
            return Err(RigError::unknown_relay(format!("{}_{}", module, position)));
        }
        Ok(Self { module, position })
    }

    /// Module the relay sits on.
    pub fn module(&self) -> RelayModule {
        self.module
    }

    /// 1-based position on the module.
    pub fn position(&self) -> u8 {
        self.position
    }

    /// Zero-based digital line index on the module port.
    pub fn line(&self) -> u8 {
        self.position - 1
    }

    /// Every relay in the catalogue, module by module.
    pub fn all() -> impl Iterator<Item = Relay> {
        RelayModule::ALL.into_iter().flat_map(RelayModule::relays)
    }

    /// Canonical name (`zk1_5`).
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.module, self.position)
    }
}

impl FromStr for Relay {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || RigError::unknown_relay(s);
        let (prefix, position) = s.trim().split_once('_').ok_or_else(unknown)?;
        let module: RelayModule = prefix.parse().map_err(|_| unknown())?;
        let position: u8 = position.parse().map_err(|_| unknown())?;
        Relay::new(module, position).map_err(|_| unknown())
    }
}

impl Serialize for Relay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Relay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Physical address of a digital or analog channel (e.g. `cDAQ1Mod2/port0/line0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelAddress(String);

impl ChannelAddress {
    /// Wrap an address string as is.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pure mapping from relay identity to physical channel.
#[derive(Debug, Clone)]
pub struct RelayMap {
    device: String,
}

impl RelayMap {
    /// Create a map for the chassis named `device` (e.g. `cDAQ1`).
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Chassis name used as the address prefix.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Digital line address of a relay.
    pub fn resolve(&self, relay: Relay) -> ChannelAddress {
        ChannelAddress(format!(
            "{}Mod{}/port0/line{}",
            self.device,
            relay.module().slot(),
            relay.line()
        ))
    }

    /// Resolve a relay by name, failing with `UnknownRelay` outside the catalogue.
    pub fn resolve_name(&self, name: &str) -> Result<ChannelAddress, RigError> {
        let relay: Relay = name.parse()?;
        Ok(self.resolve(relay))
    }

    /// Channel spec covering the four analog inputs (`<device>Mod1/ai0:3`).
    pub fn analog_inputs(&self) -> ChannelAddress {
        ChannelAddress(format!("{}Mod1/ai0:3", self.device))
    }
}
