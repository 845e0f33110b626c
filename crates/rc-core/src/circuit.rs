//! Capacitor and discharge-resistor selectors.
//!
//! Each selector is bound to exactly one relay on the `zk2` module:
//! capacitors `cs1..cs4` on lines 1-4 and discharge resistors `rz1..rz4`
//! on lines 5-8.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RigError;
use crate::relay::{Relay, RelayModule};

/// Capacitor under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capacitor {
    /// 1 µF, relay `zk2_1`
    Cs1,
    /// 10 µF, relay `zk2_2`
    Cs2,
    /// 100 µF, relay `zk2_3`
    Cs3,
    /// 1000 µF, relay `zk2_4`
    Cs4,
}

impl Capacitor {
    /// Every capacitor in code order.
    pub const ALL: [Capacitor; 4] = [Capacitor::Cs1, Capacitor::Cs2, Capacitor::Cs3, Capacitor::Cs4];

    /// Lowercase selector code (`cs1`..`cs4`).
    pub fn code(self) -> &'static str {
        match self {
            Capacitor::Cs1 => "cs1",
            Capacitor::Cs2 => "cs2",
            Capacitor::Cs3 => "cs3",
            Capacitor::Cs4 => "cs4",
        }
    }

    /// Relay that switches this capacitor into the circuit.
    pub fn relay(self) -> Relay {
        let position = match self {
            Capacitor::Cs1 => 1,
            Capacitor::Cs2 => 2,
            Capacitor::Cs3 => 3,
            Capacitor::Cs4 => 4,
        };
        zk2(position)
    }

    /// Nominal capacitance in microfarads.
    pub fn nominal_microfarads(self) -> f64 {
        match self {
            Capacitor::Cs1 => 1.0,
            Capacitor::Cs2 => 10.0,
            Capacitor::Cs3 => 100.0,
            Capacitor::Cs4 => 1000.0,
        }
    }
}

impl fmt::Display for Capacitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Capacitor {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capacitor::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RigError::InvalidSelector {
                kind: "capacitor",
                value: s.to_string(),
            })
    }
}

/// Resistor used to bleed the capacitor during discharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DischargeResistor {
    /// 10 Ω, relay `zk2_5`
    Rz1,
    /// 100 Ω, relay `zk2_6`
    Rz2,
    /// 1 kΩ, relay `zk2_7`
    Rz3,
    /// 10 kΩ, relay `zk2_8`
    Rz4,
}

impl DischargeResistor {
    /// Every discharge resistor in code order.
    pub const ALL: [DischargeResistor; 4] = [
        DischargeResistor::Rz1,
        DischargeResistor::Rz2,
        DischargeResistor::Rz3,
        DischargeResistor::Rz4,
    ];

    /// Lowercase selector code (`rz1`..`rz4`).
    pub fn code(self) -> &'static str {
        match self {
            DischargeResistor::Rz1 => "rz1",
            DischargeResistor::Rz2 => "rz2",
            DischargeResistor::Rz3 => "rz3",
            DischargeResistor::Rz4 => "rz4",
        }
    }

    /// Relay that switches this resistor into the discharge path.
    pub fn relay(self) -> Relay {
        let position = match self {
            DischargeResistor::Rz1 => 5,
            DischargeResistor::Rz2 => 6,
            DischargeResistor::Rz3 => 7,
            DischargeResistor::Rz4 => 8,
        };
        zk2(position)
    }

    /// Nominal resistance in ohms.
    pub fn nominal_ohms(self) -> f64 {
        match self {
            DischargeResistor::Rz1 => 10.0,
            DischargeResistor::Rz2 => 100.0,
            DischargeResistor::Rz3 => 1_000.0,
            DischargeResistor::Rz4 => 10_000.0,
        }
    }
}

impl fmt::Display for DischargeResistor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DischargeResistor {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DischargeResistor::ALL
            .into_iter()
            .find(|r| r.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RigError::InvalidSelector {
                kind: "discharge resistor",
                value: s.to_string(),
            })
    }
}

// positions passed here are literals within the 8-line zk2 module
fn zk2(position: u8) -> Relay {
    Relay::fixed(RelayModule::Zk2, position)
}
