//! Timing configuration for realistic mode.

use std::time::Duration;

/// Hardware-like delays applied in [`MockMode::Realistic`](super::MockMode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingConfig {
    /// Mechanical switching time of a relay in milliseconds
    pub relay_switch_ms: u64,
    /// Driver round-trip for opening a task in milliseconds
    pub communication_delay_ms: u64,
}

impl TimingConfig {
    /// Timing of a CompactDAQ chassis with electromechanical relay modules.
    pub fn compact_daq() -> Self {
        Self {
            relay_switch_ms: 5,
            communication_delay_ms: 1,
        }
    }

    /// Relay switching time.
    pub fn relay_switch(&self) -> Duration {
        Duration::from_millis(self.relay_switch_ms)
    }

    /// Task open round-trip.
    pub fn communication_delay(&self) -> Duration {
        Duration::from_millis(self.communication_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let config = TimingConfig::default();
        assert_eq!(config.relay_switch(), Duration::ZERO);
        assert_eq!(config.communication_delay(), Duration::ZERO);
    }

    #[test]
    fn test_compact_daq_timing() {
        let config = TimingConfig::compact_daq();
        assert_eq!(config.relay_switch_ms, 5);
        assert_eq!(config.communication_delay_ms, 1);
    }
}
