//! Operational modes for the simulated chassis.
//!
//! - **Instant**: settle delays and finite reads return immediately (unit tests)
//! - **Realistic**: waits as long as real hardware would (integration runs, CLI)

use serde::{Deserialize, Serialize};

/// Operational modes for mock devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Hardware-like timing - for integration tests
    Realistic,
}

impl MockMode {
    /// Whether delays are actually slept.
    pub fn is_realistic(self) -> bool {
        self == MockMode::Realistic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(MockMode::default(), MockMode::Instant);
        assert!(!MockMode::default().is_realistic());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(format!("{:?}", MockMode::Realistic), "Realistic");
        assert!(MockMode::Realistic.is_realistic());
    }
}
