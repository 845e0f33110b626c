//! Error injection framework for the simulated chassis.
//!
//! Scenarios and per-operation failure rates decide when a device call fails.
//! Every injected failure is an ordinary [`DeviceError`], so the orchestration
//! code cannot tell it apart from a real driver fault.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rc_core::error::{DeviceError, DeviceErrorKind};
use rc_core::relay::ChannelAddress;

use super::rng::MockRng;

/// Operation names understood by [`ErrorConfig::check_operation`].
pub mod op {
    /// Opening a digital output task
    pub const DIGITAL_OPEN: &str = "digital_open";
    /// Writing a relay line
    pub const DIGITAL_WRITE: &str = "digital_write";
    /// Reading a relay line back
    pub const DIGITAL_READ: &str = "digital_read";
    /// Opening an analog input task
    pub const ANALOG_OPEN: &str = "analog_open";
    /// Starting the sample clock
    pub const ANALOG_START: &str = "analog_start";
    /// Reading analog samples
    pub const ANALOG_READ: &str = "analog_read";
    /// Stopping an analog task
    pub const ANALOG_STOP: &str = "analog_stop";
    /// Closing an analog task
    pub const ANALOG_CLOSE: &str = "analog_close";
}

/// Error injection configuration for mock devices
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure rate (0.0 to 1.0), `"*"` matches any operation
    failure_rates: Arc<HashMap<&'static str, f64>>,
    scenarios: Arc<Vec<ErrorScenario>>,
    rng: Arc<MockRng>,
    state: Arc<Mutex<ErrorState>>,
}

/// Deterministic failure pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorScenario {
    /// Fail after N successful operations
    FailAfterN {
        /// One of the [`op`] names
        operation: &'static str,
        /// Successful calls allowed before failing
        count: u32,
    },
    /// Fail every write of `state` to `channel`
    FailOnWrite {
        /// Line address to fail on
        channel: ChannelAddress,
        /// Written value that fails
        state: bool,
    },
    /// Timeout on specific operation
    Timeout {
        /// One of the [`op`] names
        operation: &'static str,
    },
    /// Simulate communication loss
    CommunicationLoss,
    /// Hardware fault with specific code
    HardwareFault {
        /// Fault code reported in the error message
        code: u32,
    },
}

#[derive(Default, Debug)]
struct ErrorState {
    operation_counts: HashMap<&'static str, u32>,
    communication_lost: bool,
    /// 0 = no fault
    hardware_fault_code: u32,
}

impl ErrorConfig {
    /// Create error config with no errors (default)
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Create error config with uniform random failures and specific seed
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate);
        Self::build(rates, Vec::new(), seed)
    }

    /// Create error config with a single scenario
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Create error config with multiple scenarios
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    /// Create error config with custom failure rates per operation
    pub fn with_rates(rates: HashMap<&'static str, f64>) -> Self {
        Self::build(rates, Vec::new(), None)
    }

    fn build(rates: HashMap<&'static str, f64>, scenarios: Vec<ErrorScenario>, seed: Option<u64>) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Check if an operation should fail and return appropriate error
    pub fn check_operation(&self, device: &str, operation: &'static str) -> Result<(), DeviceError> {
        let mut state = self.state.lock();

        if state.communication_lost {
            return Err(DeviceError::new(device, DeviceErrorKind::Communication, "Communication lost"));
        }

        if state.hardware_fault_code != 0 {
            return Err(DeviceError::new(
                device,
                DeviceErrorKind::Hardware,
                format!("Hardware fault: {}", state.hardware_fault_code),
            ));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN { operation: op, count } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(DeviceError::new(
                            device,
                            DeviceErrorKind::Hardware,
                            format!("Injected failure after {} operations", count),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DeviceError::new(
                        device,
                        DeviceErrorKind::Timeout,
                        format!("Operation '{}' timed out", operation),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    // Latches on first occurrence
                    state.communication_lost = true;
                    return Err(DeviceError::new(device, DeviceErrorKind::Communication, "Communication lost"));
                }
                ErrorScenario::HardwareFault { code } => {
                    state.hardware_fault_code = *code;
                    return Err(DeviceError::new(
                        device,
                        DeviceErrorKind::Hardware,
                        format!("Hardware fault: {}", code),
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);

        if self.rng.should_fail(rate) {
            return Err(DeviceError::new(
                device,
                DeviceErrorKind::Hardware,
                format!("Random failure on operation '{}'", operation),
            ));
        }

        Ok(())
    }

    /// Check a digital line write, honoring [`ErrorScenario::FailOnWrite`].
    pub fn check_write(&self, device: &str, channel: &ChannelAddress, value: bool) -> Result<(), DeviceError> {
        let targeted = self.scenarios.iter().any(|s| {
            matches!(s, ErrorScenario::FailOnWrite { channel: c, state } if c == channel && *state == value)
        });
        if targeted {
            return Err(DeviceError::new(
                device,
                DeviceErrorKind::Hardware,
                format!("Injected write failure on {} (state={})", channel, value),
            ));
        }
        self.check_operation(device, op::DIGITAL_WRITE)
    }

    /// Reset error state (clear counters, faults)
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_errors() {
        let config = ErrorConfig::none();
        for _ in 0..100 {
            assert!(config.check_operation("sim", op::ANALOG_READ).is_ok());
        }
    }

    #[test]
    fn test_random_failures() {
        let config = ErrorConfig::random_failures_seeded(0.5, Some(42));
        let failures = (0..1000)
            .filter(|_| config.check_operation("sim", op::DIGITAL_WRITE).is_err())
            .count();
        assert!(failures > 400 && failures < 600, "Got {} failures", failures);
    }

    #[test]
    fn test_fail_after_n() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: op::ANALOG_READ,
            count: 3,
        });

        for i in 0..3 {
            assert!(config.check_operation("sim", op::ANALOG_READ).is_ok(), "read {} should succeed", i + 1);
        }
        let err = config.check_operation("sim", op::ANALOG_READ).unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Hardware);

        // Other operations are unaffected
        assert!(config.check_operation("sim", op::ANALOG_CLOSE).is_ok());
    }

    #[test]
    fn test_fail_on_write_matches_channel_and_state() {
        let target = ChannelAddress::new("cDAQ1Mod5/port0/line4");
        let config = ErrorConfig::scenario(ErrorScenario::FailOnWrite {
            channel: target.clone(),
            state: true,
        });

        assert!(config.check_write("sim", &target, true).is_err());
        assert!(config.check_write("sim", &target, true).is_err());
        assert!(config.check_write("sim", &target, false).is_ok());
        assert!(config
            .check_write("sim", &ChannelAddress::new("cDAQ1Mod2/port0/line0"), true)
            .is_ok());
    }

    #[test]
    fn test_timeout_scenario() {
        let config = ErrorConfig::scenario(ErrorScenario::Timeout {
            operation: op::ANALOG_START,
        });
        let err = config.check_operation("sim", op::ANALOG_START).unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Timeout);
        assert!(err.message.contains("timed out"));
    }

    #[test]
    fn test_communication_loss_latches() {
        let config = ErrorConfig::scenario(ErrorScenario::CommunicationLoss);
        let err = config.check_operation("sim", op::DIGITAL_WRITE).unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Communication);
        assert!(config.check_operation("sim", op::ANALOG_READ).is_err());
    }

    #[test]
    fn test_hardware_fault() {
        let config = ErrorConfig::scenario(ErrorScenario::HardwareFault { code: 0x42 });
        let err = config.check_operation("sim", op::DIGITAL_READ).unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Hardware);
        assert!(err.message.contains("66"));
    }

    #[test]
    fn test_reset() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: op::ANALOG_READ,
            count: 1,
        });
        assert!(config.check_operation("sim", op::ANALOG_READ).is_ok());
        assert!(config.check_operation("sim", op::ANALOG_READ).is_err());

        config.reset();
        assert!(config.check_operation("sim", op::ANALOG_READ).is_ok());
    }

    #[test]
    fn test_custom_rates() {
        let mut rates = HashMap::new();
        rates.insert(op::DIGITAL_READ, 1.0);
        rates.insert(op::DIGITAL_WRITE, 0.0);
        let config = ErrorConfig::with_rates(rates);

        for _ in 0..10 {
            assert!(config.check_operation("sim", op::DIGITAL_READ).is_err());
            assert!(config.check_operation("sim", op::DIGITAL_WRITE).is_ok());
        }
    }
}
