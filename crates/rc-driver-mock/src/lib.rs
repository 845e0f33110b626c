//! Simulated hardware for rc-daq.
//!
//! [`MockDevice`] stands in for a CompactDAQ chassis with six relay modules
//! and a four-channel analog input module. It lets the whole relay sequencing
//! and acquisition stack run without hardware.
//!
//! # Features
//!
//! - Instant and realistic timing ([`MockMode`])
//! - Optional digital output readback
//! - Error injection ([`ErrorConfig`], [`ErrorScenario`])
//! - An ordered [`Journal`] of every write, analog task call and settle delay
//!
//! ```rust,ignore
//! use rc_driver_mock::{ErrorConfig, ErrorScenario, MockDevice};
//!
//! let device = MockDevice::builder()
//!     .error_config(ErrorConfig::scenario(ErrorScenario::CommunicationLoss))
//!     .build();
//! ```

pub mod common;
mod journal;
mod mock_device;

pub use common::{op, ErrorConfig, ErrorScenario, MockMode, MockRng, TimingConfig};
pub use journal::{Journal, JournalEvent};
pub use mock_device::{MockDelay, MockDevice, MockDeviceBuilder, DEFAULT_NOISE_AMPLITUDE};
