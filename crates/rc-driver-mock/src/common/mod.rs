//! Common infrastructure for the simulated chassis.
//!
//! - **mode**: Operational modes (Instant, Realistic)
//! - **timing**: Hardware-like delays used in realistic mode
//! - **errors**: Error injection framework
//! - **rng**: Seeded random number generator

pub mod errors;
pub mod mode;
pub mod rng;
pub mod timing;

pub use errors::{op, ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;
pub use timing::TimingConfig;
