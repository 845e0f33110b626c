//! # RC DAQ
//!
//! Relay sequencing and capacitor transient acquisition for a compact DAQ
//! chassis with 40 relay channels and four analog inputs.
//!
//! ## Crate Structure
//!
//! - **`gateway`**: named relay writes and reads with a cached state map.
//! - **`sequencer`**: ordered charge/discharge relay sequences and the safe-OFF guard.
//! - **`acquisition`**: continuous sessions, finite reads and buffer sizing.
//! - **`requests`**: validation of caller-facing request parameters.
//! - **`streaming`**: cooperative live-streaming loop over finite reads.
//! - **`rig`**: facade wiring one device into all of the above.
//! - **`config`**: layered `figment` settings (defaults, TOML, environment).
//! - **`logging`**: `tracing-subscriber` initialization.
//!
//! Shared types and the device capability traits live in `rc-core`; the
//! simulated chassis lives in `rc-driver-mock`.

pub mod acquisition;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod requests;
pub mod rig;
pub mod sequencer;
pub mod streaming;

pub use config::Settings;
pub use rig::Rig;
