//! Core types and traits for rc-daq.
//!
//! This crate holds everything shared between the orchestration engine and
//! device drivers:
//!
//! - [`error`] - `RigError` taxonomy and driver-level `DeviceError`
//! - [`relay`] - relay identity, module layout and the relay-to-channel map
//! - [`circuit`] - capacitor and discharge-resistor selectors
//! - [`device`] - the device capability interface (tasks, reads, delays)

pub mod circuit;
pub mod device;
pub mod error;
pub mod relay;

pub use circuit::{Capacitor, DischargeResistor};
pub use device::{
    AcquisitionMode, AnalogTask, AnalogTaskConfig, ChannelData, Delay, Device, DigitalTask,
    ReadCount, ThreadDelay, ADC_CHANNELS,
};
pub use error::{DeviceError, DeviceErrorKind, ErrorClass, RigError, RigResult};
pub use relay::{ChannelAddress, Relay, RelayMap, RelayModule};
