//! Acquisition and RMS estimation core for the ZMPT101B mains voltage sensor.
//!
//! One reading captures a fixed burst of DMA-fed ADC samples, median-filters
//! the burst in place to suppress ripple, calibrates the filtered extremes to
//! millivolts and reports the RMS of the implied sinusoid. Hardware access
//! goes through the [`peripheral::AdcPeripheral`] trait.

pub mod calibration;
pub mod math;
pub mod peripheral;
pub mod prelude;
pub mod processing;
pub mod sensor;
pub mod telemetry;

pub use calibration::{AdcCharacteristics, CalibrationCurve};
pub use peripheral::{AdcPeripheral, PeripheralError};
pub use prelude::{AdcChannel, SensorConfig, SensorError, SensorResult, VoltageReading};
pub use sensor::VoltageSensor;
