//! Boundary to the sampling hardware.
//!
//! The sensor only needs a DMA-fed ADC that can be configured in a handful of
//! sub-steps and then drained with blocking reads. Board support crates
//! implement [`AdcPeripheral`]; [`ScriptedPeripheral`] replays canned data.

pub mod scripted;

use std::fmt;
use std::time::Duration;

use crate::prelude::{AdcChannel, AdcWidth, Attenuation, CaptureConfig};

pub use scripted::{ScriptedPeripheral, ScriptedRead};

/// Raw eFuse readings of the two-point trim (codes measured at 150 mV and 850 mV).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoPointTrim {
    pub low_raw: u32,
    pub high_raw: u32,
}

/// Calibration values burned into the chip, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EfuseCalibration {
    pub two_point: Option<TwoPointTrim>,
    pub vref_mv: Option<u32>,
}

/// Initialization sub-steps, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Width,
    Attenuation,
    DriverInstall,
    Clock,
    AdcMode,
    AdcEnable,
}

impl InitStep {
    pub const ALL: [InitStep; 6] = [
        InitStep::Width,
        InitStep::Attenuation,
        InitStep::DriverInstall,
        InitStep::Clock,
        InitStep::AdcMode,
        InitStep::AdcEnable,
    ];
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStep::Width => "width config",
            InitStep::Attenuation => "attenuation config",
            InitStep::DriverInstall => "driver install",
            InitStep::Clock => "clock config",
            InitStep::AdcMode => "adc mode",
            InitStep::AdcEnable => "adc enable",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PeripheralError {
    #[error("timed out waiting for DMA data")]
    Timeout,
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("hardware fault: {0}")]
    Fault(String),
}

/// DMA-backed ADC capture peripheral.
pub trait AdcPeripheral {
    fn config_width(&mut self, width: AdcWidth) -> Result<(), PeripheralError>;

    fn config_channel_attenuation(
        &mut self,
        channel: AdcChannel,
        attenuation: Attenuation,
    ) -> Result<(), PeripheralError>;

    fn install_driver(&mut self, capture: &CaptureConfig) -> Result<(), PeripheralError>;

    fn set_clock(&mut self, sample_rate_hz: u32, bits_per_sample: u8)
        -> Result<(), PeripheralError>;

    fn set_adc_mode(&mut self, channel: AdcChannel) -> Result<(), PeripheralError>;

    fn enable_adc(&mut self) -> Result<(), PeripheralError>;

    /// Copies captured bytes into `dst` and returns how many were written,
    /// which may be fewer than requested. `None` waits without bound.
    fn read(&mut self, dst: &mut [u8], timeout: Option<Duration>)
        -> Result<usize, PeripheralError>;

    fn efuse(&self) -> EfuseCalibration {
        EfuseCalibration::default()
    }
}
