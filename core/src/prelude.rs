use crate::peripheral::{InitStep, PeripheralError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One ADC code as delivered by the DMA capture (12 meaningful bits).
pub type Sample = u16;

/// Highest code a 12-bit conversion can produce.
pub const ADC_12_BIT_MAX: Sample = 4095;

/// ADC1 input channel the sensor is wired to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AdcChannel(pub u8);

impl AdcChannel {
    /// ADC1 exposes channels 0 through 7.
    pub const MAX: u8 = 7;

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 <= Self::MAX
    }
}

impl fmt::Display for AdcChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ADC1_CH{}", self.0)
    }
}

/// Conversion resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdcWidth {
    Bit9,
    Bit10,
    Bit11,
    Bit12,
}

impl AdcWidth {
    pub fn bits(self) -> u32 {
        match self {
            AdcWidth::Bit9 => 9,
            AdcWidth::Bit10 => 10,
            AdcWidth::Bit11 => 11,
            AdcWidth::Bit12 => 12,
        }
    }
}

/// Input attenuation, which selects the measurable voltage range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Attenuation {
    /// ~0 to 1.1 V.
    Db0,
    /// ~0 to 1.5 V.
    Db2_5,
    /// ~0 to 2.2 V.
    Db6,
    /// ~0 to 3.9 V.
    Db12,
}

impl Attenuation {
    pub(crate) fn table_index(self) -> usize {
        match self {
            Attenuation::Db0 => 0,
            Attenuation::Db2_5 => 1,
            Attenuation::Db6 => 2,
            Attenuation::Db12 => 3,
        }
    }
}

/// Sensor configuration shared by initialization and every acquisition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub sampling_rate_hz: u32,
    /// Byte length of one DMA buffer.
    pub dma_buffer_len: usize,
    pub dma_buffer_count: usize,
    /// Multiplier from DMA words to the number of captured samples.
    pub repack_factor: usize,
    pub width: AdcWidth,
    pub attenuation: Attenuation,
    pub default_vref_mv: u32,
    /// Median filter window; even values are bumped to the next odd size.
    pub window_size: usize,
    /// `None` blocks each peripheral read until data arrives.
    pub read_timeout_ms: Option<u64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 25_000,
            dma_buffer_len: 1024,
            dma_buffer_count: 8,
            repack_factor: 2,
            width: AdcWidth::Bit12,
            attenuation: Attenuation::Db12,
            default_vref_mv: 1100,
            window_size: 10,
            read_timeout_ms: None,
        }
    }
}

impl SensorConfig {
    /// Number of samples gathered per acquisition. Saturates for layouts that
    /// `validate` rejects.
    pub fn target_samples(&self) -> usize {
        self.checked_target_samples().unwrap_or(usize::MAX)
    }

    fn checked_target_samples(&self) -> Option<usize> {
        (self.dma_buffer_len / std::mem::size_of::<Sample>()).checked_mul(self.repack_factor)
    }

    /// Capture window length implied by the sample count and rate.
    pub fn capture_duration(&self) -> Duration {
        if self.sampling_rate_hz == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.target_samples() as f64 / self.sampling_rate_hz as f64)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate_hz: self.sampling_rate_hz,
            bits_per_sample: (std::mem::size_of::<Sample>() * 8) as u8,
            dma_buffer_count: self.dma_buffer_count,
            dma_buffer_len: self.dma_buffer_len,
        }
    }

    pub fn validate(&self) -> SensorResult<()> {
        if self.sampling_rate_hz == 0 {
            return Err(SensorError::InvalidConfig(
                "sampling rate must be greater than zero".into(),
            ));
        }
        if !(8..=1024).contains(&self.dma_buffer_len) || self.dma_buffer_len % 2 != 0 {
            return Err(SensorError::InvalidConfig(format!(
                "DMA buffer length {} must be even and within 8..=1024 bytes",
                self.dma_buffer_len
            )));
        }
        if !(2..=128).contains(&self.dma_buffer_count) {
            return Err(SensorError::InvalidConfig(format!(
                "DMA buffer count {} must be within 2..=128",
                self.dma_buffer_count
            )));
        }
        let target = self.checked_target_samples().ok_or_else(|| {
            SensorError::InvalidConfig(format!(
                "repack factor {} overflows the sample count",
                self.repack_factor
            ))
        })?;
        if target == 0 {
            return Err(SensorError::InvalidConfig(
                "target sample count must be greater than zero".into(),
            ));
        }
        if self.window_size > target {
            return Err(SensorError::WindowTooLarge {
                window: self.window_size,
                length: target,
            });
        }
        Ok(())
    }
}

/// DMA-backed capture settings handed to the peripheral driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate_hz: u32,
    pub bits_per_sample: u8,
    pub dma_buffer_count: usize,
    pub dma_buffer_len: usize,
}

/// Minimum and maximum of the filtered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredExtremes {
    pub min: Sample,
    pub max: Sample,
}

/// Outcome of one full acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageReading {
    pub channel: AdcChannel,
    /// RMS estimate in whole reporting units.
    pub rms: u16,
    pub min_mv: u32,
    pub max_mv: u32,
    pub samples: usize,
    pub elapsed_us: u64,
}

impl VoltageReading {
    pub fn delta_mv(&self) -> u32 {
        self.max_mv.saturating_sub(self.min_mv)
    }
}

/// One failed initialization sub-step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    pub step: InitStep,
    pub error: PeripheralError,
}

/// Every sub-step that failed during one `initialize` call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InitFailures(pub Vec<StepFailure>);

impl InitFailures {
    pub fn steps(&self) -> impl Iterator<Item = InitStep> + '_ {
        self.0.iter().map(|failure| failure.step)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InitFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, failure) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.step, failure.error)?;
        }
        Ok(())
    }
}

/// Common error type for the sensor pipeline.
#[derive(thiserror::Error, Debug)]
pub enum SensorError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid window size {window} for buffer of {length} samples")]
    WindowTooLarge { window: usize, length: usize },
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("failed to read samples: {0}")]
    ReadFailure(#[source] PeripheralError),
    #[error("failed to initialize ADC ({0})")]
    Initialization(InitFailures),
    #[error("sensor not initialized")]
    NotInitialized,
    #[error("channel {0} is not configured")]
    ChannelNotConfigured(AdcChannel),
}

pub type SensorResult<T> = Result<T, SensorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_captures_1024_samples() {
        let config = SensorConfig::default();
        assert_eq!(config.target_samples(), 1024);
        assert_eq!(config.capture_duration().as_micros(), 40_960);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SensorConfig =
            serde_json::from_str(r#"{"window_size": 5, "read_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.window_size, 5);
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.sampling_rate_hz, 25_000);
    }

    #[test]
    fn validate_rejects_window_larger_than_capture() {
        let config = SensorConfig {
            dma_buffer_len: 8,
            repack_factor: 1,
            window_size: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SensorError::WindowTooLarge { window: 5, length: 4 })
        ));
    }

    #[test]
    fn validate_rejects_bad_dma_layout() {
        let odd = SensorConfig {
            dma_buffer_len: 33,
            ..Default::default()
        };
        assert!(matches!(odd.validate(), Err(SensorError::InvalidConfig(_))));

        let single = SensorConfig {
            dma_buffer_count: 1,
            ..Default::default()
        };
        assert!(matches!(single.validate(), Err(SensorError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_overflowing_repack_factor() {
        let config = SensorConfig {
            repack_factor: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SensorError::InvalidConfig(_))));
        assert_eq!(config.target_samples(), usize::MAX);
    }

    #[test]
    fn init_failures_display_every_step() {
        let failures = InitFailures(vec![
            StepFailure {
                step: InitStep::Width,
                error: PeripheralError::InvalidState("busy".into()),
            },
            StepFailure {
                step: InitStep::AdcEnable,
                error: PeripheralError::Fault("no clock".into()),
            },
        ]);
        let message = SensorError::Initialization(failures).to_string();
        assert!(message.contains("width"));
        assert!(message.contains("adc enable"));
    }
}
