use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use zmptcore::prelude::{AdcChannel, SensorConfig};

use crate::generator::profile::GeneratorConfig;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub channel: AdcChannel,
    /// Back-off between failed initialization attempts.
    pub init_retry_interval_ms: u64,
    /// `None` retries initialization forever.
    pub max_init_attempts: Option<usize>,
    pub read_interval_ms: u64,
    /// `None` keeps reading until interrupted.
    pub iterations: Option<usize>,
    pub sensor: SensorConfig,
    pub generator: GeneratorConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            channel: AdcChannel(0),
            init_retry_interval_ms: 10_000,
            max_init_attempts: None,
            read_interval_ms: 5_000,
            iterations: None,
            sensor: SensorConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading harness config {}", path_ref.display()))?;
        let config: HarnessConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing harness config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(channel: u8, mains_rms_volts: f64, noise_mv: f64, seed: u64) -> Self {
        Self {
            channel: AdcChannel(channel),
            generator: GeneratorConfig {
                mains_rms_volts,
                noise_mv,
                seed,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn init_retry_interval(&self) -> Duration {
        Duration::from_millis(self.init_retry_interval_ms)
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_sets_channel_and_waveform() {
        let cfg = HarnessConfig::from_args(3, 120.0, 1.5, 9);
        assert_eq!(cfg.channel, AdcChannel(3));
        assert_eq!(cfg.generator.mains_rms_volts, 120.0);
        assert_eq!(cfg.sensor.window_size, 10);
        assert_eq!(cfg.read_interval(), Duration::from_secs(5));
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"channel: 6\nread_interval_ms: 250\nsensor:\n  window_size: 5\n  attenuation: Db6\ngenerator:\n  mains_rms_volts: 110.0\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = HarnessConfig::load(&path).unwrap();
        assert_eq!(cfg.channel, AdcChannel(6));
        assert_eq!(cfg.read_interval_ms, 250);
        assert_eq!(cfg.sensor.window_size, 5);
        assert_eq!(cfg.sensor.sampling_rate_hz, 25_000);
        assert_eq!(cfg.generator.mains_rms_volts, 110.0);
        assert_eq!(cfg.init_retry_interval_ms, 10_000);
    }

    #[test]
    fn config_load_reports_missing_file() {
        let err = HarnessConfig::load("/nonexistent/harness.yaml").unwrap_err();
        assert!(err.to_string().contains("reading harness config"));
    }
}
