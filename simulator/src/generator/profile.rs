use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;
use std::time::Duration;
use zmptcore::calibration::{characterize, AdcCharacteristics};
use zmptcore::peripheral::{AdcPeripheral, EfuseCalibration, PeripheralError};
use zmptcore::prelude::{
    AdcChannel, AdcWidth, Attenuation, CaptureConfig, Sample, ADC_12_BIT_MAX,
};

use crate::generator::template::sine_at;

/// Configuration of the simulated sensor front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Mains RMS; the board trim maps one mains volt to one sensor millivolt.
    pub mains_rms_volts: f64,
    pub mains_frequency_hz: f64,
    /// DC level the sensor output swings around.
    pub center_mv: f64,
    /// Peak of the uniform noise added to every sample.
    pub noise_mv: f64,
    /// Chance that a sample is replaced by a full-scale or zero glitch.
    pub spike_probability: f64,
    pub seed: u64,
    /// Bytes delivered per read call at most.
    pub chunk_bytes: usize,
    /// Reference voltage of the simulated chip.
    pub chip_vref_mv: u32,
    /// Whether the chip advertises its Vref through eFuse.
    pub efuse_vref: bool,
    /// Number of initializations that fail before the ADC comes up.
    pub failing_init_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mains_rms_volts: 230.0,
            mains_frequency_hz: 50.0,
            center_mv: 1650.0,
            noise_mv: 3.0,
            spike_probability: 0.002,
            seed: 0,
            chunk_bytes: 1024,
            chip_vref_mv: 1100,
            efuse_vref: false,
            failing_init_attempts: 0,
        }
    }
}

/// Peripheral producing a continuous noisy mains sinusoid.
pub struct SimulatedPeripheral {
    config: GeneratorConfig,
    rng: StdRng,
    characteristics: AdcCharacteristics,
    sample_rate_hz: u32,
    sample_index: u64,
    failed_inits: usize,
    driver_installed: bool,
    enabled: bool,
}

impl SimulatedPeripheral {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let characteristics = characterize(
            Attenuation::Db12,
            AdcWidth::Bit12,
            config.chip_vref_mv,
            &EfuseCalibration::default(),
        );
        Self {
            config,
            rng,
            characteristics,
            sample_rate_hz: 0,
            sample_index: 0,
            failed_inits: 0,
            driver_installed: false,
            enabled: false,
        }
    }

    #[cfg(test)]
    pub fn samples_generated(&self) -> u64 {
        self.sample_index
    }

    fn recharacterize(&mut self, width: AdcWidth, attenuation: Attenuation) {
        self.characteristics = characterize(
            attenuation,
            width,
            self.config.chip_vref_mv,
            &EfuseCalibration::default(),
        );
    }

    fn next_sample(&mut self) -> Sample {
        let index = self.sample_index;
        self.sample_index += 1;

        let spike_probability = self.config.spike_probability.clamp(0.0, 1.0);
        if spike_probability > 0.0 && self.rng.gen_bool(spike_probability) {
            return if self.rng.gen_bool(0.5) {
                ADC_12_BIT_MAX
            } else {
                0
            };
        }

        let amplitude_mv = self.config.mains_rms_volts * SQRT_2;
        let noise = if self.config.noise_mv > 0.0 {
            self.rng.gen_range(-self.config.noise_mv..self.config.noise_mv)
        } else {
            0.0
        };
        let wave = sine_at(index, self.sample_rate_hz, self.config.mains_frequency_hz);
        let millivolts = (self.config.center_mv + amplitude_mv * wave + noise).max(0.0);
        self.characteristics.raw_for_millivolts(millivolts.round() as u32)
    }
}

impl AdcPeripheral for SimulatedPeripheral {
    fn config_width(&mut self, width: AdcWidth) -> Result<(), PeripheralError> {
        self.recharacterize(width, self.characteristics.attenuation);
        Ok(())
    }

    fn config_channel_attenuation(
        &mut self,
        channel: AdcChannel,
        attenuation: Attenuation,
    ) -> Result<(), PeripheralError> {
        if !channel.is_valid() {
            return Err(PeripheralError::InvalidState(format!(
                "no such channel {}",
                channel
            )));
        }
        self.recharacterize(self.characteristics.width, attenuation);
        Ok(())
    }

    fn install_driver(&mut self, capture: &CaptureConfig) -> Result<(), PeripheralError> {
        if capture.dma_buffer_len == 0 {
            return Err(PeripheralError::InvalidState("empty DMA buffer".into()));
        }
        self.driver_installed = true;
        Ok(())
    }

    fn set_clock(
        &mut self,
        sample_rate_hz: u32,
        _bits_per_sample: u8,
    ) -> Result<(), PeripheralError> {
        if sample_rate_hz == 0 {
            return Err(PeripheralError::InvalidState("zero sample rate".into()));
        }
        self.sample_rate_hz = sample_rate_hz;
        Ok(())
    }

    fn set_adc_mode(&mut self, channel: AdcChannel) -> Result<(), PeripheralError> {
        if !self.driver_installed {
            return Err(PeripheralError::InvalidState(format!(
                "driver not installed for {}",
                channel
            )));
        }
        Ok(())
    }

    fn enable_adc(&mut self) -> Result<(), PeripheralError> {
        if self.failed_inits < self.config.failing_init_attempts {
            self.failed_inits += 1;
            return Err(PeripheralError::Fault("ADC did not come up".into()));
        }
        if !self.driver_installed {
            return Err(PeripheralError::InvalidState("driver not installed".into()));
        }
        self.enabled = true;
        Ok(())
    }

    fn read(
        &mut self,
        dst: &mut [u8],
        _timeout: Option<Duration>,
    ) -> Result<usize, PeripheralError> {
        if !self.enabled {
            return Err(PeripheralError::InvalidState("ADC not enabled".into()));
        }
        let chunk = self.config.chunk_bytes.max(2);
        // Whole words only.
        let count = dst.len().min(chunk) & !1;
        for word in dst[..count].chunks_exact_mut(2) {
            word.copy_from_slice(&self.next_sample().to_ne_bytes());
        }
        Ok(count)
    }

    fn efuse(&self) -> EfuseCalibration {
        EfuseCalibration {
            two_point: None,
            vref_mv: self.config.efuse_vref.then_some(self.config.chip_vref_mv),
        }
    }
}
