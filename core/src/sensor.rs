use std::time::Instant;

use crate::calibration::{characterize, AdcCharacteristics};
use crate::peripheral::{AdcPeripheral, InitStep, PeripheralError};
use crate::prelude::{
    AdcChannel, InitFailures, SensorConfig, SensorError, SensorResult, StepFailure,
    VoltageReading,
};
use crate::processing::{MedianFilter, RmsEstimator, SampleAcquirer};
use crate::telemetry::{
    CaptureObserver, CaptureRecord, LogManager, MetricsRecorder, MetricsSnapshot,
};

#[derive(Debug, Clone, Copy)]
struct ActiveChannel {
    channel: AdcChannel,
    characteristics: AdcCharacteristics,
}

/// ZMPT101B voltage sensor on one ADC channel.
///
/// `initialize` characterizes the ADC and configures the capture peripheral;
/// each `read_voltage` then acquires one buffer, median-filters it and turns
/// the filtered extremes into an RMS estimate. Calls are expected to be
/// serialized by the caller; the sensor holds no locks.
pub struct VoltageSensor<P: AdcPeripheral> {
    peripheral: P,
    config: SensorConfig,
    acquirer: SampleAcquirer,
    filter: MedianFilter,
    estimator: RmsEstimator,
    active: Option<ActiveChannel>,
    observer: Option<Box<dyn CaptureObserver + Send>>,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl<P: AdcPeripheral> VoltageSensor<P> {
    pub fn new(peripheral: P, config: SensorConfig) -> Self {
        Self {
            peripheral,
            acquirer: SampleAcquirer::from_config(&config),
            filter: MedianFilter::new(config.window_size),
            estimator: RmsEstimator::new(),
            config,
            active: None,
            observer: None,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn CaptureObserver + Send>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Characterizes the ADC and brings up the DMA capture for `channel`.
    ///
    /// Every configuration sub-step is attempted even after one fails; the
    /// failures are reported together and nothing already applied is undone.
    /// The sensor stays unusable until a later call succeeds.
    pub fn initialize(&mut self, channel: AdcChannel) -> SensorResult<()> {
        self.active = None;
        if !channel.is_valid() {
            return Err(SensorError::InvalidConfig(format!(
                "ADC1 has no channel {}",
                channel.index()
            )));
        }
        self.config.validate()?;

        self.logger
            .record(&format!("Initializing ADC for channel {}", channel.index()));
        let efuse = self.peripheral.efuse();
        self.logger.record(&format!(
            "eFuse Two Point: {}",
            supported(efuse.two_point.is_some())
        ));
        self.logger
            .record(&format!("eFuse Vref: {}", supported(efuse.vref_mv.is_some())));

        let characteristics = characterize(
            self.config.attenuation,
            self.config.width,
            self.config.default_vref_mv,
            &efuse,
        );
        self.logger
            .record(&format!("Characterized using {}", characteristics.source));

        let failures = self.configure_peripheral(channel);
        if !failures.is_empty() {
            self.logger
                .error(&format!("Failed to initialize ADC ({})", failures));
            return Err(SensorError::Initialization(failures));
        }

        self.acquirer = SampleAcquirer::from_config(&self.config);
        self.filter = MedianFilter::new(self.config.window_size);
        self.active = Some(ActiveChannel {
            channel,
            characteristics,
        });
        Ok(())
    }

    fn configure_peripheral(&mut self, channel: AdcChannel) -> InitFailures {
        let capture = self.config.capture_config();
        let mut failures = Vec::new();
        for step in InitStep::ALL {
            let outcome: Result<(), PeripheralError> = match step {
                InitStep::Width => self.peripheral.config_width(self.config.width),
                InitStep::Attenuation => self
                    .peripheral
                    .config_channel_attenuation(channel, self.config.attenuation),
                InitStep::DriverInstall => self.peripheral.install_driver(&capture),
                InitStep::Clock => self
                    .peripheral
                    .set_clock(capture.sample_rate_hz, capture.bits_per_sample),
                InitStep::AdcMode => self.peripheral.set_adc_mode(channel),
                InitStep::AdcEnable => self.peripheral.enable_adc(),
            };
            if let Err(error) = outcome {
                failures.push(StepFailure { step, error });
            }
        }
        InitFailures(failures)
    }

    /// RMS voltage of one capture, in whole reporting units.
    pub fn read_voltage(&mut self, channel: AdcChannel) -> SensorResult<u16> {
        self.read(channel).map(|reading| reading.rms)
    }

    /// Runs the full acquisition pipeline and reports its intermediate values.
    pub fn read(&mut self, channel: AdcChannel) -> SensorResult<VoltageReading> {
        match self.acquire_reading(channel) {
            Ok(reading) => {
                self.metrics.record_reading(reading.rms);
                Ok(reading)
            }
            Err(err) => {
                self.metrics.record_error();
                Err(err)
            }
        }
    }

    fn acquire_reading(&mut self, channel: AdcChannel) -> SensorResult<VoltageReading> {
        let active = self.active.ok_or(SensorError::NotInitialized)?;
        if active.channel != channel {
            return Err(SensorError::ChannelNotConfigured(channel));
        }
        self.logger
            .debug(&format!("read voltage for channel {}", channel.index()));

        let started = Instant::now();
        let mut samples = self.acquirer.acquire(&mut self.peripheral)?;

        // Median filtering removes the ripple before extremes are taken.
        let extremes = match self.filter.apply(&mut samples) {
            Ok(extremes) => extremes,
            Err(err) => {
                self.acquirer.release(samples);
                return Err(err);
            }
        };
        let estimate = self.estimator.estimate(extremes, &active.characteristics);
        let elapsed = started.elapsed();

        if let Some(observer) = self.observer.as_mut() {
            observer.on_capture(&CaptureRecord {
                channel,
                sampling_rate_hz: self.config.sampling_rate_hz,
                samples: &samples,
                calibration: &active.characteristics,
                estimate: &estimate,
                elapsed,
            });
        }

        self.logger.debug(&format!(
            "performance time: {} microseconds, delta {:.2}V, max {:.2}V, min {:.2}V, measuring {}V",
            elapsed.as_micros(),
            estimate.peak_to_peak_mv() as f64 / 1000.0,
            estimate.max_mv as f64 / 1000.0,
            estimate.min_mv as f64 / 1000.0,
            estimate.rms
        ));

        let reading = VoltageReading {
            channel,
            rms: estimate.rms,
            min_mv: estimate.min_mv,
            max_mv: estimate.max_mv,
            samples: samples.len(),
            elapsed_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        };
        self.acquirer.release(samples);
        Ok(reading)
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub fn channel(&self) -> Option<AdcChannel> {
        self.active.map(|active| active.channel)
    }

    pub fn characteristics(&self) -> Option<&AdcCharacteristics> {
        self.active.as_ref().map(|active| &active.characteristics)
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }
}

fn supported(flag: bool) -> &'static str {
    if flag {
        "Supported"
    } else {
        "NOT supported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationCurve, CalibrationSource};
    use crate::peripheral::{EfuseCalibration, ScriptedPeripheral, ScriptedRead};
    use crate::prelude::Sample;
    use crate::telemetry::CaptureTrace;
    use std::sync::{Arc, Mutex};

    fn small_config() -> SensorConfig {
        SensorConfig {
            dma_buffer_len: 32,
            repack_factor: 2,
            window_size: 3,
            ..Default::default()
        }
    }

    /// 32-sample square-ish wave with one spike on each plateau.
    fn capture_words() -> Vec<Sample> {
        let mut words: Vec<Sample> = (0..32)
            .map(|i| if (i / 8) % 2 == 0 { 1800 } else { 1400 })
            .collect();
        words[3] = 4095;
        words[12] = 0;
        words
    }

    #[test]
    fn read_before_initialize_fails() {
        let mut sensor = VoltageSensor::new(ScriptedPeripheral::default(), small_config());
        assert!(matches!(
            sensor.read_voltage(AdcChannel(0)),
            Err(SensorError::NotInitialized)
        ));
        assert_eq!(sensor.metrics().errors, 1);
    }

    #[test]
    fn initialize_runs_every_step_and_characterizes() {
        let peripheral = ScriptedPeripheral::default().with_efuse(EfuseCalibration {
            two_point: None,
            vref_mv: Some(1121),
        });
        let mut sensor = VoltageSensor::new(peripheral, small_config());
        sensor.initialize(AdcChannel(0)).unwrap();
        assert!(sensor.is_initialized());
        assert_eq!(sensor.peripheral().applied_steps(), &InitStep::ALL);
        assert_eq!(
            sensor.characteristics().map(|c| c.source),
            Some(CalibrationSource::EfuseVref)
        );
    }

    #[test]
    fn initialize_aggregates_failed_steps_without_stopping() {
        let peripheral =
            ScriptedPeripheral::default().failing([InitStep::Width, InitStep::Clock]);
        let mut sensor = VoltageSensor::new(peripheral, small_config());
        let err = sensor.initialize(AdcChannel(0)).unwrap_err();
        match err {
            SensorError::Initialization(failures) => {
                assert_eq!(
                    failures.steps().collect::<Vec<_>>(),
                    vec![InitStep::Width, InitStep::Clock]
                );
            }
            other => panic!("unexpected error {other:?}"),
        }
        // All six sub-steps were still attempted.
        assert_eq!(sensor.peripheral().applied_steps().len(), 6);
        assert!(!sensor.is_initialized());

        sensor.peripheral_mut().clear_failures();
        assert!(sensor.initialize(AdcChannel(0)).is_ok());
    }

    #[test]
    fn initialize_rejects_invalid_channel_and_config() {
        let mut sensor = VoltageSensor::new(ScriptedPeripheral::default(), small_config());
        assert!(matches!(
            sensor.initialize(AdcChannel(8)),
            Err(SensorError::InvalidConfig(_))
        ));

        let oversized = SensorConfig {
            window_size: 33,
            ..small_config()
        };
        let mut sensor = VoltageSensor::new(ScriptedPeripheral::default(), oversized);
        assert!(matches!(
            sensor.initialize(AdcChannel(0)),
            Err(SensorError::WindowTooLarge { .. })
        ));
        assert!(sensor.peripheral().applied_steps().is_empty());
    }

    #[test]
    fn read_voltage_filters_spikes_and_estimates_rms() {
        let words = capture_words();
        let peripheral = ScriptedPeripheral::new(vec![
            ScriptedRead::samples(&words[..10]),
            ScriptedRead::samples(&words[10..]),
        ]);
        let trace = Arc::new(Mutex::new(CaptureTrace::new()));
        let mut sensor = VoltageSensor::new(peripheral, small_config())
            .with_observer(Box::new(trace.clone()));
        sensor.initialize(AdcChannel(0)).unwrap();

        let reading = sensor.read(AdcChannel(0)).unwrap();
        let chars = *sensor.characteristics().unwrap();
        assert_eq!(reading.samples, 32);
        assert_eq!(reading.min_mv, chars.raw_to_millivolts(1400));
        assert_eq!(reading.max_mv, chars.raw_to_millivolts(1800));
        let expected = (reading.delta_mv() as f64 / 2.0 / std::f64::consts::SQRT_2).round();
        assert_eq!(reading.rms, expected as u16);

        let trace = trace.lock().unwrap();
        assert_eq!(trace.captures(), 1);
        assert!(trace
            .last()
            .unwrap()
            .starts_with("SAMPLING_FREQ: 25000\nSAMPLED: 32\n"));
        assert_eq!(sensor.metrics().last_rms, Some(reading.rms));
    }

    #[test]
    fn read_on_other_channel_is_rejected() {
        let mut sensor = VoltageSensor::new(ScriptedPeripheral::default(), small_config());
        sensor.initialize(AdcChannel(0)).unwrap();
        assert!(matches!(
            sensor.read_voltage(AdcChannel(3)),
            Err(SensorError::ChannelNotConfigured(AdcChannel(3)))
        ));
    }

    #[test]
    fn read_failure_propagates_and_next_read_recovers() {
        let words = capture_words();
        let peripheral = ScriptedPeripheral::new(vec![
            ScriptedRead::samples(&words[..4]),
            ScriptedRead::Fail(PeripheralError::Timeout),
            ScriptedRead::samples(&words),
        ]);
        let mut sensor = VoltageSensor::new(peripheral, small_config());
        sensor.initialize(AdcChannel(0)).unwrap();

        assert!(matches!(
            sensor.read_voltage(AdcChannel(0)),
            Err(SensorError::ReadFailure(PeripheralError::Timeout))
        ));
        assert!(sensor.read_voltage(AdcChannel(0)).is_ok());
        let metrics = sensor.metrics();
        assert_eq!((metrics.readings, metrics.errors), (1, 1));
    }
}
