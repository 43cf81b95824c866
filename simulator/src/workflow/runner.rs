use crate::generator::profile::SimulatedPeripheral;
use crate::workflow::config::HarnessConfig;
use anyhow::Context;
use log::{info, warn};
use tokio::time::sleep;
use zmptcore::telemetry::CaptureObserver;
use zmptcore::{VoltageReading, VoltageSensor};

#[derive(Debug)]
pub struct RunSummary {
    pub init_attempts: usize,
    pub readings: Vec<VoltageReading>,
}

#[derive(Clone)]
pub struct Runner {
    config: HarnessConfig,
}

impl Runner {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn build_sensor(
        &self,
        observer: Option<Box<dyn CaptureObserver + Send>>,
    ) -> VoltageSensor<SimulatedPeripheral> {
        let peripheral = SimulatedPeripheral::new(self.config.generator.clone());
        let sensor = VoltageSensor::new(peripheral, self.config.sensor.clone());
        match observer {
            Some(observer) => sensor.with_observer(observer),
            None => sensor,
        }
    }

    /// Retries `initialize` at the fixed back-off until it succeeds or the
    /// attempt limit is hit. Returns the number of attempts made.
    pub async fn initialize_with_retry(
        &self,
        sensor: &mut VoltageSensor<SimulatedPeripheral>,
    ) -> anyhow::Result<usize> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match sensor.initialize(self.config.channel) {
                Ok(()) => return Ok(attempts),
                Err(err) => {
                    if self
                        .config
                        .max_init_attempts
                        .is_some_and(|max| attempts >= max)
                    {
                        return Err(err).with_context(|| {
                            format!("initializing ZMPT101B sensor after {} attempts", attempts)
                        });
                    }
                    warn!(
                        "timeout {}msec before retry initialization ZMPT101B sensor: {}",
                        self.config.init_retry_interval_ms, err
                    );
                    sleep(self.config.init_retry_interval()).await;
                }
            }
        }
    }

    /// Initializes the sensor, then reads it every read interval. A failed
    /// read ends the run with an error.
    pub async fn run<F>(
        &self,
        sensor: &mut VoltageSensor<SimulatedPeripheral>,
        mut on_reading: F,
    ) -> anyhow::Result<RunSummary>
    where
        F: FnMut(&VoltageReading),
    {
        let init_attempts = self.initialize_with_retry(sensor).await?;
        let mut readings = Vec::new();

        loop {
            let reading = sensor
                .read(self.config.channel)
                .context("reading ZMPT101B voltage")?;
            info!("ZMPT101B return voltage = {}V", reading.rms);
            on_reading(&reading);
            readings.push(reading);

            if self
                .config
                .iterations
                .is_some_and(|limit| readings.len() >= limit)
            {
                break;
            }
            sleep(self.config.read_interval()).await;
        }

        Ok(RunSummary {
            init_attempts,
            readings,
        })
    }
}
