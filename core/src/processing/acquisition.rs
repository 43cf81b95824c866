use std::time::Duration;

use byte_slice_cast::AsMutByteSlice;

use crate::peripheral::AdcPeripheral;
use crate::prelude::{Sample, SensorConfig, SensorError, SensorResult};
use crate::processing::buffer_pool::BufferPool;
use crate::telemetry::log::LogManager;

/// Fills a fixed-size sample buffer from the DMA-fed peripheral.
pub struct SampleAcquirer {
    target_samples: usize,
    read_timeout: Option<Duration>,
    pool: BufferPool,
    logger: LogManager,
}

impl SampleAcquirer {
    pub fn new(target_samples: usize, read_timeout: Option<Duration>) -> Self {
        Self {
            target_samples,
            read_timeout,
            pool: BufferPool::with_capacity(1),
            logger: LogManager::default(),
        }
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(config.target_samples(), config.read_timeout())
    }

    pub fn target_samples(&self) -> usize {
        self.target_samples
    }

    /// Reads until the full buffer has arrived. Short and empty reads count as
    /// progress; a failed read drops the partial capture and aborts.
    ///
    /// The peripheral writes straight into the byte view of the sample words,
    /// so repacking is a reinterpretation in native byte order.
    pub fn acquire<P>(&mut self, peripheral: &mut P) -> SensorResult<Vec<Sample>>
    where
        P: AdcPeripheral + ?Sized,
    {
        let mut buffer = self.pool.checkout(self.target_samples)?;

        let result = {
            let bytes = buffer.as_mut_byte_slice();
            fill(peripheral, bytes, self.read_timeout)
        };

        match result {
            Ok(reads) => {
                self.logger.debug(&format!(
                    "captured {} samples in {} reads",
                    self.target_samples, reads
                ));
                Ok(buffer)
            }
            Err(err) => {
                self.logger.error(&format!("failed to read data: {}", err));
                self.pool.release(buffer);
                Err(err)
            }
        }
    }

    /// Hands a buffer back for the next acquisition.
    pub fn release(&mut self, buffer: Vec<Sample>) {
        self.pool.release(buffer);
    }
}

fn fill<P>(
    peripheral: &mut P,
    bytes: &mut [u8],
    timeout: Option<Duration>,
) -> SensorResult<usize>
where
    P: AdcPeripheral + ?Sized,
{
    let mut total = 0;
    let mut reads = 0;
    while total < bytes.len() {
        let received = peripheral
            .read(&mut bytes[total..], timeout)
            .map_err(SensorError::ReadFailure)?;
        reads += 1;
        total += received.min(bytes.len() - total);
    }
    Ok(reads)
}
