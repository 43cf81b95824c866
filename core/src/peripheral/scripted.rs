use std::collections::VecDeque;
use std::time::Duration;

use byte_slice_cast::AsByteSlice;

use crate::peripheral::{AdcPeripheral, EfuseCalibration, InitStep, PeripheralError};
use crate::prelude::{AdcChannel, AdcWidth, Attenuation, CaptureConfig, Sample};

/// One scripted outcome of a `read` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedRead {
    Chunk(Vec<u8>),
    Fail(PeripheralError),
}

impl ScriptedRead {
    /// Chunk carrying `samples` in the peripheral's native word layout.
    pub fn samples(samples: &[Sample]) -> Self {
        ScriptedRead::Chunk(samples.as_byte_slice().to_vec())
    }
}

/// In-memory peripheral useful for tests and deterministic playback.
///
/// Reads are served from a queue; a chunk larger than the destination is
/// split across calls. An exhausted script reports `InvalidState` instead of
/// blocking.
#[derive(Debug, Default)]
pub struct ScriptedPeripheral {
    reads: VecDeque<ScriptedRead>,
    failing_steps: Vec<InitStep>,
    efuse: EfuseCalibration,
    applied_steps: Vec<InitStep>,
    read_calls: usize,
    last_timeout: Option<Duration>,
}

impl ScriptedPeripheral {
    pub fn new(reads: impl IntoIterator<Item = ScriptedRead>) -> Self {
        Self {
            reads: reads.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Makes the named sub-steps fail on every `initialize`.
    pub fn failing(mut self, steps: impl IntoIterator<Item = InitStep>) -> Self {
        self.failing_steps = steps.into_iter().collect();
        self
    }

    pub fn with_efuse(mut self, efuse: EfuseCalibration) -> Self {
        self.efuse = efuse;
        self
    }

    pub fn push_read(&mut self, read: ScriptedRead) {
        self.reads.push_back(read);
    }

    pub fn clear_failures(&mut self) {
        self.failing_steps.clear();
    }

    /// Sub-steps that were attempted, failed ones included.
    pub fn applied_steps(&self) -> &[InitStep] {
        &self.applied_steps
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    pub fn remaining_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn last_timeout(&self) -> Option<Duration> {
        self.last_timeout
    }

    fn step(&mut self, step: InitStep) -> Result<(), PeripheralError> {
        self.applied_steps.push(step);
        if self.failing_steps.contains(&step) {
            Err(PeripheralError::InvalidState(format!("{} rejected", step)))
        } else {
            Ok(())
        }
    }
}

impl AdcPeripheral for ScriptedPeripheral {
    fn config_width(&mut self, _width: AdcWidth) -> Result<(), PeripheralError> {
        self.step(InitStep::Width)
    }

    fn config_channel_attenuation(
        &mut self,
        _channel: AdcChannel,
        _attenuation: Attenuation,
    ) -> Result<(), PeripheralError> {
        self.step(InitStep::Attenuation)
    }

    fn install_driver(&mut self, _capture: &CaptureConfig) -> Result<(), PeripheralError> {
        self.step(InitStep::DriverInstall)
    }

    fn set_clock(
        &mut self,
        _sample_rate_hz: u32,
        _bits_per_sample: u8,
    ) -> Result<(), PeripheralError> {
        self.step(InitStep::Clock)
    }

    fn set_adc_mode(&mut self, _channel: AdcChannel) -> Result<(), PeripheralError> {
        self.step(InitStep::AdcMode)
    }

    fn enable_adc(&mut self) -> Result<(), PeripheralError> {
        self.step(InitStep::AdcEnable)
    }

    fn read(
        &mut self,
        dst: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, PeripheralError> {
        self.read_calls += 1;
        self.last_timeout = timeout;
        match self.reads.pop_front() {
            Some(ScriptedRead::Chunk(mut chunk)) => {
                let count = chunk.len().min(dst.len());
                dst[..count].copy_from_slice(&chunk[..count]);
                if count < chunk.len() {
                    let rest = chunk.split_off(count);
                    self.reads.push_front(ScriptedRead::Chunk(rest));
                }
                Ok(count)
            }
            Some(ScriptedRead::Fail(err)) => Err(err),
            None => Err(PeripheralError::InvalidState("read script exhausted".into())),
        }
    }

    fn efuse(&self) -> EfuseCalibration {
        self.efuse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_chunk_is_split_across_reads() {
        let mut peripheral =
            ScriptedPeripheral::new(vec![ScriptedRead::Chunk(vec![1, 2, 3, 4, 5])]);
        let mut dst = [0u8; 3];
        assert_eq!(peripheral.read(&mut dst, None).unwrap(), 3);
        assert_eq!(dst, [1, 2, 3]);
        assert_eq!(peripheral.read(&mut dst, None).unwrap(), 2);
        assert_eq!(&dst[..2], &[4, 5]);
        assert!(peripheral.read(&mut dst, None).is_err());
        assert_eq!(peripheral.read_calls(), 3);
    }

    #[test]
    fn failing_steps_are_reported_and_recorded() {
        let mut peripheral = ScriptedPeripheral::default().failing([InitStep::Clock]);
        assert!(peripheral.config_width(AdcWidth::Bit12).is_ok());
        assert!(peripheral.set_clock(25_000, 16).is_err());
        assert_eq!(peripheral.applied_steps(), &[InitStep::Width, InitStep::Clock]);
    }
}
