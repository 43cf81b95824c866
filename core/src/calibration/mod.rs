//! Raw-code to millivolt conversion.

pub mod characteristics;

use crate::prelude::Sample;

pub use characteristics::{characterize, AdcCharacteristics, CalibrationSource};

/// Monotonic mapping from a raw ADC code to millivolts.
pub trait CalibrationCurve {
    fn raw_to_millivolts(&self, raw: Sample) -> u32;
}

impl<F> CalibrationCurve for F
where
    F: Fn(Sample) -> u32,
{
    fn raw_to_millivolts(&self, raw: Sample) -> u32 {
        self(raw)
    }
}
