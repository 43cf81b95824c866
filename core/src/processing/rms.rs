use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationCurve;
use crate::math::stats::StatsHelper;
use crate::prelude::{FilteredExtremes, Sample};
use crate::telemetry::log::LogManager;

/// Calibrated extremes and the RMS derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RmsEstimate {
    pub min_mv: u32,
    pub max_mv: u32,
    /// Unrounded RMS in millivolts.
    pub rms_mv: f64,
    /// RMS rounded to the nearest whole unit.
    pub rms: u16,
}

impl RmsEstimate {
    pub fn peak_to_peak_mv(&self) -> i64 {
        i64::from(self.max_mv) - i64::from(self.min_mv)
    }
}

/// Converts filtered extremes to an RMS value, assuming a sinusoid.
#[derive(Default)]
pub struct RmsEstimator {
    logger: LogManager,
}

impl RmsEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate<C>(&self, extremes: FilteredExtremes, calibration: &C) -> RmsEstimate
    where
        C: CalibrationCurve + ?Sized,
    {
        let estimate = estimate_rms(extremes.min, extremes.max, calibration);
        if estimate.peak_to_peak_mv() < 0 {
            self.logger.warn(&format!(
                "calibrated maximum {} mV is below minimum {} mV",
                estimate.max_mv, estimate.min_mv
            ));
        }
        estimate
    }
}

/// `rms = ((max_mv - min_mv) / 2) / sqrt(2)`, rounded half away from zero.
/// An inverted pair (only possible with a non-monotonic curve) yields zero.
pub fn estimate_rms<C>(min_raw: Sample, max_raw: Sample, calibration: &C) -> RmsEstimate
where
    C: CalibrationCurve + ?Sized,
{
    let min_mv = calibration.raw_to_millivolts(min_raw);
    let max_mv = calibration.raw_to_millivolts(max_raw);
    let peak_to_peak = (i64::from(max_mv) - i64::from(min_mv)).max(0);
    let rms_mv = StatsHelper::sine_rms_from_peak_to_peak(peak_to_peak as f64);
    let rms = rms_mv.round().min(f64::from(u16::MAX)) as u16;

    RmsEstimate {
        min_mv,
        max_mv,
        rms_mv,
        rms,
    }
}
