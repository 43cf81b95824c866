use std::f64::consts::SQRT_2;

pub struct StatsHelper;

impl StatsHelper {
    /// RMS of a sinusoid whose full swing is `peak_to_peak`.
    pub fn sine_rms_from_peak_to_peak(peak_to_peak: f64) -> f64 {
        (peak_to_peak / 2.0) / SQRT_2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::Sample;

    #[test]
    fn sine_rms_matches_sampled_adc_codes() {
        // One mains cycle of 12-bit codes swinging 1000 counts around mid-scale.
        let codes: Vec<Sample> = (0..500)
            .map(|i| {
                let phase = i as f64 / 500.0 * 2.0 * std::f64::consts::PI;
                (2048.0 + 500.0 * phase.sin()).round() as Sample
            })
            .collect();
        let mean_sq = codes
            .iter()
            .map(|&code| (f64::from(code) - 2048.0).powi(2))
            .sum::<f64>()
            / codes.len() as f64;
        let derived = StatsHelper::sine_rms_from_peak_to_peak(1000.0);
        assert!((mean_sq.sqrt() - derived).abs() < 0.5);
    }

    #[test]
    fn flat_signal_has_no_rms() {
        assert_eq!(StatsHelper::sine_rms_from_peak_to_peak(0.0), 0.0);
    }
}
