use std::f64::consts::PI;

/// Value of a unit sine of `frequency_hz` at sample `index`.
pub fn sine_at(index: u64, sample_rate_hz: u32, frequency_hz: f64) -> f64 {
    let t = index as f64 / f64::from(sample_rate_hz.max(1));
    (2.0 * PI * frequency_hz * t).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_period_reaches_peak() {
        // 25 kHz / 50 Hz = 500 samples per cycle
        assert!((sine_at(125, 25_000, 50.0) - 1.0).abs() < 1e-9);
        assert!(sine_at(0, 25_000, 50.0).abs() < 1e-9);
    }
}
