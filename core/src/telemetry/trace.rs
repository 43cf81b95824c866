//! Optional per-capture observability.
//!
//! [`CaptureTrace`] renders the diagnostic dump format: two header lines
//! followed by every filtered sample in volts, 32 per line.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::calibration::CalibrationCurve;
use crate::prelude::{AdcChannel, Sample};
use crate::processing::rms::RmsEstimate;

const SAMPLES_PER_LINE: usize = 32;

/// Everything known about one finished capture.
pub struct CaptureRecord<'a> {
    pub channel: AdcChannel,
    pub sampling_rate_hz: u32,
    /// Buffer contents after median filtering.
    pub samples: &'a [Sample],
    pub calibration: &'a dyn CalibrationCurve,
    pub estimate: &'a RmsEstimate,
    pub elapsed: Duration,
}

/// Hook invoked after each successful reading.
pub trait CaptureObserver {
    fn on_capture(&mut self, capture: &CaptureRecord<'_>);
}

/// Keeps the text dump of the most recent capture.
#[derive(Debug, Default)]
pub struct CaptureTrace {
    last: Option<String>,
    captures: usize,
}

impl CaptureTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn captures(&self) -> usize {
        self.captures
    }

    pub fn render(capture: &CaptureRecord<'_>) -> String {
        let mut out = String::with_capacity(capture.samples.len() * 5 + 48);
        out.push_str(&format!("SAMPLING_FREQ: {}\n", capture.sampling_rate_hz));
        out.push_str(&format!("SAMPLED: {}\n", capture.samples.len()));
        for (idx, &sample) in capture.samples.iter().enumerate() {
            let volts = capture.calibration.raw_to_millivolts(sample) as f64 / 1000.0;
            out.push_str(&format!("{:.2} ", volts));
            if (idx + 1) % SAMPLES_PER_LINE == 0 {
                out.push('\n');
            }
        }
        out.push('\n');
        out
    }
}

impl CaptureObserver for CaptureTrace {
    fn on_capture(&mut self, capture: &CaptureRecord<'_>) {
        self.last = Some(Self::render(capture));
        self.captures += 1;
    }
}

impl<T: CaptureObserver> CaptureObserver for Arc<Mutex<T>> {
    fn on_capture(&mut self, capture: &CaptureRecord<'_>) {
        if let Ok(mut inner) = self.lock() {
            inner.on_capture(capture);
        }
    }
}
