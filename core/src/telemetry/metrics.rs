/// In-process reading counters.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    readings: usize,
    errors: usize,
    last_rms: Option<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub readings: usize,
    pub errors: usize,
    pub last_rms: Option<u16>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_reading(&mut self, rms: u16) {
        self.readings += 1;
        self.last_rms = Some(rms);
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            readings: self.readings,
            errors: self.errors,
            last_rms: self.last_rms,
        }
    }
}
