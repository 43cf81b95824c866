use log::{debug, error, info, warn};

/// Log target shared by every message the sensor emits.
pub const SENSOR_TAG: &str = "zmpt101b";

pub struct LogManager {
    target: &'static str,
}

impl LogManager {
    pub fn new() -> Self {
        Self::with_target(SENSOR_TAG)
    }

    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn record(&self, message: &str) {
        info!(target: self.target, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        debug!(target: self.target, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(target: self.target, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(target: self.target, "{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
