pub mod log;
pub mod metrics;
pub mod trace;

pub use self::log::LogManager;
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use trace::{CaptureObserver, CaptureRecord, CaptureTrace};
