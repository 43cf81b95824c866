pub mod acquisition;
pub mod buffer_pool;
pub mod median;
pub mod rms;

pub use acquisition::SampleAcquirer;
pub use buffer_pool::BufferPool;
pub use median::{median_filter_in_place, MedianFilter};
pub use rms::{estimate_rms, RmsEstimate, RmsEstimator};
