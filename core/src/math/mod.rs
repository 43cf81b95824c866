pub mod median;
pub mod stats;

pub use median::{insertion_sort, median_of_sorted};
pub use stats::StatsHelper;
