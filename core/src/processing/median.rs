use std::collections::VecDeque;

use crate::math::median::{insertion_sort, median_of_sorted};
use crate::prelude::{FilteredExtremes, Sample, SensorError, SensorResult};
use crate::processing::buffer_pool::scratch;

/// Sliding-window median denoiser that overwrites the capture buffer.
#[derive(Debug, Clone, Copy)]
pub struct MedianFilter {
    window_size: usize,
}

impl MedianFilter {
    pub fn new(window_size: usize) -> Self {
        Self { window_size }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Window actually used after bumping an even size to odd.
    pub fn effective_window(&self) -> usize {
        coerce_odd(self.window_size)
    }

    pub fn apply(&self, buffer: &mut [Sample]) -> SensorResult<FilteredExtremes> {
        median_filter_in_place(buffer, self.window_size)
    }
}

fn coerce_odd(window_size: usize) -> usize {
    if window_size % 2 == 0 {
        window_size + 1
    } else {
        window_size
    }
}

/// Replaces every sample with the median of its neighbourhood and returns the
/// extremes of the filtered result.
///
/// Windows are clipped at the buffer edges rather than padded, so the first
/// and last `window_size / 2` samples see a smaller window. Every window is
/// taken from the unfiltered samples: a median is only written back once no
/// later window can reach its index.
///
/// Fails without touching `data` when `window_size` exceeds the buffer length
/// or the buffer is empty.
pub fn median_filter_in_place(
    data: &mut [Sample],
    window_size: usize,
) -> SensorResult<FilteredExtremes> {
    let length = data.len();
    if window_size > length {
        return Err(SensorError::WindowTooLarge {
            window: window_size,
            length,
        });
    }
    if length == 0 {
        return Err(SensorError::InvalidConfig(
            "cannot filter an empty sample buffer".into(),
        ));
    }

    let window_size = coerce_odd(window_size);
    let half_window = window_size / 2;
    let mut window = scratch(window_size)?;
    let mut pending = VecDeque::from(scratch(half_window + 1)?);

    let mut extremes = FilteredExtremes {
        min: Sample::MAX,
        max: Sample::MIN,
    };

    for i in 0..length {
        let start = i.saturating_sub(half_window);
        let end = (i + half_window).min(length - 1);

        window.clear();
        window.extend_from_slice(&data[start..=end]);
        insertion_sort(&mut window);
        pending.push_back(median_of_sorted(&window).unwrap_or(data[i]));

        // Index i - half_window is outside every window still to come.
        if pending.len() > half_window {
            if let Some(median) = pending.pop_front() {
                commit(data, i - half_window, median, &mut extremes);
            }
        }
    }

    let first_pending = length - pending.len();
    for (offset, median) in pending.drain(..).enumerate() {
        commit(data, first_pending + offset, median, &mut extremes);
    }

    Ok(extremes)
}

fn commit(data: &mut [Sample], idx: usize, value: Sample, extremes: &mut FilteredExtremes) {
    data[idx] = value;
    extremes.max = extremes.max.max(value);
    extremes.min = extremes.min.min(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_random(len: usize, seed: u32) -> Vec<Sample> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((state >> 16) % 4096) as Sample
            })
            .collect()
    }

    #[test]
    fn clipped_edges_match_hand_trace() {
        let mut data = vec![9, 1, 8, 2, 7];
        let extremes = median_filter_in_place(&mut data, 3).unwrap();
        assert_eq!(data, vec![1, 8, 2, 7, 2]);
        assert_eq!(extremes, FilteredExtremes { min: 1, max: 8 });
    }

    #[test]
    fn constant_sequence_is_unchanged() {
        let mut data = vec![2048; 64];
        let extremes = median_filter_in_place(&mut data, 10).unwrap();
        assert!(data.iter().all(|&v| v == 2048));
        assert_eq!(extremes, FilteredExtremes { min: 2048, max: 2048 });
    }

    #[test]
    fn extremes_bound_the_filtered_buffer() {
        for length in 1..40 {
            for window in 0..=length.min(12) {
                let mut data = pseudo_random(length, (length * 31 + window) as u32);
                let extremes = median_filter_in_place(&mut data, window).unwrap();
                assert_eq!(extremes.min, *data.iter().min().unwrap());
                assert_eq!(extremes.max, *data.iter().max().unwrap());
                assert!(extremes.min <= extremes.max);
            }
        }
    }

    #[test]
    fn even_window_behaves_like_next_odd_window() {
        let original = pseudo_random(128, 7);
        for window in [2, 4, 10] {
            let mut even = original.clone();
            let mut odd = original.clone();
            let even_extremes = median_filter_in_place(&mut even, window).unwrap();
            let odd_extremes = median_filter_in_place(&mut odd, window + 1).unwrap();
            assert_eq!(even, odd);
            assert_eq!(even_extremes, odd_extremes);
        }
        assert_eq!(MedianFilter::new(10).effective_window(), 11);
        assert_eq!(MedianFilter::new(11).effective_window(), 11);
    }

    #[test]
    fn oversized_window_leaves_buffer_untouched() {
        let mut data = vec![5, 4, 3];
        let err = median_filter_in_place(&mut data, 4).unwrap_err();
        assert!(matches!(
            err,
            SensorError::WindowTooLarge {
                window: 4,
                length: 3
            }
        ));
        assert_eq!(data, vec![5, 4, 3]);
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let mut data: Vec<Sample> = Vec::new();
        assert!(matches!(
            median_filter_in_place(&mut data, 0),
            Err(SensorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unit_window_keeps_samples() {
        let original = pseudo_random(16, 3);
        for window in [0, 1] {
            let mut data = original.clone();
            median_filter_in_place(&mut data, window).unwrap();
            assert_eq!(data, original);
        }
    }

    #[test]
    fn windows_read_unfiltered_neighbours() {
        // A filter reading its own output would flatten the step to 0 here.
        let mut data = vec![5, 0, 5, 0, 5];
        let extremes = median_filter_in_place(&mut data, 3).unwrap();
        assert_eq!(data, vec![0, 5, 0, 5, 0]);
        assert_eq!(extremes, FilteredExtremes { min: 0, max: 5 });
    }

    #[test]
    fn isolated_spikes_are_removed() {
        let mut data = vec![1000; 50];
        data[10] = 4095;
        data[30] = 0;
        let extremes = MedianFilter::new(10).apply(&mut data).unwrap();
        assert_eq!(extremes, FilteredExtremes { min: 1000, max: 1000 });
    }
}
