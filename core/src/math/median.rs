use crate::prelude::Sample;

/// Sorts a small window in place; insertion sort beats the general sort for
/// the handful of samples a median window holds.
pub fn insertion_sort(window: &mut [Sample]) {
    for j in 1..window.len() {
        let key = window[j];
        let mut k = j;
        while k > 0 && window[k - 1] > key {
            window[k] = window[k - 1];
            k -= 1;
        }
        window[k] = key;
    }
}

/// Middle element of a sorted window. Even-sized windows, which only occur
/// where the window is clipped at a buffer edge, take the lower middle.
pub fn median_of_sorted(sorted: &[Sample]) -> Option<Sample> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted[(sorted.len() - 1) / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_sort_orders_window() {
        let mut window = [9, 1, 8, 2, 7, 2];
        insertion_sort(&mut window);
        assert_eq!(window, [1, 2, 2, 7, 8, 9]);
    }

    #[test]
    fn median_picks_middle_or_lower_middle() {
        assert_eq!(median_of_sorted(&[]), None);
        assert_eq!(median_of_sorted(&[4]), Some(4));
        assert_eq!(median_of_sorted(&[1, 9]), Some(1));
        assert_eq!(median_of_sorted(&[1, 5, 9]), Some(5));
    }
}
