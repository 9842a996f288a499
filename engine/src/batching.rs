use std::ops::Range;

/// Splits `len` samples into windows of exactly `batch_size` samples.
///
/// The cursor advances by `batch_size` each step. When the next advance would
/// reach or pass the end, the window is instead the last `batch_size` samples
/// of the collection, so the final two windows can overlap and no short batch
/// is ever produced. A `batch_size` above `len` is clamped to `len`.
///
/// For `len = 20` and `batch_size = 8` the windows are `0..8`, `8..16` and `12..20`.
pub fn trailing_windows(len: usize, batch_size: usize) -> TrailingWindows {
    TrailingWindows {
        len,
        batch_size: batch_size.clamp(1, len.max(1)),
        cursor: 0,
    }
}

/// Iterator returned by `trailing_windows`.
#[derive(Debug, Clone)]
pub struct TrailingWindows {
    len: usize,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for TrailingWindows {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }

        let start = self.cursor;
        self.cursor += self.batch_size;

        if self.cursor >= self.len {
            Some(self.len - self.batch_size..self.len)
        } else {
            Some(start..self.cursor)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len.saturating_sub(self.cursor).div_ceil(self.batch_size);
        (left, Some(left))
    }
}

impl ExactSizeIterator for TrailingWindows {}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(len: usize, batch_size: usize) -> Vec<Range<usize>> {
        trailing_windows(len, batch_size).collect()
    }

    #[test]
    fn last_window_reuses_the_tail() {
        assert_eq!(windows(20, 8), vec![0..8, 8..16, 12..20]);
    }

    #[test]
    fn exact_multiple_has_no_overlap() {
        assert_eq!(windows(16, 8), vec![0..8, 8..16]);
    }

    #[test]
    fn oversized_batch_is_clamped() {
        assert_eq!(windows(5, 16), vec![0..5]);
    }

    #[test]
    fn every_window_has_the_batch_size() {
        for len in 1..40 {
            for batch_size in 1..=len {
                for range in trailing_windows(len, batch_size) {
                    assert_eq!(range.len(), batch_size, "len={len} batch={batch_size}");
                    assert!(range.end <= len);
                }
            }
        }
    }

    #[test]
    fn every_sample_is_covered() {
        let mut seen = [false; 23];
        for range in trailing_windows(23, 5) {
            seen[range].iter_mut().for_each(|s| *s = true);
        }

        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn empty_collection_has_no_windows() {
        assert!(windows(0, 8).is_empty());
    }

    #[test]
    fn size_hint_matches_count() {
        let iter = trailing_windows(20, 8);
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.count(), 3);
    }
}
