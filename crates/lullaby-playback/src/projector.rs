//! Maps playback progress to the word currently being spoken.

/// Index of the last word considered spoken.
///
/// `floor(word_count * position / duration)`, clamped to
/// `[0, word_count - 1]`. Returns 0 when the duration is unknown (0) or the
/// text has no words. Non-decreasing in `position_ms`.
#[must_use]
pub fn highlight_cursor(position_ms: u64, duration_ms: u64, word_count: usize) -> usize {
    if duration_ms == 0 || word_count == 0 {
        return 0;
    }

    let position = u128::from(position_ms.min(duration_ms));
    let words = word_count as u128;
    let index = words * position / u128::from(duration_ms);

    usize::try_from(index)
        .unwrap_or(usize::MAX)
        .min(word_count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_of_track_is_first_word() {
        assert_eq!(highlight_cursor(0, 120_000, 300), 0);
    }

    #[test]
    fn end_of_track_is_last_word() {
        assert_eq!(highlight_cursor(120_000, 120_000, 300), 299);
    }

    #[test]
    fn unknown_duration_is_first_word() {
        assert_eq!(highlight_cursor(5_000, 0, 300), 0);
        assert_eq!(highlight_cursor(0, 0, 0), 0);
    }

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(highlight_cursor(60_000, 120_000, 0), 0);
    }

    #[test]
    fn midpoint_floors() {
        // 10 words over 1000 ms: 100 ms per word.
        assert_eq!(highlight_cursor(499, 1_000, 10), 4);
        assert_eq!(highlight_cursor(500, 1_000, 10), 5);
    }

    #[test]
    fn position_past_end_clamps() {
        assert_eq!(highlight_cursor(200_000, 120_000, 300), 299);
    }

    #[test]
    fn large_values_do_not_overflow() {
        assert_eq!(highlight_cursor(u64::MAX, u64::MAX, usize::MAX), usize::MAX - 1);
    }

    #[test]
    fn cursor_is_monotonic_in_position() {
        let duration = 97_531;
        for words in [1_usize, 2, 7, 250, 4_096] {
            let mut last = 0;
            for position in (0..=duration).step_by(127) {
                let cursor = highlight_cursor(position, duration, words);
                assert!(cursor >= last, "cursor went back at {position} for {words} words");
                assert!(cursor < words);
                last = cursor;
            }
        }
    }
}
