//! Sliding-window text chunker.
//!
//! Splits document text into overlapping fixed-size fragments with
//! positional metadata. A window of `size` characters advances by
//! `size - overlap` each step, starting at offset 0, and stops once a
//! window's end reaches the end of the text. Pure and deterministic.
//!
//! Offsets are `char` offsets rather than byte offsets so multibyte text
//! never splits a scalar value.

use crate::models::FragmentDraft;

/// Split text into overlapping fragments.
///
/// Callers must guarantee `0 < overlap < size` (enforced by config
/// validation); the window then strictly advances and the function always
/// terminates. Text shorter than `size` produces exactly one fragment
/// covering the whole text.
///
/// Each draft carries the trimmed content, a zero-based index, the
/// untrimmed start/end char offsets, and the trimmed char length.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<FragmentDraft> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let step = size - overlap;

    let mut drafts = Vec::new();
    let mut start = 0usize;
    let mut index = 0i64;

    loop {
        let end = (start + size).min(len);
        let content: String = chars[start..end].iter().collect::<String>().trim().to_string();
        let length = content.chars().count();

        drafts.push(FragmentDraft {
            index,
            content,
            start_offset: start,
            end_offset: end,
            length,
        });

        if end >= len {
            break;
        }
        start += step;
        index += 1;
    }

    drafts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_fragment() {
        let drafts = chunk_text("Hello, world!", 1000, 200);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].index, 0);
        assert_eq!(drafts[0].content, "Hello, world!");
        assert_eq!(drafts[0].start_offset, 0);
        assert_eq!(drafts[0].end_offset, 13);
    }

    #[test]
    fn test_empty_text() {
        let drafts = chunk_text("", 1000, 200);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].content, "");
        assert_eq!(drafts[0].end_offset, 0);
    }

    #[test]
    fn test_scenario_2400_chars() {
        // 2,400 chars, size 1000, overlap 200 => 3 fragments at
        // [0,1000), [800,1800), [1600,2400).
        let text = "a".repeat(2400);
        let drafts = chunk_text(&text, 1000, 200);
        assert_eq!(drafts.len(), 3);
        let offsets: Vec<(usize, usize)> = drafts
            .iter()
            .map(|d| (d.start_offset, d.end_offset))
            .collect();
        assert_eq!(offsets, vec![(0, 1000), (800, 1800), (1600, 2400)]);
        let indices: Vec<i64> = drafts.iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_coverage_no_gaps() {
        // Consecutive windows overlap; the last one ends at the text end.
        let text = "x".repeat(3137);
        let drafts = chunk_text(&text, 500, 100);
        assert_eq!(drafts[0].start_offset, 0);
        for pair in drafts.windows(2) {
            assert!(pair[1].start_offset < pair[0].end_offset, "gap between windows");
        }
        assert_eq!(drafts.last().unwrap().end_offset, 3137);
    }

    #[test]
    fn test_fragment_count_formula() {
        // count = ceil((N - O) / (C - O)), bounded below by 1
        for (n, c, o) in [(2400, 1000, 200), (1000, 1000, 200), (1001, 1000, 200), (50, 1000, 200), (999, 100, 25)] {
            let text = "y".repeat(n);
            let drafts = chunk_text(&text, c, o);
            let expected = if n <= c {
                1
            } else {
                (n - o).div_ceil(c - o)
            };
            assert_eq!(drafts.len(), expected, "N={} C={} O={}", n, c, o);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "The quick brown fox. ".repeat(120);
        let a = chunk_text(&text, 300, 60);
        let b = chunk_text(&text, 300, 60);
        assert_eq!(a, b);
    }

    #[test]
    fn test_trimmed_content_and_length() {
        let text = format!("  leading ws{}trailing ws  ", " ".repeat(10));
        let drafts = chunk_text(&text, 1000, 200);
        assert_eq!(drafts.len(), 1);
        assert!(!drafts[0].content.starts_with(' '));
        assert!(!drafts[0].content.ends_with(' '));
        assert_eq!(drafts[0].length, drafts[0].content.chars().count());
        // Offsets stay untrimmed
        assert_eq!(drafts[0].start_offset, 0);
        assert_eq!(drafts[0].end_offset, text.chars().count());
    }

    #[test]
    fn test_multibyte_text() {
        let text = "赤血球数の増加が認められた。".repeat(100);
        let drafts = chunk_text(&text, 100, 20);
        assert_eq!(drafts.last().unwrap().end_offset, text.chars().count());
        for d in &drafts {
            assert!(d.end_offset - d.start_offset <= 100);
        }
    }
}
