//! Groups timed words into display-ready caption segments.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::style::StyleDescriptor;
use crate::timing::Word;

/// A caption's displayed text plus its active time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl CaptionSegment {
    pub fn new<S: Into<String>>(text: S, start_ms: u64, end_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            end_ms: end_ms.max(start_ms),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Half-open activity window: `start <= t < end`.
    pub fn is_active(&self, time_ms: f64) -> bool {
        time_ms >= self.start_ms as f64 && time_ms < self.end_ms as f64
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Chunking limits for one segmentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentConstraints {
    pub max_words: usize,
    pub max_chars: usize,
    /// Soft floor: a break is deferred until the segment lasts this long.
    pub min_duration_ms: u64,
}

impl SegmentConstraints {
    pub fn new(max_words: usize, max_chars: usize, min_duration_ms: u64) -> Self {
        Self {
            max_words,
            max_chars,
            min_duration_ms,
        }
    }

    pub fn from_style(style: &StyleDescriptor, min_duration_ms: u64) -> Self {
        Self::new(
            style.max_words_per_line as usize,
            style.max_chars_per_line as usize,
            min_duration_ms,
        )
    }
}

struct Pending<'a> {
    words: Vec<&'a Word>,
    chars: usize,
    start_ms: u64,
}

impl<'a> Pending<'a> {
    fn new() -> Self {
        Self {
            words: Vec::new(),
            chars: 0,
            start_ms: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn push(&mut self, word: &'a Word) {
        let len = word.text.chars().count();
        if self.words.is_empty() {
            self.start_ms = word.start_ms();
            self.chars = len;
        } else {
            self.chars += 1 + len;
        }
        self.words.push(word);
    }

    fn duration_ms(&self) -> u64 {
        self.words
            .last()
            .map(|w| w.end_ms().saturating_sub(self.start_ms))
            .unwrap_or(0)
    }

    fn take(&mut self, prev_end: Option<u64>) -> CaptionSegment {
        let text = self
            .words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let end_ms = self.words.last().map(|w| w.end_ms()).unwrap_or(self.start_ms);
        let start_ms = prev_end.map_or(self.start_ms, |p| self.start_ms.max(p));

        self.words.clear();
        self.chars = 0;
        CaptionSegment::new(text, start_ms, end_ms)
    }
}

/// Segment a word list under the given constraints.
///
/// A break becomes a candidate once the word or character limit is reached
/// (or at the last word) and is honoured only when the segment already lasts
/// `min_duration_ms`, so short segments are extended rather than dropped. A
/// word that would push the segment past `max_chars` starts a new segment
/// when the current one is already long enough.
pub fn segment(words: &[Word], constraints: &SegmentConstraints) -> Vec<CaptionSegment> {
    let max_words = constraints.max_words.max(1);
    let max_chars = constraints.max_chars.max(1);
    let min_duration = constraints.min_duration_ms;

    let mut segments: Vec<CaptionSegment> = Vec::new();
    let mut pending = Pending::new();

    for (i, word) in words.iter().enumerate() {
        let terminal = i + 1 == words.len();

        if !pending.is_empty() {
            let projected = pending.chars + 1 + word.text.chars().count();
            if projected > max_chars && pending.duration_ms() >= min_duration {
                let prev_end = segments.last().map(|s| s.end_ms);
                segments.push(pending.take(prev_end));
            }
        }

        pending.push(word);

        let candidate =
            pending.words.len() >= max_words || pending.chars >= max_chars || terminal;
        if candidate && (terminal || pending.duration_ms() >= min_duration) {
            let prev_end = segments.last().map(|s| s.end_ms);
            segments.push(pending.take(prev_end));
        }
    }

    debug!(
        "Segmented {} words into {} captions (max_words={}, max_chars={}, min_duration={}ms)",
        words.len(),
        segments.len(),
        max_words,
        max_chars,
        min_duration
    );

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaced(texts: &[&str], step: f64) -> Vec<Word> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Word::new(*t, i as f64 * step, (i + 1) as f64 * step))
            .collect()
    }

    fn assert_well_formed(segments: &[CaptionSegment]) {
        for pair in segments.windows(2) {
            assert!(pair[0].end_ms <= pair[1].start_ms, "overlap: {:?}", pair);
            assert!(pair[0].start_ms <= pair[1].start_ms);
        }
        for seg in segments {
            assert!(seg.end_ms >= seg.start_ms);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(segment(&[], &SegmentConstraints::new(3, 20, 100)).is_empty());
    }

    #[test]
    fn test_two_words_single_segment() {
        let words = vec![Word::new("Hi", 0.0, 0.3), Word::new("there", 0.3, 0.7)];
        let segments = segment(&words, &SegmentConstraints::new(2, 20, 100));
        assert_eq!(segments, vec![CaptionSegment::new("Hi there", 0, 700)]);
    }

    #[test]
    fn test_five_words_max_two() {
        let words = spaced(&["a", "b", "c", "d", "e"], 0.1);
        let segments = segment(&words, &SegmentConstraints::new(2, 20, 100));
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "a b");
        assert_eq!(segments[1].text, "c d");
        assert_eq!(segments[2].text, "e");
        assert_eq!(segments[2].word_count(), 1);
    }

    #[test]
    fn test_min_duration_defers_break() {
        // 50ms words: a two-word segment lasts 100ms, below the 250ms floor.
        let words = spaced(&["a", "b", "c", "d", "e", "f"], 0.05);
        let segments = segment(&words, &SegmentConstraints::new(2, 50, 250));
        assert_eq!(segments[0].text, "a b c d e");
        assert_eq!(segments[0].duration_ms(), 250);
        assert_eq!(segments[1].text, "f");
    }

    #[test]
    fn test_long_word_emitted_alone() {
        let words = vec![
            Word::new("supercalifragilistic", 0.0, 1.0),
            Word::new("ok", 1.0, 1.5),
        ];
        let segments = segment(&words, &SegmentConstraints::new(3, 10, 0));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "supercalifragilistic");
    }

    #[test]
    fn test_char_limit_breaks_before_overflow() {
        let words = spaced(&["hello", "big", "wide", "world"], 0.4);
        let segments = segment(&words, &SegmentConstraints::new(10, 10, 0));
        for seg in &segments[..segments.len() - 1] {
            assert!(seg.char_count() <= 10, "{:?}", seg);
        }
        assert_eq!(segments[0].text, "hello big");
    }

    #[test]
    fn test_overlapping_input_is_repaired() {
        let words = vec![
            Word::new("one", 0.0, 1.0),
            Word::new("two", 0.8, 1.5),
        ];
        let segments = segment(&words, &SegmentConstraints::new(1, 20, 0));
        assert_eq!(segments[1].start_ms, 1000);
        assert_well_formed(&segments);
    }

    #[test]
    fn test_properties_over_varied_inputs() {
        let vocab = ["a", "quick", "brown", "fox", "jumps", "over", "the", "lazy", "dog"];
        for max_words in 1..5 {
            for max_chars in [6usize, 12, 20] {
                for n in 0..vocab.len() {
                    let words = spaced(&vocab[..n], 0.25);
                    let constraints = SegmentConstraints::new(max_words, max_chars, 0);
                    let segments = segment(&words, &constraints);

                    assert_well_formed(&segments);

                    // every word lands in exactly one segment, in order
                    let rejoined: Vec<String> = segments
                        .iter()
                        .flat_map(|s| s.text.split(' ').map(str::to_string))
                        .collect();
                    assert_eq!(rejoined, vocab[..n].to_vec());

                    if let Some((_, head)) = segments.split_last() {
                        for seg in head {
                            assert!(seg.word_count() <= max_words);
                            assert!(seg.char_count() <= max_chars);
                        }
                    }

                    assert_eq!(segments, segment(&words, &constraints));
                }
            }
        }
    }

    #[test]
    fn test_activity_window_is_half_open() {
        let seg = CaptionSegment::new("x", 100, 200);
        assert!(seg.is_active(100.0));
        assert!(seg.is_active(199.9));
        assert!(!seg.is_active(200.0));
        assert!(!seg.is_active(99.0));
    }
}
