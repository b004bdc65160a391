//! Word timing inputs and the adapters that normalise them.
//!
//! Every timing source (character alignment from narration synthesis, word
//! lists from a transcript, or bare text) is turned into `Vec<Word>` here so
//! the segmenter only ever sees one shape.

use serde::{Deserialize, Serialize};

use crate::error::{JimakuError, Result};

/// Per-token duration used when no timing data exists at all.
pub const FALLBACK_TOKEN_MS: u64 = 350;

/// A spoken word with its time window in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Word {
    pub fn new<S: Into<String>>(text: S, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence: None,
        }
    }

    pub fn start_ms(&self) -> u64 {
        seconds_to_ms(self.start)
    }

    pub fn end_ms(&self) -> u64 {
        seconds_to_ms(self.end)
    }
}

/// One character of a narration alignment stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterTiming {
    pub character: String,
    pub start: f64,
    pub end: f64,
}

/// Alignment in the parallel-array layout some synthesis services return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelAlignment {
    pub characters: Vec<String>,
    pub character_start_times_seconds: Vec<f64>,
    pub character_end_times_seconds: Vec<f64>,
}

/// Transcript document: word list plus the detected language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub language: Option<String>,
    pub words: Vec<Word>,
}

/// Any of the accepted timing document shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimingDocument {
    Words(Vec<Word>),
    Transcript(Transcript),
    Characters(Vec<CharacterTiming>),
    Parallel(ParallelAlignment),
}

impl TimingDocument {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            JimakuError::Input(format!("Unrecognised timing document: {}", e))
        })
    }

    pub fn into_words(self) -> Result<Vec<Word>> {
        match self {
            TimingDocument::Words(words) => normalize_words(words),
            TimingDocument::Transcript(transcript) => normalize_words(transcript.words),
            TimingDocument::Characters(chars) => words_from_alignment(&chars),
            TimingDocument::Parallel(parallel) => {
                let chars = parallel.into_characters()?;
                words_from_alignment(&chars)
            }
        }
    }
}

impl ParallelAlignment {
    pub fn into_characters(self) -> Result<Vec<CharacterTiming>> {
        let n = self.characters.len();
        if self.character_start_times_seconds.len() != n
            || self.character_end_times_seconds.len() != n
        {
            return Err(JimakuError::Input(format!(
                "Alignment arrays differ in length: {} characters, {} starts, {} ends",
                n,
                self.character_start_times_seconds.len(),
                self.character_end_times_seconds.len()
            )));
        }

        Ok(self
            .characters
            .into_iter()
            .zip(self.character_start_times_seconds)
            .zip(self.character_end_times_seconds)
            .map(|((character, start), end)| CharacterTiming {
                character,
                start,
                end,
            })
            .collect())
    }
}

/// Rebuild word boundaries from a character alignment stream.
///
/// Whitespace and line breaks close the current word; a word spans from its
/// first character's start to its last character's end.
pub fn words_from_alignment(chars: &[CharacterTiming]) -> Result<Vec<Word>> {
    let mut words = Vec::new();
    let mut text = String::new();
    let mut start = 0.0;
    let mut end = 0.0;

    for timing in chars {
        check_time(timing.start, &timing.character)?;
        check_time(timing.end, &timing.character)?;

        if timing.character.chars().all(char::is_whitespace) {
            if !text.is_empty() {
                words.push(Word::new(std::mem::take(&mut text), start, end));
            }
            continue;
        }

        if text.is_empty() {
            start = timing.start;
        }
        text.push_str(&timing.character);
        end = timing.end.max(start);
    }

    if !text.is_empty() {
        words.push(Word::new(text, start, end));
    }

    Ok(words)
}

/// Synthesize evenly spaced pseudo-words when a text has no timing at all.
pub fn words_from_text(text: &str) -> Vec<Word> {
    let step = FALLBACK_TOKEN_MS as f64 / 1000.0;
    text.split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            let start = i as f64 * step;
            Word::new(token, start, start + step)
        })
        .collect()
}

/// Validate a pre-tokenized word list and drop empty tokens.
pub fn normalize_words(words: Vec<Word>) -> Result<Vec<Word>> {
    let mut out = Vec::with_capacity(words.len());
    for mut word in words {
        check_time(word.start, &word.text)?;
        check_time(word.end, &word.text)?;

        let trimmed = word.text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.len() != word.text.len() {
            word.text = trimmed.to_string();
        }
        if word.end < word.start {
            word.end = word.start;
        }
        out.push(word);
    }
    Ok(out)
}

fn check_time(value: f64, token: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(JimakuError::Input(format!(
            "Invalid timestamp {} for '{}'",
            value, token
        )));
    }
    Ok(())
}

pub fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds * 1000.0).round().max(0.0) as u64
}
