//! Word polarity table.
//!
//! A [`Lexicon`] is loaded once, validated, and then only read. The
//! analyzer holds it behind an `Arc` so concurrent calls share one copy.
//!
//! # File Format
//!
//! Tab-separated, one word or phrase per line, `#` starts a comment:
//!
//! ```text
//! word<TAB>polarity<TAB>subjectivity[<TAB>intensity]
//! fall flat<TAB>-0.6<TAB>0.7
//! ```
//!
//! A phrase is matched as a whole before its individual words are.
//!
//! An entry whose intensity is not `1.0` is a modifier ("very",
//! "slightly"): it scales the next sentiment-bearing word and carries no
//! polarity of its own.

use itertools::Itertools;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

const DEFAULT_TABLE: &str = include_str!("default_lexicon.tsv");

static DEFAULT_LEXICON: Lazy<Arc<Lexicon>> = Lazy::new(|| {
    Arc::new(Lexicon::from_tsv(DEFAULT_TABLE).expect("built-in lexicon table is valid"))
});

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to read lexicon {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("line {line}: {field} {value} is outside [{min}, {max}]")]
    OutOfRange {
        line: usize,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Polarity, subjectivity and intensity of one word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub polarity: f64,
    pub subjectivity: f64,
    pub intensity: f64,
}

impl Entry {
    pub fn is_modifier(&self) -> bool {
        self.intensity != 1.0
    }
}

/// Immutable lowercase word (or phrase) -> [`Entry`] table.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, Entry>,
    max_phrase_words: usize,
}

impl Lexicon {
    /// The built-in table, parsed on first use and shared afterwards.
    pub fn shared_default() -> Arc<Lexicon> {
        Arc::clone(&DEFAULT_LEXICON)
    }

    /// Load a table from a TSV file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, LexiconError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LexiconError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let lexicon = Self::from_tsv(&raw)?;
        info!(words = lexicon.len(), "Loaded lexicon");
        Ok(lexicon)
    }

    /// Parse a TSV table. Later lines override earlier ones for the same word.
    pub fn from_tsv(raw: &str) -> Result<Self, LexiconError> {
        let mut entries = HashMap::new();
        let mut max_phrase_words = 0;
        for (idx, line) in raw.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
            if !(3..=4).contains(&cols.len()) {
                return Err(LexiconError::Malformed {
                    line: line_no,
                    reason: format!("expected 3 or 4 columns, found {}", cols.len()),
                });
            }
            // Phrases are stored with single spaces between words.
            let word = cols[0].split_whitespace().join(" ").to_lowercase();
            if word.is_empty() {
                return Err(LexiconError::Malformed {
                    line: line_no,
                    reason: format!("invalid word {:?}", cols[0]),
                });
            }
            let polarity = parse_number(line_no, "polarity", cols[1], -1.0, 1.0)?;
            let subjectivity = parse_number(line_no, "subjectivity", cols[2], 0.0, 1.0)?;
            let intensity = match cols.get(3) {
                Some(raw) => parse_number(line_no, "intensity", raw, 0.1, 2.0)?,
                None => 1.0,
            };
            max_phrase_words = max_phrase_words.max(word.split(' ').count());
            entries.insert(
                word,
                Entry {
                    polarity,
                    subjectivity,
                    intensity,
                },
            );
        }
        Ok(Self {
            entries,
            max_phrase_words,
        })
    }

    /// Look up a word, case-insensitively.
    pub fn get(&self, word: &str) -> Option<&Entry> {
        match self.entries.get(word) {
            Some(entry) => Some(entry),
            None => self.entries.get(&word.to_lowercase()),
        }
    }

    /// Word count of the longest entry.
    pub fn max_phrase_words(&self) -> usize {
        self.max_phrase_words
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_number(
    line: usize,
    field: &'static str,
    raw: &str,
    min: f64,
    max: f64,
) -> Result<f64, LexiconError> {
    let value: f64 = raw.parse().map_err(|_| LexiconError::Malformed {
        line,
        reason: format!("{field} {raw:?} is not a number"),
    })?;
    if value >= min && value <= max {
        Ok(value)
    } else {
        Err(LexiconError::OutOfRange {
            line,
            field,
            value,
            min,
            max,
        })
    }
}
