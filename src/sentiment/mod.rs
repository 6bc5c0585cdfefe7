//! Lexicon-based sentiment scoring for review text.
//!
//! The analyzer is pure: it holds nothing but a shared, read-only
//! [`Lexicon`], so the same text always produces the same bits and the
//! analyzer can be cloned into any number of workers.
//!
//! # Scoring
//!
//! 1. Text is normalized: markup remnants are stripped, HTML entities
//!    decoded and whitespace collapsed. Case and punctuation are kept.
//! 2. Each sentence is scanned left to right, matching the longest lexicon
//!    phrase first ("tour de force" before "force"). Modifiers ("very",
//!    "slightly") scale the next sentiment word; a negation ("not",
//!    "isn't") flips and halves it. Commas and semicolons end the reach of
//!    both.
//! 3. A word written in capitals counts for more, and each `!` closing a
//!    sentence (up to three) boosts that sentence's words.
//! 4. Polarity and subjectivity are the means over all scored words.

pub mod lexicon;

use crate::models::{Assessment, SentimentScore, TrackReview, TrackSentiment};
use crate::utils::clean_text;
use itertools::Itertools;
use lexicon::{Entry, Lexicon};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

// Tag-shaped spans and comments only; a bare `<` or `>` in prose is text.
static MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--[\s\S]*?-->|</?[A-Za-z][^<>]*>").unwrap());
static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());
static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]+(?:'[A-Za-z]+)*|[,;:]").unwrap());

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nothing", "hardly", "without", "neither", "nor", "cannot",
];
const NEGATION_FACTOR: f64 = -0.5;
const CAPS_BOOST: f64 = 1.25;
const EXCLAMATION_STEP: f64 = 0.1;
const MAX_EXCLAMATIONS: usize = 3;

/// Music-review vocabulary reported as key terms.
const POSITIVE_TERMS: &[&str] = &[
    "masterpiece", "brilliant", "exceptional", "outstanding", "innovative",
    "groundbreaking", "excellent", "superb", "stunning", "impressive",
    "perfect", "visionary", "captivating", "spectacular", "remarkable",
];
const NEGATIVE_TERMS: &[&str] = &[
    "disappointing", "mediocre", "uninspired", "bland", "derivative",
    "forgettable", "underwhelming", "tedious", "redundant", "unimaginative",
    "generic", "lackluster", "monotonous", "dull", "pretentious",
];
const MAX_KEY_TERMS: usize = 10;
const MAX_NOTABLE_SENTENCES: usize = 5;
const NOTABLE_MIN_WORDS: usize = 3;
const NOTABLE_MIN_POLARITY: f64 = 0.3;

/// Strip markup remnants and collapse whitespace, keeping case and punctuation.
pub fn normalize(text: &str) -> String {
    let without_tags = MARKUP.replace_all(text, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    clean_text(&decoded.replace('\u{2019}', "'"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Valence {
    Positive,
    Negative,
}

/// A review-vocabulary term and how often it appears.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyTerm {
    pub term: String,
    pub valence: Valence,
    pub count: usize,
}

/// A sentence with strong sentiment of its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotableSentence {
    pub text: String,
    pub polarity: f64,
    pub subjectivity: f64,
    pub assessment: Assessment,
}

/// Everything [`SentimentAnalyzer::analyze_detailed`] finds in a text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentReport {
    pub score: SentimentScore,
    pub assessment: Assessment,
    pub key_terms: Vec<KeyTerm>,
    pub notable_sentences: Vec<NotableSentence>,
}

struct SentenceScore {
    text: String,
    words: usize,
    scored: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    lexicon: Arc<Lexicon>,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new(Lexicon::shared_default())
    }
}

impl SentimentAnalyzer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Polarity and subjectivity of `text`.
    ///
    /// Callers should only pass non-blank text; blank text (or text with no
    /// lexicon words) scores as neutral and objective.
    pub fn analyze(&self, text: &str) -> SentimentScore {
        let sentences = self.score_sentences(&normalize(text));
        overall(&sentences)
    }

    /// One score per track, in order. Tracks with blank text get `None`.
    pub fn analyze_tracks(&self, tracks: &[TrackReview]) -> Vec<TrackSentiment> {
        tracks
            .iter()
            .map(|track| TrackSentiment {
                title: track.title.clone(),
                sentiment: (!track.text.trim().is_empty()).then(|| self.analyze(&track.text)),
            })
            .collect()
    }

    /// Score plus qualitative label, key terms and notable sentences.
    pub fn analyze_detailed(&self, text: &str) -> SentimentReport {
        let normalized = normalize(text);
        let sentences = self.score_sentences(&normalized);
        let score = overall(&sentences);
        SentimentReport {
            score,
            assessment: score.assessment(),
            key_terms: key_terms(&normalized),
            notable_sentences: notable_sentences(&sentences),
        }
    }

    fn score_sentences(&self, normalized: &str) -> Vec<SentenceScore> {
        SENTENCE
            .find_iter(normalized)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .map(|sentence| self.score_sentence(sentence))
            .filter(|s| s.words > 0)
            .collect()
    }

    fn score_sentence(&self, sentence: &str) -> SentenceScore {
        let bangs = sentence.chars().filter(|&c| c == '!').count();
        let emphasis = 1.0 + EXCLAMATION_STEP * bangs.min(MAX_EXCLAMATIONS) as f64;

        let tokens: Vec<&str> = TOKEN.find_iter(sentence).map(|m| m.as_str()).collect();
        let mut words = 0;
        let mut scored = Vec::new();
        let mut intensity = 1.0;
        let mut negated = false;
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            if is_clause_break(token) {
                intensity = 1.0;
                negated = false;
                i += 1;
                continue;
            }

            let (entry, span) = match self.lookup_phrase(&tokens[i..]) {
                Some(found) => found,
                None => {
                    words += 1;
                    i += 1;
                    let lower = token.to_lowercase();
                    if is_negation(&lower) {
                        negated = true;
                        continue;
                    }
                    match self.lexicon.get(&lower) {
                        Some(entry) => (*entry, 1),
                        None => continue,
                    }
                }
            };
            if span > 1 {
                words += span;
                i += span;
            }
            if entry.is_modifier() {
                intensity *= entry.intensity;
                continue;
            }

            let mut polarity = entry.polarity * intensity * emphasis;
            if tokens[i - span..i].iter().all(|t| is_shouted(t)) {
                polarity *= CAPS_BOOST;
            }
            if negated {
                polarity *= NEGATION_FACTOR;
            }
            let subjectivity = entry.subjectivity * intensity;
            scored.push((polarity.clamp(-1.0, 1.0), subjectivity.clamp(0.0, 1.0)));

            intensity = 1.0;
            negated = false;
        }

        SentenceScore {
            text: sentence.to_string(),
            words,
            scored,
        }
    }

    /// Longest multi-word lexicon entry starting at `tokens[0]`.
    fn lookup_phrase(&self, tokens: &[&str]) -> Option<(Entry, usize)> {
        let longest = self.lexicon.max_phrase_words().min(tokens.len());
        (2..=longest).rev().find_map(|n| {
            let window = &tokens[..n];
            if window.iter().any(|t| is_clause_break(t)) {
                return None;
            }
            let key = window.iter().map(|t| t.to_lowercase()).join(" ");
            self.lexicon.get(&key).map(|entry| (*entry, n))
        })
    }
}

fn is_clause_break(token: &str) -> bool {
    matches!(token, "," | ";" | ":")
}

fn is_negation(lower: &str) -> bool {
    NEGATIONS.contains(&lower) || lower.ends_with("n't")
}

fn is_shouted(token: &str) -> bool {
    token.len() > 1 && token.chars().all(|c| c.is_ascii_uppercase())
}

fn mean(values: impl Iterator<Item = (f64, f64)>) -> (f64, f64) {
    let (mut p, mut s, mut n) = (0.0, 0.0, 0usize);
    for (polarity, subjectivity) in values {
        p += polarity;
        s += subjectivity;
        n += 1;
    }
    if n == 0 {
        (0.0, 0.0)
    } else {
        (p / n as f64, s / n as f64)
    }
}

fn overall(sentences: &[SentenceScore]) -> SentimentScore {
    let (p, s) = mean(sentences.iter().flat_map(|s| s.scored.iter().copied()));
    SentimentScore::from_bounded(p, s)
}

fn key_terms(normalized: &str) -> Vec<KeyTerm> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in TOKEN.find_iter(normalized) {
        *counts.entry(token.as_str().to_lowercase()).or_default() += 1;
    }

    let positive = POSITIVE_TERMS.iter().map(|t| (*t, Valence::Positive));
    let negative = NEGATIVE_TERMS.iter().map(|t| (*t, Valence::Negative));
    let mut terms: Vec<KeyTerm> = positive
        .chain(negative)
        .filter_map(|(term, valence)| {
            counts.get(term).map(|&count| KeyTerm {
                term: term.to_string(),
                valence,
                count,
            })
        })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(MAX_KEY_TERMS);
    terms
}

fn notable_sentences(sentences: &[SentenceScore]) -> Vec<NotableSentence> {
    let mut notable: Vec<NotableSentence> = sentences
        .iter()
        .filter(|s| s.words >= NOTABLE_MIN_WORDS && !s.scored.is_empty())
        .filter_map(|s| {
            let (polarity, subjectivity) = mean(s.scored.iter().copied());
            (polarity.abs() > NOTABLE_MIN_POLARITY).then(|| NotableSentence {
                text: s.text.clone(),
                polarity,
                subjectivity,
                assessment: Assessment::from_polarity(polarity),
            })
        })
        .collect();
    notable.sort_by(|a, b| b.polarity.abs().total_cmp(&a.polarity.abs()));
    notable.truncate(MAX_NOTABLE_SENTENCES);
    notable
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITIVE: &str = "This brilliant album represents a masterpiece of modern music. \
        The innovative approach results in stunning soundscapes that captivate the listener. \
        Each track offers something exceptional, with standout moments throughout.";

    const NEGATIVE: &str = "This disappointing album feels mediocre and uninspired. \
        The bland production makes for a forgettable, tedious listen. \
        Derivative ideas and unimaginative execution sink it.";

    fn analyzer() -> SentimentAnalyzer {
        SentimentAnalyzer::default()
    }

    #[test]
    fn test_normalize_strips_markup_and_keeps_case() {
        assert_eq!(
            normalize("<p>Truly   <em>GREAT</em></p>\n&amp; fun!"),
            "Truly GREAT & fun!"
        );
        assert_eq!(normalize("it isn\u{2019}t"), "it isn't");
    }

    #[test]
    fn test_normalize_keeps_angle_brackets_in_prose() {
        let prose = "A <3 brilliant record. Better than 5 > 4 albums.";
        assert_eq!(normalize(prose), prose);
        assert_eq!(
            normalize("<p class=\"lede\">A <3 <!-- ad --> record</p> &lt;3"),
            "A <3 record <3"
        );

        let a = analyzer();
        let plain = a.analyze("A brilliant record. Better than 5 albums.");
        assert!(plain.polarity() > 0.0);
        assert_eq!(a.analyze(prose), plain);
    }

    #[test]
    fn test_positive_text() {
        let report = analyzer().analyze_detailed(POSITIVE);
        assert!(report.score.polarity() > 0.5);
        assert_eq!(report.assessment, Assessment::VeryPositive);
        assert!(report.key_terms.iter().any(|t| t.term == "brilliant"));
        assert!(report.key_terms.iter().any(|t| t.term == "masterpiece"));
        assert!(!report.notable_sentences.is_empty());
    }

    #[test]
    fn test_negative_text() {
        let report = analyzer().analyze_detailed(NEGATIVE);
        assert!(report.score.polarity() < -0.2);
        assert!(matches!(
            report.assessment,
            Assessment::Negative | Assessment::VeryNegative
        ));
        assert!(
            report
                .key_terms
                .iter()
                .all(|t| t.valence == Valence::Negative)
        );
        assert!(report.score.subjectivity() > 0.5);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let a = analyzer();
        let first = a.analyze(POSITIVE);
        for _ in 0..5 {
            let again = a.analyze(POSITIVE);
            assert_eq!(first.polarity().to_bits(), again.polarity().to_bits());
            assert_eq!(first.subjectivity().to_bits(), again.subjectivity().to_bits());
        }
    }

    #[test]
    fn test_negation_flips_polarity() {
        let a = analyzer();
        let plain = a.analyze("The songs are good.");
        let negated = a.analyze("The songs are not good.");
        let contracted = a.analyze("The songs aren't good.");
        assert!(plain.polarity() > 0.0);
        assert!(negated.polarity() < 0.0);
        assert_eq!(negated, contracted);
    }

    #[test]
    fn test_negation_ends_at_clause_break() {
        let a = analyzer();
        let score = a.analyze("Not once, but the songs are good.");
        assert_eq!(score, a.analyze("The songs are good."));
    }

    #[test]
    fn test_modifiers_scale_next_word() {
        let a = analyzer();
        let plain = a.analyze("The songs are good.").polarity();
        assert!(a.analyze("The songs are very good.").polarity() > plain);
        assert!(a.analyze("The songs are slightly good.").polarity() < plain);
    }

    #[test]
    fn test_case_and_punctuation_affect_polarity() {
        let a = analyzer();
        let plain = a.analyze("The songs are good.").polarity();
        assert!(a.analyze("The songs are GOOD.").polarity() > plain);
        assert!(a.analyze("The songs are good!").polarity() > plain);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let a = analyzer();
        let score = a.analyze("EXTREMELY PERFECT!!! ABSOLUTELY BRILLIANT!!!");
        assert!(score.polarity() <= 1.0);
        assert!(score.subjectivity() <= 1.0);
        let score = a.analyze("UTTERLY AWFUL!!! Not perfect, worst.");
        assert!(score.polarity() >= -1.0);
    }

    #[test]
    fn test_no_lexicon_words_is_neutral() {
        let score = analyzer().analyze("The album has eleven tracks.");
        assert_eq!(score.polarity(), 0.0);
        assert_eq!(score.subjectivity(), 0.0);
    }

    #[test]
    fn test_key_terms_are_counted_and_sorted() {
        let terms = key_terms("Bland, bland, bland. A derivative record, but stunning.");
        assert_eq!(terms[0].term, "bland");
        assert_eq!(terms[0].count, 3);
        assert_eq!(terms[1].term, "derivative");
        assert_eq!(terms[2].term, "stunning");
        assert_eq!(terms[2].valence, Valence::Positive);
    }

    #[test]
    fn test_notable_sentences_sorted_by_strength() {
        let report = analyzer().analyze_detailed(
            "This is a brilliant album. The songwriting is mediocre. Some tracks are okay.",
        );
        assert_eq!(report.notable_sentences.len(), 2);
        assert!(report.notable_sentences[0].text.contains("brilliant"));
        assert!(
            report.notable_sentences[0].polarity.abs() >= report.notable_sentences[1].polarity.abs()
        );
    }

    #[test]
    fn test_injected_lexicon() {
        let lexicon = Arc::new(Lexicon::from_tsv("sludgy\t-0.8\t0.9").unwrap());
        let a = SentimentAnalyzer::new(lexicon);
        assert!(a.analyze("A sludgy record.").polarity() < 0.0);
        assert_eq!(a.analyze("A brilliant record.").polarity(), 0.0);
    }

    #[test]
    fn test_phrase_overrides_its_words() {
        let lexicon = Lexicon::from_tsv("fall\t-0.2\t0.3\nflat\t-0.3\t0.4\nfall flat\t-0.8\t0.9\n").unwrap();
        let a = SentimentAnalyzer::new(Arc::new(lexicon));

        let phrase = a.analyze("The songs fall flat.");
        assert_eq!(phrase.polarity(), -0.8);
        assert_eq!(phrase.subjectivity(), 0.9);

        // Split by a clause break, the words score on their own.
        let split = a.analyze("They fall, flat.");
        assert_eq!(split.polarity(), (-0.2 + -0.3) / 2.0);
    }

    #[test]
    fn test_phrase_takes_negation_and_modifiers() {
        let a = analyzer();
        let plain = a.analyze("The record is a tour de force.").polarity();
        assert!(plain > 0.8);
        assert!(a.analyze("The record is not a tour de force.").polarity() < 0.0);
        assert!(a.analyze("The hooks fall flat.").polarity() < 0.0);
    }

    #[test]
    fn test_analyze_tracks_scores_each_text() {
        let a = analyzer();
        let tracks = vec![
            TrackReview {
                title: "Opener".to_string(),
                text: "A brilliant, gorgeous song.".to_string(),
            },
            TrackReview {
                title: "Interlude".to_string(),
                text: "  ".to_string(),
            },
            TrackReview {
                title: "Closer".to_string(),
                text: "A boring, tedious dirge.".to_string(),
            },
        ];
        let scored = a.analyze_tracks(&tracks);

        let titles: Vec<_> = scored.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Opener", "Interlude", "Closer"]);
        assert_eq!(scored[0].sentiment, Some(a.analyze("A brilliant, gorgeous song.")));
        assert!(scored[0].sentiment.unwrap().polarity() > 0.0);
        assert_eq!(scored[1].sentiment, None);
        assert!(scored[2].sentiment.unwrap().polarity() < 0.0);
        assert!(a.analyze_tracks(&[]).is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let a = analyzer();
        let expected = a.analyze(NEGATIVE);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let a = a.clone();
                std::thread::spawn(move || a.analyze(NEGATIVE))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }
}
