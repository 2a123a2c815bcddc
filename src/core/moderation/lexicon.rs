// Fuzzy lexicon matching.
//
// Each dictionary word compiles into a matcher that tolerates up to two
// inserted junk characters between letters ("б.л.я" still matches), while a
// third inserted character breaks the match to bound false positives.
// Words are tiered: `core` profanity is always checked when the filter is
// on, the `slur` tier runs in the same pass when requested.

use super::normalizer::normalize;
use regex::Regex;
use thiserror::Error;

/// Junk characters (neither letters nor digits) tolerated between the
/// letters of a lexicon word.
pub const MAX_LETTER_GAP: usize = 2;

/// Core profanity, matched whenever the filter is enabled.
pub const DEFAULT_CORE_WORDS: &[&str] = &[
    "бля", "хуй", "пизд", "ебат", "ебан", "сука", "мудак", "долбоеб", "гандон", "залупа",
];

/// Additional slur tier, matched in the same pass when requested.
pub const DEFAULT_SLUR_WORDS: &[&str] = &["пидор", "пидар", "нигер", "хохол", "жид", "даун"];

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("Lexicon word '{word}' failed to compile: {source}")]
    BadWord {
        word: String,
        #[source]
        source: regex::Error,
    },
}

/// Outcome of classifying one message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Matched the core profanity tier (carries the matched word)
    CoreHit(String),
    /// Matched the slur tier
    SlurHit(String),
    Clean,
}

/// Compiled matcher for one dictionary word.
struct LexiconPattern {
    word: String,
    regex: Regex,
}

/// Compiles word lists into fuzzy matchers and tests normalized text.
pub struct LexiconMatcher {
    core: Vec<LexiconPattern>,
    slurs: Vec<LexiconPattern>,
}

impl LexiconMatcher {
    /// Compile matchers for custom word lists. Word order is preserved, and
    /// the first matching word in list order wins.
    pub fn new(core_words: &[&str], slur_words: &[&str]) -> Result<Self, LexiconError> {
        Ok(Self {
            core: compile_tier(core_words)?,
            slurs: compile_tier(slur_words)?,
        })
    }

    /// Matcher over the built-in word lists.
    pub fn builtin() -> Self {
        Self::new(DEFAULT_CORE_WORDS, DEFAULT_SLUR_WORDS)
            .expect("built-in lexicon words always compile")
    }

    /// Classify a raw message body. Normalizes once, then tests the core
    /// tier first and the slur tier only when `include_slurs` is set.
    pub fn classify(&self, text: &str, include_slurs: bool) -> Verdict {
        let canonical = normalize(text);

        for pattern in &self.core {
            if pattern.regex.is_match(&canonical) {
                return Verdict::CoreHit(pattern.word.clone());
            }
        }

        if include_slurs {
            for pattern in &self.slurs {
                if pattern.regex.is_match(&canonical) {
                    return Verdict::SlurHit(pattern.word.clone());
                }
            }
        }

        Verdict::Clean
    }
}

fn compile_tier(words: &[&str]) -> Result<Vec<LexiconPattern>, LexiconError> {
    words
        .iter()
        .map(|word| {
            compile_word(word).map_err(|source| LexiconError::BadWord {
                word: (*word).to_string(),
                source,
            })
        })
        .collect()
}

/// Letters of the (normalized) word in order, each pair separated by at most
/// `MAX_LETTER_GAP` characters that are neither letters nor digits.
fn compile_word(word: &str) -> Result<LexiconPattern, regex::Error> {
    let canonical = normalize(word);
    let gap = format!(r"[^\p{{L}}\p{{N}}]{{0,{}}}", MAX_LETTER_GAP);
    let pattern = canonical
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect::<Vec<_>>()
        .join(&gap);

    Ok(LexiconPattern {
        word: word.to_string(),
        regex: Regex::new(&format!("(?i){}", pattern))?,
    })
}
