//! Description normalisation: lowercase, strip punctuation, drop boilerplate.

use std::collections::BTreeSet;

/// Words that carry no identifying signal in a payment description.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    // articles and glue
    "the", "an", "and", "of", "to", "for", "from", "by", "at", "in", "on", "with", "via",
    // banking boilerplate
    "transfer", "trf", "payment", "pmt", "invoice", "inv", "reference", "ref", "cheque", "chq",
    "check", "atm", "balance", "closing", "opening", "brought", "forward", "carried", "txn",
    // institution suffixes
    "ltd", "limited", "inc", "llc", "llp", "plc", "gmbh", "co", "corp", "pvt", "pty",
    // payment rails
    "rtgs", "neft", "imps", "upi", "ach", "swift", "sepa", "bacs", "chaps", "wire",
];

/// Immutable stop-word set, built once and handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopWords(BTreeSet<String>);

impl StopWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StopWords(words.into_iter().map(|w| w.as_ref().to_lowercase()).collect())
    }

    /// The default list plus `extra`.
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut set = StopWords::default();
        set.0.extend(extra.iter().map(|w| w.as_ref().to_lowercase()));
        set
    }

    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StopWords {
    fn default() -> Self {
        StopWords::new(DEFAULT_STOP_WORDS)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    stop_words: StopWords,
}

impl TextNormalizer {
    pub fn new(stop_words: StopWords) -> Self {
        Self { stop_words }
    }

    /// Surviving tokens in their original order.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 1 && !self.stop_words.contains(w))
            .map(str::to_string)
            .collect()
    }

    pub fn normalize(&self, text: &str) -> String {
        self.tokens(text).join(" ")
    }
}
