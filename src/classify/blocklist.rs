// Blocklist matching, the cheapest tier of the pipeline.
//
// Text and entries are both normalized by lower-casing and dropping every
// non-alphanumeric character, so "B.A.D word" still matches "badword".
// Single-word entries additionally match exact alphanumeric tokens.

use serde::{Deserialize, Serialize};

/// Normalize a blocklist entry for storage: lower-cased and trimmed.
pub fn normalize_entry(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Collapse text to its lower-cased alphanumeric characters.
pub fn collapse(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split text into lower-cased alphanumeric word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Split a bulk word list on newlines, commas, or semicolons.
pub fn parse_word_list(input: &str) -> Vec<String> {
    input
        .split(['\n', ',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The set of blocked words and phrases.
///
/// Entries are stored normalized (lower-cased, trimmed) with duplicates
/// collapsed. Insertion order is kept only so listings are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedWordSet {
    words: Vec<String>,
}

impl BlockedWordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw entries, normalizing and deduplicating them.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        set.extend(entries);
        set
    }

    /// Add entries. Returns how many new entries were inserted.
    pub fn extend<I, S>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for entry in entries {
            let word = normalize_entry(entry.as_ref());
            if !word.is_empty() && !self.words.contains(&word) {
                self.words.push(word);
                added += 1;
            }
        }
        added
    }

    /// Remove an entry (normalized before comparison). Returns whether it was present.
    pub fn remove(&mut self, entry: &str) -> bool {
        let word = normalize_entry(entry);
        let before = self.words.len();
        self.words.retain(|w| *w != word);
        self.words.len() != before
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.words.clone()
    }
}

/// Find the first blocked entry present in `text`.
///
/// Multi-word entries match when the collapsed text contains the collapsed
/// entry. Single-word entries match on an exact token or the same containment
/// rule. Entries that collapse to nothing are skipped.
pub fn find_match<'a>(text: &str, blocked: &'a BlockedWordSet) -> Option<&'a str> {
    if blocked.is_empty() {
        return None;
    }

    let collapsed = collapse(text);
    let tokens = tokenize(text);

    blocked.iter().find(|entry| {
        let needle = collapse(entry);
        if needle.is_empty() {
            return false;
        }
        if collapsed.contains(&needle) {
            return true;
        }
        !entry.contains(char::is_whitespace) && tokens.iter().any(|t| t == entry)
    })
}
