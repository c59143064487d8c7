//! Name normalization and splitting into search tokens.

use tracing::warn;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::consts::MAX_TOKENS_PER_NAME;

/// Lowercase, NFD-decompose and drop combining marks: "Café" → "cafe".
pub fn normalize(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

#[inline]
pub fn is_delimiter(c: char) -> bool { !c.is_alphanumeric() }

#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    max_tokens: usize,
}

impl Default for Tokenizer {
    fn default() -> Self { Self::new(MAX_TOKENS_PER_NAME) }
}

impl Tokenizer {
    pub fn new(max_tokens: usize) -> Self { Self { max_tokens } }

    /// Lazily splits `name`. At most `max_tokens` tokens come out; the rest are
    /// dropped with a single warning.
    pub fn tokenize<'a>(&self, name: &'a str) -> Tokens<'a> {
        Tokens {
            source: name,
            chars: normalize(name).chars().collect(),
            pos: 0,
            emitted: 0,
            limit: self.max_tokens,
            truncated: false,
        }
    }
}

/// Token stream over one name. Not restartable.
pub struct Tokens<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    emitted: usize,
    limit: usize,
    truncated: bool,
}

impl Tokens<'_> {
    /// True once a token past the limit has been seen and dropped.
    pub fn truncated(&self) -> bool { self.truncated }

    fn next_run(&mut self) -> Option<(usize, usize)> {
        while self.pos < self.chars.len() && is_delimiter(self.chars[self.pos]) { self.pos += 1; }
        if self.pos == self.chars.len() { return None; }
        let start = self.pos;
        while self.pos < self.chars.len() && !is_delimiter(self.chars[self.pos]) { self.pos += 1; }
        Some((start, self.pos))
    }
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.truncated { return None; }
        let (start, end) = self.next_run()?;
        if self.emitted == self.limit {
            self.truncated = true;
            self.pos = self.chars.len();
            warn!(name = self.source, limit = self.limit, "Name has too many tokens");
            return None;
        }
        self.emitted += 1;
        Some(self.chars[start..end].iter().collect())
    }
}
