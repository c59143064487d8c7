//! Fixed-layout (token, feature) records.
//!
//! key   = [lang, c0, c1, ...] as Unicode scalar values
//! value = [rank, offset LE u32]  (ENTRY_VALUE_SIZE bytes)
//!
//! Entries sort by key ascending, then rank descending, then offset ascending,
//! so the best-ranked feature for a given text comes first among its siblings.

use byteorder::{ByteOrder, LittleEndian as LE};
use std::cmp::Ordering;

use crate::consts::ENTRY_VALUE_SIZE;
use crate::errors::{MapError, Result};

pub type KeyChar = u32;
pub type EntryValue = [u8; ENTRY_VALUE_SIZE];

pub fn clamp_rank(raw: u32, max_rank: u8) -> u8 {
    raw.min(max_rank as u32) as u8
}

/// Feature offset to its on-disk bytes, independent of host byte order.
#[inline]
pub fn encode_offset(offset: u32) -> [u8; 4] {
    let mut out = [0u8; 4];
    LE::write_u32(&mut out, offset);
    out
}

#[inline]
pub fn decode_offset(bytes: &[u8; 4]) -> u32 { LE::read_u32(bytes) }

pub fn encode_value(rank: u8, offset: u32) -> EntryValue {
    let mut v = [0u8; ENTRY_VALUE_SIZE];
    v[0] = rank;
    v[1..].copy_from_slice(&encode_offset(offset));
    v
}

/// Returns `(rank, offset)`; any length other than `ENTRY_VALUE_SIZE` is `Corrupt`.
pub fn decode_value(bytes: &[u8]) -> Result<(u8, u32)> {
    let v: &EntryValue = bytes.try_into().map_err(|_| MapError::Corrupt)?;
    Ok(value_parts(v))
}

fn value_parts(v: &EntryValue) -> (u8, u32) {
    (v[0], decode_offset(&[v[1], v[2], v[3], v[4]]))
}

pub fn encode_key(lang: u8, token: &str) -> Vec<KeyChar> {
    let mut key = Vec::with_capacity(token.len() + 1);
    key.push(lang as KeyChar);
    key.extend(token.chars().map(|c| c as KeyChar));
    key
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    key: Vec<KeyChar>,
    value: EntryValue,
}

impl IndexEntry {
    /// `rank` must already be clamped (see [`clamp_rank`]).
    pub fn new(lang: u8, token: &str, offset: u32, rank: u8) -> Self {
        Self { key: encode_key(lang, token), value: encode_value(rank, offset) }
    }

    pub fn from_parts(key: Vec<KeyChar>, value: EntryValue) -> Self { Self { key, value } }

    pub fn key(&self) -> &[KeyChar] { &self.key }
    pub fn value(&self) -> &EntryValue { &self.value }

    pub fn lang(&self) -> u8 { self.key.first().copied().unwrap_or(0) as u8 }

    /// Token text without the language prefix.
    pub fn token(&self) -> String {
        self.key.iter().skip(1).filter_map(|&c| char::from_u32(c)).collect()
    }

    pub fn rank(&self) -> u8 { value_parts(&self.value).0 }

    pub fn offset(&self) -> u32 { value_parts(&self.value).1 }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.rank().cmp(&self.rank()))
            .then_with(|| self.offset().cmp(&other.offset()))
    }
}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// Sorts by the entry order and drops exact duplicates (same key and value).
pub fn sort_and_dedup(entries: &mut Vec<IndexEntry>) {
    entries.sort_unstable();
    entries.dedup();
}
