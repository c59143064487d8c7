//! Walks a feature source and emits name and category entries.

use tracing::debug;

use crate::classif::CategoryNames;
use crate::config::IndexConfig;
use crate::consts::CATEGORY_LANG;
use crate::entry::{clamp_rank, IndexEntry};
use crate::errors::Result;
use crate::features::{Feature, FeatureSource};
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub features: u64,
    pub names: u64,
    pub truncated_names: u64,
    pub entries: u64,
}

/// Emits entries for one feature's names and categories.
struct FeatureInserter<'a> {
    out: &'a mut Vec<IndexEntry>,
    stats: &'a mut CollectStats,
    tokenizer: Tokenizer,
    offset: u32,
    rank: u8,
}

impl FeatureInserter<'_> {
    fn add_string(&mut self, lang: u8, s: &str) {
        let mut tokens = self.tokenizer.tokenize(s);
        for token in tokens.by_ref() {
            self.out.push(IndexEntry::new(lang, &token, self.offset, self.rank));
            self.stats.entries += 1;
        }
        if tokens.truncated() { self.stats.truncated_names += 1; }
    }

    fn add_feature(&mut self, feature: &Feature, categories: &dyn CategoryNames) {
        for name in &feature.names {
            self.stats.names += 1;
            self.add_string(name.lang, &name.text);
        }
        for &t in &feature.types {
            match categories.category_name(t) {
                Some(label) => self.add_string(CATEGORY_LANG, label),
                None => debug!(type_id = t, offset = self.offset, "Unknown feature type, no category entry"),
            }
        }
    }
}

/// Collects every entry of `source`. Output is unsorted.
pub fn collect_entries<S: FeatureSource + ?Sized>(
    source: &S,
    categories: &dyn CategoryNames,
    config: &IndexConfig,
) -> Result<(Vec<IndexEntry>, CollectStats)> {
    let mut out = Vec::new();
    let mut stats = CollectStats::default();
    let tokenizer = Tokenizer::new(config.max_tokens_per_name);
    source.for_each_feature(&mut |offset, feature| {
        stats.features += 1;
        let mut ins = FeatureInserter {
            out: &mut out,
            stats: &mut stats,
            tokenizer,
            offset,
            rank: clamp_rank(feature.rank, config.max_rank),
        };
        ins.add_feature(feature, categories);
        Ok(())
    })?;
    Ok((out, stats))
}
