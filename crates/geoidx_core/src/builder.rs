//! Search index build: collect → sort/dedup → trie → reversed section.

use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{error, info, warn};

use crate::classif::{CategoryNames, Classificator};
use crate::collector::collect_entries;
use crate::config::IndexConfig;
use crate::consts::{CLASSIF_FILE_TAG, FEATURES_FILE_TAG, HEADER_FILE_TAG, SEARCH_INDEX_FILE_TAG};
use crate::container::{ContainerReader, ContainerWriter};
use crate::entry::{sort_and_dedup, IndexEntry};
use crate::errors::{BuildError, Result};
use crate::features::{DataHeader, FeatureSource, FeaturesVector};
use crate::persist::scratch_file;
use crate::trie::{RankOfValue, TrieBuilder};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub features: u64,
    pub entries: u64,
    pub unique_entries: u64,
    pub truncated_names: u64,
    pub trie_nodes: u64,
    /// Length of the forward stream, equal to the stored section length.
    pub section_len: u64,
}

/// Collects, sorts and deduplicates every entry of `source`.
pub fn prepare_entries<S: FeatureSource + ?Sized>(
    source: &S,
    categories: &dyn CategoryNames,
    config: &IndexConfig,
) -> Result<(Vec<IndexEntry>, IndexStats)> {
    let (mut entries, cs) = collect_entries(source, categories, config)?;
    sort_and_dedup(&mut entries);
    let stats = IndexStats {
        features: cs.features,
        entries: cs.entries,
        unique_entries: entries.len() as u64,
        truncated_names: cs.truncated_names,
        ..IndexStats::default()
    };
    Ok((entries, stats))
}

/// Writes the forward (not yet reversed) trie for `source` into `writer`.
pub fn build_search_index<S: FeatureSource + ?Sized, W: Write>(
    source: &S,
    categories: &dyn CategoryNames,
    config: &IndexConfig,
    writer: &mut W,
) -> Result<IndexStats> {
    let (entries, mut stats) = prepare_entries(source, categories, config)?;
    let ts = TrieBuilder::new(RankOfValue).build(writer, &entries)?;
    stats.trie_nodes = ts.nodes;
    stats.section_len = ts.bytes;
    Ok(stats)
}

/// Builds the search index of the container at `path` and swaps it into the
/// `sdx` section.
///
/// A failure before the final swap leaves the container untouched, and the
/// scratch file is removed on every path.
pub fn build_search_index_for_container(
    path: &Path,
    config: &IndexConfig,
) -> std::result::Result<IndexStats, BuildError> {
    let res = build_inner(path, config);
    match &res {
        Ok(stats) => info!(
            container = %path.display(),
            features = stats.features,
            entries = stats.unique_entries,
            bytes = stats.section_len,
            "Search index built"
        ),
        Err(BuildError::Read(e)) => error!(container = %path.display(), "Error while reading file: {e}"),
        Err(BuildError::Write(e)) => error!(container = %path.display(), "Error writing index file: {e}"),
    }
    res
}

fn build_inner(path: &Path, config: &IndexConfig) -> std::result::Result<IndexStats, BuildError> {
    let (entries, stats) = read_entries(path, config).map_err(BuildError::Read)?;
    write_index(path, config, &entries, stats)
}

fn read_entries(path: &Path, config: &IndexConfig) -> Result<(Vec<IndexEntry>, IndexStats)> {
    let cont = ContainerReader::open(path)?;
    let header = DataHeader::load(cont.section(HEADER_FILE_TAG)?)?;
    let classif = if cont.has_section(CLASSIF_FILE_TAG) {
        Classificator::load(cont.section(CLASSIF_FILE_TAG)?)?
    } else {
        warn!(container = %path.display(), "No classificator section, categories are not indexed");
        Classificator::default()
    };
    let features = FeaturesVector::new(cont.section(FEATURES_FILE_TAG)?, header);
    prepare_entries(&features, &classif, config)
}

/// Write phase: scratch file, trie, reversed swap into the container. The
/// scratch file is dropped (and deleted) on every return path.
fn write_index(
    path: &Path,
    config: &IndexConfig,
    entries: &[IndexEntry],
    mut stats: IndexStats,
) -> std::result::Result<IndexStats, BuildError> {
    let mut scratch = scratch_file(path, config.scratch_dir.as_deref()).map_err(BuildError::Write)?;
    write_section(path, &mut scratch, entries, &mut stats).map_err(BuildError::Write)?;

    if let Err(e) = scratch.close() {
        warn!(error = %e, "Failed to remove scratch file");
    }
    Ok(stats)
}

fn write_section(
    path: &Path,
    scratch: &mut tempfile::NamedTempFile,
    entries: &[IndexEntry],
    stats: &mut IndexStats,
) -> Result<()> {
    {
        let mut w = BufWriter::new(scratch.as_file_mut());
        let ts = TrieBuilder::new(RankOfValue).build(&mut w, entries)?;
        stats.trie_nodes = ts.nodes;
        stats.section_len = ts.bytes;
    }

    let mut cont = ContainerWriter::open_existing(path)?;
    cont.put_section_reversed(SEARCH_INDEX_FILE_TAG, scratch.as_file().try_clone()?)?;
    cont.commit()?;
    Ok(())
}
