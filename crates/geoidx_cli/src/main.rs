use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::Level;

use geoidx_core::{
    build_search_index_for_container,
    consts::{CLASSIF_FILE_TAG, FEATURES_FILE_TAG, HEADER_FILE_TAG, SEARCH_INDEX_FILE_TAG},
    entry::decode_value,
    lang::{lang_code, lang_index},
    BuildError, Classificator, ContainerReader, ContainerWriter, Feature, FeaturesWriter, IndexConfig,
    TrieReader,
};

#[derive(Parser)]
#[command(name = "geoidx", about = "geoidx — map container search index tools")]
struct Cli {
    /// Debug-level logging
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a container from a JSON feature list
    Pack {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },

    /// Build (or rebuild) the search index section
    BuildIndex {
        #[arg(long)]
        container: PathBuf,
        /// JSON IndexConfig; missing file means defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the section table
    Info {
        #[arg(long)]
        container: PathBuf,
    },

    /// Print index entries in trie order
    DumpIndex {
        #[arg(long)]
        container: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Deserialize)]
struct PackInput {
    #[serde(default)]
    categories: BTreeMap<u32, String>,
    features: Vec<PackFeature>,
}

#[derive(Deserialize)]
struct PackFeature {
    /// language code → name
    #[serde(default)]
    names: BTreeMap<String, String>,
    #[serde(default)]
    rank: u32,
    #[serde(default)]
    types: Vec<u32>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn to_feature(pf: PackFeature) -> Result<Feature> {
    let mut f = Feature::new(pf.rank);
    for (code, text) in pf.names {
        let lang = lang_index(&code).ok_or_else(|| anyhow!("unknown language code: {code}"))?;
        f = f.with_name(lang, text);
    }
    f.types = pf.types;
    Ok(f)
}

fn pack(input: &Path, out: &Path) -> Result<()> {
    let s = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let parsed: PackInput = serde_json::from_str(&s).context("parsing feature list")?;

    let mut fw = FeaturesWriter::new();
    for pf in parsed.features {
        fw.add(&to_feature(pf)?)?;
    }
    let count = fw.header().feature_count;
    let (hdr, dat) = fw.finish();
    let classif = Classificator { types: parsed.categories };

    let mut w = ContainerWriter::create(out);
    w.put_section(HEADER_FILE_TAG, hdr)?;
    w.put_section(FEATURES_FILE_TAG, dat)?;
    w.put_section(CLASSIF_FILE_TAG, classif.to_bytes()?)?;
    let path = w.commit()?;
    println!("packed {} features: {}", count, path.display());
    Ok(())
}

fn build_index(container: &Path, config: Option<&Path>) -> Result<()> {
    let cfg = match config {
        Some(p) => IndexConfig::load(p).with_context(|| format!("loading config {}", p.display()))?,
        None => IndexConfig::default(),
    };
    match build_search_index_for_container(container, &cfg) {
        Ok(stats) => {
            println!(
                "index built: features={} entries={} unique={} truncated_names={} nodes={} bytes={}",
                stats.features,
                stats.entries,
                stats.unique_entries,
                stats.truncated_names,
                stats.trie_nodes,
                stats.section_len
            );
            Ok(())
        }
        Err(e @ BuildError::Read(_)) => bail!("read failure: {e}"),
        Err(e @ BuildError::Write(_)) => bail!("write failure: {e}"),
    }
}

fn info(container: &Path) -> Result<()> {
    let r = ContainerReader::open(container)?;
    println!("{}", container.display());
    for s in r.sections() {
        println!("  {:<10} off={:<10} len={:<10} crc={:08x}", s.tag, s.offset, s.len, s.crc);
    }
    Ok(())
}

fn dump_index(container: &Path, limit: Option<usize>) -> Result<()> {
    let r = ContainerReader::open(container)?;
    let trie = TrieReader::new(r.section(SEARCH_INDEX_FILE_TAG)?);
    let entries = trie.entries()?;
    let total = entries.len();
    for e in entries.into_iter().take(limit.unwrap_or(usize::MAX)) {
        let lang = match e.lang() {
            0 => "cat".to_string(),
            id => lang_code(id).map(str::to_string).unwrap_or_else(|| id.to_string()),
        };
        let (rank, offset) = decode_value(e.value())?;
        println!("{lang}\t{}\t{rank}\t{offset}", e.token());
    }
    println!("total: {total}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Cmd::Pack { input, out } => pack(&input, &out)?,
        Cmd::BuildIndex { container, config } => build_index(&container, config.as_deref())?,
        Cmd::Info { container } => info(&container)?,
        Cmd::DumpIndex { container, limit } => dump_index(&container, limit)?,
    }
    Ok(())
}
