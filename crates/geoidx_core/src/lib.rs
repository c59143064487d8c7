//! Search index builder for offline map containers.
//!
//! Feature names and category labels are tokenized into (token, feature)
//! entries, sorted rank-aware, compiled into an edge-compressed trie whose
//! edges carry the best rank beneath them, and stored byte-reversed in the
//! container's `sdx` section.

pub mod builder;
pub mod classif;
pub mod collector;
pub mod config;
pub mod consts;
pub mod container;
pub mod entry;
pub mod errors;
pub mod features;
pub mod lang;
pub mod persist;
pub mod tokenizer;
pub mod trie;
pub mod utils;

pub use builder::{build_search_index, build_search_index_for_container, prepare_entries, IndexStats};
pub use classif::{CategoryNames, Classificator};
pub use config::IndexConfig;
pub use container::{ContainerReader, ContainerWriter, SectionInfo};
pub use entry::{sort_and_dedup, IndexEntry};
pub use errors::{BuildError, MapError, Result};
pub use features::{DataHeader, Feature, FeatureName, FeatureSource, FeaturesVector, FeaturesWriter};
pub use persist::reverse_bytes;
pub use tokenizer::{normalize, Tokenizer};
pub use trie::{EdgeValueCalc, RankOfValue, TrieBuilder, TrieReader};
