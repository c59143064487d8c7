// crates/geoidx_core/src/consts.rs

use core::mem::size_of;

pub const MAGIC_CONTAINER: &[u8; 4] = b"GIDX";
pub const VERSION: u16 = 1;

/// Container header: magic[4] version[2] rsv[2] toc_off[8] toc_len[8]
pub const HDR_SIZE: usize = 24;

/// Section tags.
pub const HEADER_FILE_TAG: &str = "header";
pub const FEATURES_FILE_TAG: &str = "dat";
pub const CLASSIF_FILE_TAG: &str = "classif";
pub const SEARCH_INDEX_FILE_TAG: &str = "sdx";

pub const MAX_TAG_LEN: usize = u8::MAX as usize;

/// Feature data header version understood by this builder.
pub const DATA_VERSION: u16 = 1;

/// rank[1] + feature offset[4]
pub const ENTRY_VALUE_SIZE: usize = 1 + size_of::<u32>();

/// Language id reserved for category pseudo-names.
pub const CATEGORY_LANG: u8 = 0;

/// Names producing more tokens than this are truncated.
pub const MAX_TOKENS_PER_NAME: usize = 30;

/// Upper bound for encoded ranks.
pub const MAX_RANK: u8 = u8::MAX;

const _: () = { assert!(ENTRY_VALUE_SIZE == 5); };
