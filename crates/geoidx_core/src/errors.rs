use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Persist: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Bad magic or version")]
    BadHeader,

    #[error("Corrupt record")]
    Corrupt,

    #[error("Missing section: {0}")]
    SectionMissing(String),

    #[error("Offset {0} does not fit in 32 bits")]
    OffsetOverflow(u64),

    #[error("Entries are not strictly sorted")]
    Unsorted,

    #[error("Unsupported kind")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, MapError>;

/// Outcome of a failed index build, split by the side that failed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The source container could not be read; nothing was written.
    #[error("error while reading source: {0}")]
    Read(#[source] MapError),

    /// Writing the scratch file or the destination section failed.
    #[error("error writing index: {0}")]
    Write(#[source] MapError),
}

