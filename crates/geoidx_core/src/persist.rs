//! Reversal persistence.
//!
//! The trie is built front to back into a scratch file and stored in the
//! container byte-reversed, which puts the root at offset 0 of the section.
//! Builder and readers must apply exactly this transform; it is its own inverse.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::container::parent_dir;
use crate::errors::Result;

const REVERSE_CHUNK: usize = 64 * 1024;

/// Pure byte reversal of a whole stream.
pub fn reverse_bytes(data: &[u8]) -> Vec<u8> {
    data.iter().rev().copied().collect()
}

/// Streams `src` into `dst` back to front, chunk by chunk. Returns bytes copied.
pub fn reverse_copy<R: Read + Seek, W: Write>(src: &mut R, dst: &mut W) -> Result<u64> {
    let len = src.seek(SeekFrom::End(0))?;
    let mut remaining = len;
    let mut buf = vec![0u8; REVERSE_CHUNK];
    while remaining > 0 {
        let n = remaining.min(REVERSE_CHUNK as u64) as usize;
        remaining -= n as u64;
        src.seek(SeekFrom::Start(remaining))?;
        let chunk = &mut buf[..n];
        src.read_exact(chunk)?;
        chunk.reverse();
        dst.write_all(chunk)?;
    }
    dst.flush()?;
    Ok(len)
}

/// Scratch file for the forward stream. Removed when dropped, on every path.
pub fn scratch_file(container: &Path, scratch_dir: Option<&Path>) -> Result<NamedTempFile> {
    let dir = scratch_dir.unwrap_or_else(|| parent_dir(container));
    let name = container
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "container".to_string());
    let tmp = tempfile::Builder::new()
        .prefix(&format!("{name}.search."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    Ok(tmp)
}
