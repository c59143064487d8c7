//! Map container file format & IO (named byte sections)
//!
//! Header (LE, 24 bytes):
//!   magic[4]   = "GIDX"
//!   version[2] = 1
//!   rsv[2]     = 0
//!   toc_off[8] = table of contents offset
//!   toc_len[8] = table of contents length
//!
//! Sections: raw bytes, back to back, in table order.
//!
//! Table of contents:
//!   u32 count
//!   repeat count * { u8 tag_len, tag[tag_len], u64 off, u64 len, u32 crc32 }
//!
//! Every section is checksummed; the reader refuses a container whose header,
//! table or section payloads do not check out.

use crate::consts::{HDR_SIZE, MAGIC_CONTAINER, MAX_TAG_LEN, VERSION};
use crate::errors::{MapError, Result};
use crate::persist::reverse_copy;
use crate::utils::{crc32, write_u16, write_u32, write_u64, ByteCursor};
use byteorder::{ByteOrder, LittleEndian as LE};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let dir = parent_dir(path);
    let f = std::fs::OpenOptions::new().read(true).custom_flags(libc::O_DIRECTORY).open(dir)?;
    f.sync_all()
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> { Ok(()) }

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// One row of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub tag: String,
    pub offset: u64,
    pub len: u64,
    pub crc: u32,
}

/// Read-only view over a container. Sections are borrowed from the mapping.
pub struct ContainerReader {
    _f: File,
    mmap: Mmap,
    sections: Vec<SectionInfo>,
}

impl ContainerReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::open(path)?;
        if f.metadata()?.len() < HDR_SIZE as u64 { return Err(MapError::BadHeader); }
        let mmap = unsafe { Mmap::map(&f)? };
        let sections = parse_toc(&mmap)?;
        Ok(Self { _f: f, mmap, sections })
    }

    pub fn sections(&self) -> &[SectionInfo] { &self.sections }

    pub fn has_section(&self, tag: &str) -> bool {
        self.sections.iter().any(|s| s.tag == tag)
    }

    pub fn section(&self, tag: &str) -> Result<&[u8]> {
        let info = self
            .sections
            .iter()
            .find(|s| s.tag == tag)
            .ok_or_else(|| MapError::SectionMissing(tag.to_string()))?;
        // bounds were validated in parse_toc
        Ok(&self.mmap[info.offset as usize..(info.offset + info.len) as usize])
    }
}

fn parse_toc(data: &[u8]) -> Result<Vec<SectionInfo>> {
    if data.len() < HDR_SIZE || &data[0..4] != MAGIC_CONTAINER { return Err(MapError::BadHeader); }
    let ver = LE::read_u16(&data[4..6]);
    if ver != VERSION { return Err(MapError::BadHeader); }
    let toc_off = LE::read_u64(&data[8..16]);
    let toc_len = LE::read_u64(&data[16..24]);
    let toc_end = toc_off.checked_add(toc_len).ok_or(MapError::BadHeader)?;
    if toc_off < HDR_SIZE as u64 || toc_end > data.len() as u64 { return Err(MapError::BadHeader); }

    let toc = &data[toc_off as usize..toc_end as usize];
    let mut c = ByteCursor::new(toc);
    let count = c.u32_le()? as usize;
    let mut out: Vec<SectionInfo> = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        let tag_len = c.u8()? as usize;
        let tag = std::str::from_utf8(c.bytes(tag_len)?).map_err(|_| MapError::Corrupt)?.to_string();
        let offset = LE::read_u64(c.bytes(8)?);
        let len = LE::read_u64(c.bytes(8)?);
        let crc = c.u32_le()?;
        let end = offset.checked_add(len).ok_or(MapError::Corrupt)?;
        if offset < HDR_SIZE as u64 || end > toc_off { return Err(MapError::Corrupt); }
        if crc32(&data[offset as usize..end as usize]) != crc { return Err(MapError::Corrupt); }
        if out.iter().any(|s| s.tag == tag) { return Err(MapError::Corrupt); }
        out.push(SectionInfo { tag, offset, len, crc });
    }
    if !c.is_empty() { return Err(MapError::Corrupt); }
    Ok(out)
}

/// Where a section's bytes come from at commit time.
enum SectionBody {
    Bytes(Vec<u8>),
    /// Unchanged section of the container being rewritten, streamed from its mapping.
    Kept(SectionInfo),
    /// Scratch file copied back to front.
    Reversed(File),
}

/// Writer: stages sections, then publishes the whole container atomically.
///
/// Nothing touches the destination path until [`ContainerWriter::commit`] succeeds.
pub struct ContainerWriter {
    path_final: PathBuf,
    source: Option<ContainerReader>,
    sections: Vec<(String, SectionBody)>,
}

impl ContainerWriter {
    /// New, empty container (not published).
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self { path_final: path.as_ref().to_path_buf(), source: None, sections: Vec::new() }
    }

    /// Opens an existing container so some sections can be replaced. Kept
    /// sections stay in the mapping until commit.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path_final = path.as_ref().to_path_buf();
        let reader = ContainerReader::open(&path_final)?;
        let sections = reader
            .sections()
            .iter()
            .map(|info| (info.tag.clone(), SectionBody::Kept(info.clone())))
            .collect();
        Ok(Self { path_final, source: Some(reader), sections })
    }

    /// Replaces the section in place, or appends it when the tag is new.
    pub fn put_section(&mut self, tag: &str, bytes: Vec<u8>) -> Result<()> {
        self.stage(tag, SectionBody::Bytes(bytes))
    }

    /// Like [`put_section`](Self::put_section), but the section is `src`
    /// written back to front (see [`crate::persist::reverse_copy`]).
    pub fn put_section_reversed(&mut self, tag: &str, src: File) -> Result<()> {
        self.stage(tag, SectionBody::Reversed(src))
    }

    fn stage(&mut self, tag: &str, body: SectionBody) -> Result<()> {
        if tag.is_empty() || tag.len() > MAX_TAG_LEN { return Err(MapError::Unsupported); }
        match self.sections.iter_mut().find(|(t, _)| t == tag) {
            Some((_, b)) => *b = body,
            None => self.sections.push((tag.to_string(), body)),
        }
        Ok(())
    }

    /// Writes sections + table to a sibling temp file, then renames it over the destination.
    ///
    /// The destination keeps its permissions when it already exists.
    pub fn commit(mut self) -> Result<PathBuf> {
        let dir = parent_dir(&self.path_final);
        let mut tmp = tempfile::Builder::new().prefix("geoidx_cont_").tempfile_in(dir)?;
        if let Some(meta) = existing_metadata(&self.path_final)? {
            tmp.as_file().set_permissions(meta.permissions())?;
        }

        let mut toc: Vec<SectionInfo> = Vec::with_capacity(self.sections.len());
        let toc_off = {
            let mut w = CrcWriter::new(BufWriter::new(tmp.as_file_mut()));
            w.inner.write_all(&[0u8; HDR_SIZE])?; // patched in write_tail
            let mut off = HDR_SIZE as u64;
            for (tag, body) in &mut self.sections {
                let (len, crc) = match body {
                    SectionBody::Bytes(data) => {
                        w.inner.write_all(data)?;
                        (data.len() as u64, crc32(data))
                    }
                    SectionBody::Kept(info) => {
                        let src = self.source.as_ref().ok_or(MapError::Corrupt)?;
                        w.inner.write_all(src.section(&info.tag)?)?;
                        (info.len, info.crc)
                    }
                    SectionBody::Reversed(file) => {
                        w.reset();
                        let len = reverse_copy(file, &mut w)?;
                        (len, w.crc())
                    }
                };
                toc.push(SectionInfo { tag: tag.clone(), offset: off, len, crc });
                off += len;
            }
            w.inner.flush()?;
            off
        };

        let toc_bytes = encode_toc(&toc)?;
        write_tail(&mut tmp, toc_off, &toc_bytes)?;

        tmp.persist(&self.path_final)?;
        drop(self.source.take());
        let _ = fsync_dir(&self.path_final);
        Ok(self.path_final)
    }
}

fn existing_metadata(path: &Path) -> Result<Option<std::fs::Metadata>> {
    match std::fs::metadata(path) {
        Ok(m) => Ok(Some(m)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pass-through writer hashing what it forwards.
struct CrcWriter<W: Write> {
    inner: W,
    hasher: crc32fast::Hasher,
}

impl<W: Write> CrcWriter<W> {
    fn new(inner: W) -> Self { Self { inner, hasher: crc32fast::Hasher::new() } }

    fn reset(&mut self) { self.hasher = crc32fast::Hasher::new(); }

    fn crc(&self) -> u32 { self.hasher.clone().finalize() }
}

impl<W: Write> Write for CrcWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> { self.inner.flush() }
}

fn encode_toc(toc: &[SectionInfo]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(4 + toc.len() * 32);
    write_u32(&mut buf, toc.len() as u32)?;
    for s in toc {
        buf.push(s.tag.len() as u8);
        buf.extend_from_slice(s.tag.as_bytes());
        write_u64(&mut buf, s.offset)?;
        write_u64(&mut buf, s.len)?;
        write_u32(&mut buf, s.crc)?;
    }
    Ok(buf)
}

fn write_tail(tmp: &mut NamedTempFile, toc_off: u64, toc_bytes: &[u8]) -> Result<()> {
    let f = tmp.as_file_mut();
    f.seek(SeekFrom::Start(toc_off))?;
    f.write_all(toc_bytes)?;

    f.seek(SeekFrom::Start(0))?;
    let mut hdr = Vec::with_capacity(HDR_SIZE);
    hdr.extend_from_slice(MAGIC_CONTAINER);
    write_u16(&mut hdr, VERSION)?;
    write_u16(&mut hdr, 0)?;
    write_u64(&mut hdr, toc_off)?;
    write_u64(&mut hdr, toc_bytes.len() as u64)?;
    f.write_all(&hdr)?;
    f.sync_all()?;
    Ok(())
}
