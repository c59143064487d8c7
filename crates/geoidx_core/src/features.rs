//! Feature records as stored in the `header` and `dat` sections.
//!
//! header section (LE): version[2] feature_count[4]
//!
//! dat section: records back to back, each addressed by its byte offset
//!   uvarint payload_len | payload | u32 crc32(payload)
//!
//! payload:
//!   uvarint rank
//!   uvarint name_count, repeat { u8 lang, uvarint len, utf-8 bytes }
//!   uvarint type_count, repeat { uvarint type }

use crate::consts::DATA_VERSION;
use crate::errors::{MapError, Result};
use crate::utils::{crc32, read_u16, read_u32, uvarint_encode, write_u32, ByteCursor};
use byteorder::{ByteOrder, LittleEndian as LE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub version: u16,
    pub feature_count: u32,
}

impl DataHeader {
    pub const SIZE: usize = 6;

    pub fn new(feature_count: u32) -> Self {
        Self { version: DATA_VERSION, feature_count }
    }

    pub fn load(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE { return Err(MapError::BadHeader); }
        let version = read_u16(&mut bytes)?;
        if version != DATA_VERSION { return Err(MapError::BadHeader); }
        let feature_count = read_u32(&mut bytes)?;
        Ok(Self { version, feature_count })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = [0u8; Self::SIZE];
        LE::write_u16(&mut out[0..2], self.version);
        LE::write_u32(&mut out[2..6], self.feature_count);
        out.to_vec()
    }
}

/// One language variant of a feature's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureName {
    pub lang: u8,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub names: Vec<FeatureName>,
    /// Relevance score computed upstream; clamped when encoded.
    pub rank: u32,
    /// Classification ids, resolved to labels through a [`crate::classif::CategoryNames`].
    pub types: Vec<u32>,
}

impl Feature {
    pub fn new(rank: u32) -> Self { Self { rank, ..Self::default() } }

    pub fn with_name(mut self, lang: u8, text: impl Into<String>) -> Self {
        self.names.push(FeatureName { lang, text: text.into() });
        self
    }

    pub fn with_type(mut self, type_id: u32) -> Self {
        self.types.push(type_id);
        self
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        uvarint_encode(self.rank as u64, out);
        uvarint_encode(self.names.len() as u64, out);
        for n in &self.names {
            out.push(n.lang);
            uvarint_encode(n.text.len() as u64, out);
            out.extend_from_slice(n.text.as_bytes());
        }
        uvarint_encode(self.types.len() as u64, out);
        for t in &self.types { uvarint_encode(*t as u64, out); }
    }

    fn decode_payload(payload: &[u8]) -> Result<Self> {
        let mut c = ByteCursor::new(payload);
        let rank = u32::try_from(c.uvarint()?).map_err(|_| MapError::Corrupt)?;
        let name_count = c.uvarint()? as usize;
        let mut names = Vec::with_capacity(name_count.min(16));
        for _ in 0..name_count {
            let lang = c.u8()?;
            let len = c.uvarint()? as usize;
            let text = std::str::from_utf8(c.bytes(len)?).map_err(|_| MapError::Corrupt)?;
            names.push(FeatureName { lang, text: text.to_string() });
        }
        let type_count = c.uvarint()? as usize;
        let mut types = Vec::with_capacity(type_count.min(16));
        for _ in 0..type_count {
            types.push(u32::try_from(c.uvarint()?).map_err(|_| MapError::Corrupt)?);
        }
        if !c.is_empty() { return Err(MapError::Corrupt); }
        Ok(Self { names, rank, types })
    }
}

/// Iteration capability handed to the index builder.
///
/// The callback receives each feature's byte offset in the source container
/// and a borrowed record; the builder never owns the feature store.
pub trait FeatureSource {
    fn for_each_feature(&self, f: &mut dyn FnMut(u32, &Feature) -> Result<()>) -> Result<()>;
}

impl FeatureSource for [(u32, Feature)] {
    fn for_each_feature(&self, f: &mut dyn FnMut(u32, &Feature) -> Result<()>) -> Result<()> {
        for (off, feature) in self { f(*off, feature)?; }
        Ok(())
    }
}

impl FeatureSource for Vec<(u32, Feature)> {
    fn for_each_feature(&self, f: &mut dyn FnMut(u32, &Feature) -> Result<()>) -> Result<()> {
        self.as_slice().for_each_feature(f)
    }
}

/// Borrowed view over a `dat` section.
pub struct FeaturesVector<'a> {
    data: &'a [u8],
    header: DataHeader,
}

impl<'a> FeaturesVector<'a> {
    pub fn new(data: &'a [u8], header: DataHeader) -> Self { Self { data, header } }

    pub fn iter(&self) -> FeatureIter<'a> {
        FeatureIter { data: self.data, pos: 0, failed: false }
    }
}

impl FeatureSource for FeaturesVector<'_> {
    fn for_each_feature(&self, f: &mut dyn FnMut(u32, &Feature) -> Result<()>) -> Result<()> {
        let mut seen = 0u64;
        for item in self.iter() {
            let (off, feature) = item?;
            f(off, &feature)?;
            seen += 1;
        }
        if seen != self.header.feature_count as u64 { return Err(MapError::Corrupt); }
        Ok(())
    }
}

/// Yields `(offset, feature)`; stops after the first decoding error.
pub struct FeatureIter<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl Iterator for FeatureIter<'_> {
    type Item = Result<(u32, Feature)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() { return None; }
        let start = self.pos;
        let offset = match u32::try_from(start) {
            Ok(o) => o,
            Err(_) => {
                self.failed = true;
                return Some(Err(MapError::OffsetOverflow(start as u64)));
            }
        };
        match decode_record(self.data, start) {
            Ok((feature, end)) => {
                self.pos = end;
                Some(Ok((offset, feature)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn decode_record(data: &[u8], start: usize) -> Result<(Feature, usize)> {
    let mut c = ByteCursor::at(data, start)?;
    let len = c.uvarint()? as usize;
    let payload = c.bytes(len)?;
    let want = c.u32_le()?;
    if crc32(payload) != want { return Err(MapError::Corrupt); }
    Ok((Feature::decode_payload(payload)?, c.pos()))
}

/// Appends feature records into a `dat` section buffer.
#[derive(Default)]
pub struct FeaturesWriter {
    buf: Vec<u8>,
    count: u32,
}

impl FeaturesWriter {
    pub fn new() -> Self { Self::default() }

    /// Appends a record and returns its offset.
    pub fn add(&mut self, feature: &Feature) -> Result<u32> {
        let off = u32::try_from(self.buf.len()).map_err(|_| MapError::OffsetOverflow(self.buf.len() as u64))?;
        let mut payload = Vec::new();
        feature.encode_payload(&mut payload);
        uvarint_encode(payload.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(&payload);
        write_u32(&mut self.buf, crc32(&payload))?;
        self.count += 1;
        Ok(off)
    }

    pub fn header(&self) -> DataHeader { DataHeader::new(self.count) }

    /// Returns `(header section, dat section)`.
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        (self.header().to_bytes(), self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_address_records() {
        let mut w = FeaturesWriter::new();
        let a = Feature::new(200).with_name(1, "Central Park").with_type(7);
        let b = Feature::new(3).with_name(2, "Парк").with_name(1, "Park");
        let off_a = w.add(&a).unwrap();
        let off_b = w.add(&b).unwrap();
        assert_eq!(off_a, 0);
        assert!(off_b > off_a);

        let (hdr, dat) = w.finish();
        assert_eq!(hdr, vec![1, 0, 2, 0, 0, 0]);
        let header = DataHeader::load(&hdr).unwrap();
        assert_eq!(header.feature_count, 2);

        let fv = FeaturesVector::new(&dat, header);
        let all: Vec<(u32, Feature)> = fv.iter().collect::<Result<_>>().unwrap();
        assert_eq!(all, vec![(off_a, a), (off_b, b)]);
    }

    #[test]
    fn corrupt_record_stops_iteration() {
        let mut w = FeaturesWriter::new();
        w.add(&Feature::new(1).with_name(1, "x")).unwrap();
        w.add(&Feature::new(1).with_name(1, "y")).unwrap();
        let (hdr, mut dat) = w.finish();
        dat[2] ^= 0x55;
        let fv = FeaturesVector::new(&dat, DataHeader::load(&hdr).unwrap());
        let items: Vec<_> = fv.iter().collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(MapError::Corrupt)));
        assert!(fv.for_each_feature(&mut |_, _| Ok(())).is_err());
    }

    #[test]
    fn header_count_mismatch_is_corrupt() {
        let mut w = FeaturesWriter::new();
        w.add(&Feature::new(1)).unwrap();
        let (_, dat) = w.finish();
        let fv = FeaturesVector::new(&dat, DataHeader::new(5));
        assert!(matches!(fv.for_each_feature(&mut |_, _| Ok(())), Err(MapError::Corrupt)));
    }

    #[test]
    fn rejects_unknown_data_version() {
        let mut hdr = DataHeader::new(1).to_bytes();
        hdr[0] = 9;
        assert!(matches!(DataHeader::load(&hdr), Err(MapError::BadHeader)));
        assert!(matches!(DataHeader::load(&hdr[..3]), Err(MapError::BadHeader)));
    }
}
