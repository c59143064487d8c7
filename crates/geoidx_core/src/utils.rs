use byteorder::{ByteOrder, LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::errors::{MapError, Result};

pub fn crc32(data: &[u8]) -> u32 { crc32fast::hash(data) }

pub fn uvarint_encode(mut n: u64, out: &mut Vec<u8>) {
    while n >= 0x80 {
        out.push((n as u8) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

/// Decodes one varint; `None` on truncated or over-long input.
pub fn uvarint_decode(mut data: &[u8]) -> Option<(u64, &[u8])> {
    let mut x = 0u64; let mut s = 0u32;
    loop {
        let (&b, rest) = data.split_first()?;
        data = rest;
        if s >= 64 { return None; }
        if b < 0x80 { return Some((x | ((b as u64) << s), data)); }
        x |= ((b & 0x7F) as u64) << s; s += 7;
    }
}

/// Forward-only cursor over a byte slice; every short read is `Corrupt`.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self { Self { data, pos: 0 } }

    pub fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        if pos > data.len() { return Err(MapError::Corrupt); }
        Ok(Self { data, pos })
    }

    pub fn pos(&self) -> usize { self.pos }
    pub fn is_empty(&self) -> bool { self.pos >= self.data.len() }

    pub fn uvarint(&mut self) -> Result<u64> {
        let (v, rest) = uvarint_decode(&self.data[self.pos..]).ok_or(MapError::Corrupt)?;
        self.pos = self.data.len() - rest.len();
        Ok(v)
    }

    pub fn u8(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or(MapError::Corrupt)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn u32_le(&mut self) -> Result<u32> { Ok(LE::read_u32(self.bytes(4)?)) }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(MapError::Corrupt)?;
        let out = self.data.get(self.pos..end).ok_or(MapError::Corrupt)?;
        self.pos = end;
        Ok(out)
    }
}

pub fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> { w.write_u64::<LE>(v) }
pub fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> { w.write_u32::<LE>(v) }
pub fn write_u16<W: Write>(w: &mut W, v: u16) -> io::Result<()> { w.write_u16::<LE>(v) }
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> { r.read_u32::<LE>() }
pub fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> { r.read_u16::<LE>() }
