//! Edge-compressed trie over sorted entries, with per-edge max values.
//!
//! Node layout, as read from the stored (reversed) section:
//!
//! ```text
//! uvarint value_count
//! uvarint edge_count
//! value_count * [u8; ENTRY_VALUE_SIZE]
//! edge_count  * { uvarint label_len, label_len * uvarint char, u8 max_value, uvarint distance }
//! ```
//!
//! The builder emits children before parents and appends every node
//! byte-reversed. After the whole stream is reversed (see [`crate::persist`])
//! the root sits at section offset 0, each node reads front to back, and a
//! child starts `distance` bytes after the end of its parent.

use std::io::Write;

use crate::consts::ENTRY_VALUE_SIZE;
use crate::entry::{EntryValue, IndexEntry, KeyChar};
use crate::errors::{MapError, Result};
use crate::utils::{uvarint_encode, ByteCursor};

/// Reduction applied to every stored value; edges carry the max over their subtree.
pub trait EdgeValueCalc {
    fn edge_value(&self, value: &[u8]) -> u8;
}

/// Rank byte of an entry value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankOfValue;

impl EdgeValueCalc for RankOfValue {
    fn edge_value(&self, value: &[u8]) -> u8 {
        debug_assert_eq!(value.len(), ENTRY_VALUE_SIZE);
        value.first().copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrieStats {
    pub nodes: u64,
    pub edges: u64,
    pub values: u64,
    pub bytes: u64,
}

#[derive(Default)]
struct Node {
    edges: Vec<(KeyChar, usize)>,
    values: Vec<EntryValue>,
}

/// Counts bytes so node distances can be computed while streaming.
struct PosWriter<'a, W: Write> {
    inner: &'a mut W,
    pos: u64,
}

impl<W: Write> PosWriter<'_, W> {
    fn append(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }
}

pub struct TrieBuilder<C: EdgeValueCalc> {
    calc: C,
}

impl<C: EdgeValueCalc> TrieBuilder<C> {
    pub fn new(calc: C) -> Self { Self { calc } }

    /// Writes the forward stream for `entries`, which must be strictly
    /// ascending (sorted and deduplicated).
    pub fn build<W: Write>(&self, writer: &mut W, entries: &[IndexEntry]) -> Result<TrieStats> {
        if entries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MapError::Unsorted);
        }
        let nodes = insert_sorted(entries);
        let mut em = Emitter {
            w: PosWriter { inner: writer, pos: 0 },
            calc: &self.calc,
            nodes: &nodes,
            stats: TrieStats::default(),
        };
        em.emit(0)?;
        em.w.inner.flush()?;
        let mut stats = em.stats;
        stats.bytes = em.w.pos;
        Ok(stats)
    }
}

fn insert_sorted(entries: &[IndexEntry]) -> Vec<Node> {
    let mut nodes = vec![Node::default()];
    for e in entries {
        let mut cur = 0usize;
        for &c in e.key() {
            // sorted input: a matching child is always the last one
            cur = match nodes[cur].edges.last() {
                Some(&(lc, idx)) if lc == c => idx,
                _ => {
                    let idx = nodes.len();
                    nodes.push(Node::default());
                    nodes[cur].edges.push((c, idx));
                    idx
                }
            };
        }
        nodes[cur].values.push(*e.value());
    }
    nodes
}

struct Emitter<'a, W: Write, C: EdgeValueCalc> {
    w: PosWriter<'a, W>,
    calc: &'a C,
    nodes: &'a [Node],
    stats: TrieStats,
}

impl<W: Write, C: EdgeValueCalc> Emitter<'_, W, C> {
    /// Emits the subtree at `idx`; returns (forward end position, subtree max).
    fn emit(&mut self, idx: usize) -> Result<(u64, u8)> {
        let nodes = self.nodes;
        let node = &nodes[idx];

        let mut edges: Vec<(Vec<KeyChar>, u8, u64)> = Vec::with_capacity(node.edges.len());
        for &(c, first) in &node.edges {
            let mut label = vec![c];
            let mut child = first;
            while nodes[child].values.is_empty() && nodes[child].edges.len() == 1 {
                let (next_c, next) = nodes[child].edges[0];
                label.push(next_c);
                child = next;
            }
            let (child_end, child_max) = self.emit(child)?;
            edges.push((label, child_max, child_end));
        }

        let own_max = node.values.iter().map(|v| self.calc.edge_value(v)).max();
        let max = edges.iter().map(|e| e.1).chain(own_max).max().unwrap_or(0);

        let start = self.w.pos;
        let mut buf = Vec::with_capacity(2 + node.values.len() * ENTRY_VALUE_SIZE + edges.len() * 8);
        uvarint_encode(node.values.len() as u64, &mut buf);
        uvarint_encode(edges.len() as u64, &mut buf);
        for v in &node.values { buf.extend_from_slice(v); }
        for (label, edge_max, child_end) in &edges {
            uvarint_encode(label.len() as u64, &mut buf);
            for &c in label { uvarint_encode(c as u64, &mut buf); }
            buf.push(*edge_max);
            uvarint_encode(start - child_end, &mut buf);
        }
        buf.reverse();
        self.w.append(&buf)?;

        self.stats.nodes += 1;
        self.stats.edges += edges.len() as u64;
        self.stats.values += node.values.len() as u64;
        Ok((self.w.pos, max))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieEdge {
    pub label: Vec<KeyChar>,
    pub max_value: u8,
    /// Absolute position of the child node in the stored section.
    pub child: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieNode {
    pub values: Vec<EntryValue>,
    pub edges: Vec<TrieEdge>,
}

/// Decoder for a stored section; used for inspection and verification.
pub struct TrieReader<'a> {
    data: &'a [u8],
}

impl<'a> TrieReader<'a> {
    pub fn new(data: &'a [u8]) -> Self { Self { data } }

    pub fn root(&self) -> Result<TrieNode> { self.node_at(0) }

    pub fn node_at(&self, pos: usize) -> Result<TrieNode> {
        let mut c = ByteCursor::at(self.data, pos)?;
        let value_count = c.uvarint()? as usize;
        let edge_count = c.uvarint()? as usize;
        let mut values = Vec::with_capacity(value_count.min(1024));
        for _ in 0..value_count {
            let v: EntryValue = c.bytes(ENTRY_VALUE_SIZE)?.try_into().map_err(|_| MapError::Corrupt)?;
            values.push(v);
        }
        let mut raw_edges = Vec::with_capacity(edge_count.min(1024));
        for _ in 0..edge_count {
            let len = c.uvarint()? as usize;
            if len == 0 { return Err(MapError::Corrupt); }
            let mut label = Vec::with_capacity(len.min(256));
            for _ in 0..len {
                label.push(KeyChar::try_from(c.uvarint()?).map_err(|_| MapError::Corrupt)?);
            }
            let max_value = c.u8()?;
            let distance = usize::try_from(c.uvarint()?).map_err(|_| MapError::Corrupt)?;
            raw_edges.push((label, max_value, distance));
        }
        let end = c.pos();
        let mut edges = Vec::with_capacity(raw_edges.len());
        for (label, max_value, distance) in raw_edges {
            let child = end.checked_add(distance).ok_or(MapError::Corrupt)?;
            if child >= self.data.len() { return Err(MapError::Corrupt); }
            edges.push(TrieEdge { label, max_value, child });
        }
        Ok(TrieNode { values, edges })
    }

    /// All `(key, value)` pairs in trie order: a node's values, then its
    /// edges left to right.
    pub fn entries(&self) -> Result<Vec<IndexEntry>> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, Vec<KeyChar>)> = vec![(0, Vec::new())];
        while let Some((pos, prefix)) = stack.pop() {
            let node = self.node_at(pos)?;
            for v in node.values {
                out.push(IndexEntry::from_parts(prefix.clone(), v));
            }
            for edge in node.edges.into_iter().rev() {
                let mut key = prefix.clone();
                key.extend_from_slice(&edge.label);
                stack.push((edge.child, key));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::sort_and_dedup;
    use crate::persist::reverse_bytes;

    fn build(entries: &[IndexEntry]) -> (Vec<u8>, TrieStats) {
        let mut fwd = Vec::new();
        let stats = TrieBuilder::new(RankOfValue).build(&mut fwd, entries).unwrap();
        (reverse_bytes(&fwd), stats)
    }

    #[test]
    fn empty_trie_is_a_bare_root() {
        let (stored, stats) = build(&[]);
        assert_eq!(stored, vec![0, 0]);
        assert_eq!(stats.nodes, 1);
        let r = TrieReader::new(&stored);
        assert!(r.entries().unwrap().is_empty());
    }

    #[test]
    fn enumerates_in_entry_order() {
        let mut v = vec![
            IndexEntry::new(1, "park", 10, 50),
            IndexEntry::new(1, "park", 20, 200),
            IndexEntry::new(1, "parking", 30, 7),
            IndexEntry::new(1, "pub", 40, 9),
            IndexEntry::new(0, "park", 20, 200),
        ];
        sort_and_dedup(&mut v);
        let (stored, stats) = build(&v);
        assert_eq!(stats.values, 5);
        assert_eq!(TrieReader::new(&stored).entries().unwrap(), v);
    }

    #[test]
    fn edges_are_compressed_and_carry_subtree_max() {
        let mut v = vec![
            IndexEntry::new(1, "park", 10, 50),
            IndexEntry::new(1, "parking", 30, 7),
            IndexEntry::new(1, "pub", 40, 90),
            IndexEntry::new(2, "zoo", 1, 3),
        ];
        sort_and_dedup(&mut v);
        let (stored, _) = build(&v);
        let r = TrieReader::new(&stored);

        let root = r.root().unwrap();
        assert_eq!(root.edges.len(), 2);
        assert_eq!(root.edges[0].label, vec![1, 'p' as u32]);
        assert_eq!(root.edges[0].max_value, 90);
        assert_eq!(root.edges[1].label, vec![2, 'z' as u32, 'o' as u32, 'o' as u32]);
        assert_eq!(root.edges[1].max_value, 3);

        let p = r.node_at(root.edges[0].child).unwrap();
        assert!(p.values.is_empty());
        let labels: Vec<Vec<u32>> = p.edges.iter().map(|e| e.label.clone()).collect();
        assert_eq!(labels, vec!["ark".chars().map(|c| c as u32).collect::<Vec<_>>(), vec!['u' as u32, 'b' as u32]]);
        assert_eq!(p.edges[0].max_value, 50);

        let park = r.node_at(p.edges[0].child).unwrap();
        assert_eq!(park.values.len(), 1);
        assert_eq!(park.edges[0].max_value, 7);
    }

    #[test]
    fn rejects_unsorted_input() {
        let v = vec![IndexEntry::new(1, "b", 0, 0), IndexEntry::new(1, "a", 0, 0)];
        let mut sink = Vec::new();
        assert!(matches!(TrieBuilder::new(RankOfValue).build(&mut sink, &v), Err(MapError::Unsorted)));
        let dup = vec![IndexEntry::new(1, "a", 0, 0), IndexEntry::new(1, "a", 0, 0)];
        assert!(matches!(TrieBuilder::new(RankOfValue).build(&mut sink, &dup), Err(MapError::Unsorted)));
    }

    #[test]
    fn truncated_section_is_corrupt() {
        let v = vec![IndexEntry::new(1, "abc", 0, 1)];
        let (stored, _) = build(&v);
        let r = TrieReader::new(&stored[..stored.len() - 1]);
        assert!(r.entries().is_err());
        assert!(TrieReader::new(&[]).root().is_err());
    }
}
