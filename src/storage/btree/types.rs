//! B-tree page layout: constants, the in-memory node model, and the
//! node serializer/parser.

use crate::error::{Error, ErrorCode, Result};
use crate::types::Pgno;

use super::encoding::{put_u16, put_u32, read_u16, read_u32};

// ============================================================================
// Constants
// ============================================================================

/// Meta-page magic ("GtDB").
pub const BTREE_MAGIC: u32 = 0x4274_4447;

/// On-disk layout version of the index itself (distinct from the
/// application `_VERSION_` header record).
pub const BTREE_LAYOUT_VERSION: u32 = 1;

/// Page number of the meta page.
pub const META_PGNO: Pgno = 0;

/// Meta flag: duplicate keys allowed.
pub const META_FLAG_DUPS: u32 = 0x01;

/// Meta page layout: magic, layout version, page size, flags, root pgno.
pub const META_LEN: usize = 20;

pub const PAGE_TYPE_LEAF: u8 = 1;
pub const PAGE_TYPE_INTERNAL: u8 = 2;
pub const PAGE_TYPE_OVERFLOW: u8 = 3;

/// Leaf header: type, pad, ncells u16, prev pgno u32, next pgno u32.
pub const LEAF_HDR: usize = 12;
/// Internal header: type, pad, ncells u16, leftmost child u32.
pub const INTERNAL_HDR: usize = 8;
/// Overflow header: type, pad, nbytes u16, next pgno u32.
pub const OVERFLOW_HDR: usize = 8;

const VTAG_INLINE: u8 = 0;
const VTAG_OVERFLOW: u8 = 1;

/// Per-cell byte overhead beyond key/value payload.
pub const LEAF_CELL_INLINE_OVERHEAD: usize = 7;
pub const LEAF_CELL_OVERFLOW_OVERHEAD: usize = 11;
pub const INTERNAL_CELL_OVERHEAD: usize = 6;

// ============================================================================
// Open options
// ============================================================================

/// How a database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a fresh file, truncating any existing one
    Create,
    /// Open existing read-only
    Read,
    /// Open existing read-write
    Write,
}

/// Insert semantics for [`super::Btree::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Fail with `Duplicate` if the key exists
    InsertUnique,
    /// Append after the last record with an equal key
    InsertDup,
    /// Replace the first record with this key, or insert
    Replace,
}

/// Creation-time options.
#[derive(Debug, Clone, Copy)]
pub struct BtreeOpts {
    pub page_size: usize,
    pub cache_pages: usize,
    /// Allow duplicate keys
    pub dups: bool,
}

impl Default for BtreeOpts {
    fn default() -> Self {
        BtreeOpts {
            page_size: crate::storage::mpool::DEFAULT_PAGE_SIZE,
            cache_pages: crate::storage::mpool::DEFAULT_MAX_CACHE,
            dups: false,
        }
    }
}

// ============================================================================
// Node model
// ============================================================================

/// Where a leaf cell's value lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ValRepr {
    Inline(Vec<u8>),
    Overflow { head: Pgno, total: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LeafCell {
    pub key: Vec<u8>,
    pub val: ValRepr,
}

impl LeafCell {
    pub fn size(&self) -> usize {
        match &self.val {
            ValRepr::Inline(v) => LEAF_CELL_INLINE_OVERHEAD + self.key.len() + v.len(),
            ValRepr::Overflow { .. } => LEAF_CELL_OVERFLOW_OVERHEAD + self.key.len(),
        }
    }
}

/// Parsed index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Leaf {
        prev: Pgno,
        next: Pgno,
        cells: Vec<LeafCell>,
    },
    /// `first` holds keys ordered before every separator; `cells[i]`
    /// pairs a separator with the child holding keys at or after it.
    Internal {
        first: Pgno,
        cells: Vec<(Vec<u8>, Pgno)>,
    },
}

impl Node {
    pub fn empty_leaf() -> Node {
        Node::Leaf {
            prev: 0,
            next: 0,
            cells: Vec::new(),
        }
    }

    /// Serialized byte size of this node.
    pub fn size(&self) -> usize {
        match self {
            Node::Leaf { cells, .. } => {
                LEAF_HDR + cells.iter().map(|c| c.size()).sum::<usize>()
            }
            Node::Internal { cells, .. } => {
                INTERNAL_HDR
                    + cells
                        .iter()
                        .map(|(k, _)| INTERNAL_CELL_OVERHEAD + k.len())
                        .sum::<usize>()
            }
        }
    }

    pub fn parse(data: &[u8]) -> Result<Node> {
        if data.is_empty() {
            return Err(Error::with_message(ErrorCode::Corrupt, "empty page"));
        }
        match data[0] {
            PAGE_TYPE_LEAF => Self::parse_leaf(data),
            PAGE_TYPE_INTERNAL => Self::parse_internal(data),
            t => Err(Error::with_message(
                ErrorCode::Corrupt,
                format!("bad page type {}", t),
            )),
        }
    }

    fn parse_leaf(data: &[u8]) -> Result<Node> {
        let ncells = read_u16(data, 2)? as usize;
        let prev = read_u32(data, 4)?;
        let next = read_u32(data, 8)?;
        let mut off = LEAF_HDR;
        let mut cells = Vec::with_capacity(ncells);
        for _ in 0..ncells {
            let klen = read_u16(data, off)? as usize;
            off += 2;
            let vtag = *data
                .get(off)
                .ok_or_else(|| Error::new(ErrorCode::Corrupt))?;
            off += 1;
            let key = data
                .get(off..off + klen)
                .ok_or_else(|| Error::new(ErrorCode::Corrupt))?
                .to_vec();
            off += klen;
            let val = match vtag {
                VTAG_INLINE => {
                    let vlen = read_u32(data, off)? as usize;
                    off += 4;
                    let v = data
                        .get(off..off + vlen)
                        .ok_or_else(|| Error::new(ErrorCode::Corrupt))?
                        .to_vec();
                    off += vlen;
                    ValRepr::Inline(v)
                }
                VTAG_OVERFLOW => {
                    let head = read_u32(data, off)?;
                    off += 4;
                    let total = read_u32(data, off)?;
                    off += 4;
                    ValRepr::Overflow { head, total }
                }
                _ => return Err(Error::new(ErrorCode::Corrupt)),
            };
            cells.push(LeafCell { key, val });
        }
        Ok(Node::Leaf { prev, next, cells })
    }

    fn parse_internal(data: &[u8]) -> Result<Node> {
        let ncells = read_u16(data, 2)? as usize;
        let first = read_u32(data, 4)?;
        let mut off = INTERNAL_HDR;
        let mut cells = Vec::with_capacity(ncells);
        for _ in 0..ncells {
            let klen = read_u16(data, off)? as usize;
            off += 2;
            let key = data
                .get(off..off + klen)
                .ok_or_else(|| Error::new(ErrorCode::Corrupt))?
                .to_vec();
            off += klen;
            let child = read_u32(data, off)?;
            off += 4;
            cells.push((key, child));
        }
        Ok(Node::Internal { first, cells })
    }

    /// Serialize into a page-sized buffer. Callers split before writing,
    /// so exceeding the page is an internal invariant breach.
    pub fn serialize(&self, page_size: usize) -> Result<Vec<u8>> {
        if self.size() > page_size {
            return Err(Error::with_message(
                ErrorCode::Corrupt,
                "node exceeds page size",
            ));
        }
        let mut out = Vec::with_capacity(self.size());
        match self {
            Node::Leaf { prev, next, cells } => {
                out.push(PAGE_TYPE_LEAF);
                out.push(0);
                put_u16(&mut out, cells.len() as u16);
                put_u32(&mut out, *prev);
                put_u32(&mut out, *next);
                for cell in cells {
                    put_u16(&mut out, cell.key.len() as u16);
                    match &cell.val {
                        ValRepr::Inline(v) => {
                            out.push(VTAG_INLINE);
                            out.extend_from_slice(&cell.key);
                            put_u32(&mut out, v.len() as u32);
                            out.extend_from_slice(v);
                        }
                        ValRepr::Overflow { head, total } => {
                            out.push(VTAG_OVERFLOW);
                            out.extend_from_slice(&cell.key);
                            put_u32(&mut out, *head);
                            put_u32(&mut out, *total);
                        }
                    }
                }
            }
            Node::Internal { first, cells } => {
                out.push(PAGE_TYPE_INTERNAL);
                out.push(0);
                put_u16(&mut out, cells.len() as u16);
                put_u32(&mut out, *first);
                for (key, child) in cells {
                    put_u16(&mut out, key.len() as u16);
                    out.extend_from_slice(key);
                    put_u32(&mut out, *child);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_round_trip() {
        let node = Node::Leaf {
            prev: 7,
            next: 9,
            cells: vec![
                LeafCell {
                    key: b"alpha".to_vec(),
                    val: ValRepr::Inline(b"one".to_vec()),
                },
                LeafCell {
                    key: b"beta".to_vec(),
                    val: ValRepr::Overflow { head: 42, total: 9000 },
                },
            ],
        };
        let bytes = node.serialize(4096).unwrap();
        assert_eq!(Node::parse(&bytes).unwrap(), node);
        assert_eq!(bytes.len(), node.size());
    }

    #[test]
    fn test_internal_round_trip() {
        let node = Node::Internal {
            first: 3,
            cells: vec![(b"m".to_vec(), 4), (b"t".to_vec(), 5)],
        };
        let bytes = node.serialize(4096).unwrap();
        assert_eq!(Node::parse(&bytes).unwrap(), node);
    }

    #[test]
    fn test_bad_page_type_is_corrupt() {
        let err = Node::parse(&[0xEE, 0, 0, 0]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Corrupt);
    }
}
