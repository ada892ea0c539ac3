//! Ordered key→value index over the page cache.
//!
//! A disk B-tree: internal pages hold separator keys and child page
//! numbers, leaf pages hold key/value cells sorted in-page and linked to
//! their siblings for range scans. Values larger than a quarter page spill
//! into chained overflow pages. Duplicate keys are allowed when the
//! database was created with duplicates enabled; iteration over duplicates
//! preserves insertion order.

pub mod encoding;
pub mod types;

use std::fs::{File, OpenOptions};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::FileExt;

use crate::error::{Error, ErrorCode, Result};
use crate::storage::mpool::{Mpool, PutFlags};
use crate::types::Pgno;

use encoding::{put_u16, put_u32, read_u16, read_u32, write_u32_at};
use types::{
    LeafCell, Node, ValRepr, BTREE_LAYOUT_VERSION, BTREE_MAGIC, LEAF_CELL_INLINE_OVERHEAD,
    LEAF_CELL_OVERFLOW_OVERHEAD, LEAF_HDR, META_FLAG_DUPS, META_LEN, META_PGNO, OVERFLOW_HDR,
    PAGE_TYPE_OVERFLOW,
};

pub use types::{BtreeOpts, OpenMode, PutMode};

/// Ordered index handle.
#[derive(Debug)]
pub struct Btree {
    mp: Mpool,
    page_size: usize,
    root: Pgno,
    dups: bool,
    readonly: bool,
    meta_dirty: bool,
}

impl Btree {
    /// Open or create an index file.
    pub fn open(path: &Path, mode: OpenMode, opts: BtreeOpts) -> Result<Btree> {
        match mode {
            OpenMode::Create => Self::create(path, opts),
            OpenMode::Read | OpenMode::Write => Self::open_existing(path, mode, opts),
        }
    }

    fn create(path: &Path, opts: BtreeOpts) -> Result<Btree> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mp = Mpool::open(file, opts.page_size, opts.cache_pages)?;
        let (meta_pgno, meta) = mp.new_page()?;
        debug_assert_eq!(meta_pgno, META_PGNO);
        let root_node = Node::empty_leaf();
        let bytes = root_node.serialize(opts.page_size)?;
        let (root, root_pg) = mp.new_page()?;
        {
            let mut d = root_pg.data();
            d[..bytes.len()].copy_from_slice(&bytes);
        }
        mp.put(&root_pg, PutFlags::DIRTY);
        {
            let mut d = meta.data();
            d[0..4].copy_from_slice(&BTREE_MAGIC.to_le_bytes());
            d[4..8].copy_from_slice(&BTREE_LAYOUT_VERSION.to_le_bytes());
            d[8..12].copy_from_slice(&(opts.page_size as u32).to_le_bytes());
            let flags: u32 = if opts.dups { META_FLAG_DUPS } else { 0 };
            d[12..16].copy_from_slice(&flags.to_le_bytes());
            d[16..20].copy_from_slice(&root.to_le_bytes());
        }
        mp.put(&meta, PutFlags::DIRTY);
        Ok(Btree {
            mp,
            page_size: opts.page_size,
            root,
            dups: opts.dups,
            readonly: false,
            meta_dirty: false,
        })
    }

    fn open_existing(path: &Path, mode: OpenMode, opts: BtreeOpts) -> Result<Btree> {
        let file = if mode == OpenMode::Read {
            File::open(path)?
        } else {
            OpenOptions::new().read(true).write(true).open(path)?
        };
        let mut hdr = [0u8; META_LEN];
        file.read_exact_at(&mut hdr, 0).map_err(|_| {
            Error::with_message(
                ErrorCode::Corrupt,
                format!("'{}' is not a tag database file", path.display()),
            )
        })?;
        if read_u32(&hdr, 0)? != BTREE_MAGIC {
            return Err(Error::with_message(
                ErrorCode::Corrupt,
                format!("'{}' is not a tag database file", path.display()),
            ));
        }
        if read_u32(&hdr, 4)? != BTREE_LAYOUT_VERSION {
            return Err(Error::new(ErrorCode::VersionMismatch));
        }
        let page_size = read_u32(&hdr, 8)? as usize;
        if !(512..=65536).contains(&page_size) {
            return Err(Error::with_message(ErrorCode::Corrupt, "bad page size"));
        }
        let flags = read_u32(&hdr, 12)?;
        let root = read_u32(&hdr, 16)?;
        let mp = Mpool::open(file, page_size, opts.cache_pages)?;
        if root == META_PGNO || root >= mp.npages() {
            return Err(Error::with_message(ErrorCode::Corrupt, "bad root page"));
        }
        Ok(Btree {
            mp,
            page_size,
            root,
            dups: flags & META_FLAG_DUPS != 0,
            readonly: mode == OpenMode::Read,
            meta_dirty: false,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Look up the first record stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut c = self.cursor();
        c.seek(key)?;
        match c.next()? {
            Some((k, v)) if k == key => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    /// Insert a record according to `mode`.
    pub fn put(&mut self, key: &[u8], val: &[u8], mode: PutMode) -> Result<()> {
        if self.readonly {
            return Err(Error::with_message(ErrorCode::Usage, "read-only database"));
        }
        let spill = val.len() > self.page_size / 4;
        let cell_size = if spill {
            LEAF_CELL_OVERFLOW_OVERHEAD + key.len()
        } else {
            LEAF_CELL_INLINE_OVERHEAD + key.len() + val.len()
        };
        if cell_size > (self.page_size - LEAF_HDR) / 2 {
            return Err(Error::new(ErrorCode::KeyTooLarge));
        }
        match mode {
            PutMode::InsertUnique => {
                if self.get(key)?.is_some() {
                    return Err(Error::with_message(
                        ErrorCode::Duplicate,
                        String::from_utf8_lossy(key).into_owned(),
                    ));
                }
            }
            PutMode::Replace => {
                self.delete(key)?;
            }
            PutMode::InsertDup => {
                if !self.dups && self.get(key)?.is_some() {
                    return Err(Error::with_message(
                        ErrorCode::Duplicate,
                        String::from_utf8_lossy(key).into_owned(),
                    ));
                }
            }
        }
        let repr = if spill {
            self.write_overflow(val)?
        } else {
            ValRepr::Inline(val.to_vec())
        };
        if let Some((sep, right)) = self.insert_rec(self.root, key, repr)? {
            let new_root = Node::Internal {
                first: self.root,
                cells: vec![(sep, right)],
            };
            self.root = self.alloc(&new_root)?;
            self.meta_dirty = true;
        }
        Ok(())
    }

    /// Delete the first record stored under `key`.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        if self.readonly {
            return Err(Error::with_message(ErrorCode::Usage, "read-only database"));
        }
        let Some((pgno, idx)) = self.lower_bound_pos(key)? else {
            return Ok(false);
        };
        if let Node::Leaf {
            prev,
            next,
            mut cells,
        } = self.load(pgno)?
        {
            if idx < cells.len() && cells[idx].key.as_slice() == key {
                cells.remove(idx);
                self.store(pgno, &Node::Leaf { prev, next, cells })?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete the first record matching both `key` and `val`.
    pub fn delete_exact(&mut self, key: &[u8], val: &[u8]) -> Result<bool> {
        if self.readonly {
            return Err(Error::with_message(ErrorCode::Usage, "read-only database"));
        }
        let mut pos = self.lower_bound_pos(key)?;
        while let Some((pgno, idx)) = pos {
            let Node::Leaf {
                prev,
                next,
                mut cells,
            } = self.load(pgno)?
            else {
                return Err(Error::new(ErrorCode::Corrupt));
            };
            if idx >= cells.len() || cells[idx].key.as_slice() != key {
                return Ok(false);
            }
            let stored = self.read_value(&cells[idx].val)?;
            if stored == val {
                cells.remove(idx);
                self.store(pgno, &Node::Leaf { prev, next, cells })?;
                return Ok(true);
            }
            pos = self.advance_pos(pgno, idx + 1)?;
        }
        Ok(false)
    }

    /// Open a cursor. The borrow rules make any mutation invalidate
    /// outstanding cursors, which is the contract.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            bt: self,
            pos: None,
        }
    }

    /// Write back the meta page and all dirty data pages.
    pub fn sync(&mut self) -> Result<()> {
        if self.meta_dirty {
            let pg = self.mp.get(META_PGNO)?;
            {
                let mut d = pg.data();
                write_u32_at(&mut d, 16, self.root)?;
            }
            self.mp.put(&pg, PutFlags::DIRTY);
            self.meta_dirty = false;
        }
        if !self.readonly {
            self.mp.sync()?;
        }
        Ok(())
    }

    /// Sync and release the handle.
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    // ------------------------------------------------------------------
    // Node I/O
    // ------------------------------------------------------------------

    fn load(&self, pgno: Pgno) -> Result<Node> {
        let pg = self.mp.get(pgno)?;
        let node = {
            let d = pg.data();
            Node::parse(&d)
        };
        self.mp.put(&pg, PutFlags::empty());
        node
    }

    fn store(&self, pgno: Pgno, node: &Node) -> Result<()> {
        let bytes = node.serialize(self.page_size)?;
        let pg = self.mp.get(pgno)?;
        {
            let mut d = pg.data();
            d.fill(0);
            d[..bytes.len()].copy_from_slice(&bytes);
        }
        self.mp.put(&pg, PutFlags::DIRTY);
        Ok(())
    }

    fn alloc(&self, node: &Node) -> Result<Pgno> {
        let bytes = node.serialize(self.page_size)?;
        let (pgno, pg) = self.mp.new_page()?;
        {
            let mut d = pg.data();
            d[..bytes.len()].copy_from_slice(&bytes);
        }
        self.mp.put(&pg, PutFlags::DIRTY);
        Ok(pgno)
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    fn insert_rec(
        &mut self,
        pgno: Pgno,
        key: &[u8],
        val: ValRepr,
    ) -> Result<Option<(Vec<u8>, Pgno)>> {
        match self.load(pgno)? {
            Node::Leaf {
                prev,
                next,
                mut cells,
            } => {
                let idx = cells.partition_point(|c| c.key.as_slice() <= key);
                cells.insert(
                    idx,
                    LeafCell {
                        key: key.to_vec(),
                        val,
                    },
                );
                let total = LEAF_HDR + cells.iter().map(|c| c.size()).sum::<usize>();
                if total <= self.page_size {
                    self.store(pgno, &Node::Leaf { prev, next, cells })?;
                    return Ok(None);
                }
                let split = leaf_split_point(&cells);
                let right_cells = cells.split_off(split);
                let sep = right_cells[0].key.clone();
                let right_pgno = self.alloc(&Node::Leaf {
                    prev: pgno,
                    next,
                    cells: right_cells,
                })?;
                if next != 0 {
                    match self.load(next)? {
                        Node::Leaf {
                            next: n2, cells: c2, ..
                        } => self.store(
                            next,
                            &Node::Leaf {
                                prev: right_pgno,
                                next: n2,
                                cells: c2,
                            },
                        )?,
                        _ => return Err(Error::new(ErrorCode::Corrupt)),
                    }
                }
                self.store(
                    pgno,
                    &Node::Leaf {
                        prev,
                        next: right_pgno,
                        cells,
                    },
                )?;
                Ok(Some((sep, right_pgno)))
            }
            Node::Internal { first, mut cells } => {
                let idx = cells.partition_point(|(k, _)| k.as_slice() <= key);
                let child = if idx == 0 { first } else { cells[idx - 1].1 };
                let Some((sep, new_child)) = self.insert_rec(child, key, val)? else {
                    return Ok(None);
                };
                cells.insert(idx, (sep, new_child));
                let total = internal_total(&cells);
                if total <= self.page_size {
                    self.store(pgno, &Node::Internal { first, cells })?;
                    return Ok(None);
                }
                let split = internal_split_point(&cells);
                let promoted = cells[split].clone();
                let right_cells = cells.split_off(split + 1);
                cells.pop();
                let right_pgno = self.alloc(&Node::Internal {
                    first: promoted.1,
                    cells: right_cells,
                })?;
                self.store(pgno, &Node::Internal { first, cells })?;
                Ok(Some((promoted.0, right_pgno)))
            }
        }
    }

    fn write_overflow(&self, val: &[u8]) -> Result<ValRepr> {
        let chunk = self.page_size - OVERFLOW_HDR;
        let mut next: Pgno = 0;
        let pieces: Vec<&[u8]> = val.chunks(chunk).collect();
        for piece in pieces.into_iter().rev() {
            let mut buf = Vec::with_capacity(OVERFLOW_HDR + piece.len());
            buf.push(PAGE_TYPE_OVERFLOW);
            buf.push(0);
            put_u16(&mut buf, piece.len() as u16);
            put_u32(&mut buf, next);
            buf.extend_from_slice(piece);
            let (pgno, pg) = self.mp.new_page()?;
            {
                let mut d = pg.data();
                d[..buf.len()].copy_from_slice(&buf);
            }
            self.mp.put(&pg, PutFlags::DIRTY);
            next = pgno;
        }
        Ok(ValRepr::Overflow {
            head: next,
            total: val.len() as u32,
        })
    }

    fn read_value(&self, repr: &ValRepr) -> Result<Vec<u8>> {
        match repr {
            ValRepr::Inline(v) => Ok(v.clone()),
            ValRepr::Overflow { head, total } => {
                let mut out = Vec::with_capacity(*total as usize);
                let mut pgno = *head;
                while pgno != 0 {
                    let pg = self.mp.get(pgno)?;
                    let data = {
                        let d = pg.data();
                        d.to_vec()
                    };
                    self.mp.put(&pg, PutFlags::empty());
                    if data[0] != PAGE_TYPE_OVERFLOW {
                        return Err(Error::new(ErrorCode::Corrupt));
                    }
                    let n = read_u16(&data, 2)? as usize;
                    let next = read_u32(&data, 4)?;
                    out.extend_from_slice(
                        data.get(OVERFLOW_HDR..OVERFLOW_HDR + n)
                            .ok_or_else(|| Error::new(ErrorCode::Corrupt))?,
                    );
                    pgno = next;
                }
                if out.len() != *total as usize {
                    return Err(Error::new(ErrorCode::Corrupt));
                }
                Ok(out)
            }
        }
    }

    // ------------------------------------------------------------------
    // Positioning
    // ------------------------------------------------------------------

    /// Leftmost position whose key is `>= key`, normalized onto a
    /// non-exhausted leaf. `None` when past the end of the index.
    fn lower_bound_pos(&self, key: &[u8]) -> Result<Option<(Pgno, usize)>> {
        let mut pgno = self.root;
        loop {
            match self.load(pgno)? {
                Node::Internal { first, cells } => {
                    let idx = cells.partition_point(|(k, _)| k.as_slice() < key);
                    pgno = if idx == 0 { first } else { cells[idx - 1].1 };
                }
                Node::Leaf { cells, .. } => {
                    let idx = cells.partition_point(|c| c.key.as_slice() < key);
                    return self.advance_pos(pgno, idx);
                }
            }
        }
    }

    /// Normalize `(pgno, idx)` forward across sibling links, skipping
    /// exhausted leaves.
    fn advance_pos(&self, mut pgno: Pgno, mut idx: usize) -> Result<Option<(Pgno, usize)>> {
        loop {
            match self.load(pgno)? {
                Node::Leaf { next, cells, .. } => {
                    if idx < cells.len() {
                        return Ok(Some((pgno, idx)));
                    }
                    if next == 0 {
                        return Ok(None);
                    }
                    pgno = next;
                    idx = 0;
                }
                _ => return Err(Error::new(ErrorCode::Corrupt)),
            }
        }
    }
}

fn internal_total(cells: &[(Vec<u8>, Pgno)]) -> usize {
    types::INTERNAL_HDR
        + cells
            .iter()
            .map(|(k, _)| types::INTERNAL_CELL_OVERHEAD + k.len())
            .sum::<usize>()
}

fn leaf_split_point(cells: &[LeafCell]) -> usize {
    let total: usize = cells.iter().map(|c| c.size()).sum();
    let mut acc = 0usize;
    for (i, c) in cells.iter().enumerate() {
        acc += c.size();
        if acc * 2 >= total {
            return (i + 1).clamp(1, cells.len() - 1);
        }
    }
    cells.len() - 1
}

fn internal_split_point(cells: &[(Vec<u8>, Pgno)]) -> usize {
    let total: usize = cells
        .iter()
        .map(|(k, _)| types::INTERNAL_CELL_OVERHEAD + k.len())
        .sum();
    let mut acc = 0usize;
    for (i, (k, _)) in cells.iter().enumerate() {
        acc += types::INTERNAL_CELL_OVERHEAD + k.len();
        if acc * 2 >= total {
            return i.min(cells.len() - 1);
        }
    }
    cells.len() - 1
}

// ============================================================================
// Cursor
// ============================================================================

/// Bidirectional cursor. The position is a boundary: `next` returns the
/// entry at the boundary and moves it right, `prev` returns the entry
/// before it and moves it left.
pub struct Cursor<'a> {
    bt: &'a Btree,
    pos: Option<(Pgno, usize)>,
}

impl<'a> Cursor<'a> {
    /// Position before the first entry.
    pub fn seek_first(&mut self) -> Result<()> {
        let mut pgno = self.bt.root;
        loop {
            match self.bt.load(pgno)? {
                Node::Internal { first, .. } => pgno = first,
                Node::Leaf { .. } => {
                    self.pos = Some((pgno, 0));
                    return Ok(());
                }
            }
        }
    }

    /// Position after the last entry.
    pub fn seek_last(&mut self) -> Result<()> {
        let mut pgno = self.bt.root;
        loop {
            match self.bt.load(pgno)? {
                Node::Internal { first, cells } => {
                    pgno = cells.last().map(|c| c.1).unwrap_or(first)
                }
                Node::Leaf { cells, .. } => {
                    self.pos = Some((pgno, cells.len()));
                    return Ok(());
                }
            }
        }
    }

    /// Position at the first entry whose key is `>= key`. Also the entry
    /// point for prefix scans: seek to the prefix and stop when returned
    /// keys no longer start with it.
    pub fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.pos = self.bt.lower_bound_pos(key)?;
        Ok(())
    }

    /// Return the entry at the boundary and advance.
    pub fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let Some((mut pgno, mut idx)) = self.pos else {
            return Ok(None);
        };
        loop {
            let Node::Leaf { next, cells, .. } = self.bt.load(pgno)? else {
                return Err(Error::new(ErrorCode::Corrupt));
            };
            if idx < cells.len() {
                let k = cells[idx].key.clone();
                let v = self.bt.read_value(&cells[idx].val)?;
                self.pos = Some((pgno, idx + 1));
                return Ok(Some((k, v)));
            }
            if next == 0 {
                self.pos = Some((pgno, idx));
                return Ok(None);
            }
            pgno = next;
            idx = 0;
        }
    }

    /// Return the entry before the boundary and retreat.
    pub fn prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let Some((mut pgno, mut idx)) = self.pos else {
            return Ok(None);
        };
        loop {
            let Node::Leaf { prev, cells, .. } = self.bt.load(pgno)? else {
                return Err(Error::new(ErrorCode::Corrupt));
            };
            let i = idx.min(cells.len());
            if i > 0 {
                let cell = &cells[i - 1];
                let k = cell.key.clone();
                let v = self.bt.read_value(&cell.val)?;
                self.pos = Some((pgno, i - 1));
                return Ok(Some((k, v)));
            }
            if prev == 0 {
                self.pos = Some((pgno, 0));
                return Ok(None);
            }
            pgno = prev;
            idx = usize::MAX;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_opts(dups: bool) -> BtreeOpts {
        BtreeOpts {
            page_size: 512,
            cache_pages: 8,
            dups,
        }
    }

    fn scratch(dir: &tempfile::TempDir, dups: bool) -> Btree {
        Btree::open(&dir.path().join("idx"), OpenMode::Create, small_opts(dups)).unwrap()
    }

    #[test]
    fn test_put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, false);
        bt.put(b"main", b"main 3 1 int main()", PutMode::InsertUnique)
            .unwrap();
        assert_eq!(
            bt.get(b"main").unwrap().unwrap(),
            b"main 3 1 int main()".to_vec()
        );
        assert!(bt.get(b"other").unwrap().is_none());
    }

    #[test]
    fn test_many_keys_split_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut bt = scratch(&dir, false);
            for i in 0..500u32 {
                let k = format!("key{:05}", i);
                let v = format!("value-{}", i);
                bt.put(k.as_bytes(), v.as_bytes(), PutMode::InsertUnique)
                    .unwrap();
            }
            bt.close().unwrap();
        }
        let bt = Btree::open(&dir.path().join("idx"), OpenMode::Read, small_opts(false)).unwrap();
        for i in (0..500u32).step_by(37) {
            let k = format!("key{:05}", i);
            assert_eq!(
                bt.get(k.as_bytes()).unwrap().unwrap(),
                format!("value-{}", i).into_bytes()
            );
        }
        // Iteration visits every record exactly once, in order.
        let mut c = bt.cursor();
        c.seek_first().unwrap();
        let mut count = 0;
        let mut last: Option<Vec<u8>> = None;
        while let Some((k, _)) = c.next().unwrap() {
            if let Some(prev) = &last {
                assert!(prev < &k);
            }
            last = Some(k);
            count += 1;
        }
        assert_eq!(count, 500);
    }

    #[test]
    fn test_duplicates_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, true);
        for i in 0..40u32 {
            bt.put(b"dup", format!("v{:02}", i).as_bytes(), PutMode::InsertDup)
                .unwrap();
            bt.put(
                format!("filler{:03}", i).as_bytes(),
                b"x",
                PutMode::InsertDup,
            )
            .unwrap();
        }
        let mut c = bt.cursor();
        c.seek(b"dup").unwrap();
        let mut vals = Vec::new();
        while let Some((k, v)) = c.next().unwrap() {
            if k != b"dup" {
                break;
            }
            vals.push(String::from_utf8(v).unwrap());
        }
        let expect: Vec<String> = (0..40).map(|i| format!("v{:02}", i)).collect();
        assert_eq!(vals, expect);
    }

    #[test]
    fn test_insert_unique_rejects_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, false);
        bt.put(b"k", b"1", PutMode::InsertUnique).unwrap();
        let err = bt.put(b"k", b"2", PutMode::InsertUnique).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Duplicate);
    }

    #[test]
    fn test_replace() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, false);
        bt.put(b"_VERSION_", b"5", PutMode::Replace).unwrap();
        bt.put(b"_VERSION_", b"6", PutMode::Replace).unwrap();
        assert_eq!(bt.get(b"_VERSION_").unwrap().unwrap(), b"6".to_vec());
    }

    #[test]
    fn test_delete_and_delete_exact() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, true);
        bt.put(b"sym", b"a", PutMode::InsertDup).unwrap();
        bt.put(b"sym", b"b", PutMode::InsertDup).unwrap();
        bt.put(b"sym", b"c", PutMode::InsertDup).unwrap();
        assert!(bt.delete_exact(b"sym", b"b").unwrap());
        assert!(!bt.delete_exact(b"sym", b"b").unwrap());
        assert!(bt.delete(b"sym").unwrap());
        assert_eq!(bt.get(b"sym").unwrap().unwrap(), b"c".to_vec());
        assert!(bt.delete(b"sym").unwrap());
        assert!(!bt.delete(b"sym").unwrap());
    }

    #[test]
    fn test_overflow_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, false);
        let big: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        bt.put(b"big", &big, PutMode::InsertUnique).unwrap();
        bt.put(b"small", b"s", PutMode::InsertUnique).unwrap();
        assert_eq!(bt.get(b"big").unwrap().unwrap(), big);
        assert!(bt.delete_exact(b"big", &big).unwrap());
        assert!(bt.get(b"big").unwrap().is_none());
    }

    #[test]
    fn test_key_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, false);
        let key = vec![b'k'; 400];
        let err = bt.put(&key, b"v", PutMode::InsertUnique).unwrap_err();
        assert_eq!(err.code(), ErrorCode::KeyTooLarge);
    }

    #[test]
    fn test_backward_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, false);
        for i in 0..100u32 {
            bt.put(
                format!("k{:03}", i).as_bytes(),
                format!("{}", i).as_bytes(),
                PutMode::InsertUnique,
            )
            .unwrap();
        }
        let mut c = bt.cursor();
        c.seek_last().unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = c.prev().unwrap() {
            seen.push(String::from_utf8(k).unwrap());
        }
        assert_eq!(seen.len(), 100);
        assert_eq!(seen[0], "k099");
        assert_eq!(seen[99], "k000");
    }

    #[test]
    fn test_prefix_seek() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = scratch(&dir, true);
        bt.put(b"alpha@1", b"x", PutMode::InsertDup).unwrap();
        bt.put(b"beta@1", b"y", PutMode::InsertDup).unwrap();
        bt.put(b"beta@2", b"z", PutMode::InsertDup).unwrap();
        bt.put(b"gamma@1", b"w", PutMode::InsertDup).unwrap();
        let mut c = bt.cursor();
        c.seek(b"beta@").unwrap();
        let mut hits = 0;
        while let Some((k, _)) = c.next().unwrap() {
            if !k.starts_with(b"beta@") {
                break;
            }
            hits += 1;
        }
        assert_eq!(hits, 2);
    }

    #[test]
    fn test_open_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("junk");
        std::fs::write(&p, b"definitely not a database").unwrap();
        let err = Btree::open(&p, OpenMode::Read, small_opts(false)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Corrupt);
    }
}
