//! Buffered page cache over a regular file.
//!
//! Pages are fixed-size, identified by page number, and handed out pinned;
//! callers return them with [`Mpool::put`], optionally marking them dirty
//! for later write-back. Eviction is strict LRU over unpinned pages; when
//! every page is pinned the cache grows past its configured ceiling and
//! never shrinks. Optional byte-level filters run on read-in and just
//! before write-out.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::FileExt;

use bitflags::bitflags;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard, RwLock};

use crate::error::{Error, ErrorCode, Result};
use crate::types::{Pgno, MAX_PAGE_NUMBER};

/// Default page size for newly created database files.
pub const DEFAULT_PAGE_SIZE: usize = 8192;

/// Default ceiling on resident pages per pool.
pub const DEFAULT_MAX_CACHE: usize = 128;

bitflags! {
    /// Flags accepted by [`Mpool::put`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PutFlags: u8 {
        /// Page was modified and must be written back
        const DIRTY = 0x01;
    }
}

/// Byte-level page transform installed with [`Mpool::filter`].
pub type PageFilter = Box<dyn Fn(Pgno, &mut [u8]) + Send + Sync>;

#[derive(Debug)]
struct Bucket {
    pgno: Pgno,
    data: Vec<u8>,
    pinned: bool,
    dirty: bool,
}

impl Bucket {
    fn new(page_size: usize) -> Self {
        Bucket {
            pgno: 0,
            data: vec![0u8; page_size],
            pinned: false,
            dirty: false,
        }
    }
}

/// A pinned page borrowed from the pool.
///
/// Callers must not invoke pool operations while holding the guard
/// returned by [`Page::data`]; drop the guard first.
#[derive(Clone, Debug)]
pub struct Page(Arc<Mutex<Bucket>>);

impl Page {
    pub fn pgno(&self) -> Pgno {
        self.0.lock().pgno
    }

    /// Lock the page contents for reading or writing.
    pub fn data(&self) -> MappedMutexGuard<'_, [u8]> {
        MutexGuard::map(self.0.lock(), |b| b.data.as_mut_slice())
    }
}

struct Filters {
    pgin: Option<PageFilter>,
    pgout: Option<PageFilter>,
}

struct PoolInner {
    npages: Pgno,
    curcache: usize,
    map: HashMap<Pgno, Arc<Mutex<Bucket>>>,
    /// Unpinned resident pages, coldest first.
    lru: VecDeque<Pgno>,
}

/// The page cache handle.
pub struct Mpool {
    file: File,
    page_size: usize,
    max_cache: usize,
    inner: RwLock<PoolInner>,
    filters: RwLock<Filters>,
}

impl std::fmt::Debug for Mpool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mpool")
            .field("page_size", &self.page_size)
            .field("max_cache", &self.max_cache)
            .finish_non_exhaustive()
    }
}

impl Mpool {
    /// Open a pool over `file`. Fails unless the file is a regular file.
    pub fn open(file: File, page_size: usize, max_cache: usize) -> Result<Mpool> {
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(Error::with_message(
                ErrorCode::Io,
                "page pool requires a regular file",
            ));
        }
        let npages = (meta.len() / page_size as u64) as Pgno;
        Ok(Mpool {
            file,
            page_size,
            max_cache: max_cache.max(1),
            inner: RwLock::new(PoolInner {
                npages,
                curcache: 0,
                map: HashMap::new(),
                lru: VecDeque::new(),
            }),
            filters: RwLock::new(Filters {
                pgin: None,
                pgout: None,
            }),
        })
    }

    /// Install read-in / write-out page transforms.
    pub fn filter(&self, pgin: Option<PageFilter>, pgout: Option<PageFilter>) {
        let mut f = self.filters.write();
        f.pgin = pgin;
        f.pgout = pgout;
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file's address space.
    pub fn npages(&self) -> Pgno {
        self.inner.read().npages
    }

    /// Append a new page and return it pinned. The contents are zeroed;
    /// the caller must initialize them before `put`.
    pub fn new_page(&self) -> Result<(Pgno, Page)> {
        let mut inner = self.inner.write();
        if inner.npages >= MAX_PAGE_NUMBER {
            return Err(Error::with_message(
                ErrorCode::Overflow,
                "page allocation overflow",
            ));
        }
        let arc = self.acquire_bucket(&mut inner)?;
        let pgno = inner.npages;
        inner.npages += 1;
        {
            let mut b = arc.lock();
            b.pgno = pgno;
            b.pinned = true;
            b.dirty = false;
        }
        inner.map.insert(pgno, arc.clone());
        Ok((pgno, Page(arc)))
    }

    /// Pin an existing page, reading it from disk if not resident.
    pub fn get(&self, pgno: Pgno) -> Result<Page> {
        let mut inner = self.inner.write();
        if pgno >= inner.npages {
            return Err(Error::with_message(
                ErrorCode::Io,
                format!("page {} does not exist", pgno),
            ));
        }
        if let Some(arc) = inner.map.get(&pgno).cloned() {
            {
                let mut b = arc.lock();
                debug_assert!(!b.pinned, "page {} already pinned", pgno);
                b.pinned = true;
            }
            if let Some(pos) = inner.lru.iter().position(|&p| p == pgno) {
                inner.lru.remove(pos);
            }
            return Ok(Page(arc));
        }
        let arc = self.acquire_bucket(&mut inner)?;
        {
            let mut b = arc.lock();
            b.pgno = pgno;
            b.pinned = true;
            b.dirty = false;
            let off = pgno as u64 * self.page_size as u64;
            self.read_page(&mut b.data, off).map_err(|e| {
                Error::with_message(ErrorCode::Io, format!("read page {}: {}", pgno, e))
            })?;
            let filters = self.filters.read();
            if let Some(f) = &filters.pgin {
                f(pgno, &mut b.data);
            }
        }
        inner.map.insert(pgno, arc.clone());
        Ok(Page(arc))
    }

    /// Unpin a page; `DIRTY` marks it for later write-back.
    pub fn put(&self, page: &Page, flags: PutFlags) {
        let mut inner = self.inner.write();
        let pgno = {
            let mut b = page.0.lock();
            debug_assert!(b.pinned, "page {} not pinned", b.pgno);
            b.pinned = false;
            if flags.contains(PutFlags::DIRTY) {
                b.dirty = true;
            }
            b.pgno
        };
        if inner.map.contains_key(&pgno) {
            inner.lru.push_back(pgno);
        }
    }

    /// Write back all dirty pages and fsync the file.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.write();
        for arc in inner.map.values() {
            let mut b = arc.lock();
            if b.dirty {
                self.write_back(&mut b)?;
            }
        }
        self.file.sync_all()?;
        Ok(())
    }

    /// Release the pool without syncing.
    pub fn close(self) {}

    fn acquire_bucket(&self, inner: &mut PoolInner) -> Result<Arc<Mutex<Bucket>>> {
        if inner.curcache >= self.max_cache {
            while let Some(pg) = inner.lru.pop_front() {
                let arc = match inner.map.get(&pg).cloned() {
                    Some(a) => a,
                    None => continue,
                };
                {
                    let mut b = arc.lock();
                    if b.pinned {
                        continue;
                    }
                    if b.dirty {
                        self.write_back(&mut b)?;
                    }
                }
                inner.map.remove(&pg);
                // Slot reused: curcache stays put.
                return Ok(Arc::new(Mutex::new(Bucket::new(self.page_size))));
            }
            // Every page is pinned; grow anyway. The cache never shrinks.
        }
        inner.curcache += 1;
        Ok(Arc::new(Mutex::new(Bucket::new(self.page_size))))
    }

    fn write_back(&self, b: &mut Bucket) -> Result<()> {
        let filters = self.filters.read();
        let off = b.pgno as u64 * self.page_size as u64;
        if let Some(f) = &filters.pgout {
            let mut out = b.data.clone();
            f(b.pgno, &mut out);
            self.write_page(&out, off)?;
        } else {
            self.write_page(&b.data, off)?;
        }
        b.dirty = false;
        Ok(())
    }

    #[cfg(unix)]
    fn read_page(&self, buf: &mut [u8], off: u64) -> std::io::Result<()> {
        self.file.read_exact_at(buf, off)
    }

    #[cfg(unix)]
    fn write_page(&self, buf: &[u8], off: u64) -> std::io::Result<()> {
        self.file.write_all_at(buf, off)
    }
}
