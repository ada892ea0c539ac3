//! Persistent storage: the buffered page cache and the ordered index
//! layered on top of it.

pub mod btree;
pub mod mpool;

pub use btree::{Btree, BtreeOpts, Cursor, OpenMode, PutMode};
pub use mpool::{Mpool, Page, PutFlags};
