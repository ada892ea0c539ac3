//! The tag-database layer: logical record formats, the PATH inventory,
//! and the DEFS/REFS tag stores.

pub mod format;
pub mod gpath;
pub mod gtop;

pub use gpath::Gpath;
pub use gtop::{Gtop, GtopOpenFlags, TagSet};
