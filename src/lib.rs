//! rstags - source-code tagging system.
//!
//! Scans a project tree, extracts symbol definitions and references
//! from C, C++, and Yacc sources, and persists them in on-disk
//! key/value databases (GPATH, GTAGS, GRTAGS) that downstream query
//! tools consult. Supports full construction and incremental update.

pub mod build;
pub mod config;
pub mod error;
pub mod logging;
pub mod parser;
pub mod storage;
pub mod tags;
pub mod tree;
pub mod types;
pub mod util;

pub use build::{create_tags, incremental, BuildStats};
pub use config::{BuildConfig, WalkConfig};
pub use error::{Error, ErrorCode, Result};
pub use types::{Fid, ParserFlags, PathKind, TagKind};
