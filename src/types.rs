//! Core type aliases, tag event types, and shared limits.

use bitflags::bitflags;

// ============================================================================
// Numeric type aliases
// ============================================================================

/// Page number within a paged database file (0-indexed).
pub type Pgno = u32;

/// File identifier, unique within one database generation (1-based).
pub type Fid = u32;

/// Last page number the cache will hand out before reporting overflow.
pub const MAX_PAGE_NUMBER: Pgno = Pgno::MAX - 1;

/// Largest fid that may be assigned; `_NEXTKEY_` past this is an overflow.
pub const MAX_FID: Fid = Fid::MAX - 1;

/// Identifier length limit; longer symbols are dropped with a warning.
pub const IDENT_MAX: usize = 512;

/// On-disk application format version (`_VERSION_` header record).
pub const FORMAT_VERSION: i32 = 6;

// ============================================================================
// Tag events
// ============================================================================

/// Kind of a tag event emitted by a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// Symbol definition; routed to the DEFS database
    Def,
    /// Symbol reference; routed to the REFS database
    RefSym,
}

/// Classification of a tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Will be parsed for tags
    Source,
    /// Tracked but never parsed (e.g. a Makefile)
    Other,
}

impl PathKind {
    /// Flag byte stored with PATH records.
    pub fn flag_byte(&self) -> u8 {
        match self {
            PathKind::Source => b's',
            PathKind::Other => b'o',
        }
    }

    pub fn from_flag_byte(b: u8) -> Option<PathKind> {
        match b {
            b's' => Some(PathKind::Source),
            b'o' => Some(PathKind::Other),
            _ => None,
        }
    }
}

// ============================================================================
// Parser flags
// ============================================================================

bitflags! {
    /// Flags handed to the language parsers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParserFlags: u32 {
        /// Emit parse warnings
        const WARNING = 0x0001;
        /// Per-file progress messages
        const VERBOSE = 0x0002;
        /// Nesting-level trace output
        const DEBUG = 0x0004;
        /// A '{' at column 0 forces block level 1
        const BEGIN_BLOCK = 0x0008;
        /// A '}' at column 0 forces block level 0 (GTAGSFORCEENDBLOCK)
        const END_BLOCK = 0x0010;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_kind_flag_round_trip() {
        for kind in [PathKind::Source, PathKind::Other] {
            assert_eq!(PathKind::from_flag_byte(kind.flag_byte()), Some(kind));
        }
        assert_eq!(PathKind::from_flag_byte(b'x'), None);
    }
}
