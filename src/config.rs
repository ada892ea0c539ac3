//! Build configuration: option flags, filter policy, and the
//! environment inputs read once at startup.

use std::env;
use std::path::PathBuf;

use lazy_static::lazy_static;

use crate::tree::SkipSymlink;
use crate::types::ParserFlags;

lazy_static! {
    /// Names never inserted into the databases: our own artifacts,
    /// version-control metadata, and build droppings.
    static ref DEFAULT_SKIP: Vec<&'static str> = vec![
        "GTAGS", "GRTAGS", "GPATH", "GIMAGE", "GRIMAGE", "gtags.files",
        ".git", ".hg", ".svn", ".bzr", "CVS", "RCS", "SCCS",
        ".deps", ".libs",
        "*.o", "*.a", "*.so", "*.lo", "*.la", "*.orig", "*.rej", "*.bak", "*~",
    ];
}

/// Match a file or directory name against the skip patterns. A leading
/// `*` makes the pattern a suffix match, otherwise names must match
/// exactly.
pub fn matches_skip(name: &str, extra: &[String]) -> bool {
    let hit = |pat: &str| {
        if let Some(suffix) = pat.strip_prefix('*') {
            name.ends_with(suffix)
        } else {
            name == pat
        }
    };
    DEFAULT_SKIP.iter().any(|p| hit(p)) || extra.iter().any(|p| hit(p))
}

/// Filter policy for the discovery walk.
#[derive(Debug, Clone)]
pub struct WalkConfig {
    pub accept_dotfiles: bool,
    pub skip_unreadable: bool,
    pub skip_symlink: SkipSymlink,
    pub allow_blank: bool,
    /// Extra skip patterns on top of the built-in list.
    pub skip: Vec<String>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        WalkConfig {
            accept_dotfiles: false,
            skip_unreadable: false,
            skip_symlink: SkipSymlink::None,
            allow_blank: true,
            skip: Vec::new(),
        }
    }
}

/// Everything the build coordinator needs for one run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding GPATH/GTAGS/GRTAGS
    pub dbpath: PathBuf,
    /// Project root
    pub root: PathBuf,
    pub compact: bool,
    pub extract_method: bool,
    pub verbose: bool,
    pub warnings: bool,
    pub quiet: bool,
    pub debug: bool,
    /// Candidate list file instead of a walk
    pub file_list: Option<PathBuf>,
    /// Restrict an incremental run to one normalized `./` path
    pub single_update: Option<String>,
    /// Worker count; 1 means sequential
    pub jobs: usize,
    pub walk: WalkConfig,
    /// Identifiers configured to never be function names
    pub not_function: Vec<String>,
    force_end_block: bool,
}

impl BuildConfig {
    pub fn new(dbpath: PathBuf, root: PathBuf) -> Self {
        BuildConfig {
            dbpath,
            root,
            compact: false,
            extract_method: false,
            verbose: false,
            warnings: false,
            quiet: false,
            debug: false,
            file_list: None,
            single_update: None,
            jobs: 1,
            walk: WalkConfig::default(),
            not_function: Vec::new(),
            // read once at initialization
            force_end_block: env::var_os("GTAGSFORCEENDBLOCK").is_some(),
        }
    }

    /// Flags handed down to the language parsers.
    pub fn parser_flags(&self) -> ParserFlags {
        let mut flags = ParserFlags::empty();
        if self.warnings {
            flags |= ParserFlags::WARNING;
        }
        if self.verbose {
            flags |= ParserFlags::VERBOSE;
        }
        if self.debug {
            flags |= ParserFlags::DEBUG;
        }
        if self.force_end_block {
            flags |= ParserFlags::END_BLOCK;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_matching() {
        assert!(matches_skip("GTAGS", &[]));
        assert!(matches_skip(".git", &[]));
        assert!(matches_skip("x.o", &[]));
        assert!(matches_skip("editor.bak", &[]));
        assert!(!matches_skip("main.c", &[]));
        assert!(!matches_skip("gtags", &[]));
        let extra = vec!["generated".to_string(), "*.tmp".to_string()];
        assert!(matches_skip("generated", &extra));
        assert!(matches_skip("x.tmp", &extra));
        assert!(!matches_skip("x.tmpl", &extra));
    }
}
