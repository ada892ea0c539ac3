//! Language parsers: dispatch, the tag-event callback seam, and the
//! per-file entry point.

pub mod c;
pub mod cpp;
pub(crate) mod preproc;
pub mod reserved;
pub mod tokenizer;

use std::path::Path;

use crate::error::Result;
use crate::types::{ParserFlags, TagKind};

/// Languages handled by the built-in parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cpp,
    Yacc,
}

impl Language {
    /// Map a path to a parser by extension; `None` means "not a source
    /// file" and the path is tracked without parsing.
    pub fn from_path(path: &str) -> Option<Language> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        match ext {
            "c" | "h" => Some(Language::C),
            "c++" | "cc" | "hh" | "cpp" | "cxx" | "hxx" | "hpp" | "C" | "H" => Some(Language::Cpp),
            "y" => Some(Language::Yacc),
            _ => None,
        }
    }
}

/// Sink for tag events and include requests.
///
/// `put` receives `(kind, name, line, line-image)`; the implementation
/// attributes records to the file currently being parsed. `on_include`
/// lets the coordinator pre-parse an included header before the
/// including file finishes.
pub trait ParserCallback {
    fn put(&mut self, kind: TagKind, tag: &str, lineno: u32, image: &str);

    fn on_include(&mut self, target: &str) -> Result<()> {
        let _ = target;
        Ok(())
    }

    /// Identifiers configured to never be function names.
    fn is_not_function(&self, name: &str) -> bool {
        let _ = name;
        false
    }
}

/// Everything a language parser needs for one file.
pub struct ParserParam<'a> {
    /// `./`-relative path, for messages
    pub path: &'a str,
    /// Actual file to open
    pub abspath: &'a Path,
    pub flags: ParserFlags,
    pub cb: &'a mut dyn ParserCallback,
}

/// Parse one source file, dispatching on its extension. Per-file errors
/// are returned to the coordinator, which isolates them so one bad file
/// does not abort the run.
pub fn parse_file(param: &mut ParserParam) -> Result<()> {
    match Language::from_path(param.path) {
        Some(Language::C) => c::parse_c(param),
        Some(Language::Cpp) => cpp::parse_cpp(param),
        Some(Language::Yacc) => c::parse_yacc(param),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_dispatch() {
        assert_eq!(Language::from_path("./src/a.c"), Some(Language::C));
        assert_eq!(Language::from_path("./inc/a.h"), Some(Language::C));
        assert_eq!(Language::from_path("./x.cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_path("./x.cc"), Some(Language::Cpp));
        assert_eq!(Language::from_path("./x.H"), Some(Language::Cpp));
        assert_eq!(Language::from_path("./gram.y"), Some(Language::Yacc));
        assert_eq!(Language::from_path("./Makefile"), None);
        assert_eq!(Language::from_path("./a.rs"), None);
    }
}
