//! Source-file discovery: the recursive walk with its filter policy,
//! the filename basket used to resolve `#include` targets, and the
//! per-file parse states that make include pre-parsing terminate on
//! cycles.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;

use crate::config::{matches_skip, WalkConfig};
use crate::error::{Error, ErrorCode, Result};
use crate::parser::Language;
use crate::util::path::{is_binary, normalize_rel, trim_rel};

/// Symlink rejection policy (`--skip-symlink`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipSymlink {
    #[default]
    None,
    File,
    Dir,
    All,
}

impl SkipSymlink {
    pub fn skips_file(&self) -> bool {
        matches!(self, SkipSymlink::File | SkipSymlink::All)
    }

    pub fn skips_dir(&self) -> bool {
        matches!(self, SkipSymlink::Dir | SkipSymlink::All)
    }
}

/// Include pre-parse memo per source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    New,
    Pending,
    Done,
}

/// The discovered project tree.
pub struct PathTree {
    root: PathBuf,
    /// Accepted source files, `./`-relative, in walk order.
    sources: Vec<String>,
    /// Accepted non-source files (tracked, never parsed).
    others: Vec<String>,
    /// basename -> source paths sharing it, for `#include` lookup.
    basket: HashMap<String, Vec<String>>,
    states: HashMap<String, ParseState>,
}

impl PathTree {
    /// Walk the file system under `root`.
    pub fn build(root: &Path, cfg: &WalkConfig) -> Result<PathTree> {
        let root = root
            .canonicalize()
            .map_err(|e| Error::with_message(ErrorCode::Io, format!("bad root: {}", e)))?;
        let mut tree = PathTree {
            root: root.clone(),
            sources: Vec::new(),
            others: Vec::new(),
            basket: HashMap::new(),
            states: HashMap::new(),
        };
        walk_dir(&root, ".", &root, cfg, &mut tree)?;
        Ok(tree)
    }

    /// Take the candidate list from a file instead of walking. Lines
    /// starting with `". "` are comments; directories and missing files
    /// are skipped with a warning.
    pub fn from_file_list(root: &Path, list: &Path, cfg: &WalkConfig) -> Result<PathTree> {
        let root = root
            .canonicalize()
            .map_err(|e| Error::with_message(ErrorCode::Io, format!("bad root: {}", e)))?;
        let mut tree = PathTree {
            root: root.clone(),
            sources: Vec::new(),
            others: Vec::new(),
            basket: HashMap::new(),
            states: HashMap::new(),
        };
        let fp = fs::File::open(list)
            .map_err(|e| Error::with_message(ErrorCode::Io, format!("cannot open '{}': {}", list.display(), e)))?;
        for line in BufReader::new(fp).lines() {
            let line = line?;
            let path = line.trim_end();
            if path.is_empty() || path.starts_with(". ") {
                continue;
            }
            let abs = if Path::new(path).is_absolute() {
                PathBuf::from(path)
            } else {
                root.join(path.strip_prefix("./").unwrap_or(path))
            };
            match fs::metadata(&abs) {
                Ok(m) if m.is_file() => {}
                Ok(m) if m.is_dir() => {
                    log::warn!("'{}' is a directory. ignored.", path);
                    continue;
                }
                _ => {
                    log::warn!("'{}' not found. ignored.", path);
                    continue;
                }
            }
            let real = match abs.canonicalize() {
                Ok(r) => r,
                Err(_) => {
                    log::warn!("can't get real path of: {}, ignored.", path);
                    continue;
                }
            };
            let rel = match normalize_rel(&root, &real.to_string_lossy()) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let name = rel.rsplit('/').next().unwrap_or(&rel).to_string();
            if matches_skip(&name, &cfg.skip) {
                continue;
            }
            if !cfg.allow_blank && rel.contains(' ') {
                log::warn!("'{}' ignored, because it includes blank.", trim_rel(&rel));
                continue;
            }
            tree.accept_file(rel, &abs);
        }
        Ok(tree)
    }

    fn accept_file(&mut self, rel: String, abs: &Path) {
        if Language::from_path(&rel).is_some() {
            let name = rel.rsplit('/').next().unwrap_or(&rel).to_string();
            self.basket.entry(name).or_default().push(rel.clone());
            self.states.insert(rel.clone(), ParseState::New);
            self.sources.push(rel);
        } else if !is_binary(abs) {
            self.others.push(rel);
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn others(&self) -> &[String] {
        &self.others
    }

    /// Locations sharing `basename`, for `#include` resolution.
    pub fn lookup_basename(&self, name: &str) -> Vec<String> {
        self.basket.get(name).cloned().unwrap_or_default()
    }

    /// The whole filename basket.
    pub fn basket(&self) -> HashMap<String, Vec<String>> {
        self.basket.clone()
    }

    pub fn state(&self, rel: &str) -> ParseState {
        self.states.get(rel).copied().unwrap_or(ParseState::New)
    }

    pub fn set_state(&mut self, rel: &str, state: ParseState) {
        self.states.insert(rel.to_string(), state);
    }
}

/// One directory level of the recursive walk. Rejection rules apply in
/// a fixed order: dotfiles, skip list, special files, escaping symlinked
/// directories, unreadable entries, symlink policy, blanks, extension.
fn walk_dir(
    dir: &Path,
    rel_prefix: &str,
    root_real: &Path,
    cfg: &WalkConfig,
    tree: &mut PathTree,
) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            if cfg.skip_unreadable {
                log::warn!("cannot read '{}'. ignored: {}", dir.display(), e);
                return Ok(());
            }
            return Err(Error::with_message(
                ErrorCode::Io,
                format!("cannot read directory '{}': {}", dir.display(), e),
            ));
        }
    };
    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    for name in names {
        if name.starts_with('.') && !cfg.accept_dotfiles {
            continue;
        }
        if matches_skip(&name, &cfg.skip) {
            continue;
        }
        let abs = dir.join(&name);
        let rel = format!("{}/{}", rel_prefix, name);

        let lmeta = match fs::symlink_metadata(&abs) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("cannot stat path '{}'. ignored: {}", trim_rel(&rel), e);
                continue;
            }
        };
        let is_symlink = lmeta.file_type().is_symlink();
        let meta = match fs::metadata(&abs) {
            Ok(m) => m,
            Err(e) => {
                // dead symlink or vanished entry
                log::warn!("cannot stat path '{}'. ignored: {}", trim_rel(&rel), e);
                continue;
            }
        };
        let ftype = meta.file_type();
        #[cfg(unix)]
        if ftype.is_socket() || ftype.is_fifo() || ftype.is_char_device() || ftype.is_block_device()
        {
            log::warn!("file is not regular file '{}'. ignored.", trim_rel(&rel));
            continue;
        }

        if ftype.is_dir() {
            if is_symlink {
                if cfg.skip_symlink.skips_dir() {
                    continue;
                }
                if unallowed_symlink(&abs, root_real) {
                    log::warn!(
                        "unallowed symbolic link detected. '{}' is ignored.",
                        trim_rel(&rel)
                    );
                    continue;
                }
            }
            if !cfg.allow_blank && name.contains(' ') {
                log::warn!("'{}' ignored, because it includes blank.", trim_rel(&rel));
                continue;
            }
            walk_dir(&abs, &rel, root_real, cfg, tree)?;
        } else if ftype.is_file() {
            if is_symlink && cfg.skip_symlink.skips_file() {
                continue;
            }
            if fs::File::open(&abs).is_err() {
                if !cfg.skip_unreadable {
                    return Err(Error::with_message(
                        ErrorCode::Io,
                        format!("cannot read file '{}'.", trim_rel(&rel)),
                    ));
                }
                log::warn!("cannot read '{}'. ignored.", trim_rel(&rel));
                continue;
            }
            if !cfg.allow_blank && name.contains(' ') {
                log::warn!("'{}' ignored, because it includes blank.", trim_rel(&rel));
                continue;
            }
            tree.accept_file(rel, &abs);
        }
    }
    Ok(())
}

/// A symlinked directory is rejected when its target escapes the real
/// root tree or is an ancestor of it (which would loop the walk).
fn unallowed_symlink(dir: &Path, root_real: &Path) -> bool {
    match dir.canonicalize() {
        Ok(real) => !real.starts_with(root_real) || root_real.starts_with(&real),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_walk_classifies_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("main.c"), "int main() {}\n");
        touch(&dir.path().join("lib/util.c"), "int util() {}\n");
        touch(&dir.path().join("lib/util.h"), "int util();\n");
        touch(&dir.path().join("Makefile"), "all:\n");
        touch(&dir.path().join(".hidden.c"), "int hidden() {}\n");
        fs::write(dir.path().join("blob.bin"), [0u8, 1, 2, 3]).unwrap();

        let tree = PathTree::build(dir.path(), &WalkConfig::default()).unwrap();
        assert_eq!(
            tree.sources(),
            &["./lib/util.c", "./lib/util.h", "./main.c"]
        );
        assert_eq!(tree.others(), &["./Makefile"]);
        assert_eq!(tree.lookup_basename("util.h"), vec!["./lib/util.h"]);
        assert!(tree.lookup_basename("missing.h").is_empty());
    }

    #[test]
    fn test_dotfiles_accepted_on_request() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(".hidden.c"), "int hidden() {}\n");
        let cfg = WalkConfig {
            accept_dotfiles: true,
            ..WalkConfig::default()
        };
        let tree = PathTree::build(dir.path(), &cfg).unwrap();
        assert_eq!(tree.sources(), &["./.hidden.c"]);
    }

    #[test]
    fn test_skip_list_prunes_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("src/a.c"), "int a() {}\n");
        touch(&dir.path().join("CVS/old.c"), "int old() {}\n");
        let tree = PathTree::build(dir.path(), &WalkConfig::default()).unwrap();
        assert_eq!(tree.sources(), &["./src/a.c"]);
    }

    #[test]
    fn test_database_files_never_tracked() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.c"), "int a() {}\n");
        touch(&dir.path().join("GTAGS"), "binary-ish\n");
        touch(&dir.path().join("GPATH"), "binary-ish\n");
        let tree = PathTree::build(dir.path(), &WalkConfig::default()).unwrap();
        assert_eq!(tree.sources(), &["./a.c"]);
        assert!(tree.others().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let outside = tempfile::tempdir().unwrap();
        touch(&outside.path().join("escape.c"), "int escape() {}\n");
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.c"), "int a() {}\n");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let tree = PathTree::build(dir.path(), &WalkConfig::default()).unwrap();
        assert_eq!(tree.sources(), &["./a.c"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_skip_symlink_policy() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("real.c"), "int real() {}\n");
        std::os::unix::fs::symlink(dir.path().join("real.c"), dir.path().join("alias.c")).unwrap();
        let cfg = WalkConfig {
            skip_symlink: SkipSymlink::File,
            ..WalkConfig::default()
        };
        let tree = PathTree::build(dir.path(), &cfg).unwrap();
        assert_eq!(tree.sources(), &["./real.c"]);

        let tree = PathTree::build(dir.path(), &WalkConfig::default()).unwrap();
        assert_eq!(tree.sources(), &["./alias.c", "./real.c"]);
    }

    #[test]
    fn test_parse_states() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.c"), "int a() {}\n");
        let mut tree = PathTree::build(dir.path(), &WalkConfig::default()).unwrap();
        assert_eq!(tree.state("./a.c"), ParseState::New);
        tree.set_state("./a.c", ParseState::Pending);
        assert_eq!(tree.state("./a.c"), ParseState::Pending);
        tree.set_state("./a.c", ParseState::Done);
        assert_eq!(tree.state("./a.c"), ParseState::Done);
    }

    #[test]
    fn test_file_list() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.c"), "int a() {}\n");
        touch(&dir.path().join("b.c"), "int b() {}\n");
        touch(&dir.path().join("README"), "hello\n");
        let list = dir.path().join("files.txt");
        fs::write(&list, ". a comment\n./a.c\nb.c\nREADME\nmissing.c\n").unwrap();
        let tree = PathTree::from_file_list(dir.path(), &list, &WalkConfig::default()).unwrap();
        assert_eq!(tree.sources(), &["./a.c", "./b.c"]);
        assert_eq!(tree.others(), &["./README"]);
    }
}
