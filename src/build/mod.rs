//! The build coordinator: full construction and incremental update of
//! the PATH/DEFS/REFS databases.

pub mod jobs;

use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::config::{matches_skip, BuildConfig};
use crate::error::{Error, ErrorCode, Result};
use crate::parser::{parse_file, ParserCallback, ParserParam};
use crate::storage::OpenMode;
use crate::tags::{Gpath, Gtop, GtopOpenFlags, TagSet};
use crate::tree::{ParseState, PathTree};
use crate::types::{Fid, ParserFlags, PathKind, TagKind, IDENT_MAX};
use crate::util::path::{is_binary, to_absolute, touch, trim_rel};
use crate::util::IdSet;

use jobs::WorkerPool;

/// Outcome counters for one run.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildStats {
    /// Source files parsed (including pre-parsed headers)
    pub parsed: usize,
    /// Tag records removed by the delete sweep
    pub deleted: usize,
    /// Whether any database changed
    pub updated: bool,
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ============================================================================
// Shared build state
// ============================================================================

/// State shared between the coordinator and (possibly) worker threads.
/// The page cache below each handle carries its own lock; flushes
/// serialize on the per-database mutexes here.
struct Shared {
    root: std::path::PathBuf,
    gpath: Mutex<Gpath>,
    defs: Mutex<Gtop>,
    refs: Mutex<Option<Gtop>>,
    states: Mutex<HashMap<String, ParseState>>,
    basket: HashMap<String, Vec<String>>,
    seq: AtomicUsize,
    total: usize,
    verbose: bool,
    warnings: bool,
    parser_flags: ParserFlags,
    not_function: Vec<String>,
    fatal: Mutex<Option<Error>>,
}

struct FileFrame {
    rel: String,
    fid: Fid,
    recs: Vec<(TagKind, String, u32, String)>,
}

/// Per-worker sink: buffers one file's records, resolves includes, and
/// flushes at the file boundary under the database mutexes.
struct FileSink<'a> {
    shared: &'a Shared,
    stack: Vec<FileFrame>,
}

impl<'a> FileSink<'a> {
    /// Parse one source file whose state has already moved to Pending.
    /// Parse-level failures are isolated (warn and skip); database
    /// errors propagate.
    fn parse_one(&mut self, rel: &str) -> Result<()> {
        let fid = self.shared.gpath.lock().put(rel, PathKind::Source)?;
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed) + 1;
        if self.shared.verbose {
            log::info!(
                " [{}/{}] extracting tags of {}",
                seq,
                self.shared.total,
                trim_rel(rel)
            );
        }
        let abspath = to_absolute(&self.shared.root, rel);
        self.stack.push(FileFrame {
            rel: rel.to_string(),
            fid,
            recs: Vec::new(),
        });
        let result = {
            let mut param = ParserParam {
                path: rel,
                abspath: &abspath,
                flags: self.shared.parser_flags,
                cb: self,
            };
            parse_file(&mut param)
        };
        let frame = self.stack.pop().expect("parser frame stack");
        self.shared
            .states
            .lock()
            .insert(rel.to_string(), ParseState::Done);
        match result {
            Ok(()) => self.write_frame(frame),
            Err(e) => {
                log::warn!("cannot parse '{}': {}. file skipped.", trim_rel(rel), e);
                Ok(())
            }
        }
    }

    /// Flush one file's buffered records: all of them or none.
    fn write_frame(&self, frame: FileFrame) -> Result<()> {
        {
            let mut defs = self.shared.defs.lock();
            let wrote = (|| -> Result<()> {
                for (kind, name, lineno, image) in &frame.recs {
                    if *kind == TagKind::Def {
                        defs.put(name, *lineno, frame.fid, image)?;
                    }
                }
                defs.flush(frame.fid)
            })();
            if wrote.is_err() {
                let _ = defs.rollback();
                return wrote;
            }
        }
        let mut refs_guard = self.shared.refs.lock();
        if let Some(refs) = refs_guard.as_mut() {
            let wrote = (|| -> Result<()> {
                for (kind, name, lineno, image) in &frame.recs {
                    if *kind == TagKind::RefSym {
                        refs.put(name, *lineno, frame.fid, image)?;
                    }
                }
                refs.flush(frame.fid)
            })();
            if wrote.is_err() {
                let _ = refs.rollback();
                return wrote;
            }
        }
        Ok(())
    }
}

impl<'a> ParserCallback for FileSink<'a> {
    fn put(&mut self, kind: TagKind, tag: &str, lineno: u32, image: &str) {
        // There is no telling what kind of string comes out of a parser.
        let frame = match self.stack.last_mut() {
            Some(f) => f,
            None => return,
        };
        if tag.is_empty() {
            if self.shared.warnings {
                log::warn!("symbol name is null. (Ignored) [+{} {}]", lineno, frame.rel);
            }
            return;
        }
        if tag.contains(|c: char| c.is_whitespace()) {
            if self.shared.warnings {
                log::warn!(
                    "symbol name includes a space character. (Ignored) [+{} {}]",
                    lineno,
                    frame.rel
                );
            }
            return;
        }
        if tag.len() >= IDENT_MAX {
            if self.shared.warnings {
                log::warn!("symbol name is too long. (Ignored) [+{} {}]", lineno, frame.rel);
            }
            return;
        }
        frame
            .recs
            .push((kind, tag.to_string(), lineno, image.to_string()));
    }

    fn on_include(&mut self, target: &str) -> Result<()> {
        let basename = target.rsplit('/').next().unwrap_or(target);
        for candidate in self.shared.basket.get(basename).cloned().unwrap_or_default() {
            // Parse only on the new -> pending transition; a pending
            // state means an include cycle, a done state a finished
            // file. Either way re-entry is short-circuited.
            {
                let mut states = self.shared.states.lock();
                match states.get(candidate.as_str()) {
                    Some(ParseState::New) => {
                        states.insert(candidate.clone(), ParseState::Pending);
                    }
                    _ => continue,
                }
            }
            self.parse_one(&candidate)?;
        }
        Ok(())
    }

    fn is_not_function(&self, name: &str) -> bool {
        self.shared.not_function.iter().any(|w| w == name)
    }
}

/// Claim and parse one candidate file unless another worker got there
/// first.
fn process_candidate(shared: &Shared, rel: &str) -> Result<()> {
    {
        let mut states = shared.states.lock();
        match states.get(rel) {
            Some(ParseState::New) => {
                states.insert(rel.to_string(), ParseState::Pending);
            }
            _ => return Ok(()),
        }
    }
    let mut sink = FileSink {
        shared,
        stack: Vec::new(),
    };
    sink.parse_one(rel)
}

/// Run the candidate list through the shared state, sequentially or on
/// a worker pool.
fn run_candidates(shared: &Arc<Shared>, list: &[String], workers: usize) -> Result<()> {
    if workers > 1 {
        let pool = WorkerPool::new(workers)?;
        for rel in list {
            let shared = Arc::clone(shared);
            let rel = rel.clone();
            pool.submit(
                Box::new(move || {
                    if let Err(e) = process_candidate(&shared, &rel) {
                        let mut fatal = shared.fatal.lock();
                        if fatal.is_none() {
                            *fatal = Some(e);
                        }
                    }
                }),
                None,
            )?;
        }
        pool.shutdown()?;
    } else {
        for rel in list {
            process_candidate(shared, rel)?;
        }
    }
    if let Some(e) = shared.fatal.lock().take() {
        return Err(e);
    }
    Ok(())
}

fn load_tree(cfg: &BuildConfig) -> Result<PathTree> {
    match &cfg.file_list {
        Some(list) => PathTree::from_file_list(&cfg.root, list, &cfg.walk),
        None => PathTree::build(&cfg.root, &cfg.walk),
    }
}

fn gtop_behavior_flags(cfg: &BuildConfig) -> GtopOpenFlags {
    let mut flags = GtopOpenFlags::empty();
    if cfg.compact {
        flags |= GtopOpenFlags::COMPACT;
    }
    if cfg.extract_method {
        flags |= GtopOpenFlags::EXTRACT_METHOD;
    }
    flags
}

// ============================================================================
// Full build
// ============================================================================

/// Build GPATH, GTAGS, and GRTAGS from scratch.
pub fn create_tags(cfg: &BuildConfig) -> Result<BuildStats> {
    log::info!("[{}] Creating '{}' and '{}'.", now(), "GTAGS", "GRTAGS");
    let tree = load_tree(cfg)?;
    let gpath = Gpath::open(&cfg.dbpath, OpenMode::Create)?;
    let gflags = gtop_behavior_flags(cfg);
    let defs = Gtop::open(&cfg.dbpath, TagSet::Defs, OpenMode::Create, gflags)?;
    let refs = Gtop::open(&cfg.dbpath, TagSet::Refs, OpenMode::Create, gflags)?;

    let states: HashMap<String, ParseState> = tree
        .sources()
        .iter()
        .map(|s| (s.clone(), ParseState::New))
        .collect();
    let shared = Arc::new(Shared {
        root: tree.root().to_path_buf(),
        gpath: Mutex::new(gpath),
        defs: Mutex::new(defs),
        refs: Mutex::new(Some(refs)),
        states: Mutex::new(states),
        basket: tree.basket(),
        seq: AtomicUsize::new(0),
        total: tree.sources().len(),
        verbose: cfg.verbose,
        warnings: cfg.warnings,
        parser_flags: cfg.parser_flags(),
        not_function: cfg.not_function.clone(),
        fatal: Mutex::new(None),
    });

    run_candidates(&shared, tree.sources(), cfg.jobs)?;

    let shared = Arc::try_unwrap(shared)
        .map_err(|_| Error::with_message(ErrorCode::Io, "worker still holds build state"))?;
    let parsed = shared.seq.load(Ordering::Relaxed);
    let mut gpath = shared.gpath.into_inner();
    for other in tree.others() {
        gpath.put(other, PathKind::Other)?;
    }
    shared.defs.into_inner().close()?;
    if let Some(refs) = shared.refs.into_inner() {
        refs.close()?;
    }
    gpath.close()?;
    log::info!("[{}] Done.", now());
    Ok(BuildStats {
        parsed,
        deleted: 0,
        updated: true,
    })
}

// ============================================================================
// Incremental update
// ============================================================================

/// Bring an existing database directory up to date. Returns the stats
/// with `updated` false when nothing had changed.
pub fn incremental(cfg: &BuildConfig) -> Result<BuildStats> {
    log::info!("[{}] Incremental updating.", now());
    // The modification time of GTAGS before any writes is the baseline
    // every source mtime is compared against.
    let gtags_file = Gtop::db_file(&cfg.dbpath, TagSet::Defs);
    let baseline = fs::metadata(&gtags_file)
        .and_then(|m| m.modified())
        .map_err(|e| {
            Error::with_message(ErrorCode::Io, format!("stat failed '{}': {}", gtags_file.display(), e))
        })?;

    // Version check first: an incompatible GTAGS aborts before any
    // mutation.
    Gtop::open(&cfg.dbpath, TagSet::Defs, OpenMode::Read, GtopOpenFlags::empty())?.close()?;

    let mut gpath = Gpath::open(&cfg.dbpath, OpenMode::Write)?;

    let mut deleteset = IdSet::new();
    let mut findset = IdSet::new();
    let mut addlist: Vec<String> = Vec::new();
    let mut deletelist: Vec<String> = Vec::new();
    let mut addlist_other: Vec<String> = Vec::new();
    let mut tree: Option<PathTree> = None;

    if let Some(single) = &cfg.single_update {
        classify_single(cfg, &gpath, single, &mut deleteset, &mut addlist, &mut deletelist, &mut addlist_other)?;
    } else {
        let t = load_tree(cfg)?;
        for rel in t.sources() {
            match gpath.path2fid(rel)? {
                None => addlist.push(rel.clone()),
                Some((fid, _)) => {
                    findset.add(fid);
                    let abs = to_absolute(&cfg.root, rel);
                    let modified = fs::metadata(&abs)
                        .and_then(|m| m.modified())
                        .unwrap_or(SystemTime::UNIX_EPOCH);
                    if modified > baseline {
                        deleteset.add(fid);
                        addlist.push(rel.clone());
                    }
                }
            }
        }
        for rel in t.others() {
            match gpath.path2fid(rel)? {
                None => addlist_other.push(rel.clone()),
                Some((fid, _)) => findset.add(fid),
            }
        }
        // Holes grow as deletion and addition repeat; skip them.
        for fid in 1..gpath.nextkey() {
            let Some((path, kind)) = gpath.fid2path(fid)? else {
                continue;
            };
            let abs = to_absolute(&cfg.root, &path);
            let on_disk = abs.is_file();
            if kind == PathKind::Other {
                if !findset.contains(fid) || !on_disk || is_binary(&abs) {
                    deletelist.push(path);
                }
            } else if !findset.contains(fid) || !on_disk {
                deletelist.push(path);
                deleteset.add(fid);
            }
        }
        tree = Some(t);
    }

    let mut stats = BuildStats::default();
    let tags_changed = !deleteset.is_empty() || !addlist.is_empty();
    let updated = tags_changed || !deletelist.is_empty() || !addlist_other.is_empty();
    if updated {
        if tags_changed {
            let (g, parsed, deleted) =
                update_tags(cfg, gpath, tree.as_ref(), &deleteset, &addlist)?;
            gpath = g;
            stats.parsed = parsed;
            stats.deleted = deleted;
        }
        if !deletelist.is_empty() || !addlist_other.is_empty() {
            log::info!("[{}] Updating '{}'.", now(), "GPATH");
            for path in &deletelist {
                gpath.delete(path)?;
            }
            for path in &addlist_other {
                gpath.put(path, PathKind::Other)?;
            }
        }
        // Advance tag-file mtimes even if no record changed, so the
        // next incremental run sees a fresh baseline.
        for name in ["GTAGS", "GRTAGS", "GIMAGE", "GRIMAGE"] {
            let p = cfg.dbpath.join(name);
            if p.is_file() {
                touch(&p)?;
            }
        }
    }
    gpath.close()?;
    if cfg.verbose {
        if updated {
            log::info!(" Global databases have been modified.");
        } else {
            log::info!(" Global databases are up to date.");
        }
        log::info!("[{}] Done.", now());
    }
    stats.updated = updated;
    Ok(stats)
}

/// Single-file classification: absent on disk means delete, present
/// without a fid means add, present with a fid means modify.
fn classify_single(
    cfg: &BuildConfig,
    gpath: &Gpath,
    single: &str,
    deleteset: &mut IdSet,
    addlist: &mut Vec<String>,
    deletelist: &mut Vec<String>,
    addlist_other: &mut Vec<String>,
) -> Result<()> {
    let name = single.rsplit('/').next().unwrap_or(single);
    if matches_skip(name, &cfg.walk.skip) {
        return Ok(());
    }
    let abs = to_absolute(&cfg.root, single);
    if abs.is_file() && is_binary(&abs) {
        return Ok(());
    }
    match gpath.path2fid(single)? {
        None => {
            if !abs.is_file() {
                return Err(Error::with_message(
                    ErrorCode::Io,
                    format!("'{}' not found", single),
                ));
            }
            if crate::parser::Language::from_path(single).is_some() {
                addlist.push(single.to_string());
            } else {
                addlist_other.push(single.to_string());
            }
        }
        Some((fid, kind)) => {
            if !abs.is_file() {
                if kind != PathKind::Other {
                    deleteset.add(fid);
                }
                deletelist.push(single.to_string());
            } else if kind != PathKind::Other {
                deleteset.add(fid);
                addlist.push(single.to_string());
            }
        }
    }
    Ok(())
}

/// Delete the records of every fid in `deleteset`, then re-parse the
/// add list, flushing per file.
fn update_tags(
    cfg: &BuildConfig,
    gpath: Gpath,
    tree: Option<&PathTree>,
    deleteset: &IdSet,
    addlist: &[String],
) -> Result<(Gpath, usize, usize)> {
    log::info!("[{}] Updating '{}' and '{}'.", now(), "GTAGS", "GRTAGS");
    let behavior = gtop_behavior_flags(cfg);
    let mut defs = Gtop::open(&cfg.dbpath, TagSet::Defs, OpenMode::Write, behavior)?;
    defs.set_flags(behavior);
    let mut refs = if Gtop::db_file(&cfg.dbpath, TagSet::Refs).is_file() {
        let mut r = Gtop::open(&cfg.dbpath, TagSet::Refs, OpenMode::Write, behavior)?;
        r.set_flags(behavior);
        Some(r)
    } else {
        // Without GRTAGS on disk, references are simply not written.
        None
    };

    let mut deleted = 0usize;
    if !deleteset.is_empty() {
        if cfg.verbose {
            let total = deleteset.len();
            for (i, fid) in deleteset.iter().enumerate() {
                match gpath.fid2path(fid)? {
                    Some((path, _)) => {
                        log::info!(" [{}/{}] deleting tags of {}", i + 1, total, trim_rel(&path));
                    }
                    None => {
                        return Err(Error::with_message(
                            ErrorCode::Corrupt,
                            "GPATH is corrupted",
                        ))
                    }
                }
            }
        }
        deleted = defs.delete(deleteset)?;
        if let Some(r) = refs.as_mut() {
            deleted += r.delete(deleteset)?;
        }
    }

    // Files outside the add list keep their records; includes resolving
    // to them must not be re-parsed.
    let mut states: HashMap<String, ParseState> = HashMap::new();
    let mut basket: HashMap<String, Vec<String>> = HashMap::new();
    if let Some(t) = tree {
        for rel in t.sources() {
            states.insert(rel.clone(), ParseState::Done);
        }
        basket = t.basket();
    }
    for rel in addlist {
        states.insert(rel.clone(), ParseState::New);
    }

    let shared = Arc::new(Shared {
        root: cfg.root.clone(),
        gpath: Mutex::new(gpath),
        defs: Mutex::new(defs),
        refs: Mutex::new(refs),
        states: Mutex::new(states),
        basket,
        seq: AtomicUsize::new(0),
        total: addlist.len(),
        verbose: cfg.verbose,
        warnings: cfg.warnings,
        parser_flags: cfg.parser_flags(),
        not_function: cfg.not_function.clone(),
        fatal: Mutex::new(None),
    });

    run_candidates(&shared, addlist, cfg.jobs)?;

    let shared = Arc::try_unwrap(shared)
        .map_err(|_| Error::with_message(ErrorCode::Io, "worker still holds build state"))?;
    let parsed = shared.seq.load(Ordering::Relaxed);
    let gpath = shared.gpath.into_inner();
    shared.defs.into_inner().close()?;
    if let Some(r) = shared.refs.into_inner() {
        r.close()?;
    }
    Ok((gpath, parsed, deleted))
}
