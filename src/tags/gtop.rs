//! The tag store: bridges the parser's tag event stream onto the ordered
//! index, honoring the configured encoding.
//!
//! Standard encoding writes one record per occurrence under the symbol
//! name. Compact encoding buffers all records for one fid, merges line
//! numbers into run lists under `<name>@<fid>` keys, and stores the line
//! images in a sidecar keyed `<fid>:<line>`. Either way the per-file
//! flush is atomic: every record written since the last flush is
//! journaled and rolled back on failure.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::error::{Error, ErrorCode, Result};
use crate::storage::{Btree, BtreeOpts, OpenMode, PutMode};
use crate::tags::format::{
    compact_key, compose_compact, compose_standard, compress_runs, decode_flagged, image_key,
    is_header_key, parse_compact_key, parse_image_key, parse_standard, KEY_COMPLINE, KEY_COMPNAME,
    KEY_FORMAT, KEY_VERSION,
};
use crate::types::{Fid, FORMAT_VERSION};
use crate::util::IdSet;

bitflags! {
    /// Open-time behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GtopOpenFlags: u32 {
        /// Run-length-compressed record encoding
        const COMPACT = 0x01;
        /// Emit `method` for definitions of the form `Class::method`
        const EXTRACT_METHOD = 0x02;
    }
}

/// Which tag database a handle addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSet {
    Defs,
    Refs,
}

impl TagSet {
    pub fn db_name(&self) -> &'static str {
        match self {
            TagSet::Defs => "GTAGS",
            TagSet::Refs => "GRTAGS",
        }
    }

    pub fn image_db_name(&self) -> &'static str {
        match self {
            TagSet::Defs => "GIMAGE",
            TagSet::Refs => "GRIMAGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Standard,
    Compact,
}

/// One journaled write, for rollback.
#[derive(Debug)]
enum JournalEntry {
    Main(Vec<u8>, Vec<u8>),
    Image(Vec<u8>, Vec<u8>),
}

/// Tag database handle.
#[derive(Debug)]
pub struct Gtop {
    db: Btree,
    images: Option<Btree>,
    which: TagSet,
    format: Format,
    flags: GtopOpenFlags,
    readonly: bool,
    /// Fid whose records are currently buffered/journaled.
    cur_fid: Option<Fid>,
    /// (name, line) pairs already defined in the current file.
    seen_defs: HashSet<(String, u32)>,
    /// Compact: accumulated line numbers per name.
    pending: BTreeMap<String, Vec<u32>>,
    /// Compact: first line image seen per line.
    pending_images: BTreeMap<u32, String>,
    journal: Vec<JournalEntry>,
}

impl Gtop {
    /// Open one of the tag databases under `dbpath`.
    ///
    /// `Create` writes the `_VERSION_`, `_FORMAT_`, and compression-flag
    /// headers; `Write` validates `_VERSION_` and adopts the encoding
    /// recorded in `_FORMAT_`.
    pub fn open(dbpath: &Path, which: TagSet, mode: OpenMode, flags: GtopOpenFlags) -> Result<Gtop> {
        let file = dbpath.join(which.db_name());
        match mode {
            OpenMode::Create => {
                let compact = flags.contains(GtopOpenFlags::COMPACT);
                let mut db = Btree::open(
                    &file,
                    OpenMode::Create,
                    BtreeOpts {
                        dups: true,
                        ..BtreeOpts::default()
                    },
                )?;
                db.put(
                    KEY_VERSION.as_bytes(),
                    FORMAT_VERSION.to_string().as_bytes(),
                    PutMode::Replace,
                )?;
                let fmt = if compact { "1" } else { "0" };
                db.put(KEY_FORMAT.as_bytes(), fmt.as_bytes(), PutMode::Replace)?;
                db.put(KEY_COMPNAME.as_bytes(), b"0", PutMode::Replace)?;
                db.put(
                    KEY_COMPLINE.as_bytes(),
                    if compact { b"1" } else { b"0" },
                    PutMode::Replace,
                )?;
                let images = if compact {
                    Some(Btree::open(
                        &dbpath.join(which.image_db_name()),
                        OpenMode::Create,
                        BtreeOpts {
                            dups: false,
                            ..BtreeOpts::default()
                        },
                    )?)
                } else {
                    None
                };
                Ok(Gtop {
                    db,
                    images,
                    which,
                    format: if compact {
                        Format::Compact
                    } else {
                        Format::Standard
                    },
                    flags,
                    readonly: false,
                    cur_fid: None,
                    seen_defs: HashSet::new(),
                    pending: BTreeMap::new(),
                    pending_images: BTreeMap::new(),
                    journal: Vec::new(),
                })
            }
            OpenMode::Read | OpenMode::Write => {
                let db = Btree::open(&file, mode, BtreeOpts::default())?;
                let version = match db.get(KEY_VERSION.as_bytes())? {
                    Some(raw) => decode_flagged(&raw).0.parse::<i32>().map_err(|_| {
                        Error::with_message(ErrorCode::Corrupt, "bad version record")
                    })?,
                    None => {
                        return Err(Error::with_message(
                            ErrorCode::Corrupt,
                            format!("{} has no version record", which.db_name()),
                        ))
                    }
                };
                if version != FORMAT_VERSION {
                    return Err(Error::with_message(
                        ErrorCode::VersionMismatch,
                        format!(
                            "{} version {} (need {})",
                            which.db_name(),
                            version,
                            FORMAT_VERSION
                        ),
                    ));
                }
                let format = match db.get(KEY_FORMAT.as_bytes())? {
                    Some(raw) => match decode_flagged(&raw).0.as_str() {
                        "0" => Format::Standard,
                        "1" => Format::Compact,
                        _ => {
                            return Err(Error::with_message(
                                ErrorCode::Corrupt,
                                "bad _FORMAT_ record",
                            ))
                        }
                    },
                    None => Format::Standard,
                };
                let images = if format == Format::Compact {
                    Some(Btree::open(
                        &dbpath.join(which.image_db_name()),
                        mode,
                        BtreeOpts::default(),
                    )?)
                } else {
                    None
                };
                Ok(Gtop {
                    db,
                    images,
                    which,
                    format,
                    flags,
                    readonly: mode == OpenMode::Read,
                    cur_fid: None,
                    seen_defs: HashSet::new(),
                    pending: BTreeMap::new(),
                    pending_images: BTreeMap::new(),
                    journal: Vec::new(),
                })
            }
        }
    }

    pub fn which(&self) -> TagSet {
        self.which
    }

    pub fn is_compact(&self) -> bool {
        self.format == Format::Compact
    }

    /// Replace the behavior flags after open (modify-mode callers set
    /// EXTRACT_METHOD here, matching the original's open-then-flag flow).
    pub fn set_flags(&mut self, flags: GtopOpenFlags) {
        // The encoding is fixed by the _FORMAT_ header; only the
        // behavior bits are writable.
        let compact = self.flags.contains(GtopOpenFlags::COMPACT);
        self.flags = flags;
        self.flags.set(GtopOpenFlags::COMPACT, compact);
    }

    /// Buffer one record for `fid`.
    pub fn put(&mut self, name: &str, lineno: u32, fid: Fid, image: &str) -> Result<()> {
        if self.readonly {
            return Err(Error::with_message(ErrorCode::Usage, "read-only database"));
        }
        match self.cur_fid {
            Some(f) if f != fid => {
                return Err(Error::with_message(
                    ErrorCode::Usage,
                    format!("records for fid {} not flushed before fid {}", f, fid),
                ));
            }
            None => self.cur_fid = Some(fid),
            _ => {}
        }
        self.put_one(name, lineno, fid, image)?;
        if self.flags.contains(GtopOpenFlags::EXTRACT_METHOD) && self.which == TagSet::Defs {
            if let Some((_, method)) = name.rsplit_once("::") {
                if !method.is_empty() && method != name {
                    self.put_one(method, lineno, fid, image)?;
                }
            }
        }
        Ok(())
    }

    fn put_one(&mut self, name: &str, lineno: u32, fid: Fid, image: &str) -> Result<()> {
        if self.which == TagSet::Defs
            && !self.seen_defs.insert((name.to_string(), lineno))
        {
            // One definition per (name, line) within a file.
            return Ok(());
        }
        match self.format {
            Format::Standard => {
                let value = compose_standard(name, lineno, fid, image);
                self.db
                    .put(name.as_bytes(), value.as_bytes(), PutMode::InsertDup)?;
                self.journal
                    .push(JournalEntry::Main(name.as_bytes().to_vec(), value.into_bytes()));
            }
            Format::Compact => {
                self.pending.entry(name.to_string()).or_default().push(lineno);
                self.pending_images
                    .entry(lineno)
                    .or_insert_with(|| image.to_string());
            }
        }
        Ok(())
    }

    /// Write the buffered records for `fid` atomically: on any failure
    /// every record written since the last flush is deleted again.
    pub fn flush(&mut self, fid: Fid) -> Result<()> {
        if self.cur_fid.is_some() && self.cur_fid != Some(fid) {
            return Err(Error::with_message(
                ErrorCode::Usage,
                "flush for a fid with no buffered records",
            ));
        }
        let result = self.flush_inner(fid);
        if result.is_err() {
            self.rollback()?;
        } else {
            self.clear_file_state();
        }
        result
    }

    fn flush_inner(&mut self, fid: Fid) -> Result<()> {
        if self.format == Format::Standard {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        for (name, mut lines) in pending {
            lines.sort_unstable();
            lines.dedup();
            let runs = compress_runs(&lines);
            let key = compact_key(&name, fid);
            let value = compose_compact(&name, &runs, fid);
            self.db
                .put(key.as_bytes(), value.as_bytes(), PutMode::InsertDup)?;
            self.journal
                .push(JournalEntry::Main(key.into_bytes(), value.into_bytes()));
        }
        let images = std::mem::take(&mut self.pending_images);
        let idb = self
            .images
            .as_mut()
            .ok_or_else(|| Error::new(ErrorCode::Corrupt))?;
        for (lineno, image) in images {
            let key = image_key(fid, lineno);
            idb.put(key.as_bytes(), image.as_bytes(), PutMode::Replace)?;
            self.journal
                .push(JournalEntry::Image(key.into_bytes(), image.into_bytes()));
        }
        Ok(())
    }

    /// Undo every record written since the last flush. Called by the
    /// coordinator when a file's parse fails midway.
    pub fn rollback(&mut self) -> Result<()> {
        let journal = std::mem::take(&mut self.journal);
        for entry in journal.into_iter().rev() {
            match entry {
                JournalEntry::Main(key, value) => {
                    self.db.delete_exact(&key, &value)?;
                }
                JournalEntry::Image(key, value) => {
                    if let Some(idb) = self.images.as_mut() {
                        idb.delete_exact(&key, &value)?;
                    }
                }
            }
        }
        self.clear_file_state();
        Ok(())
    }

    fn clear_file_state(&mut self) {
        self.cur_fid = None;
        self.seen_defs.clear();
        self.pending.clear();
        self.pending_images.clear();
        self.journal.clear();
    }

    /// Remove every record whose fid is in `set`. One cursor pass over
    /// the index, then targeted deletes.
    pub fn delete(&mut self, set: &IdSet) -> Result<usize> {
        if set.is_empty() {
            return Ok(0);
        }
        let mut victims: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        {
            let mut c = self.db.cursor();
            c.seek_first()?;
            while let Some((key, value)) = c.next()? {
                if is_header_key(&key) {
                    continue;
                }
                let fid = match self.format {
                    Format::Standard => {
                        parse_standard(&String::from_utf8_lossy(&value))?.fid
                    }
                    Format::Compact => parse_compact_key(&String::from_utf8_lossy(&key))?.1,
                };
                if set.contains(fid) {
                    victims.push((key, value));
                }
            }
        }
        let count = victims.len();
        for (key, value) in victims {
            self.db.delete_exact(&key, &value)?;
        }
        if let Some(idb) = self.images.as_mut() {
            let mut victims: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
            {
                let mut c = idb.cursor();
                c.seek_first()?;
                while let Some((key, value)) = c.next()? {
                    let (fid, _) = parse_image_key(&String::from_utf8_lossy(&key))?;
                    if set.contains(fid) {
                        victims.push((key, value));
                    }
                }
            }
            for (key, value) in victims {
                idb.delete_exact(&key, &value)?;
            }
        }
        Ok(count)
    }

    /// Resolve a line image in compact mode (one extra lookup).
    pub fn line_image(&self, fid: Fid, lineno: u32) -> Result<Option<String>> {
        match &self.images {
            Some(idb) => Ok(idb
                .get(image_key(fid, lineno).as_bytes())?
                .map(|raw| decode_flagged(&raw).0)),
            None => Ok(None),
        }
    }

    /// Path of the main database file for a tag set.
    pub fn db_file(dbpath: &Path, which: TagSet) -> PathBuf {
        dbpath.join(which.db_name())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.db.sync()?;
        if let Some(idb) = self.images.as_mut() {
            idb.sync()?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        debug_assert!(
            self.cur_fid.is_none(),
            "closing tag database with unflushed records"
        );
        self.db.sync()?;
        if let Some(idb) = self.images.take() {
            idb.close()?;
        }
        self.db.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::format::expand_runs;

    fn all_records(dbpath: &Path, which: TagSet) -> Vec<(String, String)> {
        let db = Btree::open(
            &dbpath.join(which.db_name()),
            OpenMode::Read,
            BtreeOpts::default(),
        )
        .unwrap();
        let mut c = db.cursor();
        c.seek_first().unwrap();
        let mut out = Vec::new();
        while let Some((k, v)) = c.next().unwrap() {
            if is_header_key(&k) {
                continue;
            }
            out.push((
                String::from_utf8_lossy(&k).into_owned(),
                decode_flagged(&v).0,
            ));
        }
        out
    }

    #[test]
    fn test_standard_put_flush_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut gtop = Gtop::open(
            dir.path(),
            TagSet::Defs,
            OpenMode::Create,
            GtopOpenFlags::empty(),
        )
        .unwrap();
        gtop.put("add", 1, 1, "int add(int x, int y)").unwrap();
        gtop.flush(1).unwrap();
        gtop.put("sub", 3, 2, "int sub(int x, int y)").unwrap();
        gtop.put("sub2", 4, 2, "int sub2(void)").unwrap();
        gtop.flush(2).unwrap();
        let mut set = IdSet::new();
        set.add(2);
        assert_eq!(gtop.delete(&set).unwrap(), 2);
        gtop.close().unwrap();

        let recs = all_records(dir.path(), TagSet::Defs);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].0, "add");
        assert_eq!(recs[0].1, "add 1 1 int add(int x, int y)");
    }

    #[test]
    fn test_def_dedup_within_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut gtop = Gtop::open(
            dir.path(),
            TagSet::Defs,
            OpenMode::Create,
            GtopOpenFlags::empty(),
        )
        .unwrap();
        gtop.put("S", 1, 1, "typedef struct S { int f; } S;").unwrap();
        gtop.put("S", 1, 1, "typedef struct S { int f; } S;").unwrap();
        gtop.flush(1).unwrap();
        gtop.close().unwrap();
        assert_eq!(all_records(dir.path(), TagSet::Defs).len(), 1);
    }

    #[test]
    fn test_compact_run_merge_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut gtop = Gtop::open(
            dir.path(),
            TagSet::Refs,
            OpenMode::Create,
            GtopOpenFlags::COMPACT,
        )
        .unwrap();
        for line in [17u32, 19, 20, 21, 28, 20] {
            gtop.put("x", line, 3, &format!("line {}", line)).unwrap();
        }
        gtop.put("y", 17, 3, "line 17").unwrap();
        gtop.flush(3).unwrap();
        assert_eq!(gtop.line_image(3, 19).unwrap().unwrap(), "line 19");
        gtop.close().unwrap();

        let recs = all_records(dir.path(), TagSet::Refs);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0], ("x@3".to_string(), "x 17,19-21,28 3".to_string()));
        assert_eq!(recs[1], ("y@3".to_string(), "y 17 3".to_string()));
        let runs: Vec<&str> = recs[0].1.split(' ').collect();
        let lines = expand_runs(runs[1]).unwrap();
        assert_eq!(lines, vec![17, 19, 20, 21, 28]);
    }

    #[test]
    fn test_compact_delete_sweeps_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut gtop = Gtop::open(
            dir.path(),
            TagSet::Defs,
            OpenMode::Create,
            GtopOpenFlags::COMPACT,
        )
        .unwrap();
        gtop.put("a", 1, 1, "a one").unwrap();
        gtop.flush(1).unwrap();
        gtop.put("b", 2, 2, "b two").unwrap();
        gtop.flush(2).unwrap();
        let mut set = IdSet::new();
        set.add(1);
        assert_eq!(gtop.delete(&set).unwrap(), 1);
        assert_eq!(gtop.line_image(1, 1).unwrap(), None);
        assert_eq!(gtop.line_image(2, 2).unwrap().unwrap(), "b two");
        gtop.close().unwrap();
    }

    #[test]
    fn test_rollback_removes_partial_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut gtop = Gtop::open(
            dir.path(),
            TagSet::Defs,
            OpenMode::Create,
            GtopOpenFlags::empty(),
        )
        .unwrap();
        gtop.put("keep", 1, 1, "keep me").unwrap();
        gtop.flush(1).unwrap();
        gtop.put("drop1", 2, 2, "half written").unwrap();
        gtop.put("drop2", 3, 2, "half written too").unwrap();
        gtop.rollback().unwrap();
        gtop.close().unwrap();
        let recs = all_records(dir.path(), TagSet::Defs);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].0, "keep");
    }

    #[test]
    fn test_extract_method() {
        let dir = tempfile::tempdir().unwrap();
        let mut gtop = Gtop::open(
            dir.path(),
            TagSet::Defs,
            OpenMode::Create,
            GtopOpenFlags::EXTRACT_METHOD,
        )
        .unwrap();
        gtop.put("Stack::push", 10, 1, "void Stack::push(int v)").unwrap();
        gtop.flush(1).unwrap();
        gtop.close().unwrap();
        let recs = all_records(dir.path(), TagSet::Defs);
        let names: Vec<&str> = recs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["Stack::push", "push"]);
        assert!(recs[1].1.starts_with("push 10 1 "));
    }

    #[test]
    fn test_modify_adopts_format_and_checks_version() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut gtop = Gtop::open(
                dir.path(),
                TagSet::Defs,
                OpenMode::Create,
                GtopOpenFlags::COMPACT,
            )
            .unwrap();
            gtop.put("a", 1, 1, "a").unwrap();
            gtop.flush(1).unwrap();
            gtop.close().unwrap();
        }
        // Reopen without the COMPACT flag: encoding comes from _FORMAT_.
        let gtop = Gtop::open(
            dir.path(),
            TagSet::Defs,
            OpenMode::Write,
            GtopOpenFlags::empty(),
        )
        .unwrap();
        assert!(gtop.is_compact());
        drop(gtop);
        {
            let mut db = Btree::open(
                &dir.path().join("GTAGS"),
                OpenMode::Write,
                BtreeOpts::default(),
            )
            .unwrap();
            db.put(KEY_VERSION.as_bytes(), b"99", PutMode::Replace).unwrap();
            db.close().unwrap();
        }
        let err = Gtop::open(
            dir.path(),
            TagSet::Defs,
            OpenMode::Write,
            GtopOpenFlags::empty(),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VersionMismatch);
    }
}
