//! Shared helpers for the end-to-end tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use rstags::config::BuildConfig;
use rstags::storage::{Btree, BtreeOpts, OpenMode};
use rstags::tags::format::{decode_flagged, is_header_key, parse_standard};
use rstags::tags::gpath::GPATH_NAME;

pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A config with dbpath == root, the driver default.
pub fn config(root: &Path) -> BuildConfig {
    BuildConfig::new(root.to_path_buf(), root.to_path_buf())
}

/// All non-header records of a database file as (key, value) strings.
pub fn records(db_file: &Path) -> Vec<(String, String)> {
    let db = Btree::open(db_file, OpenMode::Read, BtreeOpts::default()).unwrap();
    let mut cursor = db.cursor();
    cursor.seek_first().unwrap();
    let mut out = Vec::new();
    while let Some((key, value)) = cursor.next().unwrap() {
        if is_header_key(&key) {
            continue;
        }
        out.push((
            String::from_utf8_lossy(&key).into_owned(),
            decode_flagged(&value).0,
        ));
    }
    out
}

/// Distinct (name, fid, line) triples of a standard-format database,
/// sorted, for order-independence comparisons.
pub fn triples(db_file: &Path) -> Vec<(String, u32, u32)> {
    let mut out: Vec<(String, u32, u32)> = records(db_file)
        .iter()
        .map(|(_, v)| {
            let rec = parse_standard(v).unwrap();
            (rec.name, rec.fid, rec.lineno)
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

pub fn gpath_file(root: &Path) -> std::path::PathBuf {
    root.join(GPATH_NAME)
}

pub fn gtags_file(root: &Path) -> std::path::PathBuf {
    root.join("GTAGS")
}

pub fn grtags_file(root: &Path) -> std::path::PathBuf {
    root.join("GRTAGS")
}

/// Move a file's mtime into the past so a freshly written source file
/// always compares newer than the database baseline.
#[cfg(unix)]
pub fn age_file(path: &Path, secs: i64) {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let tv = libc::timeval {
        tv_sec: now - secs,
        tv_usec: 0,
    };
    let times = [tv, tv];
    let cpath = CString::new(path.as_os_str().as_bytes()).unwrap();
    let rc = unsafe { libc::utimes(cpath.as_ptr(), times.as_ptr()) };
    assert_eq!(rc, 0, "utimes failed for {}", path.display());
}

/// Age every database file so the next incremental run sees a stale
/// baseline.
#[cfg(unix)]
pub fn age_databases(root: &Path, secs: i64) {
    for name in ["GPATH", "GTAGS", "GRTAGS", "GIMAGE", "GRIMAGE"] {
        let p = root.join(name);
        if p.is_file() {
            age_file(&p, secs);
        }
    }
}
