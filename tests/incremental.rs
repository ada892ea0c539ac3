//! Incremental update scenarios: modify, delete, no-change idempotence,
//! and single-update equivalence.

#![cfg(unix)]

mod common;

use common::*;

use rstags::storage::OpenMode;
use rstags::tags::Gpath;
use rstags::{create_tags, incremental};

#[test]
fn test_modified_file_is_reindexed() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "a.c",
        "int add(int x, int y) { return x + y; }\n",
    );
    create_tags(&config(dir.path())).unwrap();
    age_databases(dir.path(), 10);

    write_file(
        dir.path(),
        "a.c",
        "int add(int x, int y, int z) { return x + y + z; }\n",
    );
    let stats = incremental(&config(dir.path())).unwrap();
    assert!(stats.updated);

    // Old records for fid 1 are gone, the new ones are in, and the fid
    // space did not grow.
    let defs = records(&gtags_file(dir.path()));
    assert_eq!(
        defs,
        vec![(
            "add".to_string(),
            "add 1 1 int add(int x, int y, int z) { return x + y + z; }".to_string()
        )]
    );
    let refs = triples(&grtags_file(dir.path()));
    assert!(refs.contains(&("z".to_string(), 1, 1)));
    let gpath = Gpath::open(dir.path(), OpenMode::Read).unwrap();
    assert_eq!(gpath.nextkey(), 2);
}

#[test]
fn test_deleted_file_leaves_hole() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "a.c",
        "int add(int x, int y) { return x + y; }\n",
    );
    create_tags(&config(dir.path())).unwrap();
    age_databases(dir.path(), 10);

    std::fs::remove_file(dir.path().join("a.c")).unwrap();
    let stats = incremental(&config(dir.path())).unwrap();
    assert!(stats.updated);

    let gpath = Gpath::open(dir.path(), OpenMode::Read).unwrap();
    assert_eq!(gpath.nextkey(), 2);
    assert_eq!(gpath.path2fid("./a.c").unwrap(), None);
    assert_eq!(gpath.fid2path(1).unwrap(), None);
    assert!(records(&gtags_file(dir.path())).is_empty());
    assert!(records(&grtags_file(dir.path())).is_empty());
}

#[test]
fn test_no_change_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.c", "int a(void) { return 0; }\n");
    write_file(dir.path(), "b.c", "int b(void) { return a(); }\n");
    write_file(dir.path(), "Makefile", "all:\n");
    create_tags(&config(dir.path())).unwrap();
    age_databases(dir.path(), 10);

    let before_defs = records(&gtags_file(dir.path()));
    let before_refs = records(&grtags_file(dir.path()));
    let stats = incremental(&config(dir.path())).unwrap();
    assert!(!stats.updated);
    assert_eq!(records(&gtags_file(dir.path())), before_defs);
    assert_eq!(records(&grtags_file(dir.path())), before_refs);
}

#[test]
fn test_incremental_advances_baseline() {
    // After an update the tag files' mtimes move forward even when only
    // one file changed, so the next run sees a fresh baseline.
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.c", "int a(void) { return 0; }\n");
    create_tags(&config(dir.path())).unwrap();
    age_databases(dir.path(), 10);
    let old = std::fs::metadata(gtags_file(dir.path()))
        .unwrap()
        .modified()
        .unwrap();

    write_file(dir.path(), "a.c", "int a(void) { return 1; }\n");
    incremental(&config(dir.path())).unwrap();
    let new = std::fs::metadata(gtags_file(dir.path()))
        .unwrap()
        .modified()
        .unwrap();
    assert!(new > old);
}

#[test]
fn test_added_file_gets_fresh_fid() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.c", "int a(void) { return 0; }\n");
    create_tags(&config(dir.path())).unwrap();
    age_databases(dir.path(), 10);

    write_file(dir.path(), "b.c", "int b(void) { return 0; }\n");
    incremental(&config(dir.path())).unwrap();
    let gpath = Gpath::open(dir.path(), OpenMode::Read).unwrap();
    assert_eq!(gpath.path2fid("./a.c").unwrap().map(|(f, _)| f), Some(1));
    assert_eq!(gpath.path2fid("./b.c").unwrap().map(|(f, _)| f), Some(2));
    assert_eq!(gpath.nextkey(), 3);
    let defs = triples(&gtags_file(dir.path()));
    assert!(defs.contains(&("a".to_string(), 1, 1)));
    assert!(defs.contains(&("b".to_string(), 2, 1)));
}

#[test]
fn test_single_update_equivalence() {
    // full-build(T) must equal full-build(T \ p) + single-update(p) at
    // the record-set level.
    let full = tempfile::tempdir().unwrap();
    write_file(full.path(), "a.c", "int a(void) { return 0; }\n");
    write_file(full.path(), "b.c", "int b(void) { return a(); }\n");
    create_tags(&config(full.path())).unwrap();

    let part = tempfile::tempdir().unwrap();
    write_file(part.path(), "a.c", "int a(void) { return 0; }\n");
    create_tags(&config(part.path())).unwrap();
    age_databases(part.path(), 10);
    write_file(part.path(), "b.c", "int b(void) { return a(); }\n");
    let mut cfg = config(part.path());
    cfg.single_update = Some("./b.c".to_string());
    let stats = incremental(&cfg).unwrap();
    assert!(stats.updated);

    // Walk order assigns a.c then b.c in both histories, so the raw
    // record sets line up fid for fid.
    assert_eq!(
        triples(&gtags_file(full.path())),
        triples(&gtags_file(part.path()))
    );
    assert_eq!(
        triples(&grtags_file(full.path())),
        triples(&grtags_file(part.path()))
    );
}

#[test]
fn test_single_update_delete() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.c", "int a(void) { return 0; }\n");
    write_file(dir.path(), "b.c", "int b(void) { return 0; }\n");
    create_tags(&config(dir.path())).unwrap();
    age_databases(dir.path(), 10);

    std::fs::remove_file(dir.path().join("b.c")).unwrap();
    let mut cfg = config(dir.path());
    cfg.single_update = Some("./b.c".to_string());
    incremental(&cfg).unwrap();

    let gpath = Gpath::open(dir.path(), OpenMode::Read).unwrap();
    assert_eq!(gpath.path2fid("./b.c").unwrap(), None);
    assert_eq!(gpath.nextkey(), 3);
    let defs = triples(&gtags_file(dir.path()));
    assert!(defs.contains(&("a".to_string(), 1, 1)));
    assert!(defs.iter().all(|(n, _, _)| n != "b"));
}

#[test]
fn test_version_mismatch_is_fatal() {
    use rstags::storage::{Btree, BtreeOpts, PutMode};
    use rstags::ErrorCode;

    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.c", "int a(void) { return 0; }\n");
    create_tags(&config(dir.path())).unwrap();
    {
        let mut db = Btree::open(
            &gtags_file(dir.path()),
            OpenMode::Write,
            BtreeOpts::default(),
        )
        .unwrap();
        db.put(b"_VERSION_", b"3", PutMode::Replace).unwrap();
        db.close().unwrap();
    }
    let err = incremental(&config(dir.path())).unwrap_err();
    assert_eq!(err.code(), ErrorCode::VersionMismatch);
}
