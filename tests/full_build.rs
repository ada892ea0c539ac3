//! End-to-end full builds over scratch source trees.

mod common;

use common::*;

use rstags::storage::OpenMode;
use rstags::tags::format::expand_runs;
use rstags::tags::{Gpath, Gtop, GtopOpenFlags, TagSet};
use rstags::{create_tags, PathKind};

#[test]
fn test_single_file_build() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "a.c",
        "int add(int x, int y) { return x + y; }\n",
    );
    let stats = create_tags(&config(dir.path())).unwrap();
    assert_eq!(stats.parsed, 1);

    // PATH holds one source entry ./a.c -> 1 in both directions.
    let gpath = Gpath::open(dir.path(), OpenMode::Read).unwrap();
    assert_eq!(gpath.path2fid("./a.c").unwrap(), Some((1, PathKind::Source)));
    assert_eq!(
        gpath.fid2path(1).unwrap(),
        Some(("./a.c".to_string(), PathKind::Source))
    );
    assert_eq!(gpath.nextkey(), 2);
    gpath.verify().unwrap();

    // DEFS carries the definition with its full line image.
    let defs = records(&gtags_file(dir.path()));
    assert_eq!(
        defs,
        vec![(
            "add".to_string(),
            "add 1 1 int add(int x, int y) { return x + y; }".to_string()
        )]
    );

    // REFS carries x and y at line 1.
    let refs = triples(&grtags_file(dir.path()));
    assert!(refs.contains(&("x".to_string(), 1, 1)));
    assert!(refs.contains(&("y".to_string(), 1, 1)));
}

#[test]
fn test_if0_region_produces_no_definition() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.c", "#if 0\nvoid dead() {}\n#endif\n");
    create_tags(&config(dir.path())).unwrap();
    let defs = records(&gtags_file(dir.path()));
    assert!(defs.iter().all(|(k, _)| k != "dead"));
}

#[test]
fn test_typedef_struct_records() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.c", "typedef struct S { int f; } S;\n");
    create_tags(&config(dir.path())).unwrap();
    // The struct tag and the typedef name land on the same (name, line),
    // so a single definition record survives per the one-per-line rule.
    let defs = records(&gtags_file(dir.path()));
    assert_eq!(defs.iter().filter(|(k, _)| k == "S").count(), 1);
    let refs = triples(&grtags_file(dir.path()));
    assert!(refs.contains(&("f".to_string(), 1, 1)));
}

#[test]
fn test_cpp_constructor_suppression() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "a.cpp",
        "struct A { void A(); void m(); };\nvoid A::m() {}\n",
    );
    create_tags(&config(dir.path())).unwrap();
    let defs = triples(&gtags_file(dir.path()));
    // DEF A (the class) exactly once; DEF m at its out-of-line
    // definition; no constructor definitions.
    assert_eq!(
        defs.iter().filter(|(n, _, _)| n == "A").collect::<Vec<_>>(),
        vec![&("A".to_string(), 1, 1)]
    );
    assert!(defs.contains(&("m".to_string(), 1, 2)));
}

#[test]
fn test_other_files_tracked_not_parsed() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.c", "int a(void) { return 0; }\n");
    write_file(dir.path(), "Makefile", "all: a.o\n");
    create_tags(&config(dir.path())).unwrap();
    let gpath = Gpath::open(dir.path(), OpenMode::Read).unwrap();
    assert_eq!(
        gpath.path2fid("./Makefile").unwrap().map(|(_, k)| k),
        Some(PathKind::Other)
    );
    // Nothing from the Makefile reaches the tag databases.
    let defs = records(&gtags_file(dir.path()));
    assert!(defs.iter().all(|(k, _)| k != "all"));
}

#[test]
fn test_include_preparse_attributes_records_to_header() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "main.c",
        "#include \"util.h\"\nint main(void) { return util_max(1, 2); }\n",
    );
    write_file(dir.path(), "util.h", "#define UTIL_CAP 64\nint util_max(int a, int b);\n");
    create_tags(&config(dir.path())).unwrap();

    let gpath = Gpath::open(dir.path(), OpenMode::Read).unwrap();
    // Walk order visits main.c first; the include pulls the header in
    // before main.c finishes, so the header gets the second fid.
    let (main_fid, _) = gpath.path2fid("./main.c").unwrap().unwrap();
    let (header_fid, _) = gpath.path2fid("./util.h").unwrap().unwrap();
    assert_eq!(main_fid, 1);
    assert_eq!(header_fid, 2);

    let defs = triples(&gtags_file(dir.path()));
    assert!(defs.contains(&("UTIL_CAP".to_string(), header_fid, 1)));
    assert!(defs.contains(&("main".to_string(), main_fid, 2)));
    // The header was parsed exactly once: one UTIL_CAP record.
    assert_eq!(defs.iter().filter(|(n, _, _)| n == "UTIL_CAP").count(), 1);
}

#[test]
fn test_include_cycle_terminates() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.h", "#include \"b.h\"\n#define A_SEEN 1\n");
    write_file(dir.path(), "b.h", "#include \"a.h\"\n#define B_SEEN 1\n");
    create_tags(&config(dir.path())).unwrap();
    let defs = triples(&gtags_file(dir.path()));
    assert_eq!(defs.iter().filter(|(n, _, _)| n == "A_SEEN").count(), 1);
    assert_eq!(defs.iter().filter(|(n, _, _)| n == "B_SEEN").count(), 1);
}

#[test]
fn test_record_set_independent_of_enumeration_order() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "one.c", "int one(void) { return 1; }\n");
    write_file(dir.path(), "two.c", "int two(void) { return one(); }\n");
    write_file(dir.path(), "list_ab", "./one.c\n./two.c\n");
    write_file(dir.path(), "list_ba", "./two.c\n./one.c\n");

    let run = |list: &str, out: &std::path::Path| {
        std::fs::create_dir_all(out).unwrap();
        let mut cfg = config(dir.path());
        cfg.dbpath = out.to_path_buf();
        cfg.file_list = Some(dir.path().join(list));
        create_tags(&cfg).unwrap();
    };
    let db_ab = dir.path().join("db_ab");
    let db_ba = dir.path().join("db_ba");
    run("list_ab", &db_ab);
    run("list_ba", &db_ba);

    // Resolve fids through each PATH database so the comparison is over
    // (name, path, line) and does not depend on assignment order.
    let resolve = |db: &std::path::Path| {
        let gpath = Gpath::open(db, OpenMode::Read).unwrap();
        let mut out: Vec<(String, String, u32)> = triples(&db.join("GTAGS"))
            .into_iter()
            .map(|(name, fid, line)| {
                let (path, _) = gpath.fid2path(fid).unwrap().unwrap();
                (name, path, line)
            })
            .collect();
        out.sort();
        out
    };
    assert_eq!(resolve(&db_ab), resolve(&db_ba));
}

#[test]
fn test_compact_build_and_image_resolution() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "a.c",
        "int use(int v) { return v; }\nint caller(void) { return use(1) + use(2); }\n",
    );
    let mut cfg = config(dir.path());
    cfg.compact = true;
    create_tags(&cfg).unwrap();

    let refs = records(&grtags_file(dir.path()));
    // `use` is referenced on line 2; compact keys carry the fid.
    let use_rec = refs.iter().find(|(k, _)| k == "use@1").unwrap();
    let fields: Vec<&str> = use_rec.1.split(' ').collect();
    assert_eq!(fields[0], "use");
    assert_eq!(fields[2], "1");
    let lines = expand_runs(fields[1]).unwrap();
    assert_eq!(lines, vec![2]);

    // The sidecar resolves line images with one extra lookup.
    let gtop = Gtop::open(
        dir.path(),
        TagSet::Refs,
        OpenMode::Read,
        GtopOpenFlags::empty(),
    )
    .unwrap();
    assert!(gtop.is_compact());
    assert_eq!(
        gtop.line_image(1, 2).unwrap().unwrap(),
        "int caller(void) { return use(1) + use(2); }"
    );
}

#[test]
fn test_compact_run_lists_are_canonical() {
    let dir = tempfile::tempdir().unwrap();
    // `v` is referenced on lines 2,3,4 and 6.
    write_file(
        dir.path(),
        "a.c",
        "int f(int v)\n{ int a = v;\n a += v;\n a += v;\n int b = 0;\n return v + b;\n}\n",
    );
    let mut cfg = config(dir.path());
    cfg.compact = true;
    create_tags(&cfg).unwrap();
    let refs = records(&grtags_file(dir.path()));
    let v = refs.iter().find(|(k, _)| k == "v@1").unwrap();
    let fields: Vec<&str> = v.1.split(' ').collect();
    let lines = expand_runs(fields[1]).unwrap();
    // Strictly ascending, no duplicates, and the 2,3,4 run collapsed.
    assert_eq!(lines, vec![1, 2, 3, 4, 6]);
    assert!(fields[1].contains("2-4") || fields[1].contains("1-4"));
}

#[test]
fn test_parallel_build_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..12 {
        write_file(
            dir.path(),
            &format!("f{}.c", i),
            &format!("int fn{}(int v) {{ return v + {}; }}\n", i, i),
        );
    }
    let seq_db = dir.path().join("seq");
    let par_db = dir.path().join("par");
    std::fs::create_dir_all(&seq_db).unwrap();
    std::fs::create_dir_all(&par_db).unwrap();

    let mut cfg = config(dir.path());
    cfg.dbpath = seq_db.clone();
    create_tags(&cfg).unwrap();

    let mut cfg = config(dir.path());
    cfg.dbpath = par_db.clone();
    cfg.jobs = 4;
    create_tags(&cfg).unwrap();

    let resolve = |db: &std::path::Path| {
        let gpath = Gpath::open(db, OpenMode::Read).unwrap();
        let mut out: Vec<(String, String, u32)> = triples(&db.join("GTAGS"))
            .into_iter()
            .map(|(name, fid, line)| {
                let (path, _) = gpath.fid2path(fid).unwrap().unwrap();
                (name, path, line)
            })
            .collect();
        out.sort();
        out
    };
    assert_eq!(resolve(&seq_db), resolve(&par_db));
}
