//! rstags CLI - create tag files for a source tree.
//!
//! Usage: rstags [OPTIONS] [DBPATH]
//!
//! The thin driver over the library: flag parsing, dbpath resolution,
//! and the read-only --dump mode. Exit codes: 0 success, 1 general
//! failure, 2 usage error (clap's default).

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use rstags::config::BuildConfig;
use rstags::error::{Error, ErrorCode, Result};
use rstags::storage::{Btree, BtreeOpts, OpenMode};
use rstags::tags::format::{decode_flagged, KEY_NEXTKEY};
use rstags::tree::SkipSymlink;
use rstags::util::path::normalize_rel;

/// Default candidate list picked up from the project root.
const DEFAULT_FILE_LIST: &str = "gtags.files";

#[derive(Parser, Debug)]
#[command(
    name = "rstags",
    version,
    about = "Create tag files (GPATH, GTAGS, GRTAGS) for a source tree"
)]
struct Cli {
    /// Update existing tag files incrementally
    #[arg(short = 'i', long)]
    incremental: bool,

    /// Use the compact record format
    #[arg(short = 'c', long)]
    compact: bool,

    /// Suppress all messages
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Print progress messages
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print warning messages
    #[arg(short = 'w', long)]
    warning: bool,

    /// Also extract `method` from Class::method definitions
    #[arg(long)]
    extract_method: bool,

    /// Accept files and directories whose names begin with a dot
    #[arg(long)]
    accept_dotfiles: bool,

    /// Skip unreadable files instead of aborting
    #[arg(long)]
    skip_unreadable: bool,

    /// Skip symbolic links: f(iles), d(irectories), or a(ll)
    #[arg(
        long,
        value_name = "TYPE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "a"
    )]
    skip_symlink: Option<String>,

    /// Update only the given file
    #[arg(long, value_name = "FILE")]
    single_update: Option<String>,

    /// Browse the given database file and exit
    #[arg(short = 'd', long, value_name = "FILE")]
    dump: Option<PathBuf>,

    /// Read the candidate file list from FILE
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Parse files with this many worker threads
    #[arg(short = 'j', long, value_name = "N", default_value_t = 1)]
    jobs: usize,

    /// Directory in which tag files are generated (default: cwd)
    dbpath: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    rstags::logging::init(cli.quiet, cli.verbose && !cli.quiet, false);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rstags: {}", e);
            if e.code() == ErrorCode::Usage {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(target) = &cli.dump {
        return dump(target);
    }

    let cwd = env::current_dir()?;
    let root = cwd.clone();
    let dbpath = match &cli.dbpath {
        Some(p) => p
            .canonicalize()
            .map_err(|_| Error::with_message(ErrorCode::Usage, format!("invalid dbpath given: {}", p.display())))?,
        None => cwd.clone(),
    };
    if !dbpath.is_dir() {
        return Err(Error::with_message(
            ErrorCode::Usage,
            format!("directory '{}' not found", dbpath.display()),
        ));
    }

    let mut cfg = BuildConfig::new(dbpath, root);
    cfg.compact = cli.compact;
    cfg.extract_method = cli.extract_method;
    cfg.quiet = cli.quiet;
    cfg.verbose = cli.verbose && !cli.quiet;
    cfg.warnings = cli.warning;
    cfg.jobs = cli.jobs.max(1);
    cfg.walk.accept_dotfiles = cli.accept_dotfiles;
    cfg.walk.skip_unreadable = cli.skip_unreadable;
    cfg.walk.skip_symlink = match cli.skip_symlink.as_deref() {
        None => SkipSymlink::None,
        Some("f") => SkipSymlink::File,
        Some("d") => SkipSymlink::Dir,
        Some("a") => SkipSymlink::All,
        Some(other) => {
            return Err(Error::with_message(
                ErrorCode::Usage,
                format!("--skip-symlink: {}: unknown type", other),
            ))
        }
    };

    // 'gtags.files' is the implicit candidate list when present.
    cfg.file_list = cli.file.clone();
    if cfg.file_list.is_none() {
        let implicit = cfg.root.join(DEFAULT_FILE_LIST);
        if implicit.is_file() {
            cfg.file_list = Some(implicit);
        }
    }
    if let Some(list) = &cfg.file_list {
        if list.is_dir() {
            return Err(Error::with_message(
                ErrorCode::Usage,
                format!("'{}' is a directory", list.display()),
            ));
        }
        if !list.is_file() {
            return Err(Error::with_message(
                ErrorCode::Usage,
                format!("'{}' not found", list.display()),
            ));
        }
    }

    let mut want_incremental = cli.incremental || cli.single_update.is_some();
    if let Some(single) = &cli.single_update {
        cfg.single_update = Some(normalize_rel(&cfg.root, single)?);
    }
    if want_incremental && !databases_exist(&cfg.dbpath) {
        if cli.warning {
            eprintln!("Warning: GTAGS, GRTAGS or GPATH not found. -i option ignored.");
        }
        want_incremental = false;
        cfg.single_update = None;
    }

    if want_incremental {
        rstags::incremental(&cfg)?;
    } else {
        rstags::create_tags(&cfg)?;
    }
    Ok(())
}

fn databases_exist(dbpath: &Path) -> bool {
    ["GTAGS", "GRTAGS", "GPATH"]
        .iter()
        .all(|name| dbpath.join(name).is_file())
}

/// Print every record of a database file as `key TAB value [TAB flag]`.
/// The file with a `_NEXTKEY_` record is GPATH; only its records carry
/// flags.
fn dump(target: &Path) -> Result<()> {
    if !target.is_file() {
        return Err(Error::with_message(
            ErrorCode::Usage,
            format!("file '{}' not found", target.display()),
        ));
    }
    let db = Btree::open(target, OpenMode::Read, BtreeOpts::default())?;
    let is_gpath = db.get(KEY_NEXTKEY.as_bytes())?.is_some();
    let mut cursor = db.cursor();
    cursor.seek_first()?;
    while let Some((key, value)) = cursor.next()? {
        let key = String::from_utf8_lossy(&key);
        let (data, flag) = decode_flagged(&value);
        match flag {
            Some(f) if is_gpath => println!("{}\t{}\t{}", key, data, f as char),
            _ => println!("{}\t{}", key, data),
        }
    }
    Ok(())
}
