//! Logging setup.
//!
//! All diagnostics go through the `log` facade. The installed logger
//! appends to the file named by `GTAGSLOGGING` (read once here) when it
//! can be opened, otherwise it writes to stderr. Quiet mode silences
//! everything, the default level passes warnings, verbose passes
//! progress messages, debug passes the nesting traces.

use std::env;
use std::fs::{File, OpenOptions};
use std::io::Write;

use log::{LevelFilter, Metadata, Record};
use parking_lot::Mutex;

enum Target {
    Stderr,
    File(File),
}

struct GtagsLogger {
    out: Mutex<Target>,
}

impl log::Log for GtagsLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if record.level() > log::max_level() {
            return;
        }
        let line = match record.level() {
            log::Level::Warn => format!("Warning: {}", record.args()),
            log::Level::Error => format!("Error: {}", record.args()),
            _ => record.args().to_string(),
        };
        let mut out = self.out.lock();
        match &mut *out {
            Target::Stderr => {
                let _ = writeln!(std::io::stderr(), "{}", line);
            }
            Target::File(f) => {
                let _ = writeln!(f, "{}", line);
            }
        }
    }

    fn flush(&self) {
        if let Target::File(f) = &mut *self.out.lock() {
            let _ = f.flush();
        }
    }
}

/// Install the logger. Safe to call more than once; later calls only
/// adjust the level.
pub fn init(quiet: bool, verbose: bool, debug: bool) {
    let level = if quiet {
        LevelFilter::Off
    } else if debug {
        LevelFilter::Debug
    } else if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    let target = match env::var_os("GTAGSLOGGING") {
        Some(path) => match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => Target::File(f),
            Err(_) => Target::Stderr,
        },
        None => Target::Stderr,
    };
    let logger = GtagsLogger {
        out: Mutex::new(target),
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(level);
    } else {
        // already installed (tests, repeated init): level only
        log::set_max_level(level);
    }
}
