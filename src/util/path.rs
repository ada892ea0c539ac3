//! Path normalization and file-system helpers.
//!
//! Every path stored in the PATH database is relative to the project root
//! and begins with `./`, with forward slashes.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, ErrorCode, Result};

/// Number of leading bytes inspected when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 512;

/// Normalize `path` into `./…` form relative to `root`.
///
/// Absolute paths must lie inside `root`; relative paths are taken as
/// already root-relative. Fails with `Usage` when the path escapes the
/// project.
pub fn normalize_rel(root: &Path, path: &str) -> Result<String> {
    let p = Path::new(path);
    let rel: PathBuf = if p.is_absolute() {
        match p.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => {
                return Err(Error::with_message(
                    ErrorCode::Usage,
                    format!("path '{}' is out of the project", path),
                ))
            }
        }
    } else {
        let trimmed = path.strip_prefix("./").unwrap_or(path);
        PathBuf::from(trimmed)
    };
    let mut out = String::from(".");
    for comp in rel.components() {
        match comp {
            Component::Normal(c) => {
                out.push('/');
                out.push_str(&c.to_string_lossy());
            }
            Component::CurDir => {}
            _ => {
                return Err(Error::with_message(
                    ErrorCode::Usage,
                    format!("path '{}' is out of the project", path),
                ))
            }
        }
    }
    if out == "." {
        return Err(Error::with_message(
            ErrorCode::Usage,
            format!("'{}' is not a file path", path),
        ));
    }
    Ok(out)
}

/// Join a `./…` relative record path back onto the project root.
pub fn to_absolute(root: &Path, rel: &str) -> PathBuf {
    root.join(rel.strip_prefix("./").unwrap_or(rel))
}

/// Strip the `./` prefix for display.
pub fn trim_rel(rel: &str) -> &str {
    rel.strip_prefix("./").unwrap_or(rel)
}

/// True when the file starts with a NUL byte within the sniff window.
/// Binary files are never inserted into the databases.
pub fn is_binary(path: &Path) -> bool {
    let mut buf = [0u8; BINARY_SNIFF_LEN];
    match File::open(path) {
        Ok(mut f) => match f.read(&mut buf) {
            Ok(n) => buf[..n].contains(&0),
            Err(_) => true,
        },
        Err(_) => true,
    }
}

/// Set a file's access and modification times to now.
#[cfg(unix)]
pub fn touch(path: &Path) -> Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::with_message(ErrorCode::Io, "path contains NUL"))?;
    let rc = unsafe { libc::utime(cpath.as_ptr(), std::ptr::null()) };
    if rc != 0 {
        return Err(Error::with_message(
            ErrorCode::Io,
            format!("utime failed for '{}'", path.display()),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn touch(_path: &Path) -> Result<()> {
    Ok(())
}
