//! The PATH database: a bidirectional map between `./`-relative source
//! paths and compact numeric file identifiers.
//!
//! Each accepted file owns two entries (path→fid and fid→path, both
//! carrying a source/other flag byte) plus the distinguished `_NEXTKEY_`
//! record holding the next fid to assign. Fids are 1-based and never
//! reused; deleting a path leaves a hole.

use std::path::Path;

use crate::error::{Error, ErrorCode, Result};
use crate::storage::{Btree, BtreeOpts, OpenMode, PutMode};
use crate::tags::format::{decode_flagged, encode_flagged, KEY_NEXTKEY, KEY_VERSION};
use crate::types::{Fid, PathKind, FORMAT_VERSION, MAX_FID};

/// File name of the PATH database inside a db directory.
pub const GPATH_NAME: &str = "GPATH";

/// PATH database handle.
#[derive(Debug)]
pub struct Gpath {
    db: Btree,
    next_fid: Fid,
    readonly: bool,
}

impl Gpath {
    pub fn open(dbpath: &Path, mode: OpenMode) -> Result<Gpath> {
        let file = dbpath.join(GPATH_NAME);
        match mode {
            OpenMode::Create => {
                let mut db = Btree::open(
                    &file,
                    OpenMode::Create,
                    BtreeOpts {
                        dups: false,
                        ..BtreeOpts::default()
                    },
                )?;
                db.put(
                    KEY_VERSION.as_bytes(),
                    FORMAT_VERSION.to_string().as_bytes(),
                    PutMode::Replace,
                )?;
                db.put(KEY_NEXTKEY.as_bytes(), b"1", PutMode::Replace)?;
                Ok(Gpath {
                    db,
                    next_fid: 1,
                    readonly: false,
                })
            }
            OpenMode::Read | OpenMode::Write => {
                let db = Btree::open(&file, mode, BtreeOpts::default())?;
                let version = match db.get(KEY_VERSION.as_bytes())? {
                    Some(raw) => decode_flagged(&raw)
                        .0
                        .parse::<i32>()
                        .map_err(|_| Error::with_message(ErrorCode::Corrupt, "bad GPATH version"))?,
                    None => {
                        return Err(Error::with_message(
                            ErrorCode::Corrupt,
                            "GPATH has no version record",
                        ))
                    }
                };
                if version != FORMAT_VERSION {
                    return Err(Error::with_message(
                        ErrorCode::VersionMismatch,
                        format!("GPATH version {} (need {})", version, FORMAT_VERSION),
                    ));
                }
                let next_fid = match db.get(KEY_NEXTKEY.as_bytes())? {
                    Some(raw) => decode_flagged(&raw).0.parse::<Fid>().map_err(|_| {
                        Error::with_message(ErrorCode::Corrupt, "bad _NEXTKEY_ record")
                    })?,
                    None => {
                        return Err(Error::with_message(
                            ErrorCode::Corrupt,
                            "GPATH has no _NEXTKEY_ record",
                        ))
                    }
                };
                Ok(Gpath {
                    db,
                    next_fid,
                    readonly: mode == OpenMode::Read,
                })
            }
        }
    }

    /// Insert a path; a no-op returning the existing fid when already
    /// present.
    pub fn put(&mut self, path: &str, kind: PathKind) -> Result<Fid> {
        debug_assert!(path.starts_with("./"), "unnormalized path '{}'", path);
        if let Some((fid, _)) = self.path2fid(path)? {
            return Ok(fid);
        }
        if self.next_fid >= MAX_FID {
            return Err(Error::with_message(
                ErrorCode::Overflow,
                "fid space exhausted",
            ));
        }
        let fid = self.next_fid;
        let fid_str = fid.to_string();
        self.db.put(
            path.as_bytes(),
            &encode_flagged(&fid_str, Some(kind.flag_byte())),
            PutMode::InsertUnique,
        )?;
        self.db.put(
            fid_str.as_bytes(),
            &encode_flagged(path, Some(kind.flag_byte())),
            PutMode::InsertUnique,
        )?;
        self.next_fid += 1;
        Ok(fid)
    }

    /// Remove both directions; the fid becomes a permanent hole.
    pub fn delete(&mut self, path: &str) -> Result<bool> {
        let Some((fid, _)) = self.path2fid(path)? else {
            return Ok(false);
        };
        self.db.delete(path.as_bytes())?;
        self.db.delete(fid.to_string().as_bytes())?;
        Ok(true)
    }

    pub fn path2fid(&self, path: &str) -> Result<Option<(Fid, PathKind)>> {
        match self.db.get(path.as_bytes())? {
            Some(raw) => {
                let (data, flag) = decode_flagged(&raw);
                let fid = data.parse::<Fid>().map_err(|_| {
                    Error::with_message(ErrorCode::Corrupt, format!("bad fid for '{}'", path))
                })?;
                let kind = flag.and_then(PathKind::from_flag_byte).ok_or_else(|| {
                    Error::with_message(ErrorCode::Corrupt, format!("missing flag for '{}'", path))
                })?;
                Ok(Some((fid, kind)))
            }
            None => Ok(None),
        }
    }

    pub fn fid2path(&self, fid: Fid) -> Result<Option<(String, PathKind)>> {
        match self.db.get(fid.to_string().as_bytes())? {
            Some(raw) => {
                let (path, flag) = decode_flagged(&raw);
                let kind = flag.and_then(PathKind::from_flag_byte).ok_or_else(|| {
                    Error::with_message(ErrorCode::Corrupt, format!("missing flag for fid {}", fid))
                })?;
                Ok(Some((path, kind)))
            }
            None => Ok(None),
        }
    }

    /// The next fid that would be assigned.
    pub fn nextkey(&self) -> Fid {
        self.next_fid
    }

    /// Enumerate live fids in ascending order, skipping holes.
    pub fn live_fids(&self) -> Result<Vec<(Fid, String, PathKind)>> {
        let mut out = Vec::new();
        for fid in 1..self.next_fid {
            if let Some((path, kind)) = self.fid2path(fid)? {
                out.push((fid, path, kind));
            }
        }
        Ok(out)
    }

    /// Check that forward and reverse entries agree for every live fid.
    pub fn verify(&self) -> Result<()> {
        for (fid, path, _) in self.live_fids()? {
            match self.path2fid(&path)? {
                Some((back, _)) if back == fid => {}
                _ => {
                    return Err(Error::with_message(
                        ErrorCode::Corrupt,
                        format!("forward/reverse mismatch for '{}'", path),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Persist `_NEXTKEY_` and close the database.
    pub fn close(mut self) -> Result<()> {
        if !self.readonly {
            self.db.put(
                KEY_NEXTKEY.as_bytes(),
                self.next_fid.to_string().as_bytes(),
                PutMode::Replace,
            )?;
        }
        self.db.close()
    }
}
