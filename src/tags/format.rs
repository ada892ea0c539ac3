//! Record text formats shared by the databases.
//!
//! Standard tag value: `"<name> <lineno> <fid> <line-image>"`.
//! Compact tag: key `"<name>@<fid>"`, value `"<name> <run-list> <fid>"`
//! where the run list collapses every run of three or more consecutive
//! line numbers into `a-b`. Line images for compact records live in a
//! sidecar keyed `"<fid>:<line>"`.

use crate::error::{Error, ErrorCode, Result};
use crate::types::Fid;

// ============================================================================
// Header record keys
// ============================================================================

pub const KEY_VERSION: &str = "_VERSION_";
pub const KEY_FORMAT: &str = "_FORMAT_";
pub const KEY_COMPNAME: &str = "_COMPNAME_";
pub const KEY_COMPLINE: &str = "_COMPLINE_";
pub const KEY_NEXTKEY: &str = "_NEXTKEY_";

/// Keys skipped by record sweeps.
pub const HEADER_KEYS: [&str; 5] = [
    KEY_VERSION,
    KEY_FORMAT,
    KEY_COMPNAME,
    KEY_COMPLINE,
    KEY_NEXTKEY,
];

pub fn is_header_key(key: &[u8]) -> bool {
    HEADER_KEYS.iter().any(|h| h.as_bytes() == key)
}

// ============================================================================
// Flagged values
// ============================================================================

/// Append an optional flag byte after a NUL terminator, the way PATH
/// records carry their source/other marker.
pub fn encode_flagged(data: &str, flag: Option<u8>) -> Vec<u8> {
    let mut out = data.as_bytes().to_vec();
    if let Some(f) = flag {
        out.push(0);
        out.push(f);
    }
    out
}

/// Split a flagged value back into data and flag.
pub fn decode_flagged(raw: &[u8]) -> (String, Option<u8>) {
    match raw.iter().position(|&b| b == 0) {
        Some(pos) => {
            let data = String::from_utf8_lossy(&raw[..pos]).into_owned();
            let flag = raw.get(pos + 1).copied();
            (data, flag)
        }
        None => (String::from_utf8_lossy(raw).into_owned(), None),
    }
}

// ============================================================================
// Standard records
// ============================================================================

/// A decoded standard tag record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardRecord {
    pub name: String,
    pub lineno: u32,
    pub fid: Fid,
    pub image: String,
}

pub fn compose_standard(name: &str, lineno: u32, fid: Fid, image: &str) -> String {
    format!("{} {} {} {}", name, lineno, fid, image)
}

pub fn parse_standard(value: &str) -> Result<StandardRecord> {
    let mut it = value.splitn(4, ' ');
    let name = it
        .next()
        .ok_or_else(|| Error::with_message(ErrorCode::Corrupt, "empty tag record"))?;
    let lineno = it
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::with_message(ErrorCode::Corrupt, "bad line number"))?;
    let fid = it
        .next()
        .and_then(|s| s.parse::<Fid>().ok())
        .ok_or_else(|| Error::with_message(ErrorCode::Corrupt, "bad fid"))?;
    let image = it.next().unwrap_or("");
    Ok(StandardRecord {
        name: name.to_string(),
        lineno,
        fid,
        image: image.to_string(),
    })
}

// ============================================================================
// Compact records
// ============================================================================

pub fn compact_key(name: &str, fid: Fid) -> String {
    format!("{}@{}", name, fid)
}

/// Recover `(name, fid)` from a compact key.
pub fn parse_compact_key(key: &str) -> Result<(String, Fid)> {
    let (name, fid) = key
        .rsplit_once('@')
        .ok_or_else(|| Error::with_message(ErrorCode::Corrupt, "bad compact key"))?;
    let fid = fid
        .parse::<Fid>()
        .map_err(|_| Error::with_message(ErrorCode::Corrupt, "bad compact key fid"))?;
    Ok((name.to_string(), fid))
}

pub fn compose_compact(name: &str, runs: &str, fid: Fid) -> String {
    format!("{} {} {}", name, runs, fid)
}

pub fn image_key(fid: Fid, lineno: u32) -> String {
    format!("{}:{}", fid, lineno)
}

pub fn parse_image_key(key: &str) -> Result<(Fid, u32)> {
    let (fid, line) = key
        .split_once(':')
        .ok_or_else(|| Error::with_message(ErrorCode::Corrupt, "bad image key"))?;
    match (fid.parse::<Fid>(), line.parse::<u32>()) {
        (Ok(f), Ok(l)) => Ok((f, l)),
        _ => Err(Error::with_message(ErrorCode::Corrupt, "bad image key")),
    }
}

// ============================================================================
// Line-run compression
// ============================================================================

/// Collapse a sorted, duplicate-free line list into canonical run form:
/// runs of three or more become `a-b`, pairs and singletons stay literal.
pub fn compress_runs(lines: &[u32]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < lines.len() {
        let start = lines[i];
        let mut j = i;
        while j + 1 < lines.len() && lines[j + 1] == lines[j] + 1 {
            j += 1;
        }
        if !out.is_empty() {
            out.push(',');
        }
        let len = j - i + 1;
        if len >= 3 {
            out.push_str(&format!("{}-{}", start, lines[j]));
            i = j + 1;
        } else {
            out.push_str(&start.to_string());
            i += 1;
        }
    }
    out
}

/// Expand a run list, validating canonical form: items strictly
/// ascending, every `a-b` run covering at least three lines.
pub fn expand_runs(runs: &str) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    for item in runs.split(',') {
        if let Some((a, b)) = item.split_once('-') {
            let a = a
                .parse::<u32>()
                .map_err(|_| Error::with_message(ErrorCode::Corrupt, "bad run list"))?;
            let b = b
                .parse::<u32>()
                .map_err(|_| Error::with_message(ErrorCode::Corrupt, "bad run list"))?;
            if b < a + 2 {
                return Err(Error::with_message(ErrorCode::Corrupt, "non-canonical run"));
            }
            if let Some(&last) = out.last() {
                if a <= last {
                    return Err(Error::with_message(ErrorCode::Corrupt, "run list not ascending"));
                }
            }
            out.extend(a..=b);
        } else {
            let n = item
                .parse::<u32>()
                .map_err(|_| Error::with_message(ErrorCode::Corrupt, "bad run list"))?;
            if let Some(&last) = out.last() {
                if n <= last {
                    return Err(Error::with_message(ErrorCode::Corrupt, "run list not ascending"));
                }
            }
            out.push(n);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_round_trip() {
        let v = compose_standard("add", 1, 7, "int add(int x, int y) { return x + y; }");
        let r = parse_standard(&v).unwrap();
        assert_eq!(r.name, "add");
        assert_eq!(r.lineno, 1);
        assert_eq!(r.fid, 7);
        assert_eq!(r.image, "int add(int x, int y) { return x + y; }");
    }

    #[test]
    fn test_image_may_contain_spaces() {
        let r = parse_standard("f 10 3 a b  c").unwrap();
        assert_eq!(r.image, "a b  c");
    }

    #[test]
    fn test_compact_key_round_trip() {
        let k = compact_key("vec::push", 12);
        assert_eq!(parse_compact_key(&k).unwrap(), ("vec::push".to_string(), 12));
    }

    #[test]
    fn test_compress_runs() {
        assert_eq!(compress_runs(&[17, 19, 20, 21, 28]), "17,19-21,28");
        assert_eq!(compress_runs(&[1, 2]), "1,2");
        assert_eq!(compress_runs(&[1, 2, 3, 5, 6, 9]), "1-3,5,6,9");
        assert_eq!(compress_runs(&[4]), "4");
        assert_eq!(compress_runs(&[]), "");
    }

    #[test]
    fn test_expand_runs_round_trip() {
        for lines in [
            vec![17, 19, 20, 21, 28],
            vec![1, 2],
            vec![1, 2, 3, 5, 6, 9],
            vec![4],
        ] {
            assert_eq!(expand_runs(&compress_runs(&lines)).unwrap(), lines);
        }
    }

    #[test]
    fn test_expand_rejects_non_canonical() {
        assert!(expand_runs("5,4").is_err());
        assert!(expand_runs("1-2").is_err());
        assert!(expand_runs("3-3").is_err());
        assert!(expand_runs("x").is_err());
    }

    #[test]
    fn test_flagged_values() {
        let raw = encode_flagged("42", Some(b's'));
        assert_eq!(decode_flagged(&raw), ("42".to_string(), Some(b's')));
        let raw = encode_flagged("plain", None);
        assert_eq!(decode_flagged(&raw), ("plain".to_string(), None));
    }
}
