//! Preprocessor-conditional tracking and other machinery shared by the
//! C and C++ parsers.
//!
//! Each `#if`/`#ifdef`/`#ifndef` pushes `(start-level, end-level,
//! if0-only)`; `#endif` of an `#if 0`/`#if notdef` region restores the
//! brace level saved at the `#if`, so code that is only balanced under
//! one arm cannot skew the level. Uneven arms warn and reset.

use crate::error::{Error, ErrorCode, Result};
use crate::types::{ParserFlags, TagKind};

use super::reserved::Res;
use super::tokenizer::{ReservedFn, Tok, Tokenizer};
use super::ParserParam;

/// Depth limit of the conditional stack; exceeding it is fatal for the
/// file.
pub(crate) const MAX_PIF_STACK: usize = 100;

pub(crate) struct IfEntry {
    start: i32,
    /// Level observed at the first `#elif`/`#else`, -1 until then.
    end: i32,
    if0only: bool,
}

/// Brace level plus the conditional stack, shared by both language
/// parsers.
pub(crate) struct BlockState {
    pub ifstack: Vec<IfEntry>,
    pub level: i32,
}

impl BlockState {
    pub fn new() -> Self {
        BlockState {
            ifstack: Vec::new(),
            level: 0,
        }
    }

    /// True while any enclosing conditional is an `#if 0`/`#if notdef`
    /// arm; nothing in such a region is tagged.
    pub fn in_if0(&self) -> bool {
        self.ifstack.iter().any(|e| e.if0only)
    }
}

/// Emit a tag event unless the position is inside an `#if 0` region.
pub(crate) fn put_tag(
    param: &mut ParserParam,
    st: &BlockState,
    kind: TagKind,
    tag: &str,
    lineno: u32,
    image: &str,
) {
    if st.in_if0() {
        return;
    }
    param.cb.put(kind, tag, lineno, image);
}

/// Handle one `#if`-family directive and consume the rest of its line,
/// emitting references for the symbols in the condition.
pub(crate) fn condition_macro(
    param: &mut ParserParam,
    t: &mut Tokenizer,
    st: &mut BlockState,
    cc: Res,
    reserved: ReservedFn,
) -> Result<()> {
    if matches!(cc, Res::SharpIf | Res::SharpIfdef | Res::SharpIfndef) {
        if st.ifstack.len() >= MAX_PIF_STACK {
            return Err(Error::with_message(
                ErrorCode::Overflow,
                format!("#if stack over flow. [{}]", param.path),
            ));
        }
        let mut entry = IfEntry {
            start: st.level,
            end: -1,
            if0only: false,
        };
        if t.peek_char(false) == Some(b'0') {
            entry.if0only = true;
        } else {
            let c = t.next_token(None, Some(reserved));
            if c == Tok::Symbol && t.token() == "notdef" {
                entry.if0only = true;
            } else {
                t.pushback_token();
            }
        }
        st.ifstack.push(entry);
    } else if matches!(cc, Res::SharpElif | Res::SharpElse) {
        if let Some(top) = st.ifstack.last_mut() {
            if top.end == -1 {
                top.end = st.level;
            } else if top.end != st.level && param.flags.contains(ParserFlags::WARNING) {
                log::warn!("uneven level. [+{} {}]", t.lineno(), param.path);
            }
            st.level = top.start;
            top.if0only = false;
        }
    } else if cc == Res::SharpEndif {
        match st.ifstack.pop() {
            None => {
                if param.flags.contains(ParserFlags::WARNING) {
                    log::warn!("unmatched #if block. reseted. [+{} {}]", t.lineno(), param.path);
                }
            }
            Some(top) => {
                if top.if0only {
                    st.level = top.start;
                } else if top.end != -1 {
                    if top.end != st.level && param.flags.contains(ParserFlags::WARNING) {
                        log::warn!("uneven level. [+{} {}]", t.lineno(), param.path);
                    }
                    st.level = top.end;
                }
            }
        }
    }
    loop {
        match t.next_token(None, Some(reserved)) {
            Tok::Eof | Tok::Newline => break,
            Tok::Symbol => {
                if t.token() != "defined" {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, st, TagKind::RefSym, t.token(), lineno, &image);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Skip `__attribute__((...))`, picking up the symbols inside as
/// references.
pub(crate) fn process_attribute(
    param: &mut ParserParam,
    t: &mut Tokenizer,
    st: &BlockState,
    reserved: ReservedFn,
) -> Result<()> {
    let mut brace = 0i32;
    loop {
        match t.next_token(Some("()"), Some(reserved)) {
            Tok::Eof => break,
            Tok::Ch(b'(') => brace += 1,
            Tok::Ch(b')') => brace -= 1,
            Tok::Symbol => {
                let (lineno, image) = (t.lineno(), t.line_image().to_string());
                put_tag(param, st, TagKind::RefSym, t.token(), lineno, &image);
            }
            _ => {}
        }
        if brace == 0 {
            break;
        }
    }
    Ok(())
}

/// Walk `{ symbol (= expression), ... }`: enumerators are definitions,
/// expression symbols are references. Entered after the `{`.
pub(crate) fn enumerator_list(
    param: &mut ParserParam,
    t: &mut Tokenizer,
    st: &mut BlockState,
    reserved: ReservedFn,
) -> Result<Tok> {
    let savelevel = st.level;
    let mut in_expression = false;
    let mut c = Tok::Ch(b'{');
    loop {
        match c {
            Tok::Eof => return Ok(c),
            Tok::Res(r) if r.is_sharp_cond() => {
                condition_macro(param, t, st, r, reserved)?;
            }
            Tok::Symbol => {
                let kind = if in_expression {
                    TagKind::RefSym
                } else {
                    TagKind::Def
                };
                let (lineno, image) = (t.lineno(), t.line_image().to_string());
                put_tag(param, st, kind, t.token(), lineno, &image);
            }
            Tok::Ch(b'{') | Tok::Ch(b'(') => st.level += 1,
            Tok::Ch(b'}') | Tok::Ch(b')') => {
                st.level -= 1;
                if st.level == savelevel {
                    return Ok(c);
                }
            }
            Tok::Ch(b',') => {
                if st.level == savelevel + 1 {
                    in_expression = false;
                }
            }
            Tok::Ch(b'=') => in_expression = true,
            _ => {}
        }
        c = t.next_token(Some("{}(),="), Some(reserved));
    }
}

/// Read the target of an include-family directive and hand it to the
/// callback for pre-parsing, then skip the rest of the line.
pub(crate) fn handle_include(
    param: &mut ParserParam,
    t: &mut Tokenizer,
    reserved: ReservedFn,
) -> Result<()> {
    // Find the opening delimiter on this line, if any.
    let closing = loop {
        match t.next_char() {
            None | Some(b'\n') => {
                t.pushback_char();
                break None;
            }
            Some(b'"') => break Some("\""),
            Some(b'<') => break Some(">"),
            Some(c) if c.is_ascii_whitespace() => {}
            Some(_) => {
                // Computed include (`#include FOO`); nothing to resolve.
                break None;
            }
        }
    };
    if let Some(close) = closing {
        let mut target = String::new();
        if t.expect_charset(close, &mut target) == Tok::Ch(close.as_bytes()[0]) && !target.is_empty()
        {
            param.cb.on_include(&target)?;
        }
    }
    loop {
        match t.next_token(None, Some(reserved)) {
            Tok::Eof | Tok::Newline => break,
            _ => {}
        }
    }
    Ok(())
}
