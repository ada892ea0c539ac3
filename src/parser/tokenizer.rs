//! Stream lexer for the C-family parsers.
//!
//! The tokenizer works line by line: a newline is delivered as a token
//! only when `crflag` is set (the parsers use it to spot the end of a
//! `#define`), backslash-newline is transparent continuation, comments
//! and quoted literals are consumed at the character layer, and a `#`
//! (or `%` in Yacc mode) at the first non-blank column glues onto the
//! following word to form a directive token. A single-quoted literal
//! that crosses a newline terminates at the newline; this is forgiving
//! by design, not the C standard.
//!
//! Individual operations can be overridden through [`TokenizerOps`], a
//! capability table supplied at open; absent entries fall back to the
//! built-in implementations.

use std::fs;
use std::path::Path;

use bitflags::bitflags;

use crate::error::Result;
use crate::types::IDENT_MAX;

use super::reserved::Res;

bitflags! {
    /// Lexing mode bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TokMode: u8 {
        /// Recognize `#xxx` directive tokens
        const C_MODE = 0x01;
        /// Recognize `::`
        const CPP_MODE = 0x02;
        /// Recognize `%xxx` Yacc markers
        const Y_MODE = 0x04;
    }
}

/// A lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tok {
    Eof,
    /// Returned only when `crflag` is set
    Newline,
    /// Identifier; text available via [`Tokenizer::token`]
    Symbol,
    /// Single special character
    Ch(u8),
    /// Reserved word
    Res(Res),
}

/// Per-language reserved-word classifier.
pub type ReservedFn = fn(&str) -> Option<Res>;

/// Optional overrides for individual lexer operations.
#[derive(Default)]
pub struct TokenizerOps {
    pub next_token: Option<fn(&mut Tokenizer, Option<&str>, Option<ReservedFn>) -> Tok>,
    pub next_char: Option<fn(&mut Tokenizer) -> Option<u8>>,
    pub peek_char: Option<fn(&mut Tokenizer, bool) -> Option<u8>>,
    pub pushback_char: Option<fn(&mut Tokenizer)>,
    pub pushback_token: Option<fn(&mut Tokenizer)>,
    pub skip_next: Option<fn(&mut Tokenizer, usize)>,
    pub expect_charset: Option<fn(&mut Tokenizer, &str, &mut String) -> Tok>,
}

/// The lexer state for one source file.
pub struct Tokenizer {
    path: String,
    lines: Vec<String>,
    /// Current line index; valid once `started`.
    li: usize,
    /// Byte position in the current line.
    pos: usize,
    /// A line is loaded and its virtual newline not yet delivered.
    line_active: bool,
    next_li: usize,
    started: bool,
    eof: bool,
    token: String,
    ptoken: String,
    pushed: bool,
    lasttoken: Tok,
    pub crflag: bool,
    pub mode: TokMode,
    continued_line: bool,
    ops: TokenizerOps,
}

impl Tokenizer {
    pub fn open(path: &Path) -> Result<Tokenizer> {
        Self::open_with_ops(path, TokenizerOps::default())
    }

    pub fn open_with_ops(path: &Path, ops: TokenizerOps) -> Result<Tokenizer> {
        let raw = fs::read(path)?;
        let text = String::from_utf8_lossy(&raw);
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();
        if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }
        Ok(Tokenizer {
            path: path.display().to_string(),
            lines,
            li: 0,
            pos: 0,
            line_active: false,
            next_li: 0,
            started: false,
            eof: false,
            token: String::new(),
            ptoken: String::new(),
            pushed: false,
            lasttoken: Tok::Eof,
            crflag: false,
            mode: TokMode::empty(),
            continued_line: false,
            ops,
        })
    }

    /// Text of the last symbol or glued token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// 1-based line number of the current position.
    pub fn lineno(&self) -> u32 {
        if self.started {
            self.li as u32 + 1
        } else {
            0
        }
    }

    /// The whole current source line (the tag line image).
    pub fn line_image(&self) -> &str {
        if self.started {
            &self.lines[self.li]
        } else {
            ""
        }
    }

    /// True when the last consumed character sat at column 0.
    pub fn cp_at_first(&self) -> bool {
        if !self.started {
            return false;
        }
        if self.line_active {
            self.pos == 1
        } else {
            self.lines[self.li].is_empty()
        }
    }

    /// True when only blanks precede the last consumed character.
    pub fn cp_at_first_nonspace(&self) -> bool {
        if !self.started {
            return false;
        }
        let bytes = self.lines[self.li].as_bytes();
        let end = if self.line_active {
            self.pos.saturating_sub(1)
        } else {
            bytes.len()
        };
        bytes[..end].iter().all(|b| b.is_ascii_whitespace())
    }

    // ------------------------------------------------------------------
    // Dispatching wrappers
    // ------------------------------------------------------------------

    pub fn next_token(&mut self, interested: Option<&str>, reserved: Option<ReservedFn>) -> Tok {
        if let Some(f) = self.ops.next_token {
            return f(self, interested, reserved);
        }
        self.next_token_default(interested, reserved)
    }

    pub fn next_char(&mut self) -> Option<u8> {
        if let Some(f) = self.ops.next_char {
            return f(self);
        }
        self.next_char_default()
    }

    pub fn peek_char(&mut self, immediate: bool) -> Option<u8> {
        if let Some(f) = self.ops.peek_char {
            return f(self, immediate);
        }
        self.peek_char_default(immediate)
    }

    pub fn pushback_char(&mut self) {
        if let Some(f) = self.ops.pushback_char {
            return f(self);
        }
        self.pushback_char_default()
    }

    /// Allow one token of lookahead; the next `next_token` re-delivers
    /// the current token.
    pub fn pushback_token(&mut self) {
        if let Some(f) = self.ops.pushback_token {
            return f(self);
        }
        self.pushed = true;
        self.ptoken = self.token.clone();
    }

    pub fn skip_next(&mut self, n: usize) {
        if let Some(f) = self.ops.skip_next {
            return f(self, n);
        }
        for _ in 0..n {
            self.next_char();
        }
    }

    /// Consume characters until one of `interested`, newline, or EOF,
    /// capturing everything else into `out`.
    pub fn expect_charset(&mut self, interested: &str, out: &mut String) -> Tok {
        if let Some(f) = self.ops.expect_charset {
            return f(self, interested, out);
        }
        self.expect_charset_default(interested, out)
    }

    // ------------------------------------------------------------------
    // Built-in implementations
    // ------------------------------------------------------------------

    fn next_char_default(&mut self) -> Option<u8> {
        if self.eof {
            return None;
        }
        if !self.line_active {
            if self.next_li >= self.lines.len() {
                self.eof = true;
                return None;
            }
            self.li = self.next_li;
            self.next_li += 1;
            self.pos = 0;
            self.line_active = true;
            self.started = true;
        }
        let bytes = self.lines[self.li].as_bytes();
        if self.pos >= bytes.len() {
            self.line_active = false;
            self.continued_line = false;
            Some(b'\n')
        } else {
            let c = bytes[self.pos];
            self.pos += 1;
            Some(c)
        }
    }

    fn pushback_char_default(&mut self) {
        if !self.started || self.eof {
            return;
        }
        if self.line_active {
            if self.pos > 0 {
                self.pos -= 1;
            }
        } else {
            // Undo the virtual newline.
            self.line_active = true;
            self.pos = self.lines[self.li].len();
        }
    }

    fn peek_char_default(&mut self, immediate: bool) -> Option<u8> {
        if self.eof {
            return None;
        }
        let mut scan = Scan {
            lines: &self.lines,
            li: self.li,
            pos: self.pos,
            active: self.line_active,
            next_li: self.next_li,
        };
        if immediate {
            return scan.next();
        }
        let mut c = scan.next()?;
        loop {
            if c.is_ascii_whitespace() {
                c = scan.next()?;
                continue;
            }
            if c == b'/' {
                match scan.next() {
                    Some(b'/') => {
                        loop {
                            match scan.next() {
                                None => return None,
                                Some(b'\n') => break,
                                Some(_) => {}
                            }
                        }
                        c = scan.next()?;
                        continue;
                    }
                    Some(b'*') => {
                        let mut prev_star = false;
                        loop {
                            match scan.next() {
                                None => return None,
                                Some(b'*') => prev_star = true,
                                Some(b'/') if prev_star => break,
                                Some(_) => prev_star = false,
                            }
                        }
                        c = scan.next()?;
                        continue;
                    }
                    _ => return Some(b'/'),
                }
            }
            return Some(c);
        }
    }

    fn expect_charset_default(&mut self, interested: &str, out: &mut String) -> Tok {
        out.clear();
        loop {
            match self.next_char() {
                None => {
                    self.lasttoken = Tok::Eof;
                    return Tok::Eof;
                }
                Some(b'\n') => {
                    self.lasttoken = Tok::Newline;
                    return Tok::Newline;
                }
                Some(c) if interested.as_bytes().contains(&c) => {
                    let tok = Tok::Ch(c);
                    self.lasttoken = tok;
                    return tok;
                }
                Some(c) => out.push(c as char),
            }
        }
    }

    fn next_token_default(&mut self, interested: Option<&str>, reserved: Option<ReservedFn>) -> Tok {
        if self.pushed {
            self.pushed = false;
            self.token = std::mem::take(&mut self.ptoken);
            return self.lasttoken;
        }
        let mut sharp = false;
        let mut percent = false;
        let tok = 'outer: loop {
            // skip spaces
            let mut c = self.next_char();
            if self.crflag {
                while matches!(c, Some(ch) if ch.is_ascii_whitespace() && ch != b'\n') {
                    c = self.next_char();
                }
            } else {
                while matches!(c, Some(ch) if ch.is_ascii_whitespace()) {
                    c = self.next_char();
                }
            }
            let Some(ch) = c else { break Tok::Eof };
            if ch == b'\n' {
                break Tok::Newline;
            }
            if ch == b'"' || ch == b'\'' {
                // quoted literal
                let quote = ch;
                loop {
                    match self.next_char() {
                        None => break,
                        Some(c2) if c2 == quote => break,
                        Some(b'\n') if quote == b'\'' => break,
                        Some(b'\\') => {
                            if self.next_char().is_none() {
                                break;
                            }
                        }
                        Some(_) => {}
                    }
                }
            } else if ch == b'/' {
                // comment or a plain slash
                match self.next_char() {
                    Some(b'/') => loop {
                        match self.next_char() {
                            None => break,
                            Some(b'\n') => {
                                self.pushback_char();
                                break;
                            }
                            Some(_) => {}
                        }
                    },
                    Some(b'*') => loop {
                        match self.next_char() {
                            None => break,
                            Some(b'*') => match self.next_char() {
                                Some(b'/') | None => break,
                                Some(_) => self.pushback_char(),
                            },
                            Some(_) => {}
                        }
                    },
                    Some(_) => self.pushback_char(),
                    None => {}
                }
            } else if ch == b'\\' {
                if self.next_char() == Some(b'\n') {
                    self.continued_line = true;
                }
            } else if ch.is_ascii_digit() {
                loop {
                    match self.next_char() {
                        Some(c2) if c2 == b'.' || c2.is_ascii_alphanumeric() => {}
                        _ => break,
                    }
                }
                self.pushback_char();
            } else if ch == b'#' && self.mode.contains(TokMode::C_MODE) {
                if self.peek_char(true) == Some(b'#') {
                    self.next_char();
                    self.token.clear();
                    self.token.push_str("##");
                    if let Some(f) = reserved {
                        if let Some(r) = f("##") {
                            break Tok::Res(r);
                        }
                    }
                    break Tok::Symbol;
                } else if !self.continued_line && self.cp_at_first_nonspace() {
                    sharp = true;
                    continue 'outer;
                } else {
                    match interested {
                        None => break Tok::Ch(ch),
                        Some(set) if set.as_bytes().contains(&ch) => break Tok::Ch(ch),
                        _ => {}
                    }
                }
            } else if ch == b':'
                && self.mode.contains(TokMode::CPP_MODE)
                && self.peek_char(true) == Some(b':')
            {
                self.next_char();
                self.token.clear();
                self.token.push_str("::");
                if let Some(f) = reserved {
                    if let Some(r) = f("::") {
                        break Tok::Res(r);
                    }
                }
                break Tok::Symbol;
            } else if ch == b'%' && self.mode.contains(TokMode::Y_MODE) {
                if self.cp_at_first() {
                    match self.peek_char(true) {
                        Some(c2 @ (b'%' | b'{' | b'}')) => {
                            self.next_char();
                            self.token.clear();
                            self.token.push('%');
                            self.token.push(c2 as char);
                            if let Some(f) = reserved {
                                let word = self.token.clone();
                                if let Some(r) = f(&word) {
                                    break Tok::Res(r);
                                }
                            }
                        }
                        Some(c2) if !c2.is_ascii_whitespace() => {
                            percent = true;
                            continue 'outer;
                        }
                        _ => {}
                    }
                }
            } else if ch >= 0x80 || ch.is_ascii_alphabetic() || ch == b'_' {
                // symbol
                let mut buf: Vec<u8> = Vec::with_capacity(16);
                if sharp {
                    sharp = false;
                    buf.push(b'#');
                } else if percent {
                    percent = false;
                    buf.push(b'%');
                } else if ch == b'L' {
                    let la = self.peek_char(true);
                    if la == Some(b'"') || la == Some(b'\'') {
                        // wide literal prefix
                        continue 'outer;
                    }
                }
                buf.push(ch);
                let mut overflow = false;
                loop {
                    match self.next_char() {
                        Some(c2) if c2 >= 0x80 || c2.is_ascii_alphanumeric() || c2 == b'_' => {
                            if buf.len() < IDENT_MAX {
                                buf.push(c2);
                            } else {
                                overflow = true;
                            }
                        }
                        Some(_) => {
                            self.pushback_char();
                            break;
                        }
                        None => break,
                    }
                }
                if overflow {
                    log::warn!(
                        "symbol name is too long. (Ignored) [+{} {}]",
                        self.lineno(),
                        self.path
                    );
                    self.token.clear();
                    continue 'outer;
                }
                self.token = String::from_utf8_lossy(&buf).into_owned();
                if let Some(f) = reserved {
                    if let Some(r) = f(&self.token) {
                        break Tok::Res(r);
                    }
                }
                break Tok::Symbol;
            } else {
                // special char
                match interested {
                    None => break Tok::Ch(ch),
                    Some(set) if set.as_bytes().contains(&ch) => break Tok::Ch(ch),
                    _ => {}
                }
            }
            sharp = false;
            percent = false;
        };
        self.lasttoken = tok;
        tok
    }
}

/// Non-consuming forward scanner used by lookahead.
struct Scan<'a> {
    lines: &'a [String],
    li: usize,
    pos: usize,
    active: bool,
    next_li: usize,
}

impl<'a> Scan<'a> {
    fn next(&mut self) -> Option<u8> {
        if !self.active {
            if self.next_li >= self.lines.len() {
                return None;
            }
            self.li = self.next_li;
            self.next_li += 1;
            self.pos = 0;
            self.active = true;
        }
        let bytes = self.lines[self.li].as_bytes();
        if self.pos >= bytes.len() {
            self.active = false;
            Some(b'\n')
        } else {
            let c = bytes[self.pos];
            self.pos += 1;
            Some(c)
        }
    }
}
