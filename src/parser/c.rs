//! C and Yacc parser: a state machine over the token stream that emits
//! definition and reference events.

use crate::error::{Error, ErrorCode, Result};
use crate::types::{ParserFlags, TagKind};

use super::preproc::{
    condition_macro, enumerator_list, handle_include, process_attribute, put_tag, BlockState,
};
use super::reserved::{c_reserved_word, Res};
use super::tokenizer::{Tok, TokMode, Tokenizer};
use super::ParserParam;

const INTERESTED: &str = "{}=;";

/// Identifiers that never count against function-definition detection.
/// `__THROW` and friends appear between the argument list and the
/// terminating `;` of glibc declarations.
const FUNC_SKIP_WORDS: [&str; 3] = ["__THROW", "__wur", "__nonnull"];

#[derive(Clone, Copy, PartialEq, Eq)]
enum SourceType {
    C,
    Yacc,
}

/// Yacc input runs declarations, `%%`, rules, `%%`, programs.
#[derive(Clone, Copy, PartialEq, Eq)]
enum YaccStatus {
    Declarations,
    Rules,
    Programs,
}

/// Read a C file and pick up tag entries.
pub fn parse_c(param: &mut ParserParam) -> Result<()> {
    c_family(param, SourceType::C)
}

/// Read a Yacc file and pick up tag entries.
pub fn parse_yacc(param: &mut ParserParam) -> Result<()> {
    c_family(param, SourceType::Yacc)
}

fn c_family(param: &mut ParserParam, srctype: SourceType) -> Result<()> {
    let rw = c_reserved_word;
    let mut t = Tokenizer::open(param.abspath).map_err(|e| {
        Error::with_message(ErrorCode::Parse, format!("'{}' cannot open: {}", param.path, e))
    })?;
    t.mode |= TokMode::C_MODE;
    t.crflag = true;
    if srctype == SourceType::Yacc {
        t.mode |= TokMode::Y_MODE;
    }

    let mut st = BlockState::new();
    let mut externclevel = 0i32;
    let mut yaccstatus = if srctype == SourceType::Yacc {
        YaccStatus::Declarations
    } else {
        YaccStatus::Programs
    };
    let mut in_c = srctype == SourceType::C;
    let mut savelevel = -1i32;
    let mut startmacro = false;
    let warning = param.flags.contains(ParserFlags::WARNING);

    loop {
        let cc = t.next_token(Some(INTERESTED), Some(rw));
        if cc == Tok::Eof {
            break;
        }
        match cc {
            Tok::Symbol => {
                let nextch = t.peek_char(false);
                if in_c && nextch == Some(b'(') {
                    if param.cb.is_not_function(t.token()) {
                        let (lineno, image) = (t.lineno(), t.line_image().to_string());
                        put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                    } else if st.level > 0 || startmacro {
                        let (lineno, image) = (t.lineno(), t.line_image().to_string());
                        put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                    } else {
                        let savelineno = t.lineno();
                        let savetoken = t.token().to_string();
                        let saveline = t.line_image().to_string();
                        let mut arg1 = String::new();
                        if function_definition(param, &mut t, &mut st, &mut arg1)? {
                            // guile-snarf entries name the function in the
                            // first SCM_DEFINE argument
                            let name = if savetoken == "SCM_DEFINE" && !arg1.is_empty() {
                                arg1.as_str()
                            } else {
                                savetoken.as_str()
                            };
                            put_tag(param, &st, TagKind::Def, name, savelineno, &saveline);
                        } else {
                            put_tag(param, &st, TagKind::RefSym, &savetoken, savelineno, &saveline);
                        }
                    }
                } else if in_c && nextch == Some(b'=') && st.level == 0 && !startmacro {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::Def, t.token(), lineno, &image);
                } else {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                }
            }
            Tok::Ch(b'{') => {
                if yaccstatus == YaccStatus::Rules && st.level == 0 {
                    in_c = true;
                }
                st.level += 1;
                if param.flags.contains(ParserFlags::BEGIN_BLOCK) && t.cp_at_first() {
                    if warning && st.level != 1 {
                        log::warn!(
                            "forced level 1 block start by '{{' at column 0 [+{} {}].",
                            t.lineno(),
                            param.path
                        );
                    }
                    st.level = 1;
                }
            }
            Tok::Ch(b'}') => {
                st.level -= 1;
                if st.level < 0 {
                    if externclevel > 0 {
                        externclevel -= 1;
                    } else if warning {
                        log::warn!("missing left '{{' [+{} {}].", t.lineno(), param.path);
                    }
                    st.level = 0;
                }
                if param.flags.contains(ParserFlags::END_BLOCK) && t.cp_at_first() {
                    if warning && st.level != 0 {
                        log::warn!(
                            "forced level 0 block end by '}}' at column 0 [+{} {}].",
                            t.lineno(),
                            param.path
                        );
                    }
                    st.level = 0;
                }
                if yaccstatus == YaccStatus::Rules && st.level == 0 {
                    in_c = false;
                }
            }
            Tok::Newline => {
                if startmacro && st.level != savelevel {
                    if warning {
                        log::warn!(
                            "different level before and after #define macro. reseted. [+{} {}].",
                            t.lineno(),
                            param.path
                        );
                    }
                    st.level = savelevel;
                }
                startmacro = false;
            }
            Tok::Res(Res::YaccSep) => {
                if st.level != 0 {
                    if warning {
                        log::warn!(
                            "forced level 0 block end by '%%' [+{} {}].",
                            t.lineno(),
                            param.path
                        );
                    }
                    st.level = 0;
                }
                match yaccstatus {
                    YaccStatus::Declarations => {
                        let (lineno, image) = (t.lineno(), t.line_image().to_string());
                        put_tag(param, &st, TagKind::Def, "yyparse", lineno, &image);
                        yaccstatus = YaccStatus::Rules;
                    }
                    YaccStatus::Rules => yaccstatus = YaccStatus::Programs,
                    YaccStatus::Programs => {}
                }
                in_c = yaccstatus == YaccStatus::Programs;
            }
            Tok::Res(Res::YaccBegin) => {
                if st.level != 0 {
                    if warning {
                        log::warn!(
                            "forced level 0 block end by '%%{{' [+{} {}].",
                            t.lineno(),
                            param.path
                        );
                    }
                    st.level = 0;
                }
                if in_c && warning {
                    log::warn!("'%%{{' appeared in C mode. [+{} {}].", t.lineno(), param.path);
                }
                in_c = true;
            }
            Tok::Res(Res::YaccEnd) => {
                if st.level != 0 {
                    if warning {
                        log::warn!(
                            "forced level 0 block end by '%%}}' [+{} {}].",
                            t.lineno(),
                            param.path
                        );
                    }
                    st.level = 0;
                }
                if !in_c && warning {
                    log::warn!("'%%}}' appeared in Yacc mode. [+{} {}].", t.lineno(), param.path);
                }
                in_c = false;
            }
            Tok::Res(Res::YaccUnion) => {
                if yaccstatus == YaccStatus::Declarations {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::Def, "YYSTYPE", lineno, &image);
                }
            }
            Tok::Res(Res::SharpDefine) | Tok::Res(Res::SharpUndef) => {
                startmacro = true;
                savelevel = st.level;
                let c = t.next_token(Some(INTERESTED), Some(rw));
                if c != Tok::Symbol {
                    t.pushback_token();
                } else if t.peek_char(true) == Some(b'(') {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::Def, t.token(), lineno, &image);
                    loop {
                        match t.next_token(Some("()"), Some(rw)) {
                            Tok::Eof | Tok::Ch(b')') => break,
                            Tok::Newline => {
                                t.pushback_token();
                                break;
                            }
                            Tok::Symbol => {
                                let (lineno, image) = (t.lineno(), t.line_image().to_string());
                                put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                            }
                            _ => {}
                        }
                    }
                } else {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::Def, t.token(), lineno, &image);
                }
            }
            Tok::Res(r) if r.is_sharp_include() => {
                handle_include(param, &mut t, rw)?;
            }
            Tok::Res(r) if r.is_sharp_skipline() => loop {
                match t.next_token(Some(INTERESTED), Some(rw)) {
                    Tok::Eof | Tok::Newline => break,
                    _ => {}
                }
            },
            Tok::Res(r) if r.is_sharp_cond() => {
                condition_macro(param, &mut t, &mut st, r, rw)?;
            }
            Tok::Res(Res::SharpSharp) => {
                // token paste: swallow the right operand
                t.next_token(Some(INTERESTED), Some(rw));
            }
            Tok::Res(Res::Extern) => {
                if t.peek_char(false) == Some(b'"') {
                    // 'extern "C"' block is a kind of namespace block and
                    // has no influence on the brace level.
                    let mut c = t.next_token(Some(INTERESTED), Some(rw));
                    while c == Tok::Newline {
                        c = t.next_token(Some(INTERESTED), Some(rw));
                    }
                    if c == Tok::Ch(b'{') {
                        externclevel += 1;
                    } else {
                        t.pushback_token();
                    }
                }
            }
            Tok::Res(res @ (Res::Struct | Res::Enum | Res::Union)) => {
                let mut c = loop {
                    let c = t.next_token(Some(INTERESTED), Some(rw));
                    if c == Tok::Res(Res::Attribute) {
                        process_attribute(param, &mut t, &st, rw)?;
                        continue;
                    }
                    break c;
                };
                while c == Tok::Newline {
                    c = t.next_token(Some(INTERESTED), Some(rw));
                }
                if c == Tok::Symbol {
                    let kind = if t.peek_char(false) == Some(b'{') {
                        TagKind::Def
                    } else {
                        TagKind::RefSym
                    };
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, kind, t.token(), lineno, &image);
                    c = t.next_token(Some(INTERESTED), Some(rw));
                }
                while c == Tok::Newline {
                    c = t.next_token(Some(INTERESTED), Some(rw));
                }
                if c == Tok::Ch(b'{') && res == Res::Enum {
                    enumerator_list(param, &mut t, &mut st, rw)?;
                } else {
                    t.pushback_token();
                }
            }
            Tok::Res(r) if r.is_control() => {
                if warning && !startmacro && st.level == 0 {
                    log::warn!(
                        "Out of function. {:>8} [+{} {}]",
                        t.token(),
                        t.lineno(),
                        param.path
                    );
                }
            }
            Tok::Res(Res::Typedef) => {
                typedef_block(param, &mut t, &mut st, warning)?;
            }
            Tok::Res(Res::Attribute) => {
                process_attribute(param, &mut t, &st, rw)?;
            }
            _ => {}
        }
    }
    if warning {
        if st.level != 0 {
            log::warn!(
                "unmatched {{}} block. (last at level {}.)[+{} {}]",
                st.level,
                t.lineno(),
                param.path
            );
        }
        if !st.ifstack.is_empty() {
            log::warn!(
                "unmatched #if block. (last at level {}.)[+{} {}]",
                st.ifstack.len(),
                t.lineno(),
                param.path
            );
        }
    }
    Ok(())
}

/// Walk a `typedef` down to its terminating `;`, emitting the defined
/// names and referencing everything at deeper nesting.
fn typedef_block(
    param: &mut ParserParam,
    t: &mut Tokenizer,
    st: &mut BlockState,
    warning: bool,
) -> Result<()> {
    let rw = c_reserved_word;
    let typedef_savelevel = st.level;
    let mut savetoken = String::new();
    let mut savelineno = 0u32;

    // skip type qualifiers
    let mut c;
    loop {
        c = t.next_token(Some("{}(),;"), Some(rw));
        match c {
            Tok::Res(Res::Const) | Tok::Res(Res::Restrict) | Tok::Res(Res::Volatile)
            | Tok::Newline => {}
            _ => break,
        }
    }

    if c == Tok::Eof {
        if warning {
            log::warn!("unexpected eof. [+{} {}]", t.lineno(), param.path);
        }
        return Ok(());
    } else if let Tok::Res(res @ (Res::Enum | Res::Struct | Res::Union)) = c {
        let interest_enum = "{},;";
        c = loop {
            let c = t.next_token(Some(interest_enum), Some(rw));
            if c == Tok::Res(Res::Attribute) {
                process_attribute(param, t, st, rw)?;
                continue;
            }
            break c;
        };
        while c == Tok::Newline {
            c = t.next_token(Some(interest_enum), Some(rw));
        }
        // read tag name if present
        if c == Tok::Symbol {
            let kind = if t.peek_char(false) == Some(b'{') {
                TagKind::Def
            } else {
                TagKind::RefSym
            };
            let (lineno, image) = (t.lineno(), t.line_image().to_string());
            put_tag(param, st, kind, t.token(), lineno, &image);
            c = t.next_token(Some(interest_enum), Some(rw));
        }
        while c == Tok::Newline {
            c = t.next_token(Some(interest_enum), Some(rw));
        }
        if res == Res::Enum {
            if c == Tok::Ch(b'{') {
                c = enumerator_list(param, t, st, rw)?;
            } else {
                t.pushback_token();
            }
        } else {
            loop {
                if c == Tok::Eof {
                    break;
                }
                if let Tok::Res(r) = c {
                    if r.is_sharp_cond() {
                        condition_macro(param, t, st, r, rw)?;
                        c = t.next_token(Some(interest_enum), Some(rw));
                        continue;
                    }
                }
                match c {
                    Tok::Ch(b';') if st.level == typedef_savelevel => {
                        if !savetoken.is_empty() {
                            let image = t.line_image().to_string();
                            put_tag(param, st, TagKind::Def, &savetoken, savelineno, &image);
                            savetoken.clear();
                        }
                        break;
                    }
                    Tok::Ch(b'{') => st.level += 1,
                    Tok::Ch(b'}') => {
                        savetoken.clear();
                        st.level -= 1;
                        if st.level == typedef_savelevel {
                            break;
                        }
                    }
                    Tok::Symbol => {
                        if st.level > typedef_savelevel {
                            let (lineno, image) = (t.lineno(), t.line_image().to_string());
                            put_tag(param, st, TagKind::RefSym, t.token(), lineno, &image);
                        }
                        savetoken = t.token().to_string();
                        savelineno = t.lineno();
                    }
                    _ => {}
                }
                c = t.next_token(Some(interest_enum), Some(rw));
            }
            if c == Tok::Ch(b';') {
                // the body scan already saw the terminating ';'
                return Ok(());
            }
        }
        if c == Tok::Eof {
            if warning {
                log::warn!("unexpected eof. [+{} {}]", t.lineno(), param.path);
            }
            return Ok(());
        }
    } else if c == Tok::Symbol {
        let (lineno, image) = (t.lineno(), t.line_image().to_string());
        put_tag(param, st, TagKind::RefSym, t.token(), lineno, &image);
    }

    // declarator list: the last name before each ',' or the final ';'
    // is the typedef'd name
    savetoken.clear();
    let mut expect_funcptr = false;
    loop {
        c = t.next_token(Some("(),;*"), Some(rw));
        if c == Tok::Eof {
            break;
        }
        if let Tok::Res(r) = c {
            if r.is_sharp_cond() {
                condition_macro(param, t, st, r, rw)?;
                continue;
            }
        }
        if c != Tok::Symbol {
            expect_funcptr = false;
        }
        match c {
            Tok::Ch(b'(') => st.level += 1,
            Tok::Ch(b')') => st.level -= 1,
            Tok::Symbol => {
                if st.level > typedef_savelevel {
                    let kind = if expect_funcptr {
                        TagKind::Def
                    } else {
                        TagKind::RefSym
                    };
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, st, kind, t.token(), lineno, &image);
                } else {
                    if !savetoken.is_empty() {
                        let image = t.line_image().to_string();
                        put_tag(param, st, TagKind::RefSym, &savetoken, savelineno, &image);
                    }
                    savetoken = t.token().to_string();
                    savelineno = t.lineno();
                }
            }
            Tok::Ch(b',') | Tok::Ch(b';') => {
                if !savetoken.is_empty() {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, st, TagKind::Def, &savetoken, lineno, &image);
                    savetoken.clear();
                }
            }
            Tok::Ch(b'*') => expect_funcptr = true,
            _ => {}
        }
        if st.level == typedef_savelevel && c == Tok::Ch(b';') {
            break;
        }
    }
    if warning {
        if c == Tok::Eof {
            log::warn!("unexpected eof. [+{} {}]", t.lineno(), param.path);
        } else if st.level != typedef_savelevel {
            log::warn!(
                "unmatched () block. (last at level {}.)[+{} {}]",
                st.level,
                t.lineno(),
                param.path
            );
        }
    }
    Ok(())
}

/// Decide whether the symbol just seen starts a function definition.
///
/// Walks the argument list (emitting parameter references and memoizing
/// the argument names), then looks past attributes and preprocessor
/// conditionals for a `{` (definition) or a `;`/`,`/`=` (declaration).
/// K&R-style parameter declarations count toward the argument names
/// collected from the list.
fn function_definition(
    param: &mut ParserParam,
    t: &mut Tokenizer,
    st: &mut BlockState,
    arg1: &mut String,
) -> Result<bool> {
    let rw = c_reserved_word;
    let mut args: Vec<String> = Vec::new();
    let mut brace_level = 0i32;
    let mut accept_arg1 = false;
    loop {
        let c = t.next_token(Some("()"), Some(rw));
        match c {
            Tok::Eof => return Ok(false),
            Tok::Res(r) if r.is_sharp_cond() => {
                condition_macro(param, t, st, r, rw)?;
                continue;
            }
            Tok::Ch(b'(') => brace_level += 1,
            Tok::Ch(b')') => {
                brace_level -= 1;
                if brace_level == 0 {
                    break;
                }
            }
            Tok::Symbol => {
                if !accept_arg1 {
                    accept_arg1 = true;
                    *arg1 = t.token().to_string();
                }
                let (lineno, image) = (t.lineno(), t.line_image().to_string());
                put_tag(param, st, TagKind::RefSym, t.token(), lineno, &image);
                if brace_level > 0 {
                    let nextc = t.peek_char(false);
                    if nextc == Some(b',') || nextc == Some(b')') {
                        args.push(t.token().to_string());
                    }
                }
            }
            _ => {}
        }
    }
    let mut brace_level = 0i32;
    let mut found_args = 0usize;
    let mut unknown_symbols = 0usize;
    loop {
        let c = t.next_token(Some(",;[](){}="), Some(rw));
        match c {
            Tok::Eof => break,
            Tok::Res(r) if r.is_sharp_cond() => {
                condition_macro(param, t, st, r, rw)?;
                continue;
            }
            Tok::Res(Res::Attribute) => {
                process_attribute(param, t, st, rw)?;
                continue;
            }
            Tok::Res(Res::SharpDefine) => {
                t.pushback_token();
                return Ok(false);
            }
            Tok::Ch(b'(') | Tok::Ch(b'[') => brace_level += 1,
            Tok::Ch(b')') | Tok::Ch(b']') => brace_level -= 1,
            Tok::Ch(b';') | Tok::Ch(b',') => {
                if found_args == 0 && unknown_symbols <= 1 {
                    break;
                }
                if found_args == args.len() {
                    // every symbol matched an argument name: K&R definition
                    return Ok(true);
                }
            }
            Tok::Ch(b'{') => {
                t.pushback_token();
                return Ok(true);
            }
            Tok::Ch(b'}') => {
                t.pushback_token();
                break;
            }
            Tok::Ch(b'=') => break,
            Tok::Symbol => {
                let (lineno, image) = (t.lineno(), t.line_image().to_string());
                put_tag(param, st, TagKind::RefSym, t.token(), lineno, &image);
                if brace_level == 0 && !FUNC_SKIP_WORDS.contains(&t.token()) {
                    if args.iter().any(|a| a == t.token()) {
                        found_args += 1;
                    } else {
                        unknown_symbols += 1;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use std::io::Write;
    use std::path::PathBuf;

    struct Collector {
        events: Vec<(TagKind, String, u32)>,
    }

    impl super::super::ParserCallback for Collector {
        fn put(&mut self, kind: TagKind, tag: &str, lineno: u32, _image: &str) {
            self.events.push((kind, tag.to_string(), lineno));
        }
    }

    fn run(name: &str, src: &str) -> Vec<(TagKind, String, u32)> {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(src.as_bytes()).unwrap();
        drop(f);
        let mut cb = Collector { events: Vec::new() };
        let mut param = ParserParam {
            path: name,
            abspath: &path,
            flags: ParserFlags::empty(),
            cb: &mut cb,
        };
        parse_file(&mut param).unwrap();
        cb.events
    }

    fn defs(events: &[(TagKind, String, u32)]) -> Vec<(String, u32)> {
        events
            .iter()
            .filter(|(k, _, _)| *k == TagKind::Def)
            .map(|(_, n, l)| (n.clone(), *l))
            .collect()
    }

    fn refs(events: &[(TagKind, String, u32)]) -> Vec<(String, u32)> {
        events
            .iter()
            .filter(|(k, _, _)| *k == TagKind::RefSym)
            .map(|(_, n, l)| (n.clone(), *l))
            .collect()
    }

    #[test]
    fn test_simple_function_definition() {
        let ev = run("a.c", "int add(int x, int y) { return x + y; }\n");
        assert_eq!(defs(&ev), vec![("add".to_string(), 1)]);
        let r = refs(&ev);
        assert!(r.contains(&("x".to_string(), 1)));
        assert!(r.contains(&("y".to_string(), 1)));
    }

    #[test]
    fn test_declaration_is_reference() {
        let ev = run("a.c", "int add(int x, int y);\n");
        assert!(defs(&ev).is_empty());
        assert!(refs(&ev).contains(&("add".to_string(), 1)));
    }

    #[test]
    fn test_kr_style_definition() {
        let ev = run("a.c", "int add(x, y)\nint x;\nint y;\n{ return x + y; }\n");
        assert_eq!(defs(&ev), vec![("add".to_string(), 1)]);
    }

    #[test]
    fn test_glibc_declaration_with_throw() {
        let ev = run("a.c", "extern int chown(const char *f, int o) __THROW __wur;\n");
        assert!(defs(&ev).is_empty());
        assert!(refs(&ev).contains(&("chown".to_string(), 1)));
    }

    #[test]
    fn test_if0_region_hides_definitions() {
        let ev = run("a.c", "#if 0\nvoid dead() {}\n#endif\nint live() { return 0; }\n");
        assert_eq!(defs(&ev), vec![("live".to_string(), 4)]);
    }

    #[test]
    fn test_if0_restores_brace_level() {
        // The #if 0 arm opens a brace it never closes; the #endif must
        // restore the level so `after` is still seen at level 0.
        let src = "#if 0\nvoid broken() {\n#endif\nint after(int v) { return v; }\n";
        let ev = run("a.c", src);
        assert_eq!(defs(&ev), vec![("after".to_string(), 4)]);
    }

    #[test]
    fn test_define_macros() {
        let ev = run(
            "a.c",
            "#define MAX 10\n#define MIN(a, b) ((a) < (b) ? (a) : (b))\n#undef MAX\n",
        );
        assert_eq!(
            defs(&ev),
            vec![
                ("MAX".to_string(), 1),
                ("MIN".to_string(), 2),
                ("MAX".to_string(), 3)
            ]
        );
        let r = refs(&ev);
        assert!(r.contains(&("a".to_string(), 2)));
        assert!(r.contains(&("b".to_string(), 2)));
    }

    #[test]
    fn test_struct_and_enum() {
        let src = "struct point { int x; int y; };\nenum color { RED, GREEN = RED + 1, BLUE };\nstruct point p;\n";
        let ev = run("a.c", src);
        let d = defs(&ev);
        assert!(d.contains(&("point".to_string(), 1)));
        assert!(d.contains(&("RED".to_string(), 2)));
        assert!(d.contains(&("GREEN".to_string(), 2)));
        assert!(d.contains(&("BLUE".to_string(), 2)));
        let r = refs(&ev);
        // RED in the GREEN initializer is a reference.
        assert!(r.contains(&("RED".to_string(), 2)));
        // `struct point p;` references the tag.
        assert!(r.contains(&("point".to_string(), 3)));
    }

    #[test]
    fn test_typedef_struct() {
        let ev = run("a.c", "typedef struct S { int f; } S;\n");
        let d = defs(&ev);
        // The struct tag and the typedef name, both S on line 1.
        assert_eq!(d.iter().filter(|(n, l)| n == "S" && *l == 1).count(), 2);
        assert!(refs(&ev).contains(&("f".to_string(), 1)));
    }

    #[test]
    fn test_typedef_plain_and_funcptr() {
        let ev = run(
            "a.c",
            "typedef unsigned long ulong_t;\ntypedef int (*handler_t)(int sig);\n",
        );
        let d = defs(&ev);
        assert!(d.contains(&("ulong_t".to_string(), 1)));
        assert!(d.contains(&("handler_t".to_string(), 2)));
    }

    #[test]
    fn test_extern_c_block_keeps_level() {
        let src = "extern \"C\" {\nint f(void) { return 0; }\n}\n";
        let ev = run("a.c", src);
        assert_eq!(defs(&ev), vec![("f".to_string(), 2)]);
    }

    #[test]
    fn test_global_assignment_is_definition() {
        let ev = run("a.c", "int counter = 0;\n");
        assert!(defs(&ev).contains(&("counter".to_string(), 1)));
    }

    #[test]
    fn test_scm_define_uses_first_argument() {
        let src = "SCM_DEFINE (scm_list, \"list\", 0, 0, 1,\n (SCM objs),\n \"doc\")\n{\n return objs;\n}\n";
        let ev = run("a.c", src);
        assert!(defs(&ev).contains(&("scm_list".to_string(), 1)));
    }

    #[test]
    fn test_yacc_sections() {
        let src = "%{\n#include \"x.h\"\n%}\n%token WORD\n%%\nline : WORD { act(); } ;\n%%\nint helper(void) { return 1; }\n";
        let ev = run("g.y", src);
        let d = defs(&ev);
        assert!(d.contains(&("yyparse".to_string(), 5)));
        assert!(d.contains(&("helper".to_string(), 8)));
    }

    #[test]
    fn test_yacc_union() {
        let src = "%union {\n int ival;\n}\n%%\nrule : ;\n%%\n";
        let ev = run("g.y", src);
        assert!(defs(&ev).contains(&("YYSTYPE".to_string(), 1)));
    }

    #[test]
    fn test_conditional_symbols_are_references() {
        let ev = run(
            "a.c",
            "#ifdef HAVE_CONFIG_H\n#endif\n#if defined(FOO) || BAR\n#endif\n",
        );
        let r = refs(&ev);
        assert!(r.contains(&("HAVE_CONFIG_H".to_string(), 1)));
        assert!(r.contains(&("FOO".to_string(), 3)));
        assert!(r.contains(&("BAR".to_string(), 3)));
        assert!(!r.iter().any(|(n, _)| n == "defined"));
    }

    #[test]
    fn test_include_callback() {
        struct IncCollector {
            includes: Vec<String>,
        }
        impl super::super::ParserCallback for IncCollector {
            fn put(&mut self, _: TagKind, _: &str, _: u32, _: &str) {}
            fn on_include(&mut self, target: &str) -> Result<()> {
                self.includes.push(target.to_string());
                Ok(())
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.c");
        std::fs::write(&path, "#include \"local.h\"\n#include <stdio.h>\n").unwrap();
        let mut cb = IncCollector {
            includes: Vec::new(),
        };
        let mut param = ParserParam {
            path: "a.c",
            abspath: &path,
            flags: ParserFlags::empty(),
            cb: &mut cb,
        };
        parse_file(&mut param).unwrap();
        assert_eq!(
            cb.includes,
            vec!["local.h".to_string(), "stdio.h".to_string()]
        );
    }
}
