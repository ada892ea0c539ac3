//! C++ parser: the C machine extended with a class-name stack,
//! namespace tracking, and the C++-only keywords.

use crate::error::{Error, ErrorCode, Result};
use crate::types::{ParserFlags, TagKind};

use super::preproc::{
    condition_macro, enumerator_list, handle_include, process_attribute, put_tag, BlockState,
};
use super::reserved::{cpp_reserved_word, Res};
use super::tokenizer::{Tok, TokMode, Tokenizer};
use super::ParserParam;

const INTERESTED: &str = "{}=;~";

/// Depth limit of the class stack.
const MAX_CLASS_STACK: usize = 100;

struct ClassFrame {
    name: String,
    level: i32,
}

/// Read a C++ file and pick up tag entries.
pub fn parse_cpp(param: &mut ParserParam) -> Result<()> {
    let rw = cpp_reserved_word;
    let mut t = Tokenizer::open(param.abspath).map_err(|e| {
        Error::with_message(ErrorCode::Parse, format!("'{}' cannot open: {}", param.path, e))
    })?;
    t.crflag = true;
    t.mode |= TokMode::C_MODE;
    t.mode |= TokMode::CPP_MODE;

    let mut st = BlockState::new();
    // Namespace and 'extern "C"' blocks do not affect the brace level;
    // this counter absorbs their closing braces.
    let mut namespacelevel = 0i32;
    let mut stack: Vec<ClassFrame> = vec![ClassFrame {
        name: String::new(),
        level: 0,
    }];
    let mut classname = String::new();
    let mut savelevel = -1i32;
    let mut startclass = false;
    let mut startthrow = false;
    let mut startmacro = false;
    let mut startequal = false;
    let warning = param.flags.contains(ParserFlags::WARNING);

    loop {
        let cc = t.next_token(Some(INTERESTED), Some(rw));
        if cc == Tok::Eof {
            break;
        }
        // destructor tilde at class scope
        if cc == Tok::Ch(b'~') && st.level == stack.last().map(|f| f.level).unwrap_or(0) {
            continue;
        }
        match cc {
            Tok::Symbol => {
                if startclass || startthrow {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                } else if t.peek_char(false) == Some(b'(') {
                    let class_level = stack.last().map(|f| f.level).unwrap_or(0);
                    if param.cb.is_not_function(t.token()) {
                        let (lineno, image) = (t.lineno(), t.line_image().to_string());
                        put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                    } else if st.level > class_level || startequal || startmacro {
                        let (lineno, image) = (t.lineno(), t.line_image().to_string());
                        put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                    } else {
                        let savelineno = t.lineno();
                        let savetok = t.token().to_string();
                        let saveline = t.line_image().to_string();
                        if function_definition(param, &mut t, &mut st)? {
                            // constructors are references to the class
                            let current = stack.last().map(|f| f.name.as_str()).unwrap_or("");
                            if savetok != current {
                                put_tag(param, &st, TagKind::Def, &savetok, savelineno, &saveline);
                            }
                        } else {
                            put_tag(param, &st, TagKind::RefSym, &savetok, savelineno, &saveline);
                        }
                    }
                } else {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                }
            }
            Tok::Res(Res::Using) => {
                t.crflag = false;
                // using namespace name;  |  using name = ...;  |  using name;
                let c = t.next_token(Some(INTERESTED), Some(rw));
                if c == Tok::Res(Res::Namespace) {
                    let c = t.next_token(Some(INTERESTED), Some(rw));
                    if c == Tok::Symbol {
                        let (lineno, image) = (t.lineno(), t.line_image().to_string());
                        put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                    } else {
                        if warning {
                            log::warn!("missing namespace name. [+{} {}].", t.lineno(), param.path);
                        }
                        t.pushback_token();
                    }
                } else if c == Tok::Symbol {
                    let savelineno = t.lineno();
                    let savetok = t.token().to_string();
                    let saveline = t.line_image().to_string();
                    let mut c = t.next_token(Some(INTERESTED), Some(rw));
                    if c == Tok::Ch(b'=') {
                        put_tag(param, &st, TagKind::Def, &savetok, savelineno, &saveline);
                    } else {
                        put_tag(param, &st, TagKind::RefSym, &savetok, savelineno, &saveline);
                        while c == Tok::Symbol {
                            let (lineno, image) = (t.lineno(), t.line_image().to_string());
                            put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                            c = t.next_token(Some(INTERESTED), Some(rw));
                        }
                    }
                } else {
                    t.pushback_token();
                }
                t.crflag = true;
            }
            Tok::Res(Res::Namespace) => {
                t.crflag = false;
                // namespace name = ...;  |  namespace [name[::name]*] { ... }
                let mut alias = false;
                let mut c = t.next_token(Some(INTERESTED), Some(rw));
                loop {
                    if c != Tok::Symbol {
                        break;
                    }
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::Def, t.token(), lineno, &image);
                    c = t.next_token(Some(INTERESTED), Some(rw));
                    if c == Tok::Ch(b'=') {
                        alias = true;
                        break;
                    }
                    if c == Tok::Res(Res::Wcolon) {
                        c = t.next_token(Some(INTERESTED), Some(rw));
                        continue;
                    }
                }
                if !alias {
                    // the block has no influence on the brace level
                    if c == Tok::Ch(b'{') {
                        namespacelevel += 1;
                    } else if warning {
                        log::warn!("missing namespace block. [+{} {}].", t.lineno(), param.path);
                    }
                }
                t.crflag = true;
            }
            Tok::Res(Res::Extern) => {
                if t.peek_char(false) == Some(b'"') {
                    // 'extern "C"' block is a kind of namespace block
                    let mut c = t.next_token(Some(INTERESTED), Some(rw));
                    while c == Tok::Newline {
                        c = t.next_token(Some(INTERESTED), Some(rw));
                    }
                    if c == Tok::Ch(b'{') {
                        namespacelevel += 1;
                    } else {
                        t.pushback_token();
                    }
                }
            }
            Tok::Res(Res::Struct) | Tok::Res(Res::Class) => {
                let mut c = loop {
                    let c = t.next_token(None, Some(rw));
                    if c == Tok::Res(Res::Attribute) {
                        process_attribute(param, &mut t, &st, rw)?;
                        continue;
                    }
                    if c == Tok::Newline {
                        continue;
                    }
                    break c;
                };
                if c == Tok::Symbol {
                    let mut savelineno = t.lineno();
                    let mut saveline = t.line_image().to_string();
                    loop {
                        if c == Tok::Symbol {
                            savelineno = t.lineno();
                            saveline = t.line_image().to_string();
                            classname = t.token().to_string();
                        }
                        c = t.next_token(None, Some(rw));
                        if c == Tok::Symbol {
                            put_tag(
                                param,
                                &st,
                                TagKind::RefSym,
                                &classname,
                                savelineno,
                                &saveline,
                            );
                        } else if c == Tok::Ch(b'<') {
                            // template argument list
                            let mut templates = 1i32;
                            let ok = loop {
                                c = t.next_token(None, Some(rw));
                                match c {
                                    Tok::Symbol => {
                                        let (lineno, image) =
                                            (t.lineno(), t.line_image().to_string());
                                        put_tag(
                                            param,
                                            &st,
                                            TagKind::RefSym,
                                            t.token(),
                                            lineno,
                                            &image,
                                        );
                                    }
                                    Tok::Ch(b'<') => {
                                        if t.peek_char(true) == Some(b'<') {
                                            t.skip_next(1);
                                        } else {
                                            templates += 1;
                                        }
                                    }
                                    Tok::Ch(b'>') => {
                                        templates -= 1;
                                        if templates == 0 {
                                            break true;
                                        }
                                    }
                                    Tok::Eof => break false,
                                    _ => {}
                                }
                            };
                            if !ok {
                                if warning {
                                    log::warn!(
                                        "failed to parse template [+{} {}].",
                                        savelineno,
                                        param.path
                                    );
                                }
                                return Ok(());
                            }
                            c = t.next_token(None, Some(rw));
                        } else if c == Tok::Res(Res::Final) {
                            c = t.next_token(None, Some(rw));
                        }
                        if !(c == Tok::Symbol || c == Tok::Newline) {
                            break;
                        }
                    }
                    if c == Tok::Ch(b':') || c == Tok::Ch(b'{') {
                        startclass = true;
                        put_tag(param, &st, TagKind::Def, &classname, savelineno, &saveline);
                    } else {
                        put_tag(
                            param,
                            &st,
                            TagKind::RefSym,
                            &classname,
                            savelineno,
                            &saveline,
                        );
                    }
                }
                t.pushback_token();
            }
            Tok::Ch(b'{') => {
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
                if startclass {
                    if stack.len() >= MAX_CLASS_STACK {
                        return Err(Error::with_message(
                            ErrorCode::Overflow,
                            format!("class stack over flow.[{}]", param.path),
                        ));
                    }
                    stack.push(ClassFrame {
                        name: classname.clone(),
                        level: st.level,
                    });
                }
                startclass = false;
                startthrow = false;
            }
            Tok::Ch(b'}') => {
                st.level -= 1;
                if st.level < 0 {
                    if namespacelevel > 0 {
                        namespacelevel -= 1;
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
                if stack.len() > 1 && st.level < stack.last().map(|f| f.level).unwrap_or(0) {
                    stack.pop();
                }
            }
            Tok::Ch(b'=') => {
                // `==` is comparison, a single `=` starts an initializer
                if t.peek_char(false) == Some(b'=') {
                    t.skip_next(1);
                } else {
                    startequal = true;
                }
            }
            Tok::Ch(b';') => {
                startthrow = false;
                startequal = false;
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
                t.next_token(Some(INTERESTED), Some(rw));
            }
            Tok::Res(Res::New) => {
                let c = t.next_token(Some(INTERESTED), Some(rw));
                if c == Tok::Symbol {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                }
            }
            Tok::Res(res @ (Res::Enum | Res::Union)) => {
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
            Tok::Res(Res::Template) => {
                let mut depth = 0i32;
                loop {
                    let c = t.next_token(Some("<>"), Some(rw));
                    match c {
                        Tok::Eof => {
                            if warning {
                                log::warn!(
                                    "template <...> isn't closed. [+{} {}].",
                                    t.lineno(),
                                    param.path
                                );
                            }
                            break;
                        }
                        Tok::Ch(b'<') => depth += 1,
                        Tok::Ch(b'>') => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        Tok::Symbol => {
                            let (lineno, image) = (t.lineno(), t.line_image().to_string());
                            put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                        }
                        _ => {}
                    }
                }
            }
            Tok::Res(Res::Operator) => {
                let mut sawend = false;
                loop {
                    let c = t.next_token(Some(";{"), Some(rw));
                    match c {
                        Tok::Eof => break,
                        Tok::Ch(b'{') => {
                            t.pushback_token();
                            sawend = true;
                            break;
                        }
                        Tok::Ch(b';') => {
                            sawend = true;
                            break;
                        }
                        Tok::Symbol => {
                            let (lineno, image) = (t.lineno(), t.line_image().to_string());
                            put_tag(param, &st, TagKind::RefSym, t.token(), lineno, &image);
                        }
                        _ => {}
                    }
                }
                if !sawend && warning {
                    log::warn!(
                        "'{{' doesn't exist after 'operator'. [+{} {}].",
                        t.lineno(),
                        param.path
                    );
                }
            }
            Tok::Res(Res::Throw) => {
                startthrow = true;
                if warning && !startmacro && st.level == 0 {
                    log::warn!(
                        "Out of function. {:>8} [+{} {}]",
                        t.token(),
                        t.lineno(),
                        param.path
                    );
                }
            }
            Tok::Res(r)
                if r.is_control() || matches!(r, Res::Catch | Res::Delete | Res::Try) =>
            {
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

/// C++ typedef walker: like the C one, but template argument depth makes
/// the pending name a reference instead of a definition.
fn typedef_block(
    param: &mut ParserParam,
    t: &mut Tokenizer,
    st: &mut BlockState,
    warning: bool,
) -> Result<()> {
    let rw = cpp_reserved_word;
    let typedef_savelevel = st.level;
    let mut savetok = String::new();
    let mut savelineno = 0u32;

    // skip CV qualifiers
    let mut c;
    loop {
        c = t.next_token(Some("{}(),;"), Some(rw));
        match c {
            Tok::Res(Res::Const) | Tok::Res(Res::Volatile) | Tok::Newline => {}
            _ => break,
        }
    }

    if c == Tok::Eof {
        if warning {
            log::warn!("unexpected eof. [+{} {}]", t.lineno(), param.path);
        }
        return Ok(());
    } else if let Tok::Res(res @ (Res::Enum | Res::Struct | Res::Union | Res::Class)) = c {
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
                        if !savetok.is_empty() {
                            let image = t.line_image().to_string();
                            put_tag(param, st, TagKind::Def, &savetok, savelineno, &image);
                            savetok.clear();
                        }
                        break;
                    }
                    Tok::Ch(b'{') => st.level += 1,
                    Tok::Ch(b'}') => {
                        savetok.clear();
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
                        savetok = t.token().to_string();
                        savelineno = t.lineno();
                    }
                    _ => {}
                }
                c = t.next_token(Some(interest_enum), Some(rw));
            }
            if c == Tok::Ch(b';') {
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

    savetok.clear();
    let mut templates = 0i32;
    loop {
        c = t.next_token(Some("()<>,;"), Some(rw));
        if c == Tok::Eof {
            break;
        }
        if let Tok::Res(r) = c {
            if r.is_sharp_cond() {
                condition_macro(param, t, st, r, rw)?;
                continue;
            }
        }
        match c {
            Tok::Ch(b'(') => st.level += 1,
            Tok::Ch(b')') => st.level -= 1,
            Tok::Ch(b'<') => templates += 1,
            Tok::Ch(b'>') => templates -= 1,
            Tok::Symbol => {
                if st.level > typedef_savelevel {
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, st, TagKind::RefSym, t.token(), lineno, &image);
                } else {
                    if !savetok.is_empty() {
                        let image = t.line_image().to_string();
                        put_tag(param, st, TagKind::RefSym, &savetok, savelineno, &image);
                    }
                    savetok = t.token().to_string();
                    savelineno = t.lineno();
                }
            }
            Tok::Ch(b',') | Tok::Ch(b';') => {
                if !savetok.is_empty() {
                    let kind = if templates != 0 {
                        TagKind::RefSym
                    } else {
                        TagKind::Def
                    };
                    let (lineno, image) = (t.lineno(), t.line_image().to_string());
                    put_tag(param, st, kind, &savetok, lineno, &image);
                    savetok.clear();
                }
            }
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

/// Function-definition lookahead for C++: walk the argument list, then
/// decide on `{` versus `;`/`,`/`=`.
fn function_definition(
    param: &mut ParserParam,
    t: &mut Tokenizer,
    st: &mut BlockState,
) -> Result<bool> {
    let rw = cpp_reserved_word;
    let mut brace_level = 0i32;
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
                let (lineno, image) = (t.lineno(), t.line_image().to_string());
                put_tag(param, st, TagKind::RefSym, t.token(), lineno, &image);
            }
            _ => {}
        }
    }
    if t.peek_char(false) == Some(b';') {
        t.next_token(Some(";"), None);
        return Ok(false);
    }
    let mut brace_level = 0i32;
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
            Tok::Ch(b';') | Tok::Ch(b',') if brace_level == 0 => break,
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
            }
            _ => {}
        }
    }
    Ok(false)
}
