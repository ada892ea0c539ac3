//! Reserved-word tables for the C-family parsers.
//!
//! The tokenizer turns identifier-shaped text into [`Res`] values through
//! a per-language lookup function; everything the parsers do not act on
//! specifically maps to [`Res::Other`] so it never surfaces as a symbol.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Reserved-word token values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Res {
    // Preprocessor directives
    SharpDefine,
    SharpUndef,
    SharpIf,
    SharpIfdef,
    SharpIfndef,
    SharpElif,
    SharpElse,
    SharpEndif,
    SharpInclude,
    SharpIncludeNext,
    SharpImport,
    SharpError,
    SharpLine,
    SharpPragma,
    SharpWarning,
    SharpIdent,
    SharpSccs,
    /// The `##` token-paste operator
    SharpSharp,
    // Yacc markers
    YaccSep,
    YaccBegin,
    YaccEnd,
    YaccUnion,
    YaccOther,
    // Keywords the parsers act on
    Extern,
    Struct,
    Union,
    Enum,
    Typedef,
    Attribute,
    Const,
    Restrict,
    Volatile,
    Break,
    Case,
    Continue,
    Default,
    Do,
    Else,
    For,
    Goto,
    If,
    Return,
    Switch,
    While,
    // C++ extras
    Class,
    Namespace,
    Using,
    Template,
    Operator,
    New,
    Throw,
    Catch,
    Delete,
    Try,
    Final,
    /// The `::` scope operator
    Wcolon,
    /// Reserved but not acted on (types, storage classes, ...)
    Other,
}

impl Res {
    /// True for the `#if`-family directives that drive the conditional
    /// stack.
    pub fn is_sharp_cond(&self) -> bool {
        matches!(
            self,
            Res::SharpIf
                | Res::SharpIfdef
                | Res::SharpIfndef
                | Res::SharpElif
                | Res::SharpElse
                | Res::SharpEndif
        )
    }

    /// True for the directives whose line is skipped wholesale.
    pub fn is_sharp_skipline(&self) -> bool {
        matches!(
            self,
            Res::SharpError
                | Res::SharpLine
                | Res::SharpPragma
                | Res::SharpWarning
                | Res::SharpIdent
                | Res::SharpSccs
        )
    }

    /// True for the include-family directives.
    pub fn is_sharp_include(&self) -> bool {
        matches!(
            self,
            Res::SharpInclude | Res::SharpIncludeNext | Res::SharpImport
        )
    }

    /// True for the flow-control keywords that only make sense inside a
    /// function body.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Res::Break
                | Res::Case
                | Res::Continue
                | Res::Default
                | Res::Do
                | Res::Else
                | Res::For
                | Res::Goto
                | Res::If
                | Res::Return
                | Res::Switch
                | Res::While
        )
    }
}

lazy_static! {
    static ref SHARP_WORDS: HashMap<&'static str, Res> = {
        let mut m = HashMap::new();
        m.insert("#define", Res::SharpDefine);
        m.insert("#undef", Res::SharpUndef);
        m.insert("#if", Res::SharpIf);
        m.insert("#ifdef", Res::SharpIfdef);
        m.insert("#ifndef", Res::SharpIfndef);
        m.insert("#elif", Res::SharpElif);
        m.insert("#else", Res::SharpElse);
        m.insert("#endif", Res::SharpEndif);
        m.insert("#include", Res::SharpInclude);
        m.insert("#include_next", Res::SharpIncludeNext);
        m.insert("#import", Res::SharpImport);
        m.insert("#error", Res::SharpError);
        m.insert("#line", Res::SharpLine);
        m.insert("#pragma", Res::SharpPragma);
        m.insert("#warning", Res::SharpWarning);
        m.insert("#ident", Res::SharpIdent);
        m.insert("#sccs", Res::SharpSccs);
        m.insert("##", Res::SharpSharp);
        m
    };
    static ref YACC_WORDS: HashMap<&'static str, Res> = {
        let mut m = HashMap::new();
        m.insert("%%", Res::YaccSep);
        m.insert("%{", Res::YaccBegin);
        m.insert("%}", Res::YaccEnd);
        m.insert("%union", Res::YaccUnion);
        for w in [
            "%token",
            "%type",
            "%left",
            "%right",
            "%nonassoc",
            "%start",
            "%prec",
            "%expect",
            "%define",
            "%defines",
            "%locations",
            "%pure_parser",
            "%token_table",
        ] {
            m.insert(w, Res::YaccOther);
        }
        m
    };
    static ref C_WORDS: HashMap<&'static str, Res> = {
        let mut m = HashMap::new();
        m.insert("extern", Res::Extern);
        m.insert("struct", Res::Struct);
        m.insert("union", Res::Union);
        m.insert("enum", Res::Enum);
        m.insert("typedef", Res::Typedef);
        m.insert("__attribute__", Res::Attribute);
        m.insert("const", Res::Const);
        m.insert("restrict", Res::Restrict);
        m.insert("volatile", Res::Volatile);
        m.insert("break", Res::Break);
        m.insert("case", Res::Case);
        m.insert("continue", Res::Continue);
        m.insert("default", Res::Default);
        m.insert("do", Res::Do);
        m.insert("else", Res::Else);
        m.insert("for", Res::For);
        m.insert("goto", Res::Goto);
        m.insert("if", Res::If);
        m.insert("return", Res::Return);
        m.insert("switch", Res::Switch);
        m.insert("while", Res::While);
        for w in [
            "auto",
            "char",
            "double",
            "float",
            "inline",
            "int",
            "long",
            "register",
            "short",
            "signed",
            "sizeof",
            "static",
            "unsigned",
            "void",
            "_Bool",
            "_Complex",
            "_Imaginary",
            "asm",
            "__asm__",
            "__extension__",
            "__inline",
            "__inline__",
            "__restrict",
            "__restrict__",
            "__signed__",
            "__volatile__",
        ] {
            m.insert(w, Res::Other);
        }
        m
    };
    static ref CPP_WORDS: HashMap<&'static str, Res> = {
        let mut m: HashMap<&'static str, Res> = C_WORDS.clone();
        m.insert("class", Res::Class);
        m.insert("namespace", Res::Namespace);
        m.insert("using", Res::Using);
        m.insert("template", Res::Template);
        m.insert("operator", Res::Operator);
        m.insert("new", Res::New);
        m.insert("throw", Res::Throw);
        m.insert("catch", Res::Catch);
        m.insert("delete", Res::Delete);
        m.insert("try", Res::Try);
        m.insert("final", Res::Final);
        m.insert("::", Res::Wcolon);
        for w in [
            "bool",
            "constexpr",
            "const_cast",
            "decltype",
            "dynamic_cast",
            "explicit",
            "export",
            "false",
            "friend",
            "mutable",
            "noexcept",
            "nullptr",
            "override",
            "private",
            "protected",
            "public",
            "reinterpret_cast",
            "static_assert",
            "static_cast",
            "this",
            "true",
            "typeid",
            "typename",
            "virtual",
            "wchar_t",
        ] {
            m.insert(w, Res::Other);
        }
        m
    };
}

/// Reserved-word lookup for C and Yacc sources.
pub fn c_reserved_word(token: &str) -> Option<Res> {
    SHARP_WORDS
        .get(token)
        .or_else(|| YACC_WORDS.get(token))
        .or_else(|| C_WORDS.get(token))
        .copied()
}

/// Reserved-word lookup for C++ sources.
pub fn cpp_reserved_word(token: &str) -> Option<Res> {
    SHARP_WORDS
        .get(token)
        .or_else(|| CPP_WORDS.get(token))
        .copied()
}
