//! Structural GLSL checking for the headless context.
//!
//! This is not a compiler. It tokenizes the source, validates the handful of
//! rules that real drivers reject most often in hand-written sketches
//! (unbalanced delimiters, missing semicolons, missing `main`, stage-specific
//! built-ins, version-specific qualifiers) and extracts the global interface
//! (`attribute`/`in`, `varying`/`out`, `uniform`) that the linker needs.
//! Preprocessor directives other than `#version` are ignored and macros are
//! not expanded.

use std::fmt;

use crate::gpu::ShaderStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlslVersion {
    pub number: u32,
    pub es: bool,
}

impl GlslVersion {
    pub const ES_100: GlslVersion = GlslVersion { number: 100, es: true };

    /// ES 3.00+ and desktop 1.30+ use `in`/`out` instead of `attribute`/`varying`.
    fn modern(self) -> bool {
        if self.es {
            self.number >= 300
        } else {
            self.number >= 130
        }
    }
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.es && self.number != 100 {
            write!(f, "{} es", self.number)
        } else {
            write!(f, "{}", self.number)
        }
    }
}

/// One compiler message, rendered in the usual `ERROR: 0:<line>: ...` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR: 0:{}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// Per-vertex input of a vertex shader.
    Attribute,
    /// Stage output (`varying`/`out`).
    Output,
    /// Stage input of a fragment shader (`varying`/`in`).
    Input,
    Uniform,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub ty: String,
    pub name: String,
    pub location: Option<u32>,
    pub line: usize,
}

/// Global interface of a successfully checked shader.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderInterface {
    pub stage: ShaderStage,
    pub version: GlslVersion,
    pub declarations: Vec<Declaration>,
}

impl ShaderInterface {
    pub fn of_kind(&self, kind: DeclKind) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.kind == kind)
    }
}

// ── Tokens ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(String),
    Punct(&'static str),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

impl Token {
    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.tok, Tok::Punct(q) if *q == p)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(&self.tok, Tok::Ident(s) if s == name)
    }

    fn text(&self) -> &str {
        match &self.tok {
            Tok::Ident(s) | Tok::Number(s) => s,
            Tok::Punct(p) => p,
        }
    }
}

const PUNCTUATION: &[&str] = &[
    "<<=", ">>=", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "==", "!=", "<=",
    ">=", "&&", "||", "^^", "<<", ">>", "(", ")", "{", "}", "[", "]", ";", ",", ".", "+", "-",
    "*", "/", "%", "<", ">", "=", "!", "~", "&", "|", "^", "?", ":",
];

const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch"];
const PRECISION_QUALIFIERS: &[&str] = &["lowp", "mediump", "highp"];
const AUXILIARY_QUALIFIERS: &[&str] = &["flat", "smooth", "centroid", "invariant", "noperspective"];
const STORAGE_QUALIFIERS: &[&str] = &["attribute", "uniform", "varying", "in", "out", "const"];

const VERTEX_ONLY_BUILTINS: &[&str] = &["gl_Position", "gl_PointSize", "gl_VertexID", "gl_InstanceID"];
const FRAGMENT_ONLY_BUILTINS: &[&str] = &[
    "gl_FragColor",
    "gl_FragData",
    "gl_FragCoord",
    "gl_FrontFacing",
    "gl_PointCoord",
    "gl_FragDepth",
];
const LEGACY_OUTPUTS: &[&str] = &["gl_FragColor", "gl_FragData"];

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0, line: 1 }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            if self.rest().starts_with("//") {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
            } else if self.rest().starts_with("/*") {
                let start = self.line;
                self.advance();
                self.advance();
                loop {
                    if self.rest().starts_with("*/") {
                        self.advance();
                        self.advance();
                        break;
                    }
                    if self.advance().is_none() {
                        return Err(Diagnostic::new(start, "'/*' : unterminated comment"));
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(ch) = self.peek() else {
                return Ok(tokens);
            };

            let tok = if ch.is_ascii_alphabetic() || ch == '_' {
                Tok::Ident(self.take_while(|c, _| c.is_ascii_alphanumeric() || c == '_'))
            } else if ch.is_ascii_digit()
                || (ch == '.' && self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()))
            {
                Tok::Number(self.take_number())
            } else if let Some(&p) = PUNCTUATION.iter().find(|p| self.rest().starts_with(**p)) {
                for _ in 0..p.len() {
                    self.advance();
                }
                Tok::Punct(p)
            } else {
                return Err(Diagnostic::new(line, format!("'{ch}' : invalid character")));
            };
            tokens.push(Token { tok, line });
        }
    }

    fn take_while(&mut self, keep: impl Fn(char, &str) -> bool) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !keep(c, &self.src[start..self.pos]) {
                break;
            }
            self.advance();
        }
        self.src[start..self.pos].to_string()
    }

    fn take_number(&mut self) -> String {
        self.take_while(|c, so_far| {
            let hex = so_far.starts_with("0x") || so_far.starts_with("0X");
            c.is_ascii_alphanumeric()
                || c == '.'
                || ((c == '+' || c == '-') && !hex && so_far.ends_with(['e', 'E']))
        })
    }
}

// ── Preprocessor ──────────────────────────────────────────────────────────

/// Returns `line` without comment text. `in_block` carries an open `/* */`
/// comment from one line to the next.
fn strip_comments(line: &str, in_block: &mut bool) -> String {
    let mut code = String::new();
    let mut rest = line;
    loop {
        if *in_block {
            let Some(end) = rest.find("*/") else {
                return code;
            };
            rest = &rest[end + 2..];
            *in_block = false;
            code.push(' ');
        }
        match (rest.find("/*"), rest.find("//")) {
            (Some(block), line_comment) if line_comment.map_or(true, |l| block < l) => {
                code.push_str(&rest[..block]);
                rest = &rest[block + 2..];
                *in_block = true;
            }
            (_, Some(line_comment)) => {
                code.push_str(&rest[..line_comment]);
                return code;
            }
            _ => {
                code.push_str(rest);
                return code;
            }
        }
    }
}

/// Blanks out directive lines (keeping line numbers stable) and reads `#version`.
/// Comments may precede `#version`; any other code may not.
fn preprocess(source: &str) -> Result<(String, GlslVersion), Diagnostic> {
    let mut version = None;
    let mut seen_code = false;
    let mut in_comment = false;
    let mut out = String::with_capacity(source.len());

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let continues_comment = in_comment;
        let code = strip_comments(raw, &mut in_comment);
        let line = code.trim();
        if let Some(directive) = line.strip_prefix('#') {
            let mut words = directive.split_whitespace();
            if words.next() == Some("version") {
                if seen_code || version.is_some() {
                    return Err(Diagnostic::new(
                        line_no,
                        "'#version' : must occur first in shader",
                    ));
                }
                let number = words
                    .next()
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| Diagnostic::new(line_no, "'#version' : invalid version number"))?;
                let es = match words.next() {
                    None => number == 100,
                    Some("es") => true,
                    Some("core") | Some("compatibility") => false,
                    Some(other) => {
                        return Err(Diagnostic::new(
                            line_no,
                            format!("'{other}' : invalid version profile"),
                        ))
                    }
                };
                if es && number != 100 && number != 300 && number != 310 && number != 320 {
                    return Err(Diagnostic::new(
                        line_no,
                        format!("'{number}' : version number not supported"),
                    ));
                }
                version = Some(GlslVersion { number, es });
            }
            // The lexer still has to see comments open or close on this line.
            if continues_comment {
                out.push_str("*/");
            }
            if in_comment {
                out.push_str("/*");
            }
            out.push('\n');
            continue;
        }
        if !line.is_empty() {
            seen_code = true;
        }
        out.push_str(raw);
        out.push('\n');
    }

    Ok((out, version.unwrap_or(GlslVersion::ES_100)))
}

// ── Checker ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Code,
    Declarations,
}

/// Checks one shader stage and returns its interface or the list of errors.
pub fn check(stage: ShaderStage, source: &str) -> Result<ShaderInterface, Vec<Diagnostic>> {
    let (body, version) = preprocess(source).map_err(|d| vec![d])?;
    let tokens = Lexer::new(&body).tokenize().map_err(|d| vec![d])?;

    check_structure(&tokens).map_err(|d| vec![d])?;

    let mut errors = Vec::new();
    if !has_main(&tokens) {
        let line = tokens.last().map(|t| t.line).unwrap_or(0);
        errors.push(Diagnostic::new(line, "missing main() function definition"));
    }
    check_identifiers(stage, version, &tokens, &mut errors);

    let declarations = collect_declarations(stage, &tokens, &mut errors);
    if errors.is_empty() {
        Ok(ShaderInterface {
            stage,
            version,
            declarations,
        })
    } else {
        Err(errors)
    }
}

/// An open delimiter: its text, scope and line, and whether its closing
/// delimiter may be followed directly by a word.
type Open = (&'static str, Scope, usize, bool);

/// Delimiter balance and statement termination.
fn check_structure(tokens: &[Token]) -> Result<(), Diagnostic> {
    let mut stack: Vec<Open> = Vec::new();
    let mut paren_depth = 0usize;
    let mut closed_prefix = false;

    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| &tokens[p]);
        let after_prefix = std::mem::take(&mut closed_prefix);

        if let (Some(prev), Tok::Ident(_) | Tok::Number(_)) = (prev, &token.tok) {
            if matches!(prev.tok, Tok::Number(_)) {
                return Err(Diagnostic::new(
                    token.line,
                    format!("'{}' : syntax error", token.text()),
                ));
            }
            let closes_expression = prev.is_punct(")") || prev.is_punct("]");
            if closes_expression && !after_prefix && in_function_body(&stack) {
                return Err(Diagnostic::new(
                    token.line,
                    format!(
                        "'{}' : syntax error, expected ';' after '{}'",
                        token.text(),
                        prev.text()
                    ),
                ));
            }
        }

        let Tok::Punct(p) = token.tok else {
            if stack.is_empty() && paren_depth == 0 {
                check_top_level_terminator(token, prev)?;
            }
            continue;
        };

        match p {
            "(" | "[" => {
                let prefix = if p == "(" {
                    paren_depth += 1;
                    prev.is_some_and(|t| CONTROL_KEYWORDS.contains(&t.text()))
                } else {
                    opens_array_type(tokens, i)
                };
                stack.push((p, Scope::Code, token.line, prefix));
            }
            "{" => {
                let scope = match prev {
                    Some(t) if t.is_punct(")") || t.is_ident("else") || t.is_ident("do") => {
                        Scope::Code
                    }
                    Some(t) if t.is_punct("{") || t.is_punct("}") || t.is_punct(";") => {
                        stack.last().map(|s| s.1).unwrap_or(Scope::Code)
                    }
                    _ => Scope::Declarations,
                };
                stack.push(("{", scope, token.line, false));
            }
            ")" | "]" | "}" => {
                let open = match p {
                    ")" => "(",
                    "]" => "[",
                    _ => "{",
                };
                match stack.pop() {
                    Some((o, scope, _, prefix)) if o == open => {
                        closed_prefix = prefix;
                        if p == ")" {
                            paren_depth -= 1;
                        }
                        if p == "}" {
                            check_block_close(token, prev, scope)?;
                        }
                    }
                    _ => {
                        return Err(Diagnostic::new(
                            token.line,
                            format!("'{p}' : syntax error, unexpected '{p}'"),
                        ))
                    }
                }
            }
            _ => {}
        }
    }

    match stack.last() {
        Some((open, _, line, _)) => Err(Diagnostic::new(
            *line,
            format!("'{open}' : syntax error, unexpected end of file"),
        )),
        None => Ok(()),
    }
}

/// Inside a function body, as opposed to the global scope or a struct.
fn in_function_body(stack: &[Open]) -> bool {
    stack
        .iter()
        .rev()
        .find(|open| open.0 == "{")
        .is_some_and(|open| open.1 == Scope::Code)
}

/// `[` of an array type such as `float[2] a` or `Light[4] lights`.
fn opens_array_type(tokens: &[Token], bracket: usize) -> bool {
    let Some(Tok::Ident(name)) = bracket.checked_sub(1).map(|i| &tokens[i].tok) else {
        return false;
    };
    if is_builtin_type(name) {
        return true;
    }
    match bracket.checked_sub(2).map(|i| &tokens[i]) {
        None => true,
        Some(before) => {
            before.is_punct(";")
                || before.is_punct("{")
                || before.is_punct("}")
                || STORAGE_QUALIFIERS.contains(&before.text())
                || PRECISION_QUALIFIERS.contains(&before.text())
        }
    }
}

fn is_builtin_type(name: &str) -> bool {
    let sized = |base: &str| {
        name.strip_prefix(base).is_some_and(|dims| {
            !dims.is_empty() && dims.bytes().all(|b| b.is_ascii_digit() || b == b'x')
        })
    };
    matches!(name, "float" | "int" | "uint" | "bool")
        || ["vec", "ivec", "uvec", "bvec", "mat"].into_iter().any(sized)
        || name.starts_with("sampler")
}

fn check_block_close(close: &Token, prev: Option<&Token>, scope: Scope) -> Result<(), Diagnostic> {
    let Some(prev) = prev else {
        return Ok(());
    };
    let terminated = match scope {
        Scope::Code => prev.is_punct(";") || prev.is_punct("{") || prev.is_punct("}"),
        Scope::Declarations => prev.is_punct(";") || prev.is_punct("{"),
    };
    if terminated {
        Ok(())
    } else {
        Err(Diagnostic::new(
            close.line,
            format!("'}}' : syntax error, expected ';' after '{}'", prev.text()),
        ))
    }
}

/// A global qualifier or `void` must start a new declaration.
fn check_top_level_terminator(token: &Token, prev: Option<&Token>) -> Result<(), Diagnostic> {
    let starts_declaration = match &token.tok {
        Tok::Ident(s) => {
            STORAGE_QUALIFIERS.contains(&s.as_str())
                || matches!(s.as_str(), "precision" | "void" | "struct" | "layout")
        }
        _ => false,
    };
    let Some(prev) = prev else {
        return Ok(());
    };
    if !starts_declaration {
        return Ok(());
    }
    let after_boundary = prev.is_punct(";") || prev.is_punct("}") || prev.is_punct(")");
    let after_qualifier = match &prev.tok {
        Tok::Ident(s) => {
            AUXILIARY_QUALIFIERS.contains(&s.as_str())
                || PRECISION_QUALIFIERS.contains(&s.as_str())
                || STORAGE_QUALIFIERS.contains(&s.as_str())
        }
        _ => false,
    };
    if after_boundary || after_qualifier {
        Ok(())
    } else {
        Err(Diagnostic::new(
            token.line,
            format!(
                "'{}' : syntax error, expected ';' after '{}'",
                token.text(),
                prev.text()
            ),
        ))
    }
}

fn has_main(tokens: &[Token]) -> bool {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct("{") {
            depth += 1;
        } else if token.is_punct("}") {
            depth = depth.saturating_sub(1);
        } else if depth == 0
            && token.is_ident("void")
            && tokens.get(i + 1).is_some_and(|t| t.is_ident("main"))
            && tokens.get(i + 2).is_some_and(|t| t.is_punct("("))
        {
            let mut j = i + 3;
            while j < tokens.len() && !tokens[j].is_punct(")") {
                j += 1;
            }
            if tokens.get(j + 1).is_some_and(|t| t.is_punct("{")) {
                return true;
            }
        }
    }
    false
}

fn check_identifiers(
    stage: ShaderStage,
    version: GlslVersion,
    tokens: &[Token],
    errors: &mut Vec<Diagnostic>,
) {
    let mut depth = 0usize;
    for token in tokens {
        if token.is_punct("{") || token.is_punct("(") {
            depth += 1;
            continue;
        }
        if token.is_punct("}") || token.is_punct(")") {
            depth = depth.saturating_sub(1);
            continue;
        }
        let Tok::Ident(name) = &token.tok else {
            continue;
        };
        let name = name.as_str();

        let foreign = match stage {
            ShaderStage::Vertex => FRAGMENT_ONLY_BUILTINS,
            ShaderStage::Fragment => VERTEX_ONLY_BUILTINS,
        };
        if foreign.contains(&name) || (version.modern() && LEGACY_OUTPUTS.contains(&name)) {
            errors.push(Diagnostic::new(
                token.line,
                format!("'{name}' : undeclared identifier"),
            ));
            continue;
        }

        if depth != 0 {
            continue;
        }
        match name {
            "attribute" | "varying" if version.modern() => errors.push(Diagnostic::new(
                token.line,
                format!("'{name}' : Illegal use of reserved word"),
            )),
            "attribute" if stage == ShaderStage::Fragment => errors.push(Diagnostic::new(
                token.line,
                "'attribute' : supported in vertex shaders only",
            )),
            "in" | "out" | "layout" if !version.modern() => errors.push(Diagnostic::new(
                token.line,
                format!("'{name}' : storage qualifier supported in GLSL ES 3.00 and above only"),
            )),
            _ => {}
        }
    }
}

/// Walks global declarations and records the stage interface.
fn collect_declarations(
    stage: ShaderStage,
    tokens: &[Token],
    errors: &mut Vec<Diagnostic>,
) -> Vec<Declaration> {
    let mut declarations: Vec<Declaration> = Vec::new();
    let mut statement: Vec<&Token> = Vec::new();
    let mut depth = 0usize;

    for token in tokens {
        if depth > 0 {
            if token.is_punct("{") {
                depth += 1;
            } else if token.is_punct("}") {
                depth -= 1;
            }
            continue;
        }
        if token.is_punct("{") {
            // Function bodies, struct bodies and interface blocks carry no
            // loose interface variables.
            depth = 1;
            statement.clear();
            continue;
        }
        if token.is_punct(";") {
            parse_declaration(stage, &statement, &mut declarations, errors);
            statement.clear();
            continue;
        }
        statement.push(token);
    }

    declarations
}

fn parse_declaration(
    stage: ShaderStage,
    statement: &[&Token],
    declarations: &mut Vec<Declaration>,
    errors: &mut Vec<Diagnostic>,
) {
    let mut i = 0;
    let mut location = None;

    if statement.first().is_some_and(|t| t.is_ident("layout")) {
        let mut j = 1;
        while j < statement.len() && !statement[j].is_punct(")") {
            if statement[j].is_ident("location") && statement.get(j + 1).is_some_and(|t| t.is_punct("=")) {
                location = statement.get(j + 2).and_then(|t| t.text().parse::<u32>().ok());
            }
            j += 1;
        }
        i = j + 1;
    }

    while statement.get(i).is_some_and(|t| {
        AUXILIARY_QUALIFIERS.contains(&t.text()) || PRECISION_QUALIFIERS.contains(&t.text())
    }) {
        i += 1;
    }

    let Some(qualifier) = statement.get(i) else {
        return;
    };
    let kind = match (stage, qualifier.text()) {
        (ShaderStage::Vertex, "attribute" | "in") => DeclKind::Attribute,
        (ShaderStage::Vertex, "varying" | "out") => DeclKind::Output,
        (ShaderStage::Fragment, "varying" | "in") => DeclKind::Input,
        (ShaderStage::Fragment, "out") => DeclKind::Output,
        (_, "uniform") => DeclKind::Uniform,
        _ => return,
    };
    i += 1;

    while statement.get(i).is_some_and(|t| PRECISION_QUALIFIERS.contains(&t.text())) {
        i += 1;
    }
    let Some(ty) = statement.get(i) else {
        return;
    };
    let ty = ty.text().to_string();
    i += 1;

    // name [ '[' N ']' ] { ',' name ... } with initializers skipped.
    let mut expect_name = true;
    let mut nesting = 0usize;
    while let Some(token) = statement.get(i) {
        if nesting > 0 {
            if token.is_punct("(") || token.is_punct("[") {
                nesting += 1;
            } else if token.is_punct(")") || token.is_punct("]") {
                nesting -= 1;
            }
        } else if token.is_punct(",") {
            expect_name = true;
        } else if token.is_punct("(") || token.is_punct("[") {
            nesting += 1;
        } else if expect_name {
            if let Tok::Ident(name) = &token.tok {
                if declarations.iter().any(|d| d.kind == kind && d.name == *name) {
                    errors.push(Diagnostic::new(
                        token.line,
                        format!("'{name}' : redefinition"),
                    ));
                } else {
                    declarations.push(Declaration {
                        kind,
                        ty: ty.clone(),
                        name: name.clone(),
                        location,
                        line: token.line,
                    });
                }
                expect_name = false;
                location = None;
            }
        }
        i += 1;
    }
}

/// Number of consecutive attribute slots a type occupies.
pub fn attribute_slots(ty: &str) -> u32 {
    match ty {
        "mat2" => 2,
        "mat3" => 3,
        "mat4" => 4,
        _ => 1,
    }
}
