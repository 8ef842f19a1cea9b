//! Top-level JavaScript declaration scanner
//!
//! This is not a full ECMAScript parser. The tokenizer understands comments,
//! strings, template literals, and regular expression literals well enough
//! to keep brackets balanced; the scanner then reads the top-level
//! statements that matter for archiving: function and class declarations,
//! imports, and exports. Unbalanced brackets or unterminated literals are
//! reported as parse errors.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JsParseError {
    #[error("Unterminated {kind} starting at offset {offset}")]
    Unterminated { kind: &'static str, offset: usize },

    #[error("Unbalanced '{found}' at offset {offset}")]
    Unbalanced { found: char, offset: usize },

    #[error("Unclosed '{0}' at end of input")]
    Unclosed(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub is_async: bool,
    pub is_generator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportDecl {
    /// `export function f() {}` / `export class C {}`
    Declaration(Box<Node>),
    /// `export const a = 1, b = 2`
    Variables(Vec<String>),
    /// `export { a, b as c }`, optionally re-exported `from` a module
    Specifiers {
        names: Vec<String>,
        source: Option<String>,
    },
    /// `export default ...`; the declaration is kept when it is a named
    /// function or class
    Default(Option<Box<Node>>),
    /// `export * from "m"` / `export * as ns from "m"`
    All {
        alias: Option<String>,
        source: String,
    },
}

/// A top-level statement of interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Function(FunctionDecl),
    Class(ClassDecl),
    Import(ImportDecl),
    Export(ExportDecl),
}

/// The top-level statements of interest, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub body: Vec<Node>,
}

/// Visitor over [`Program`] nodes
///
/// Every method has a default that does nothing except `visit_export`,
/// which walks into exported declarations.
pub trait Visitor {
    fn visit_function(&mut self, _function: &FunctionDecl) {}

    fn visit_class(&mut self, _class: &ClassDecl) {}

    fn visit_import(&mut self, _import: &ImportDecl) {}

    fn visit_export(&mut self, export: &ExportDecl) {
        walk_export(self, export);
    }
}

pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &Program) {
    for node in &program.body {
        walk_node(visitor, node);
    }
}

pub fn walk_node<V: Visitor + ?Sized>(visitor: &mut V, node: &Node) {
    match node {
        Node::Function(function) => visitor.visit_function(function),
        Node::Class(class) => visitor.visit_class(class),
        Node::Import(import) => visitor.visit_import(import),
        Node::Export(export) => visitor.visit_export(export),
    }
}

pub fn walk_export<V: Visitor + ?Sized>(visitor: &mut V, export: &ExportDecl) {
    match export {
        ExportDecl::Declaration(node) | ExportDecl::Default(Some(node)) => walk_node(visitor, node),
        _ => {}
    }
}

/// Parses source text into its top-level declarations
pub fn parse(source: &str) -> Result<Program, JsParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    check_balance(&tokens)?;
    Ok(Scanner { tokens: &tokens, pos: 0 }.scan())
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Template,
    Number,
    Regex,
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
    newline_before: bool,
}

impl Token {
    fn is_ident(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(name) if name == word)
    }

    fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    fn string(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Whether an expression can end with this token
    fn ends_expression(&self) -> bool {
        match &self.kind {
            TokenKind::Ident(name) => !is_operator_keyword(name),
            TokenKind::Punct(c) => matches!(c, ')' | ']' | '}'),
            _ => true,
        }
    }
}

/// Keywords after which `/` starts a regular expression
fn is_operator_keyword(word: &str) -> bool {
    matches!(
        word,
        "return"
            | "typeof"
            | "instanceof"
            | "in"
            | "of"
            | "new"
            | "delete"
            | "void"
            | "throw"
            | "case"
            | "do"
            | "else"
            | "yield"
            | "await"
    )
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
    newline_pending: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
            newline_pending: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn tokenize(mut self) -> Result<Vec<Token>, JsParseError> {
        while self.next_token()? {}
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        self.tokens.push(Token {
            kind,
            offset,
            newline_before: std::mem::take(&mut self.newline_pending),
        });
    }

    fn regex_allowed(&self) -> bool {
        self.tokens.last().map_or(true, |t| match &t.kind {
            TokenKind::Punct(c) => !matches!(c, ')' | ']'),
            TokenKind::Ident(name) => is_operator_keyword(name),
            _ => false,
        })
    }

    /// Lexes one token; returns false at end of input
    fn next_token(&mut self) -> Result<bool, JsParseError> {
        loop {
            let Some(c) = self.peek() else {
                return Ok(false);
            };
            let start = self.pos;

            if c == '\n' || c == '\u{2028}' || c == '\u{2029}' {
                self.newline_pending = true;
                self.pos += 1;
                continue;
            }
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }

            if c == '/' && self.peek_at(1) == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                self.pos += 2;
                loop {
                    match self.peek() {
                        None => {
                            return Err(JsParseError::Unterminated {
                                kind: "comment",
                                offset: start,
                            })
                        }
                        Some('*') if self.peek_at(1) == Some('/') => {
                            self.pos += 2;
                            break;
                        }
                        Some('\n') => {
                            self.newline_pending = true;
                            self.pos += 1;
                        }
                        Some(_) => self.pos += 1,
                    }
                }
                continue;
            }

            if c == '"' || c == '\'' {
                let value = self.read_string(c)?;
                self.push(TokenKind::Str(value), start);
            } else if c == '`' {
                self.read_template()?;
                self.push(TokenKind::Template, start);
            } else if c == '/' && self.regex_allowed() {
                self.read_regex()?;
                self.push(TokenKind::Regex, start);
            } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                while self
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
                {
                    self.pos += 1;
                }
                self.push(TokenKind::Number, start);
            } else if is_ident_start(c) {
                while self.peek().is_some_and(is_ident_part) {
                    self.pos += 1;
                }
                let word: String = self.chars[start..self.pos].iter().collect();
                self.push(TokenKind::Ident(word), start);
            } else {
                self.pos += 1;
                self.push(TokenKind::Punct(c), start);
            }
            return Ok(true);
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, JsParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(JsParseError::Unterminated {
                        kind: "string",
                        offset: start,
                    })
                }
                Some('\\') => {
                    if let Some(escaped) = self.peek_at(1) {
                        value.push(escaped);
                    }
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_template(&mut self) -> Result<(), JsParseError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => {
                    return Err(JsParseError::Unterminated {
                        kind: "template literal",
                        offset: start,
                    })
                }
                Some('\\') => self.pos += 2,
                Some('`') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.pos += 2;
                    self.skip_substitution(start)?;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Skips a `${ ... }` substitution by lexing until its closing brace
    fn skip_substitution(&mut self, template_start: usize) -> Result<(), JsParseError> {
        let outer = self.tokens.len();
        let mut depth = 0usize;
        loop {
            if !self.next_token()? {
                return Err(JsParseError::Unterminated {
                    kind: "template literal",
                    offset: template_start,
                });
            }
            match self.tokens.last().map(|t| &t.kind) {
                Some(TokenKind::Punct('{')) => depth += 1,
                Some(TokenKind::Punct('}')) if depth == 0 => break,
                Some(TokenKind::Punct('}')) => depth -= 1,
                _ => {}
            }
        }
        // Substitution tokens belong to the template, not the statement stream
        self.tokens.truncate(outer);
        Ok(())
    }

    fn read_regex(&mut self) -> Result<(), JsParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(JsParseError::Unterminated {
                        kind: "regular expression",
                        offset: start,
                    })
                }
                Some('\\') => self.pos += 2,
                Some('[') => {
                    in_class = true;
                    self.pos += 1;
                }
                Some(']') => {
                    in_class = false;
                    self.pos += 1;
                }
                Some('/') if !in_class => {
                    self.pos += 1;
                    while self.peek().is_some_and(is_ident_part) {
                        self.pos += 1;
                    }
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

fn check_balance(tokens: &[Token]) -> Result<(), JsParseError> {
    let mut stack: Vec<char> = Vec::new();
    for token in tokens {
        let TokenKind::Punct(c) = token.kind else {
            continue;
        };
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err(JsParseError::Unbalanced {
                        found: c,
                        offset: token.offset,
                    });
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(JsParseError::Unclosed(open)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Statement scanner
// ---------------------------------------------------------------------------

struct Scanner<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn scan(mut self) -> Program {
        let mut body = Vec::new();
        let mut depth = 0usize;

        while self.pos < self.tokens.len() {
            if depth == 0 && self.at_statement_start() {
                let start = self.pos;
                if let Some(node) = self.statement() {
                    body.push(node);
                }
                // Statement parsers only look ahead; bodies are walked below
                self.pos = start;
            }

            let token = &self.tokens[self.pos];
            match token.kind {
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']' | '}') => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        }

        Program { body }
    }

    fn at_statement_start(&self) -> bool {
        if self.pos == 0 {
            return true;
        }
        let prev = &self.tokens[self.pos - 1];
        if prev.is_punct(';') || prev.is_punct('}') {
            return true;
        }
        self.tokens[self.pos].newline_before && prev.ends_expression()
    }

    fn token(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn statement(&mut self) -> Option<Node> {
        let first = self.token(0)?;
        match first.ident()? {
            "function" | "async" | "class" => self.declaration(),
            "import" => self.import(),
            "export" => {
                self.pos += 1;
                self.export()
            }
            _ => None,
        }
    }

    /// Reads a function or class declaration at the cursor
    fn declaration(&mut self) -> Option<Node> {
        let mut is_async = false;
        if self.token(0)?.is_ident("async") {
            // `async` followed by a newline is an identifier, not a modifier
            if !self.token(1)?.is_ident("function") || self.token(1)?.newline_before {
                return None;
            }
            is_async = true;
            self.pos += 1;
        }

        let keyword = self.token(0)?;
        if keyword.is_ident("function") {
            let mut next = 1;
            let is_generator = self.token(1)?.is_punct('*');
            if is_generator {
                next += 1;
            }
            let name = self.token(next)?.ident()?.to_string();
            return Some(Node::Function(FunctionDecl {
                name,
                is_async,
                is_generator,
            }));
        }

        if keyword.is_ident("class") {
            let name = self.token(1)?.ident()?;
            if name == "extends" {
                return None;
            }
            let superclass = if self.token(2).is_some_and(|t| t.is_ident("extends")) {
                self.token(3).and_then(Token::ident).map(str::to_string)
            } else {
                None
            };
            return Some(Node::Class(ClassDecl {
                name: name.to_string(),
                superclass,
            }));
        }

        None
    }

    fn import(&mut self) -> Option<Node> {
        let next = self.token(1)?;
        // `import(...)` and `import.meta` are expressions
        if next.is_punct('(') || next.is_punct('.') {
            return None;
        }
        if let Some(source) = next.string() {
            return Some(Node::Import(ImportDecl {
                source: source.to_string(),
            }));
        }

        self.pos += 1;
        let source = self.from_clause()?;
        Some(Node::Import(ImportDecl { source }))
    }

    /// Finds `from "source"` before the statement ends
    fn from_clause(&mut self) -> Option<String> {
        let mut depth = 0usize;
        while let Some(token) = self.token(0) {
            match &token.kind {
                TokenKind::Punct('{') => depth += 1,
                TokenKind::Punct('}') => depth = depth.checked_sub(1)?,
                TokenKind::Punct(';') if depth == 0 => return None,
                TokenKind::Ident(word) if depth == 0 && word == "from" => {
                    return self.token(1)?.string().map(str::to_string);
                }
                _ => {}
            }
            self.pos += 1;
        }
        None
    }

    /// Cursor is on the token after `export`
    fn export(&mut self) -> Option<Node> {
        let token = self.token(0)?;

        if token.is_ident("default") {
            self.pos += 1;
            let inner = self.declaration().map(Box::new);
            return Some(Node::Export(ExportDecl::Default(inner)));
        }

        if token.is_punct('*') {
            let alias = if self.token(1).is_some_and(|t| t.is_ident("as")) {
                Some(self.token(2)?.ident()?.to_string())
            } else {
                None
            };
            let source = self.from_clause()?;
            return Some(Node::Export(ExportDecl::All { alias, source }));
        }

        if token.is_punct('{') {
            let names = self.export_specifiers()?;
            let source = if self.token(0).is_some_and(|t| t.is_ident("from")) {
                self.token(1).and_then(Token::string).map(str::to_string)
            } else {
                None
            };
            return Some(Node::Export(ExportDecl::Specifiers { names, source }));
        }

        if let Some(word) = token.ident() {
            if matches!(word, "const" | "let" | "var") {
                self.pos += 1;
                return Some(Node::Export(ExportDecl::Variables(self.declarators())));
            }
        }

        let declaration = self.declaration()?;
        Some(Node::Export(ExportDecl::Declaration(Box::new(declaration))))
    }

    /// Reads `{ a, b as c, default as d }`; leaves the cursor after `}`
    fn export_specifiers(&mut self) -> Option<Vec<String>> {
        self.pos += 1;
        let mut names = Vec::new();
        let mut current: Option<String> = None;

        loop {
            let token = self.token(0)?;
            self.pos += 1;
            match &token.kind {
                TokenKind::Punct('}') => break,
                TokenKind::Punct(',') => names.extend(current.take()),
                TokenKind::Ident(word) if word == "as" => {
                    current = self.token(0).and_then(|t| match &t.kind {
                        TokenKind::Ident(alias) => Some(alias.clone()),
                        TokenKind::Str(alias) => Some(alias.clone()),
                        _ => None,
                    });
                    self.pos += 1;
                }
                TokenKind::Ident(word) => current = Some(word.clone()),
                TokenKind::Str(word) => current = Some(word.clone()),
                _ => {}
            }
        }
        names.extend(current);
        Some(names)
    }

    /// Binding names of `a = 1, b, c = f(x, y)`; destructuring patterns are skipped
    fn declarators(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        let mut expect_name = true;
        let mut depth = 0usize;

        while let Some(token) = self.token(0) {
            if depth == 0 && !expect_name && self.pos > 0 {
                let prev = &self.tokens[self.pos - 1];
                if token.newline_before && prev.ends_expression() && !token.is_punct(',') {
                    break;
                }
            }
            match &token.kind {
                TokenKind::Punct('(' | '[' | '{') => {
                    depth += 1;
                    expect_name = false;
                }
                TokenKind::Punct(')' | ']' | '}') if depth == 0 => break,
                TokenKind::Punct(')' | ']' | '}') => depth -= 1,
                TokenKind::Punct(';') if depth == 0 => break,
                TokenKind::Punct(',') if depth == 0 => expect_name = true,
                TokenKind::Ident(name) if depth == 0 && expect_name => {
                    names.push(name.clone());
                    expect_name = false;
                }
                _ => expect_name = false,
            }
            self.pos += 1;
        }
        names
    }
}
