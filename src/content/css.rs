//! Minimal CSS stylesheet parser and serializer
//!
//! Understands enough of CSS to sanitize, re-serialize and describe a
//! stylesheet: style rules with declarations, `@import`, `@media` blocks
//! (parsed recursively), and other at-rules kept verbatim.

use thiserror::Error;

/// Errors raised while parsing a stylesheet
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CssError {
    #[error("Unterminated comment")]
    UnterminatedComment,

    #[error("Unterminated string starting at byte {0}")]
    UnterminatedString(usize),

    #[error("Unexpected '{found}' at byte {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("Unexpected end of stylesheet")]
    UnexpectedEnd,
}

/// A single `name: value` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// A top-level or nested stylesheet rule
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Style {
        selectors: String,
        declarations: Vec<Declaration>,
    },
    Import {
        href: String,
        prelude: String,
    },
    Media {
        query: String,
        rules: Vec<Rule>,
    },
    /// Any other at-rule; `block` is the raw body when the rule has one
    Other {
        prelude: String,
        block: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    /// Parses a stylesheet; comments are dropped
    pub fn parse(input: &str) -> Result<Self, CssError> {
        let stripped = strip_comments(input)?;
        let mut parser = Parser {
            chars: stripped.char_indices().collect(),
            pos: 0,
        };
        let rules = parser.parse_rules(false)?;
        Ok(Self { rules })
    }

    /// Removes declarations whose value contains `expression`, at any depth
    pub fn remove_expressions(&mut self) {
        strip_expressions(&mut self.rules);
    }

    /// Serializes the stylesheet with one declaration per line
    pub fn to_css_string(&self) -> String {
        let mut out = String::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            write_rule(rule, 0, &mut out);
        }
        out
    }

    /// Selector text of every top-level style rule
    pub fn selectors(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(|rule| match rule {
                Rule::Style { selectors, .. } => Some(selectors.clone()),
                _ => None,
            })
            .collect()
    }

    /// Targets of every top-level `@import`
    pub fn imports(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(|rule| match rule {
                Rule::Import { href, .. } => Some(href.clone()),
                _ => None,
            })
            .collect()
    }

    /// Query text of every top-level `@media` block
    pub fn media_queries(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(|rule| match rule {
                Rule::Media { query, .. } => Some(query.clone()),
                _ => None,
            })
            .collect()
    }
}

fn strip_expressions(rules: &mut [Rule]) {
    for rule in rules {
        match rule {
            Rule::Style { declarations, .. } => {
                declarations.retain(|d| !d.value.to_ascii_lowercase().contains("expression"));
            }
            Rule::Media { rules, .. } => strip_expressions(rules),
            _ => {}
        }
    }
}

fn write_rule(rule: &Rule, depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    match rule {
        Rule::Style {
            selectors,
            declarations,
        } => {
            out.push_str(&format!("{}{} {{\n", indent, selectors));
            for decl in declarations {
                out.push_str(&format!("{}    {}: {}", indent, decl.name, decl.value));
                if decl.important {
                    out.push_str(" !important");
                }
                out.push_str(";\n");
            }
            out.push_str(&format!("{}}}\n", indent));
        }
        Rule::Import { prelude, .. } => {
            out.push_str(&format!("{}@import {};\n", indent, prelude));
        }
        Rule::Media { query, rules } => {
            out.push_str(&format!("{}@media {} {{\n", indent, query));
            for nested in rules {
                write_rule(nested, depth + 1, out);
            }
            out.push_str(&format!("{}}}\n", indent));
        }
        Rule::Other { prelude, block } => match block {
            Some(block) => {
                out.push_str(&format!("{}{} {{ {} }}\n", indent, prelude, block.trim()));
            }
            None => out.push_str(&format!("{}{};\n", indent, prelude)),
        },
    }
}

/// Removes `/* ... */` comments outside of strings
fn strip_comments(input: &str) -> Result<String, CssError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((offset, c)) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                } else if c == '\n' {
                    return Err(CssError::UnterminatedString(offset));
                }
            }
            None => {
                if c == '/' && matches!(chars.peek(), Some((_, '*'))) {
                    chars.next();
                    let mut closed = false;
                    let mut prev = '\0';
                    for (_, inner) in chars.by_ref() {
                        if prev == '*' && inner == '/' {
                            closed = true;
                            break;
                        }
                        prev = inner;
                    }
                    if !closed {
                        return Err(CssError::UnterminatedComment);
                    }
                    out.push(' ');
                } else {
                    if c == '"' || c == '\'' {
                        quote = Some(c);
                    }
                    out.push(c);
                }
            }
        }
    }

    match quote {
        Some(_) => Err(CssError::UnexpectedEnd),
        None => Ok(out),
    }
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(usize::MAX, |(o, _)| *o)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_rules(&mut self, nested: bool) -> Result<Vec<Rule>, CssError> {
        let mut rules = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None if nested => return Err(CssError::UnexpectedEnd),
                None => return Ok(rules),
                Some('}') if nested => {
                    self.pos += 1;
                    return Ok(rules);
                }
                Some('}') => {
                    return Err(CssError::Unexpected {
                        found: '}',
                        offset: self.offset(),
                    })
                }
                // Stray semicolons between rules are harmless
                Some(';') => self.pos += 1,
                Some('@') => rules.push(self.parse_at_rule()?),
                Some(_) => rules.push(self.parse_style_rule()?),
            }
        }
    }

    /// Reads up to (not including) the first top-level `{` or `;`
    fn read_prelude(&mut self) -> Result<(String, Option<char>), CssError> {
        let mut prelude = String::new();
        let mut parens = 0usize;
        let mut quote: Option<char> = None;

        while let Some(c) = self.peek() {
            if let Some(q) = quote {
                prelude.push(c);
                self.pos += 1;
                if c == '\\' {
                    if let Some(escaped) = self.peek() {
                        prelude.push(escaped);
                        self.pos += 1;
                    }
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '"' | '\'' => quote = Some(c),
                '(' => parens += 1,
                ')' => parens = parens.saturating_sub(1),
                '{' | ';' if parens == 0 => return Ok((collapse_whitespace(&prelude), Some(c))),
                '}' if parens == 0 => return Ok((collapse_whitespace(&prelude), Some(c))),
                _ => {}
            }
            prelude.push(c);
            self.pos += 1;
        }

        Ok((collapse_whitespace(&prelude), None))
    }

    /// Reads a balanced `{ ... }` body; the opening brace is current
    fn read_block(&mut self) -> Result<String, CssError> {
        self.pos += 1;
        let mut body = String::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        while let Some(c) = self.peek() {
            self.pos += 1;
            if let Some(q) = quote {
                body.push(c);
                if c == '\\' {
                    if let Some(escaped) = self.peek() {
                        body.push(escaped);
                        self.pos += 1;
                    }
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '"' | '\'' => quote = Some(c),
                '{' => depth += 1,
                '}' if depth == 0 => return Ok(body),
                '}' => depth -= 1,
                _ => {}
            }
            body.push(c);
        }

        Err(CssError::UnexpectedEnd)
    }

    fn parse_at_rule(&mut self) -> Result<Rule, CssError> {
        let start = self.offset();
        let (prelude, terminator) = self.read_prelude()?;
        let name = prelude
            .trim_start_matches('@')
            .split(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '(')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        let rest = prelude
            .get(1 + name.len()..)
            .unwrap_or("")
            .trim()
            .to_string();

        match terminator {
            Some(';') | None => {
                if terminator.is_some() {
                    self.pos += 1;
                }
                if name == "import" {
                    Ok(Rule::Import {
                        href: import_href(&rest),
                        prelude: rest,
                    })
                } else {
                    Ok(Rule::Other {
                        prelude,
                        block: None,
                    })
                }
            }
            Some('{') if name == "media" => {
                self.pos += 1;
                let rules = self.parse_rules(true)?;
                Ok(Rule::Media { query: rest, rules })
            }
            Some('{') => {
                let block = self.read_block()?;
                Ok(Rule::Other {
                    prelude,
                    block: Some(block),
                })
            }
            Some(found) => Err(CssError::Unexpected {
                found,
                offset: start,
            }),
        }
    }

    fn parse_style_rule(&mut self) -> Result<Rule, CssError> {
        let (selectors, terminator) = self.read_prelude()?;
        match terminator {
            Some('{') => {
                let block = self.read_block()?;
                Ok(Rule::Style {
                    selectors,
                    declarations: parse_declarations(&block),
                })
            }
            Some(found) => Err(CssError::Unexpected {
                found,
                offset: self.offset(),
            }),
            None => Err(CssError::UnexpectedEnd),
        }
    }
}

/// Splits a declaration block on top-level semicolons
///
/// Pieces without a colon are dropped, the way browsers ignore them.
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in block.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                pieces.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    pieces.push(current);

    pieces
        .iter()
        .filter_map(|piece| {
            let (name, value) = piece.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = collapse_whitespace(value);
            let (value, important) = split_important(&value);
            Some(Declaration {
                name: name.to_string(),
                value,
                important,
            })
        })
        .collect()
}

fn split_important(value: &str) -> (String, bool) {
    let lowered = value.to_ascii_lowercase();
    if let Some(idx) = lowered.rfind("!important") {
        if lowered[idx + "!important".len()..].trim().is_empty() {
            return (value[..idx].trim_end().to_string(), true);
        }
    }
    (value.to_string(), false)
}

fn import_href(rest: &str) -> String {
    let rest = rest.trim();
    let inner = if rest.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("url(")) {
        rest[4..].split(')').next().unwrap_or("")
    } else {
        rest
    };
    let inner = inner.trim();
    match inner.chars().next() {
        Some(q @ ('"' | '\'')) => inner[1..].split(q).next().unwrap_or("").to_string(),
        _ => inner
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
