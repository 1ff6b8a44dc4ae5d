//! Tokenizer for pipeline DSL text

use crate::core::error::DslError;
use regex::Regex;
use serde_json::{Number, Value};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Pipe,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Equals,
    Colon,
    At,
    Dollar,
    String,
    Number,
    Bool,
    Identifier,
    Newline,
    Eof,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Pipe => "PIPE",
            TokenKind::Dot => "DOT",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::LBracket => "LBRACKET",
            TokenKind::RBracket => "RBRACKET",
            TokenKind::Comma => "COMMA",
            TokenKind::Equals => "EQUALS",
            TokenKind::Colon => "COLON",
            TokenKind::At => "AT",
            TokenKind::Dollar => "DOLLAR",
            TokenKind::String => "STRING",
            TokenKind::Number => "NUMBER",
            TokenKind::Bool => "BOOL",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lexical token with its decoded value and source position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Decoded value: unquoted string, int/float number, bool, or the raw
    /// text for identifiers and punctuation
    pub value: Value,
    /// Byte offset into the source text
    pub offset: usize,
    /// 1-based
    pub line: usize,
    /// 1-based, in characters
    pub column: usize,
}

impl Token {
    /// The value as text, for identifiers and strings
    pub fn text(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Short description used in syntax errors
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::String => format!("STRING {}", self.value),
            TokenKind::Number | TokenKind::Bool => format!("{} {}", self.kind, self.value),
            _ => match self.value.as_str() {
                Some(text) => format!("{} '{}'", self.kind, text),
                None => self.kind.to_string(),
            },
        }
    }
}

// Order matters: earlier alternatives win at the same position.
const PATTERNS: &[(&str, &str)] = &[
    ("PIPE", r"\|"),
    ("DOT", r"\."),
    ("LPAREN", r"\("),
    ("RPAREN", r"\)"),
    ("LBRACE", r"\{"),
    ("RBRACE", r"\}"),
    ("LBRACKET", r"\["),
    ("RBRACKET", r"\]"),
    ("COMMA", r","),
    ("EQUALS", r"="),
    ("COLON", r":"),
    ("AT", r"@"),
    ("DOLLAR", r"\$"),
    ("STRING", r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#),
    ("NUMBER", r"-?\d+\.?\d*"),
    ("BOOL", r"\b(?:true|false|True|False)\b"),
    ("IDENTIFIER", r"[a-zA-Z_][a-zA-Z0-9_]*"),
    ("WHITESPACE", r"\s+"),
    ("NEWLINE", r"\n"),
    ("COMMENT", r"#[^\n]*"),
];

fn token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        let alternation = PATTERNS
            .iter()
            .map(|(name, pattern)| format!("(?P<{}>{})", name, pattern))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&alternation).expect("token patterns are valid")
    })
}

/// Splits DSL text into tokens; stateless, safe to share
#[derive(Debug, Default, Clone, Copy)]
pub struct Tokenizer;

impl Tokenizer {
    pub fn new() -> Self {
        Self
    }

    /// Tokenize `text`, dropping whitespace and comments.
    ///
    /// The returned sequence always ends with an [`TokenKind::Eof`] token.
    /// A character no pattern matches is a syntax error.
    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>, DslError> {
        let regex = token_regex();
        let mut tokens = Vec::new();
        let mut position = Position::default();

        for caps in regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };

            if whole.start() > position.offset {
                return Err(unexpected_char(&position, text));
            }

            let Some((name, raw)) = PATTERNS
                .iter()
                .find_map(|(name, _)| caps.name(name).map(|m| (*name, m.as_str())))
            else {
                continue;
            };

            let start = position.clone();
            position.advance_to(text, whole.end());

            let (kind, value) = match name {
                "WHITESPACE" | "COMMENT" => continue,
                "PIPE" => (TokenKind::Pipe, Value::String(raw.to_string())),
                "DOT" => (TokenKind::Dot, Value::String(raw.to_string())),
                "LPAREN" => (TokenKind::LParen, Value::String(raw.to_string())),
                "RPAREN" => (TokenKind::RParen, Value::String(raw.to_string())),
                "LBRACE" => (TokenKind::LBrace, Value::String(raw.to_string())),
                "RBRACE" => (TokenKind::RBrace, Value::String(raw.to_string())),
                "LBRACKET" => (TokenKind::LBracket, Value::String(raw.to_string())),
                "RBRACKET" => (TokenKind::RBracket, Value::String(raw.to_string())),
                "COMMA" => (TokenKind::Comma, Value::String(raw.to_string())),
                "EQUALS" => (TokenKind::Equals, Value::String(raw.to_string())),
                "COLON" => (TokenKind::Colon, Value::String(raw.to_string())),
                "AT" => (TokenKind::At, Value::String(raw.to_string())),
                "DOLLAR" => (TokenKind::Dollar, Value::String(raw.to_string())),
                "STRING" => (TokenKind::String, Value::String(unquote(raw))),
                "NUMBER" => match decode_number(raw) {
                    Some(number) => (TokenKind::Number, number),
                    None => return Err(number_out_of_range(&start, raw)),
                },
                "BOOL" => (TokenKind::Bool, Value::Bool(raw.eq_ignore_ascii_case("true"))),
                "IDENTIFIER" => (TokenKind::Identifier, Value::String(raw.to_string())),
                _ => (TokenKind::Newline, Value::String(raw.to_string())),
            };

            tokens.push(Token {
                kind,
                value,
                offset: start.offset,
                line: start.line,
                column: start.column,
            });
        }

        if position.offset < text.len() {
            return Err(unexpected_char(&position, text));
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            value: Value::Null,
            offset: text.len(),
            line: position.line,
            column: position.column,
        });

        Ok(tokens)
    }
}

/// Convenience wrapper around [`Tokenizer::tokenize`]
pub fn tokenize(text: &str) -> Result<Vec<Token>, DslError> {
    Tokenizer::new().tokenize(text)
}

#[derive(Debug, Clone)]
struct Position {
    offset: usize,
    line: usize,
    column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Position {
    fn advance_to(&mut self, text: &str, target: usize) {
        if target <= self.offset {
            return;
        }
        for ch in text[self.offset..target].chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = target;
    }
}

fn unexpected_char(position: &Position, text: &str) -> DslError {
    let ch = text[position.offset..].chars().next().unwrap_or_default();
    DslError::Syntax {
        expected: "a token".to_string(),
        found: format!("unexpected character '{}'", ch),
        line: position.line,
        column: position.column,
    }
}

fn number_out_of_range(position: &Position, raw: &str) -> DslError {
    DslError::Syntax {
        expected: "a number within range".to_string(),
        found: format!("NUMBER {}", raw),
        line: position.line,
        column: position.column,
    }
}

/// Strip the quotes; only quote characters and backslashes are unescaped so
/// paths and patterns like `C:\new` keep their backslashes
fn unquote(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Integer when it fits an i64, float otherwise; `None` when not even an f64 holds it
fn decode_number(raw: &str) -> Option<Value> {
    if !raw.contains('.') {
        if let Ok(n) = raw.parse::<i64>() {
            return Some(Value::from(n));
        }
    }

    let text = if raw.ends_with('.') {
        format!("{}0", raw)
    } else {
        raw.to_string()
    };
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
