//! The pipeline DSL: tokenizer, parser and normalized text output

pub mod format;
pub mod parser;
pub mod token;

pub use parser::{parse, Parser, ParserConfig, UnknownTypePolicy};
pub use token::{tokenize, Token, TokenKind, Tokenizer};
