//! Recursive-descent parser producing a [`PipelineDefinition`]
//!
//! ```text
//! pipeline      := [header] {variable_decl} [step {'|' step}]
//! header        := '@' 'pipeline' (IDENTIFIER | STRING) ':'
//! variable_decl := '$' IDENTIFIER '=' value
//! step          := IDENTIFIER '.' IDENTIFIER ['(' params ')']
//! params        := [param {',' param} [',']]
//! param         := IDENTIFIER '=' value | value
//! value         := STRING | NUMBER | BOOL | 'null' | 'None' | '$' IDENTIFIER
//!                | IDENTIFIER | object | list
//! object        := '{' [(IDENTIFIER | STRING) ':' value {',' ...} [',']] '}'
//! list          := '[' [value {',' value} [',']] ']'
//! ```

use crate::core::{
    atom::{Atom, AtomType, Params},
    error::DslError,
    pipeline::{PipelineDefinition, DEFAULT_PIPELINE_NAME},
    step::PipelineStep,
};
use crate::dsl::token::{Token, TokenKind, Tokenizer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// How a step's module name outside the atom type set is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTypePolicy {
    /// Map it onto [`ParserConfig::fallback_type`]
    #[default]
    Fallback,
    /// Fail with [`DslError::UnknownAtomType`]
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub unknown_type: UnknownTypePolicy,
    pub fallback_type: AtomType,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            unknown_type: UnknownTypePolicy::Fallback,
            fallback_type: AtomType::Data,
        }
    }
}

impl ParserConfig {
    pub fn strict() -> Self {
        Self {
            unknown_type: UnknownTypePolicy::Reject,
            ..Self::default()
        }
    }
}

/// DSL parser; holds only configuration, so one instance can parse concurrently
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
    tokenizer: Tokenizer,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            tokenizer: Tokenizer::new(),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse(&self, text: &str) -> Result<PipelineDefinition, DslError> {
        let tokens = self.tokenizer.tokenize(text)?;
        let mut cursor = Cursor {
            tokens,
            pos: 0,
            config: &self.config,
        };
        let definition = cursor.parse_pipeline()?;
        debug!(
            "Parsed pipeline '{}': {} variables, {} steps",
            definition.name,
            definition.variables.len(),
            definition.steps.len()
        );
        Ok(definition)
    }
}

/// Parse with the default configuration
pub fn parse(text: &str) -> Result<PipelineDefinition, DslError> {
    Parser::new().parse(text)
}

struct Cursor<'a> {
    tokens: Vec<Token>,
    pos: usize,
    config: &'a ParserConfig,
}

impl Cursor<'_> {
    fn parse_pipeline(&mut self) -> Result<PipelineDefinition, DslError> {
        let mut definition = PipelineDefinition::new(DEFAULT_PIPELINE_NAME);

        if self.check(TokenKind::At) {
            definition.name = self.parse_header()?;
        }

        while self.check(TokenKind::Dollar) {
            let (name, value) = self.parse_variable()?;
            definition.variables.insert(name, value);
        }

        if self.is_at_end() {
            return Ok(definition);
        }

        loop {
            definition.steps.push(self.parse_step()?);

            if self.check(TokenKind::Pipe) {
                self.advance();
            } else if self.is_at_end() {
                break;
            } else {
                return Err(self.error("'|' or end of input"));
            }
        }

        Ok(definition)
    }

    fn parse_header(&mut self) -> Result<String, DslError> {
        self.expect(TokenKind::At)?;
        let is_keyword =
            self.check(TokenKind::Identifier) && self.current().text() == Some("pipeline");
        if !is_keyword {
            return Err(self.error("'pipeline' after '@'"));
        }
        self.advance();

        let name = match self.current().kind {
            TokenKind::Identifier | TokenKind::String => self.expect_text(self.current().kind)?,
            _ => return Err(self.error("pipeline name")),
        };
        self.expect(TokenKind::Colon)?;
        Ok(name)
    }

    fn parse_variable(&mut self) -> Result<(String, Value), DslError> {
        self.expect(TokenKind::Dollar)?;
        let name = self.expect_text(TokenKind::Identifier)?;
        self.expect(TokenKind::Equals)?;
        let value = self.parse_value()?;
        Ok((name, value))
    }

    fn parse_step(&mut self) -> Result<PipelineStep, DslError> {
        let module_token = self.current().clone();
        let module = self.expect_text(TokenKind::Identifier)?;
        self.expect(TokenKind::Dot)?;
        let action = self.expect_text(TokenKind::Identifier)?;

        let params = if self.check(TokenKind::LParen) {
            self.parse_params()?
        } else {
            Params::new()
        };

        let atom_type = match AtomType::from_name(&module) {
            Some(atom_type) => atom_type,
            None => match self.config.unknown_type {
                UnknownTypePolicy::Fallback => {
                    warn!(
                        "Unknown atom type '{}' at line {}; using '{}'",
                        module, module_token.line, self.config.fallback_type
                    );
                    self.config.fallback_type
                }
                UnknownTypePolicy::Reject => {
                    return Err(DslError::UnknownAtomType {
                        name: module,
                        line: module_token.line,
                        column: module_token.column,
                    })
                }
            },
        };

        Ok(PipelineStep::new(Atom::with_params(atom_type, action, params)))
    }

    fn parse_params(&mut self) -> Result<Params, DslError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Params::new();
        let mut positional = 0;

        while !self.check(TokenKind::RParen) {
            let key_token = self.current().clone();
            let (key, value) =
                if self.check(TokenKind::Identifier) && self.peek_kind(1) == TokenKind::Equals {
                    let key = self.expect_text(TokenKind::Identifier)?;
                    self.expect(TokenKind::Equals)?;
                    (key, self.parse_value()?)
                } else {
                    let key = format!("_arg{}", positional);
                    positional += 1;
                    (key, self.parse_value()?)
                };

            if params.contains_key(&key) {
                return Err(DslError::Syntax {
                    expected: "unique parameter names".to_string(),
                    found: format!("duplicate parameter '{}'", key),
                    line: key_token.line,
                    column: key_token.column,
                });
            }
            params.insert(key, value);

            if self.check(TokenKind::Comma) {
                self.advance();
            } else if !self.check(TokenKind::RParen) {
                return Err(self.error("',' or ')'"));
            }
        }

        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_value(&mut self) -> Result<Value, DslError> {
        match self.current().kind {
            TokenKind::String | TokenKind::Number | TokenKind::Bool => {
                let value = self.current().value.clone();
                self.advance();
                Ok(value)
            }
            TokenKind::Dollar => {
                self.advance();
                let name = self.expect_text(TokenKind::Identifier)?;
                Ok(Value::String(format!("${}", name)))
            }
            TokenKind::LBrace => self.parse_object(),
            TokenKind::LBracket => self.parse_list(),
            TokenKind::Identifier => {
                let ident = self.expect_text(TokenKind::Identifier)?;
                match ident.as_str() {
                    "null" | "None" => Ok(Value::Null),
                    _ => Ok(Value::String(ident)),
                }
            }
            _ => Err(self.error("value")),
        }
    }

    fn parse_object(&mut self) -> Result<Value, DslError> {
        self.expect(TokenKind::LBrace)?;
        let mut object = Map::new();

        while !self.check(TokenKind::RBrace) {
            let key = match self.current().kind {
                TokenKind::Identifier | TokenKind::String => self.expect_text(self.current().kind)?,
                _ => return Err(self.error("object key")),
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_value()?;
            object.insert(key, value);

            if self.check(TokenKind::Comma) {
                self.advance();
            } else if !self.check(TokenKind::RBrace) {
                return Err(self.error("',' or '}'"));
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(Value::Object(object))
    }

    fn parse_list(&mut self) -> Result<Value, DslError> {
        self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();

        while !self.check(TokenKind::RBracket) {
            items.push(self.parse_value()?);

            if self.check(TokenKind::Comma) {
                self.advance();
            } else if !self.check(TokenKind::RBracket) {
                return Err(self.error("',' or ']'"));
            }
        }

        self.expect(TokenKind::RBracket)?;
        Ok(Value::Array(items))
    }

    // Helpers

    fn current(&self) -> &Token {
        // The tokenizer always appends Eof and `advance` never moves past it
        &self.tokens[self.pos]
    }

    fn peek_kind(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), DslError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(kind.name()))
        }
    }

    fn expect_text(&mut self, kind: TokenKind) -> Result<String, DslError> {
        if !self.check(kind) {
            return Err(self.error(kind.name()));
        }
        let text = self.current().text().unwrap_or_default().to_string();
        self.advance();
        Ok(text)
    }

    fn error(&self, expected: &str) -> DslError {
        let token = self.current();
        DslError::Syntax {
            expected: expected.to_string(),
            found: token.describe(),
            line: token.line,
            column: token.column,
        }
    }
}
