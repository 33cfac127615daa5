//! Lexical analysis for Vague source text.
//!
//! Deterministic left-to-right scan producing tokens for identifiers,
//! numbers, double-quoted strings, line comments, operators and
//! delimiters, as described in spec.md §4.1. Keywords are matched
//! against [`TokenKind::keyword_lookup`] plus whatever a
//! [`crate::registry::PluginRegistry`] has registered.

use crate::error::LexError;
use crate::registry::PluginRegistry;
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Tokenizes Vague source text on demand.
pub struct Lexer<'a> {
    source: &'a str,
    remaining: &'a str,
    position: usize,
    line: usize,
    column: usize,
    /// Keywords registered by a plugin registry, checked after the fixed
    /// built-in table.
    plugin_keywords: Vec<String>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer with no plugin-registered keywords.
    pub fn new(source: &'a str) -> Self {
        Self::with_registry(source, None)
    }

    /// Creates a new lexer, consulting `registry` for additional keywords.
    pub fn with_registry(source: &'a str, registry: Option<&dyn PluginRegistry>) -> Self {
        let plugin_keywords = registry.map(|r| r.keywords().to_vec()).unwrap_or_default();
        Lexer {
            source,
            remaining: source,
            position: 0,
            line: 1,
            column: 1,
            plugin_keywords,
        }
    }

    /// Tokenizes the entire source, stopping at (and including) the first
    /// [`TokenKind::Eof`]. Lex errors are collected rather than aborting,
    /// so batch diagnostics can be reported together.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        loop {
            match self.next_token() {
                Ok(tok) => {
                    let is_eof = tok.kind == TokenKind::Eof;
                    tokens.push(tok);
                    if is_eof {
                        break;
                    }
                }
                Err(e) => errors.push(e),
            }
        }
        (tokens, errors)
    }

    /// Produces the next token, or a [`LexError`] if the lexer cannot make
    /// progress on the current input.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(tok) = self.try_newline() {
            return Ok(tok);
        }
        self.skip_inline_whitespace_and_comments();

        if self.remaining.is_empty() {
            return Ok(Token::new(
                TokenKind::Eof,
                "",
                Span::new(self.position, self.position, self.line, self.column),
            ));
        }

        if let Some(tok) = self.try_newline() {
            return Ok(tok);
        }

        if let Some(tok) = self.try_string()? {
            return Ok(tok);
        }
        if let Some(tok) = self.try_number()? {
            return Ok(tok);
        }
        if let Some(tok) = self.try_identifier_or_keyword() {
            return Ok(tok);
        }
        if let Some(tok) = self.try_operator() {
            return Ok(tok);
        }

        let start = (self.position, self.line, self.column);
        let ch = self.remaining.chars().next().unwrap();
        self.advance(ch.len_utf8());
        Err(LexError::UnexpectedChar {
            ch,
            span: Span::new(start.0, self.position, start.1, start.2),
        })
    }

    fn try_newline(&mut self) -> Option<Token> {
        if !self.remaining.starts_with(['\n', '\r']) {
            return None;
        }
        let start = (self.position, self.line, self.column);
        while let Some(ch) = self.remaining.chars().next() {
            if ch == '\n' {
                self.advance(1);
                self.line += 1;
                self.column = 1;
            } else if ch == '\r' {
                self.advance(1);
            } else if ch.is_whitespace() {
                self.advance(ch.len_utf8());
            } else if self.remaining.starts_with("//") {
                self.skip_line_comment();
            } else {
                break;
            }
        }
        Some(Token::new(
            TokenKind::Newline,
            "",
            Span::new(start.0, self.position, start.1, start.2),
        ))
    }

    fn skip_inline_whitespace_and_comments(&mut self) {
        loop {
            let before = self.remaining.len();
            while let Some(ch) = self.remaining.chars().next() {
                if ch == ' ' || ch == '\t' {
                    self.advance(ch.len_utf8());
                } else {
                    break;
                }
            }
            if self.remaining.starts_with("//") {
                self.skip_line_comment();
            }
            if self.remaining.len() == before {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.remaining.chars().next() {
            if ch == '\n' {
                break;
            }
            self.advance(ch.len_utf8());
        }
    }

    fn try_string(&mut self) -> Result<Option<Token>, LexError> {
        if !self.remaining.starts_with('"') {
            return Ok(None);
        }
        let start = (self.position, self.line, self.column);
        self.advance(1);

        let mut content = String::new();
        let mut escaped = false;
        loop {
            let Some(ch) = self.remaining.chars().next() else {
                return Err(LexError::UnterminatedString {
                    span: Span::new(start.0, self.position, start.1, start.2),
                });
            };
            if escaped {
                match ch {
                    'n' => content.push('\n'),
                    't' => content.push('\t'),
                    '\\' => content.push('\\'),
                    '"' => content.push('"'),
                    other => {
                        return Err(LexError::InvalidEscape {
                            ch: other,
                            span: Span::new(
                                self.position.saturating_sub(1),
                                self.position + 1,
                                self.line,
                                self.column,
                            ),
                        });
                    }
                }
                escaped = false;
                self.advance(ch.len_utf8());
            } else if ch == '\\' {
                escaped = true;
                self.advance(1);
            } else if ch == '"' {
                self.advance(1);
                return Ok(Some(Token::new(
                    TokenKind::String,
                    content,
                    Span::new(start.0, self.position, start.1, start.2),
                )));
            } else if ch == '\n' {
                return Err(LexError::UnterminatedString {
                    span: Span::new(start.0, self.position, start.1, start.2),
                });
            } else {
                content.push(ch);
                self.advance(ch.len_utf8());
            }
        }
    }

    fn try_number(&mut self) -> Result<Option<Token>, LexError> {
        let first = self.remaining.chars().next();
        if !matches!(first, Some(c) if c.is_ascii_digit()) {
            return Ok(None);
        }
        let start = (self.position, self.line, self.column);
        let mut lexeme = String::new();
        let mut saw_dot = false;

        while let Some(ch) = self.remaining.chars().next() {
            if ch.is_ascii_digit() {
                lexeme.push(ch);
                self.advance(1);
            } else if ch == '_' {
                // digit separator, dropped from the lexeme
                self.advance(1);
            } else if ch == '.' && !saw_dot {
                let next_is_digit = self
                    .remaining
                    .chars()
                    .nth(1)
                    .is_some_and(|c| c.is_ascii_digit());
                let is_range_dots = self.remaining.starts_with("..");
                if is_range_dots || !next_is_digit {
                    break;
                }
                saw_dot = true;
                lexeme.push(ch);
                self.advance(1);
            } else {
                break;
            }
        }

        if lexeme.is_empty() || lexeme == "." {
            return Err(LexError::MalformedNumber {
                span: Span::new(start.0, self.position, start.1, start.2),
            });
        }

        Ok(Some(Token::new(
            TokenKind::Number,
            lexeme,
            Span::new(start.0, self.position, start.1, start.2),
        )))
    }

    fn try_identifier_or_keyword(&mut self) -> Option<Token> {
        let first = self.remaining.chars().next()?;
        if !(first.is_alphabetic() || first == '_') {
            return None;
        }
        let start = (self.position, self.line, self.column);
        let mut lexeme = String::new();

        loop {
            // Consume one identifier segment.
            while let Some(ch) = self.remaining.chars().next() {
                if ch.is_alphanumeric() || ch == '_' {
                    lexeme.push(ch);
                    self.advance(ch.len_utf8());
                } else {
                    break;
                }
            }
            // Qualified name: `a.b.c`, but not `a..b` (range) or a trailing dot.
            if self.remaining.starts_with('.') && !self.remaining.starts_with("..") {
                let after_dot = self.remaining[1..].chars().next();
                if after_dot.is_some_and(|c| c.is_alphabetic() || c == '_') {
                    lexeme.push('.');
                    self.advance(1);
                    continue;
                }
            }
            break;
        }

        let kind = TokenKind::keyword_lookup(&lexeme)
            .or_else(|| {
                if self.plugin_keywords.iter().any(|k| k == &lexeme) {
                    Some(TokenKind::PluginKeyword)
                } else {
                    None
                }
            })
            .unwrap_or(TokenKind::Identifier);

        Some(Token::new(
            kind,
            lexeme,
            Span::new(start.0, self.position, start.1, start.2),
        ))
    }

    fn try_operator(&mut self) -> Option<Token> {
        let start = (self.position, self.line, self.column);
        let (kind, len): (TokenKind, usize) = if self.remaining.starts_with("??") {
            (TokenKind::DoubleQuestion, 2)
        } else if self.remaining.starts_with("==") {
            (TokenKind::EqEq, 2)
        } else if self.remaining.starts_with("!=") {
            (TokenKind::Ne, 2)
        } else if self.remaining.starts_with("<=") {
            (TokenKind::Le, 2)
        } else if self.remaining.starts_with(">=") {
            (TokenKind::Ge, 2)
        } else if self.remaining.starts_with("+=") {
            (TokenKind::PlusEq, 2)
        } else if self.remaining.starts_with("=>") {
            (TokenKind::FatArrow, 2)
        } else if self.remaining.starts_with("->") {
            (TokenKind::Arrow, 2)
        } else if self.remaining.starts_with("..") {
            (TokenKind::DotDot, 2)
        } else if self.remaining.starts_with('|') {
            (TokenKind::Pipe, 1)
        } else if self.remaining.starts_with('~') {
            (TokenKind::Tilde, 1)
        } else if self.remaining.starts_with(':') {
            (TokenKind::Colon, 1)
        } else if self.remaining.starts_with('=') {
            (TokenKind::Equal, 1)
        } else if self.remaining.starts_with('^') {
            (TokenKind::Caret, 1)
        } else if self.remaining.starts_with('<') {
            (TokenKind::Lt, 1)
        } else if self.remaining.starts_with('>') {
            (TokenKind::Gt, 1)
        } else if self.remaining.starts_with('+') {
            (TokenKind::Plus, 1)
        } else if self.remaining.starts_with('-') {
            (TokenKind::Minus, 1)
        } else if self.remaining.starts_with('*') {
            (TokenKind::Star, 1)
        } else if self.remaining.starts_with('/') {
            (TokenKind::Slash, 1)
        } else if self.remaining.starts_with('%') {
            (TokenKind::Percent, 1)
        } else if self.remaining.starts_with('?') {
            (TokenKind::Question, 1)
        } else if self.remaining.starts_with(',') {
            (TokenKind::Comma, 1)
        } else if self.remaining.starts_with('.') {
            (TokenKind::Dot, 1)
        } else if self.remaining.starts_with('(') {
            (TokenKind::LeftParen, 1)
        } else if self.remaining.starts_with(')') {
            (TokenKind::RightParen, 1)
        } else if self.remaining.starts_with('{') {
            (TokenKind::LeftBrace, 1)
        } else if self.remaining.starts_with('}') {
            (TokenKind::RightBrace, 1)
        } else if self.remaining.starts_with('[') {
            (TokenKind::LeftBracket, 1)
        } else if self.remaining.starts_with(']') {
            (TokenKind::RightBracket, 1)
        } else {
            return None;
        };

        let lexeme = self.remaining[..len].to_string();
        self.advance(len);
        Some(Token::new(
            kind,
            lexeme,
            Span::new(start.0, self.position, start.1, start.2),
        ))
    }

    fn advance(&mut self, bytes: usize) {
        self.position += bytes;
        self.column += bytes;
        self.remaining = &self.source[self.position..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .0
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| *k != TokenKind::Newline)
            .collect()
    }

    #[test]
    fn lexes_schema_header() {
        let k = kinds("schema S {\n  x: int\n}");
        assert_eq!(
            k,
            vec![
                TokenKind::Schema,
                TokenKind::Identifier,
                TokenKind::LeftBrace,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Int,
                TokenKind::RightBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_range() {
        let k = kinds("1..10");
        assert_eq!(
            k,
            vec![TokenKind::Number, TokenKind::DotDot, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_decimal_number() {
        let (tokens, errs) = Lexer::new("3.14").tokenize();
        assert!(errs.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "3.14");
    }

    #[test]
    fn lexes_digit_separated_number() {
        let (tokens, errs) = Lexer::new("1_000_000").tokenize();
        assert!(errs.is_empty());
        assert_eq!(tokens[0].lexeme, "1000000");
    }

    #[test]
    fn lexes_qualified_identifier() {
        let (tokens, _) = Lexer::new("line_items.amount").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].lexeme, "line_items.amount");
    }

    #[test]
    fn string_escapes() {
        let (tokens, errs) = Lexer::new(r#""a\nb""#).tokenize();
        assert!(errs.is_empty());
        assert_eq!(tokens[0].lexeme, "a\nb");
    }

    #[test]
    fn unterminated_string_errors() {
        let (_, errs) = Lexer::new("\"abc").tokenize();
        assert!(matches!(errs[0], LexError::UnterminatedString { .. }));
    }

    #[test]
    fn unknown_char_errors() {
        let (_, errs) = Lexer::new("$").tokenize();
        assert!(matches!(errs[0], LexError::UnexpectedChar { .. }));
    }

    #[test]
    fn round_trip_lexemes_relex_identically() {
        let source = "schema S { x: int in 1..10, assume x > 100 }";
        let (tokens, _) = Lexer::new(source).tokenize();
        let reconstructed: String = tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof && t.kind != TokenKind::Newline)
            .map(|t| t.lexeme.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let (retokens, _) = Lexer::new(&reconstructed).tokenize();
        let original_kinds: Vec<_> = tokens
            .iter()
            .map(|t| t.kind.clone())
            .filter(|k| *k != TokenKind::Newline)
            .collect();
        let reparsed_kinds: Vec<_> = retokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(original_kinds, reparsed_kinds);
    }
}
