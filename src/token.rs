//! The token definition for the tag filter language.

use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// The exact source text matched by this token. Empty for `Eof`.
    pub lexeme: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, lexeme: &'a str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }

    /// The end-of-input token, positioned at `offset`.
    pub fn eof(offset: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            lexeme: "",
            span: Span::new(offset, offset),
        }
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A tag name or meta value, e.g. `tag1`, `photos/2023`, `v1.2`
    Identifier,

    // Punctuation
    Colon,  // :
    LParen, // (
    RParen, // )

    // Operators
    And, // &
    Or,  // |
    Not, // !

    // Special
    Illegal, // An illegal/unknown character
    Eof,     // End of input
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Colon => "':'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::And => "'&'",
            TokenKind::Or => "'|'",
            TokenKind::Not => "'!'",
            TokenKind::Illegal => "illegal character",
            TokenKind::Eof => "end of input",
        };
        f.write_str(name)
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
