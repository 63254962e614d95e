use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed multi- and single-character syntax forms recognized by the
/// lexer. Matched greedily, longer-first among the two-character operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Syn {
    FatArrow, // =>
    Arrow,    // ->
    Colon,    // :
    Equal,    // =
    Semi,     // ;
    Comma,    // ,
    LParen,   // (
    RParen,   // )
    Instruction,
    External,
}

impl Syn {
    pub fn text(self) -> &'static str {
        match self {
            Syn::FatArrow => "=>",
            Syn::Arrow => "->",
            Syn::Colon => ":",
            Syn::Equal => "=",
            Syn::Semi => ";",
            Syn::Comma => ",",
            Syn::LParen => "(",
            Syn::RParen => ")",
            Syn::Instruction => "instruction",
            Syn::External => "external",
        }
    }
}

impl fmt::Display for Syn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// A single lexical token. Carries no source location, just enough data to
/// reconstruct what the lexer matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Token {
    Syntax(Syn),
    /// Raw decimal text, with an optional leading `-`. Parsed to an `i64`
    /// by the grouper, which is the first pass that needs the value.
    Integer(String),
    Name(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Syntax(s) => write!(f, "`{}`", s),
            Token::Integer(text) => write!(f, "integer `{}`", text),
            Token::Name(name) => write!(f, "name `{}`", name),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

pub type Tokens = Vec<Token>;
