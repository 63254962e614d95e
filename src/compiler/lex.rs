use crate::common::source::Source;
use crate::compiler::syntax::CompileError;
use crate::construct::token::{Syn, Token, Tokens};

/// Scans source text into a flat token stream in one left-to-right pass.
/// Whitespace separates tokens but produces none of its own; every other
/// character either extends the current token or is a fatal lex error.
pub struct Lexer<'a> {
    source: &'a str,
    index: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer { source, index: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.source[self.index..]
    }

    fn is_done(&self) -> bool {
        self.index >= self.source.len()
    }

    fn advance(&mut self, bytes: usize) {
        self.index += bytes;
    }

    /// Consumes leading whitespace; emits nothing.
    fn strip(&mut self) {
        while let Some(c) = self.remaining().chars().next() {
            if c == ' ' || c == '\t' || c == '\n' || c == '\r' {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let rest = self.remaining();
        let end = rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.advance(end);
        &rest[..end]
    }

    fn integer(&mut self) -> Result<Token, CompileError> {
        let rest = self.remaining();
        let neg = rest.starts_with('-');
        let start = self.index;
        if neg {
            self.advance(1);
        }
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            self.index = start;
            return Err(CompileError::lex(format!(
                "unexpected character '{}'",
                rest.chars().next().unwrap()
            )));
        }
        let text = &self.source[start..self.index];
        Ok(Token::Integer(text.to_string()))
    }

    fn name_or_keyword(&mut self) -> Token {
        let text = self
            .take_while(|c| c.is_ascii_alphanumeric() || c == '_')
            .to_string();
        match text.as_str() {
            "instruction" => Token::Syntax(Syn::Instruction),
            "external" => Token::Syntax(Syn::External),
            _ => Token::Name(text),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, CompileError> {
        self.strip();
        if self.is_done() {
            return Ok(None);
        }

        let rest = self.remaining();
        let c = rest.chars().next().unwrap();

        if rest.starts_with("=>") {
            self.advance(2);
            return Ok(Some(Token::Syntax(Syn::FatArrow)));
        }
        if rest.starts_with("->") {
            self.advance(2);
            return Ok(Some(Token::Syntax(Syn::Arrow)));
        }

        let single = match c {
            ':' => Some(Syn::Colon),
            '=' => Some(Syn::Equal),
            ';' => Some(Syn::Semi),
            ',' => Some(Syn::Comma),
            '(' => Some(Syn::LParen),
            ')' => Some(Syn::RParen),
            _ => None,
        };
        if let Some(syn) = single {
            self.advance(1);
            return Ok(Some(Token::Syntax(syn)));
        }

        if c.is_ascii_digit() || (c == '-' && rest[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            return Ok(Some(self.integer()?));
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(Some(self.name_or_keyword()));
        }

        Err(CompileError::lex(format!("unexpected character '{}'", c)))
    }

    pub fn lex(mut self) -> Result<Tokens, CompileError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        tokens.push(Token::Eof);
        Ok(tokens)
    }
}

pub fn lex(source: &Source) -> Result<Tokens, CompileError> {
    Lexer::new(&source.contents).lex()
}
