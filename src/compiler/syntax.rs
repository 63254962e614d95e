use std::error::Error;
use std::fmt;

/// Every way a compilation can fail, one variant per pass (plus one for
/// invariants this crate itself should never violate). There are no spans —
/// messages name the offending token, name, or shape in free text instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    LexError(String),
    GroupError(String),
    ParseError(String),
    NameError(String),
    TypeError(String),
    InternalError(String),
}

impl CompileError {
    pub fn lex(reason: impl Into<String>) -> CompileError {
        CompileError::LexError(reason.into())
    }

    pub fn group(reason: impl Into<String>) -> CompileError {
        CompileError::GroupError(reason.into())
    }

    pub fn parse(reason: impl Into<String>) -> CompileError {
        CompileError::ParseError(reason.into())
    }

    pub fn name(reason: impl Into<String>) -> CompileError {
        CompileError::NameError(reason.into())
    }

    pub fn ty(reason: impl Into<String>) -> CompileError {
        CompileError::TypeError(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> CompileError {
        CompileError::InternalError(reason.into())
    }

    /// The CLI's exit-code mapping: every error is a clean rejection (1)
    /// except `InternalError`, which signals a bug in the compiler itself (2).
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::InternalError(_) => 2,
            _ => 1,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CompileError::LexError(_) => "lex error",
            CompileError::GroupError(_) => "group error",
            CompileError::ParseError(_) => "parse error",
            CompileError::NameError(_) => "name error",
            CompileError::TypeError(_) => "type error",
            CompileError::InternalError(_) => "internal error",
        }
    }

    fn reason(&self) -> &str {
        match self {
            CompileError::LexError(r)
            | CompileError::GroupError(r)
            | CompileError::ParseError(r)
            | CompileError::NameError(r)
            | CompileError::TypeError(r)
            | CompileError::InternalError(r) => r,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.reason())
    }
}

impl Error for CompileError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_is_kind_then_reason() {
        let e = CompileError::lex("unexpected character '$'");
        assert_eq!(e.to_string(), "lex error: unexpected character '$'");
    }

    #[test]
    fn only_internal_errors_exit_2() {
        assert_eq!(CompileError::lex("x").exit_code(), 1);
        assert_eq!(CompileError::group("x").exit_code(), 1);
        assert_eq!(CompileError::parse("x").exit_code(), 1);
        assert_eq!(CompileError::name("x").exit_code(), 1);
        assert_eq!(CompileError::ty("x").exit_code(), 1);
        assert_eq!(CompileError::internal("x").exit_code(), 2);
    }
}
