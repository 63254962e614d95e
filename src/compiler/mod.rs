//! The seven-pass pipeline, leaves first:
//!
//! ```text
//! text -> lex -> group -> parse -> name -> flatten -> normalize -> emit -> IR
//! ```
//!
//! Each pass is a free function wrapping a small pass-local struct; all of
//! them are pure functions of their input and return `Result<_, CompileError>`.
//! There is no shared mutable state between passes — each owns its scope
//! tables and drops them on exit.

pub mod emit;
pub mod flatten;
pub mod group;
pub mod lex;
pub mod name;
pub mod normalize;
pub mod parse;
pub mod syntax;

pub use syntax::CompileError;

use crate::common::source::Source;
use crate::construct::module::Module;
use crate::construct::token::Tokens;
use crate::construct::tree::{Ast, OperatorTree};
use crate::construct::{flat::FlatProgram, named::NamedAst};

#[inline(always)]
pub fn lex(source: &Source) -> Result<Tokens, CompileError> {
    lex::lex(source)
}

#[inline(always)]
pub fn group(tokens: Tokens) -> Result<OperatorTree, CompileError> {
    group::group(tokens)
}

#[inline(always)]
pub fn parse(tree: OperatorTree) -> Result<Ast, CompileError> {
    parse::parse(tree)
}

#[inline(always)]
pub fn name(ast: Ast) -> Result<NamedAst, CompileError> {
    name::name(ast)
}

#[inline(always)]
pub fn flatten(named: NamedAst) -> Result<FlatProgram, CompileError> {
    flatten::flatten(named)
}

#[inline(always)]
pub fn normalize(flat: FlatProgram) -> Result<Module, CompileError> {
    normalize::normalize(flat)
}

#[inline(always)]
pub fn emit(module: &Module) -> Result<String, CompileError> {
    emit::emit(module)
}

/// Runs every pass in order, from source text to a textual IR module.
pub fn compile(source: &Source) -> Result<String, CompileError> {
    let tokens = lex(source)?;
    let tree = group(tokens)?;
    let ast = parse(tree)?;
    let named = name(ast)?;
    let flat = flatten(named)?;
    let module = normalize(flat)?;
    emit(&module)
}
