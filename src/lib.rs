//! # ember
//!
//! `ember` is an ahead-of-time compiler for a tiny expression-oriented
//! language: integer literals, named definitions, first-class functions with
//! closures over free variables, application, blocks, primitive
//! instructions, and declared external functions. It lowers source text to a
//! typed, LLVM-flavored textual IR through seven strictly sequential passes:
//!
//! ```text
//! text -> lex -> group -> parse -> name -> flatten -> normalize -> emit -> IR
//! ```
//!
//! Each pass is a pure function of its input (see [`compiler`]); the data
//! structures that flow between them live in [`construct`], and the handful
//! of things every pass shares (source text, the type lattice) live in
//! [`common`].
//!
//! ## Compiling a program
//!
//! ```
//! use ember::{compile, Source};
//!
//! let source = Source::source("x = 3; y = 4; instruction add (x, y)");
//! let ir = compile(&source).unwrap();
//! assert!(ir.contains("define i32 @main()"));
//! ```
//!
//! ## What's deliberately missing
//!
//! No optimization, no garbage collection of closures, no polymorphism
//! beyond the single `Unknown` placeholder used during inference, no
//! user-defined data types, no modules, no source-location tracking in
//! errors, no incremental recompilation. These are explicit non-goals, not
//! oversights — see `SPEC_FULL.md` in the repository root for the full
//! rationale.

pub mod common;
pub mod compiler;
pub mod construct;

pub use common::Source;
pub use compiler::{compile, CompileError};
