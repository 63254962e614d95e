//! `emberc` — the command-line front end for the `ember` compiler.
//!
//! One subcommand per pass, plus `compile`, which chains all seven. Every
//! subcommand reads from stdin and writes to stdout: source text for `lex`
//! and `compile`, the canonical JSON form of the previous pass's output for
//! everything else. This lets any two adjacent passes be piped together for
//! inspection or debugging, e.g.:
//!
//! ```text
//! $ echo 'x = 3; x' | emberc lex | emberc group | emberc parse
//! ```

use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ember::common::source::Source;
use ember::compiler::{self, CompileError};
use ember::construct::flat::FlatProgram;
use ember::construct::module::Module;
use ember::construct::named::NamedAst;
use ember::construct::token::Tokens;
use ember::construct::tree::{Ast, OperatorTree};

#[derive(Parser)]
#[command(name = "emberc")]
#[command(about = "Compiles ember source to a typed SSA-style IR", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Source text -> token stream
    Lex,
    /// Token stream -> operator tree
    Group,
    /// Operator tree -> semantic AST
    Parse,
    /// Semantic AST -> AST with unique names
    Name,
    /// Named AST -> flattened (three-address) statement form
    Flatten,
    /// Flattened form -> closure-converted module
    Normalize,
    /// Normalized module -> textual IR
    Emit,
    /// Source text -> textual IR, running every pass in order
    Compile,
}

fn read_stdin() -> Result<String, CompileError> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| CompileError::internal(format!("couldn't read stdin: {}", e)))?;
    Ok(buf)
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, CompileError> {
    serde_json::from_str(text)
        .map_err(|e| CompileError::internal(format!("malformed interchange JSON: {}", e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CompileError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CompileError::internal(format!("couldn't serialize result: {}", e)))
}

fn run(command: Command) -> Result<String, CompileError> {
    match command {
        Command::Lex => {
            let source = Source::source(read_stdin()?);
            to_json(&compiler::lex(&source)?)
        }
        Command::Group => {
            let tokens: Tokens = from_json(&read_stdin()?)?;
            to_json(&compiler::group(tokens)?)
        }
        Command::Parse => {
            let tree: OperatorTree = from_json(&read_stdin()?)?;
            to_json(&compiler::parse(tree)?)
        }
        Command::Name => {
            let ast: Ast = from_json(&read_stdin()?)?;
            to_json(&compiler::name(ast)?)
        }
        Command::Flatten => {
            let named: NamedAst = from_json(&read_stdin()?)?;
            to_json(&compiler::flatten(named)?)
        }
        Command::Normalize => {
            let flat: FlatProgram = from_json(&read_stdin()?)?;
            to_json(&compiler::normalize(flat)?)
        }
        Command::Emit => {
            let module: Module = from_json(&read_stdin()?)?;
            compiler::emit(&module)
        }
        Command::Compile => {
            let source = Source::source(read_stdin()?);
            compiler::compile(&source)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(output) => {
            print!("{}", output);
            if !output.ends_with('\n') {
                println!();
            }
            ExitCode::from(0)
        }
        Err(err) => {
            let _ = writeln!(io::stderr(), "{}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
