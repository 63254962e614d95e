use serde::{Deserialize, Serialize};

use crate::common::types::Type;
use crate::construct::symbol::UniqueName;

/// The fixed row of primitive instructions. Extending the language with a
/// new primitive is exactly adding a row here plus a matching arm in the IR
/// emitter — no other pass needs to know about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Add,
    Sub,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
        }
    }

    pub fn from_name(name: &str) -> Option<Opcode> {
        match name {
            "add" => Some(Opcode::Add),
            "sub" => Some(Opcode::Sub),
            _ => None,
        }
    }

    /// Every primitive in this row is typed `Int, Int -> Int`.
    pub fn arity(self) -> usize {
        2
    }

    pub fn signature(self) -> (Vec<Type>, Type) {
        (vec![Type::Int, Type::Int], Type::Int)
    }
}

/// A leaf value in the normalized module: either a name already bound in
/// scope, or an integer constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NLeaf {
    Name(UniqueName),
    Integer(i64),
}

/// A captured environment entry — a loan, materialized at the point its
/// owning closure is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub name: UniqueName,
    pub vtype: Type,
}

/// The single positional argument every hoisted function takes (in
/// addition to its implicit environment pointer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    pub name: UniqueName,
    pub vtype: Type,
}

/// One step of a normalized function or `main` body. Calls are split into
/// two shapes because they have different calling conventions: closures are
/// curried down to a single argument, externals keep their declared arity
/// and use the plain (non-env) convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NStatement {
    /// `vtype` is the already-inferred type of `expression`, carried here
    /// because the emitter picks an identity instruction by type and has no
    /// other way to recover it once the statement list is built.
    Def {
        name: UniqueName,
        expression: NLeaf,
        vtype: Type,
    },
    /// Materializes a closure value `{code_ptr, env_ptr}` for a hoisted
    /// function, packing the listed captures (in first-use order) into a
    /// freshly stack-allocated environment record.
    Closure {
        name: UniqueName,
        function: UniqueName,
        captures: Vec<NLeaf>,
    },
    /// A single-argument application of a closure value. `arg_type` and
    /// `ret_type` are the callee's parameter and result types — the emitter
    /// needs both to pick the code pointer's signature, and nothing upstream
    /// of here still has the callee's shape in hand.
    Call {
        name: UniqueName,
        call: NLeaf,
        arg: NLeaf,
        arg_type: Type,
        ret_type: Type,
    },
    /// A direct, plain-convention call to a declared external.
    ExternalCall {
        name: UniqueName,
        external: UniqueName,
        args: Vec<NLeaf>,
    },
    Instruction {
        name: UniqueName,
        opcode: Opcode,
        args: Vec<NLeaf>,
    },
}

/// A sequence of statements followed by the value they produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub statements: Vec<NStatement>,
    pub result: NLeaf,
}

/// A declared external function: imported, plain calling convention, arity
/// derived from the `Int -> Int -> ... -> Int` signature given at parse
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extern {
    pub name: UniqueName,
    pub arity: usize,
}

/// A function hoisted to module scope. Always takes exactly one positional
/// argument plus an implicit environment pointer — currying is already
/// done by the time a `Function` exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: UniqueName,
    pub env: Vec<EnvEntry>,
    pub arg: Arg,
    pub ret_type: Type,
    pub body: Body,
}

/// The output of the normalizer: every function definition hoisted to
/// module scope, with closures and externals already distinguished, ready
/// for the IR emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub externals: Vec<Extern>,
    pub fns: Vec<Function>,
    pub main: Body,
}
