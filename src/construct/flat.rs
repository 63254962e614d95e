use serde::{Deserialize, Serialize};

use crate::construct::symbol::UniqueName;
use crate::construct::tree::TypeExpr;

/// After flattening, every expression position holds either a name
/// reference or an integer literal — never a nested expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Leaf {
    Name(UniqueName),
    Integer(i64),
}

/// One step of a flattened (three-address) program. Every statement binds
/// exactly one name to the result of some operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Def {
        name: UniqueName,
        expression: Leaf,
    },
    /// A hoistable function: the flattener does not yet hoist it to module
    /// scope (that's the normalizer's job), but it already carries its own
    /// fully flattened body.
    Fn {
        name: UniqueName,
        args: Vec<UniqueName>,
        body: Vec<Statement>,
        ret: Leaf,
    },
    /// `vtype` is carried here (one field beyond the bare grammar in the
    /// data model write-up) because the normalizer needs the external's
    /// declared signature to derive its arity, and this is the last pass
    /// that still has it in hand.
    External {
        name: UniqueName,
        vtype: Option<TypeExpr>,
    },
    /// Still n-ary at this stage; the normalizer curries calls down to one
    /// argument apiece.
    Call {
        name: UniqueName,
        call: Leaf,
        args: Vec<Leaf>,
    },
    Instruction {
        name: UniqueName,
        opcode: String,
        args: Vec<Leaf>,
    },
}

/// A flattened block: a sequence of statements followed by a trailing
/// simple expression — the block's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatProgram {
    pub statements: Vec<Statement>,
    pub expression: Leaf,
}
