use serde::{Deserialize, Serialize};

use crate::construct::{symbol::UniqueName, tree::TypeExpr};

/// The semantic AST after α-renaming: every binding carries a globally
/// unique name, every `Name` reference has been resolved to the unique name
/// of its binder, and `Call`/`Instruction`/`External`/`Fn` nodes carry an
/// additional synthetic unique name (`tag`) used from flattening onward as
/// an SSA-value name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NamedAst {
    Integer(i64),
    Name(UniqueName),
    Def {
        name: UniqueName,
        expression: Box<NamedAst>,
        vtype: Option<TypeExpr>,
    },
    Fn {
        tag: UniqueName,
        args: Vec<UniqueName>,
        expression: Box<NamedAst>,
    },
    Call {
        tag: UniqueName,
        call: Box<NamedAst>,
        args: Vec<NamedAst>,
    },
    Instruction {
        tag: UniqueName,
        opcode: String,
        args: Vec<NamedAst>,
    },
    External {
        tag: UniqueName,
        name: UniqueName,
        vtype: Option<TypeExpr>,
    },
    Block(Vec<NamedAst>),
    Tuple(Vec<NamedAst>),
}
