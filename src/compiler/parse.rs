use crate::compiler::syntax::CompileError;
use crate::construct::tree::{Ast, Op, OperatorTree, Separator, TypeExpr};

/// Converts the grouper's operator tree into the semantic AST: definitions,
/// functions, calls, instructions, externals, blocks, and tuples. Plain
/// source names are not yet unique — that's the namer's job.
pub fn parse(tree: OperatorTree) -> Result<Ast, CompileError> {
    to_ast(tree)
}

/// Peels away nested single-element, separator-less blocks, i.e. redundant
/// parenthesization like `((a))`.
fn peel(tree: OperatorTree) -> OperatorTree {
    match tree {
        OperatorTree::Block(None, mut exprs) if exprs.len() == 1 => peel(exprs.remove(0)),
        other => other,
    }
}

fn to_ast(tree: OperatorTree) -> Result<Ast, CompileError> {
    match tree {
        OperatorTree::Integer(n) => Ok(Ast::Integer(n)),
        OperatorTree::Name(n) => Ok(Ast::Name(n)),
        OperatorTree::Instruction(opcode, args) => Ok(Ast::Instruction {
            opcode,
            args: args.into_iter().map(to_ast).collect::<Result<_, _>>()?,
        }),
        OperatorTree::External(name) => Ok(Ast::External { name, vtype: None }),
        OperatorTree::Block(sep, exprs) => block_to_ast(sep, exprs),
        OperatorTree::Operator(op, lhs, rhs) => operator_to_ast(op, *lhs, *rhs),
    }
}

fn block_to_ast(
    sep: Option<Separator>,
    exprs: Vec<OperatorTree>,
) -> Result<Ast, CompileError> {
    match sep {
        None if exprs.is_empty() => Ok(Ast::Tuple(vec![])),
        None if exprs.len() == 1 => to_ast(exprs.into_iter().next().unwrap()),
        None => Err(CompileError::internal(
            "grouper produced a null-separator block with more than one expression",
        )),
        Some(Separator::Semi) => Ok(Ast::Block(
            exprs.into_iter().map(to_ast).collect::<Result<_, _>>()?,
        )),
        Some(Separator::Comma) => Ok(Ast::Tuple(
            exprs.into_iter().map(to_ast).collect::<Result<_, _>>()?,
        )),
    }
}

fn operator_to_ast(op: Op, lhs: OperatorTree, rhs: OperatorTree) -> Result<Ast, CompileError> {
    match op {
        Op::Equal => {
            let (name, vtype) = name_and_vtype(lhs)?;
            Ok(Ast::Def {
                name,
                expression: Box::new(to_ast(rhs)?),
                vtype,
            })
        }
        Op::FatArrow => {
            let args = name_tuple(lhs)?;
            Ok(Ast::Fn {
                args,
                expression: Box::new(to_ast(rhs)?),
            })
        }
        Op::Colon => match peel(lhs) {
            OperatorTree::External(name) => Ok(Ast::External {
                name,
                vtype: Some(to_type(rhs)?),
            }),
            other => Err(CompileError::parse(format!(
                "`:` may only follow an external name or the left side of `=`, found {}",
                other.describe()
            ))),
        },
        Op::Arrow => Err(CompileError::parse(
            "a type expression cannot appear where a value is expected",
        )),
        Op::Call => {
            let call = Box::new(to_ast(lhs)?);
            let args = match rhs {
                OperatorTree::Block(Some(Separator::Comma), exprs) => {
                    exprs.into_iter().map(to_ast).collect::<Result<_, _>>()?
                }
                other => vec![to_ast(other)?],
            };
            Ok(Ast::Call { call, args })
        }
    }
}

/// Extracts `(name, vtype)` from the left side of `=`: either a bare name,
/// or a name with a type attached via `:`.
fn name_and_vtype(lhs: OperatorTree) -> Result<(String, Option<TypeExpr>), CompileError> {
    match peel(lhs) {
        OperatorTree::Name(name) => Ok((name, None)),
        OperatorTree::Operator(Op::Colon, inner_lhs, inner_rhs) => match peel(*inner_lhs) {
            OperatorTree::Name(name) => Ok((name, Some(to_type(*inner_rhs)?))),
            other => Err(CompileError::parse(format!(
                "left side of `=` must be a name, found {}",
                other.describe()
            ))),
        },
        other => Err(CompileError::parse(format!(
            "left side of `=` must be a name, found {}",
            other.describe()
        ))),
    }
}

/// Extracts the parameter names from the left side of `=>`: a tuple of
/// names, or a single bare name. Every function carries exactly one
/// positional argument per curry stage once normalized (spec.md §4.6), so
/// there's no normal form for a nullary `() => expr` — it's rejected here,
/// at the source boundary, rather than further down the pipeline.
fn name_tuple(lhs: OperatorTree) -> Result<Vec<String>, CompileError> {
    match lhs {
        OperatorTree::Name(name) => Ok(vec![name]),
        OperatorTree::Block(None, exprs) if exprs.is_empty() => Err(CompileError::parse(
            "a function must take at least one argument, found `()`",
        )),
        OperatorTree::Block(Some(Separator::Comma), exprs) | OperatorTree::Block(None, exprs) => {
            exprs
                .into_iter()
                .map(|e| match e {
                    OperatorTree::Name(name) => Ok(name),
                    other => Err(CompileError::parse(format!(
                        "function parameters must be names, found {}",
                        other.describe()
                    ))),
                })
                .collect()
        }
        other => Err(CompileError::parse(format!(
            "left side of `=>` must be a tuple of names, found {}",
            other.describe()
        ))),
    }
}

fn to_type(tree: OperatorTree) -> Result<TypeExpr, CompileError> {
    match tree {
        OperatorTree::Name(name) => Ok(TypeExpr::Name(name)),
        OperatorTree::Operator(Op::Arrow, lhs, rhs) => {
            let args = type_tuple(*lhs)?;
            let ret = Box::new(to_type(*rhs)?);
            Ok(TypeExpr::Fn(args, ret))
        }
        OperatorTree::Block(None, exprs) if exprs.len() == 1 => {
            to_type(exprs.into_iter().next().unwrap())
        }
        other => Err(CompileError::parse(format!(
            "malformed type expression: found {}",
            other.describe()
        ))),
    }
}

/// The left side of `->`: a tuple of type expressions, possibly degenerate
/// (a bare type, or an empty/singleton group).
fn type_tuple(tree: OperatorTree) -> Result<Vec<TypeExpr>, CompileError> {
    match tree {
        OperatorTree::Block(None, exprs) if exprs.is_empty() => Ok(vec![]),
        OperatorTree::Block(None, exprs) if exprs.len() == 1 => {
            Ok(vec![to_type(exprs.into_iter().next().unwrap())?])
        }
        OperatorTree::Block(Some(Separator::Comma), exprs) => {
            exprs.into_iter().map(to_type).collect()
        }
        other => Ok(vec![to_type(other)?]),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::group::group;
    use crate::compiler::lex::Lexer;
    use proptest::prelude::*;

    fn parse_str(s: &str) -> Result<Ast, CompileError> {
        let tokens = Lexer::new(s).lex().unwrap();
        parse(group(tokens)?)
    }

    #[test]
    fn constant_scenario() {
        let ast = parse_str("x = 3; x").unwrap();
        assert_eq!(
            ast,
            Ast::Block(vec![
                Ast::Def {
                    name: "x".to_string(),
                    expression: Box::new(Ast::Integer(3)),
                    vtype: None,
                },
                Ast::Name("x".to_string()),
            ])
        );
    }

    #[test]
    fn primitive_scenario() {
        let ast = parse_str("x = 3; y = 4; instruction add (x, y)").unwrap();
        match ast {
            Ast::Block(stmts) => {
                assert_eq!(stmts.len(), 3);
                assert!(matches!(
                    stmts[2],
                    Ast::Instruction { ref opcode, .. } if opcode == "add"
                ));
            }
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn identity_function_scenario() {
        let ast = parse_str("id = (a) => a; id(5)").unwrap();
        match ast {
            Ast::Block(stmts) => match &stmts[0] {
                Ast::Def { name, expression, .. } => {
                    assert_eq!(name, "id");
                    assert_eq!(
                        **expression,
                        Ast::Fn {
                            args: vec!["a".to_string()],
                            expression: Box::new(Ast::Name("a".to_string())),
                        }
                    );
                }
                other => panic!("expected a Def, got {:?}", other),
            },
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn currying_scenario_nests_calls() {
        let ast = parse_str("f(2)(3)").unwrap();
        match ast {
            Ast::Block(mut stmts) => {
                let call = stmts.remove(0);
                match call {
                    Ast::Call { call, args } => {
                        assert_eq!(args, vec![Ast::Integer(3)]);
                        assert!(matches!(*call, Ast::Call { .. }));
                    }
                    other => panic!("expected a Call, got {:?}", other),
                }
            }
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn external_with_type_scenario() {
        let ast = parse_str("external puts : Int -> Int; puts(0)").unwrap();
        match ast {
            Ast::Block(stmts) => match &stmts[0] {
                Ast::External { name, vtype } => {
                    assert_eq!(name, "puts");
                    assert_eq!(
                        *vtype,
                        Some(TypeExpr::Fn(
                            vec![TypeExpr::Name("Int".to_string())],
                            Box::new(TypeExpr::Name("Int".to_string())),
                        ))
                    );
                }
                other => panic!("expected an External, got {:?}", other),
            },
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn def_lhs_must_be_a_name() {
        assert!(parse_str("3 = 4").is_err());
    }

    #[test]
    fn fn_params_must_be_names() {
        assert!(parse_str("(1, 2) => 3").is_err());
    }

    #[test]
    fn nullary_fn_is_a_parse_error() {
        assert!(parse_str("() => 3").is_err());
    }

    proptest! {
        #[test]
        fn doesnt_crash(s in "\\PC{0,40}") {
            if let Ok(tokens) = Lexer::new(&s).lex() {
                if let Ok(tree) = group(tokens) {
                    let _ = parse(tree);
                }
            }
        }
    }
}
