use crate::compiler::syntax::CompileError;
use crate::construct::flat::{FlatProgram, Leaf, Statement};
use crate::construct::named::NamedAst;

/// Lowers a named AST into statement form: every nested expression becomes
/// a flat list of statements, each binding exactly one name, followed by a
/// trailing leaf (a `Name` or an `Integer`). Evaluation order is strictly
/// left-to-right and innermost-first.
pub fn flatten(ast: NamedAst) -> Result<FlatProgram, CompileError> {
    let mut statements = Vec::new();
    let expression = flatten_expr(ast, &mut statements)?;
    Ok(FlatProgram {
        statements,
        expression,
    })
}

fn flatten_expr(ast: NamedAst, out: &mut Vec<Statement>) -> Result<Leaf, CompileError> {
    match ast {
        NamedAst::Integer(n) => Ok(Leaf::Integer(n)),
        NamedAst::Name(n) => Ok(Leaf::Name(n)),

        NamedAst::Block(stmts) => {
            let mut last = Leaf::Integer(0);
            let len = stmts.len();
            for (i, stmt) in stmts.into_iter().enumerate() {
                let leaf = flatten_expr(stmt, out)?;
                if i + 1 == len {
                    last = leaf;
                }
            }
            Ok(last)
        }

        NamedAst::Tuple(_) => Err(CompileError::ty(
            "a tuple cannot appear where a value of type Int or Fn is expected",
        )),

        NamedAst::Def { name, expression, .. } => {
            let leaf = flatten_expr(*expression, out)?;
            out.push(Statement::Def {
                name: name.clone(),
                expression: leaf,
            });
            Ok(Leaf::Name(name))
        }

        NamedAst::Fn { tag, args, expression } => {
            let mut body = Vec::new();
            let ret = flatten_expr(*expression, &mut body)?;
            out.push(Statement::Fn {
                name: tag.clone(),
                args,
                body,
                ret,
            });
            Ok(Leaf::Name(tag))
        }

        NamedAst::Call { tag, call, args } => {
            let call_leaf = flatten_expr(*call, out)?;
            let arg_leaves = args
                .into_iter()
                .map(|a| flatten_expr(a, out))
                .collect::<Result<_, _>>()?;
            out.push(Statement::Call {
                name: tag.clone(),
                call: call_leaf,
                args: arg_leaves,
            });
            Ok(Leaf::Name(tag))
        }

        NamedAst::Instruction { tag, opcode, args } => {
            let arg_leaves = args
                .into_iter()
                .map(|a| flatten_expr(a, out))
                .collect::<Result<_, _>>()?;
            out.push(Statement::Instruction {
                name: tag.clone(),
                opcode,
                args: arg_leaves,
            });
            Ok(Leaf::Name(tag))
        }

        NamedAst::External { name, vtype, .. } => {
            out.push(Statement::External {
                name: name.clone(),
                vtype,
            });
            Ok(Leaf::Name(name))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::group::group;
    use crate::compiler::lex::Lexer;
    use crate::compiler::name::name;
    use crate::compiler::parse::parse;
    use proptest::prelude::*;

    fn flatten_str(s: &str) -> Result<FlatProgram, CompileError> {
        let tokens = Lexer::new(s).lex().unwrap();
        let tree = group(tokens).unwrap();
        let ast = parse(tree).unwrap();
        flatten(name(ast).unwrap())
    }

    #[test]
    fn constant_scenario_has_one_def_statement() {
        let flat = flatten_str("x = 3; x").unwrap();
        assert_eq!(flat.statements.len(), 1);
        assert!(matches!(flat.statements[0], Statement::Def { .. }));
        assert!(matches!(flat.expression, Leaf::Name(_)));
    }

    #[test]
    fn primitive_scenario_leaves_only_names_and_integers() {
        let flat = flatten_str("x = 3; y = 4; instruction add (x, y)").unwrap();
        assert_eq!(flat.statements.len(), 3);
        for stmt in &flat.statements {
            let leaves: Vec<&Leaf> = match stmt {
                Statement::Def { expression, .. } => vec![expression],
                Statement::Call { call, args, .. } => {
                    let mut v = vec![call];
                    v.extend(args);
                    v
                }
                Statement::Instruction { args, .. } => args.iter().collect(),
                Statement::External { .. } => vec![],
                Statement::Fn { ret, .. } => vec![ret],
            };
            for leaf in leaves {
                assert!(matches!(leaf, Leaf::Name(_) | Leaf::Integer(_)));
            }
        }
    }

    #[test]
    fn fn_carries_its_own_flattened_body() {
        let flat = flatten_str("id = (a) => a; id(5)").unwrap();
        let fn_stmt = flat
            .statements
            .iter()
            .find(|s| matches!(s, Statement::Fn { .. }))
            .unwrap();
        match fn_stmt {
            Statement::Fn { args, body, ret, .. } => {
                assert_eq!(args.len(), 1);
                assert!(body.is_empty());
                assert!(matches!(ret, Leaf::Name(n) if *n == args[0]));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn bare_tuple_value_is_a_type_error() {
        assert!(flatten_str("(1, 2)").is_err());
    }

    proptest! {
        #[test]
        fn doesnt_crash(s in "\\PC{0,40}") {
            if let Ok(tokens) = Lexer::new(&s).lex() {
                if let Ok(tree) = group(tokens) {
                    if let Ok(ast) = parse(tree) {
                        if let Ok(named) = name(ast) {
                            let _ = flatten(named);
                        }
                    }
                }
            }
        }
    }
}
