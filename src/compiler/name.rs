use std::collections::{HashMap, HashSet};

use crate::compiler::syntax::CompileError;
use crate::construct::named::NamedAst;
use crate::construct::symbol::UniqueName;
use crate::construct::tree::Ast;

/// The root of every unique name in a compiled module. Chosen so generated
/// names read like the dotted paths used in diagnostics and IR symbols.
const ROOT_PATH: &str = ".module";

/// An immutable mapping from source names to unique names. Extending a
/// scope clones it rather than mutating in place, so a binding is visible
/// only along the branch of the traversal where it was threaded through —
/// sibling statements that ran before it never see it.
#[derive(Clone, Default)]
struct Scope(HashMap<String, UniqueName>);

impl Scope {
    fn new() -> Scope {
        Scope(HashMap::new())
    }

    fn get(&self, name: &str) -> Option<&UniqueName> {
        self.0.get(name)
    }

    fn bind(&self, name: String, unique: UniqueName) -> Scope {
        let mut next = self.0.clone();
        next.insert(name, unique);
        Scope(next)
    }
}

/// Performs α-renaming and reference resolution in a single traversal.
/// Shadowing is allowed: re-defining a source name does not error, it just
/// produces a fresh unique name and rebinds the scope for what follows.
struct Namer {
    used: HashSet<String>,
}

impl Namer {
    fn new() -> Namer {
        Namer {
            used: HashSet::new(),
        }
    }

    /// Turns a candidate textual name into one guaranteed not to collide
    /// with any name generated so far, appending `.1`, `.2`, ... on clash.
    fn fresh(&mut self, candidate: String) -> UniqueName {
        if self.used.insert(candidate.clone()) {
            return UniqueName::new(candidate);
        }
        let mut n = 1u32;
        loop {
            let alt = format!("{}.{}", candidate, n);
            if self.used.insert(alt.clone()) {
                return UniqueName::new(alt);
            }
            n += 1;
        }
    }

    /// Converts one AST node, returning the named node plus, if it was a
    /// binding form (`Def` or `External`), the `(source name, unique name)`
    /// pair the caller should fold into scope for later siblings.
    fn convert(
        &mut self,
        ast: Ast,
        scope: &Scope,
        path: &str,
    ) -> Result<(NamedAst, Option<(String, UniqueName)>), CompileError> {
        match ast {
            Ast::Integer(n) => Ok((NamedAst::Integer(n), None)),

            Ast::Name(n) => {
                let unique = scope.get(&n).cloned().ok_or_else(|| {
                    CompileError::name(format!("reference to undefined name `{}`", n))
                })?;
                Ok((NamedAst::Name(unique), None))
            }

            Ast::Block(stmts) => {
                let mut current = scope.clone();
                let mut out = Vec::with_capacity(stmts.len());
                for stmt in stmts {
                    let (named, binding) = self.convert(stmt, &current, path)?;
                    out.push(named);
                    if let Some((source, unique)) = binding {
                        current = current.bind(source, unique);
                    }
                }
                Ok((NamedAst::Block(out), None))
            }

            Ast::Tuple(elems) => {
                let out = elems
                    .into_iter()
                    .map(|e| Ok(self.convert(e, scope, path)?.0))
                    .collect::<Result<_, CompileError>>()?;
                Ok((NamedAst::Tuple(out), None))
            }

            Ast::Def {
                name,
                expression,
                vtype,
            } => {
                let unique = self.fresh(format!("{}.{}", path, name));
                // Anything nested inside this def's initializer — most
                // usefully a hoisted `Fn` — is named under the def's own
                // path, so `id = (a) => a` produces a function tag that
                // reads as "id's function" rather than an anonymous one.
                let inner_path = unique.as_str().to_string();
                let (named_expr, _) = self.convert(*expression, scope, &inner_path)?;
                Ok((
                    NamedAst::Def {
                        name: unique.clone(),
                        expression: Box::new(named_expr),
                        vtype,
                    },
                    Some((name, unique)),
                ))
            }

            Ast::Fn { args, expression } => {
                let tag = self.fresh(format!("{}$fn", path));
                let fn_path = tag.as_str().to_string();
                let mut inner = scope.clone();
                let mut unique_args = Vec::with_capacity(args.len());
                for arg in args {
                    let unique = self.fresh(format!("{}.{}", fn_path, arg));
                    inner = inner.bind(arg, unique.clone());
                    unique_args.push(unique);
                }
                let (body, _) = self.convert(*expression, &inner, &fn_path)?;
                Ok((
                    NamedAst::Fn {
                        tag,
                        args: unique_args,
                        expression: Box::new(body),
                    },
                    None,
                ))
            }

            Ast::Call { call, args } => {
                let tag = self.fresh(format!("{}$call", path));
                let (named_call, _) = self.convert(*call, scope, path)?;
                let named_args = args
                    .into_iter()
                    .map(|a| Ok(self.convert(a, scope, path)?.0))
                    .collect::<Result<_, CompileError>>()?;
                Ok((
                    NamedAst::Call {
                        tag,
                        call: Box::new(named_call),
                        args: named_args,
                    },
                    None,
                ))
            }

            Ast::Instruction { opcode, args } => {
                let tag = self.fresh(format!("{}$res", path));
                let named_args = args
                    .into_iter()
                    .map(|a| Ok(self.convert(a, scope, path)?.0))
                    .collect::<Result<_, CompileError>>()?;
                Ok((
                    NamedAst::Instruction {
                        tag,
                        opcode,
                        args: named_args,
                    },
                    None,
                ))
            }

            Ast::External { name, vtype } => {
                let tag = self.fresh(format!("{}$external", path));
                // The linkage name is the literal symbol, never uniquified:
                // it has to match the imported symbol's actual name.
                let unique = UniqueName::new(name.clone());
                Ok((
                    NamedAst::External {
                        tag,
                        name: unique.clone(),
                        vtype,
                    },
                    Some((name, unique)),
                ))
            }
        }
    }
}

pub fn name(ast: Ast) -> Result<NamedAst, CompileError> {
    let mut namer = Namer::new();
    let scope = Scope::new();
    let (named, _) = namer.convert(ast, &scope, ROOT_PATH)?;
    Ok(named)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::group::group;
    use crate::compiler::lex::Lexer;
    use crate::compiler::parse::parse;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn name_str(s: &str) -> Result<NamedAst, CompileError> {
        let tokens = Lexer::new(s).lex().unwrap();
        let tree = group(tokens).unwrap();
        let ast = parse(tree).unwrap();
        name(ast)
    }

    fn collect_def_names(ast: &NamedAst, out: &mut Vec<UniqueName>) {
        match ast {
            NamedAst::Def { name, expression, .. } => {
                out.push(name.clone());
                collect_def_names(expression, out);
            }
            NamedAst::Fn { expression, .. } => collect_def_names(expression, out),
            NamedAst::Call { call, args, .. } => {
                collect_def_names(call, out);
                args.iter().for_each(|a| collect_def_names(a, out));
            }
            NamedAst::Instruction { args, .. } => {
                args.iter().for_each(|a| collect_def_names(a, out))
            }
            NamedAst::Block(stmts) | NamedAst::Tuple(stmts) => {
                stmts.iter().for_each(|s| collect_def_names(s, out))
            }
            NamedAst::Integer(_) | NamedAst::Name(_) | NamedAst::External { .. } => {}
        }
    }

    #[test]
    fn undefined_name_is_fatal() {
        assert!(name_str("x").is_err());
    }

    #[test]
    fn shadowing_produces_distinct_unique_names() {
        let named = name_str("x = 1; x = x; x").unwrap();
        let mut names = Vec::new();
        collect_def_names(&named, &mut names);
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn shadowed_def_initializer_sees_the_previous_binding() {
        // the rhs `x` in the second def must resolve to the first `x`, not
        // the one currently being defined.
        let named = name_str("x = 1; x = x; x").unwrap();
        match named {
            NamedAst::Block(stmts) => match &stmts[1] {
                NamedAst::Def { name, expression, .. } => {
                    if let NamedAst::Name(referenced) = expression.as_ref() {
                        assert_ne!(referenced, name);
                    } else {
                        panic!("expected a Name reference");
                    }
                }
                other => panic!("expected a Def, got {:?}", other),
            },
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn external_name_is_not_uniquified() {
        let named = name_str("external puts; puts(0)").unwrap();
        match named {
            NamedAst::Block(stmts) => match &stmts[0] {
                NamedAst::External { name, .. } => assert_eq!(name.as_str(), "puts"),
                other => panic!("expected an External, got {:?}", other),
            },
            other => panic!("expected a block, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn doesnt_crash(s in "\\PC{0,40}") {
            if let Ok(tokens) = Lexer::new(&s).lex() {
                if let Ok(tree) = group(tokens) {
                    if let Ok(ast) = parse(tree) {
                        let _ = name(ast);
                    }
                }
            }
        }
    }
}
