use std::collections::{HashMap, HashSet};

use crate::common::types::Type;
use crate::compiler::syntax::CompileError;
use crate::construct::flat::{FlatProgram, Leaf, Statement};
use crate::construct::module::{Arg, Body, EnvEntry, Extern, Function, Module, NLeaf, NStatement, Opcode};
use crate::construct::symbol::UniqueName;
use crate::construct::tree::TypeExpr;

/// One level of function nesting. `locals` are names bound directly in this
/// frame (a function's own parameters, plus any `Def`s in its body);
/// `loans` are names this frame borrows from an enclosing frame because its
/// body mentions them, in first-use order.
struct Frame {
    locals: HashSet<UniqueName>,
    loans: Vec<UniqueName>,
}

/// Closure conversion, currying, and a one-pass eager type inference, all
/// driven off a single walk of the flattened program. Because every name
/// is already globally unique, "is this a local, a loan, or a module
/// global" is pure bookkeeping — nothing here ever renames anything.
struct Normalizer {
    scopes: Vec<Frame>,
    /// Hoisted function tags and declared externals: referencing these by
    /// name never creates a loan (spec: "references to module-global
    /// functions are not loans").
    globals: HashSet<UniqueName>,
    types: HashMap<UniqueName, Type>,
    fns: Vec<Function>,
    /// Original source arity of each hoisted function, used to tell which
    /// curry step in a call chain is the saturating one.
    fn_arity: HashMap<UniqueName, usize>,
    /// Parameter types of each hoisted function, in declaration order, keyed
    /// by the function's own tag — lets a call chain recover the callee's
    /// argument type without re-deriving it from scratch at the call site.
    fn_param_types: HashMap<UniqueName, Vec<Type>>,
    externals: HashMap<UniqueName, Option<usize>>,
    external_order: Vec<UniqueName>,
    synth_counter: u32,
}

impl Normalizer {
    fn new() -> Normalizer {
        Normalizer {
            scopes: vec![Frame {
                locals: HashSet::new(),
                loans: Vec::new(),
            }],
            globals: HashSet::new(),
            types: HashMap::new(),
            fns: Vec::new(),
            fn_arity: HashMap::new(),
            fn_param_types: HashMap::new(),
            externals: HashMap::new(),
            external_order: Vec::new(),
            synth_counter: 0,
        }
    }

    fn synth(&mut self, prefix: &str) -> UniqueName {
        let n = self.synth_counter;
        self.synth_counter += 1;
        UniqueName::new(format!("{}%{}", prefix, n))
    }

    fn type_of(&self, name: &UniqueName) -> Type {
        self.types.get(name).cloned().unwrap_or(Type::Unknown)
    }

    fn leaf_type(&self, leaf: &NLeaf) -> Type {
        match leaf {
            NLeaf::Integer(_) => Type::Int,
            NLeaf::Name(n) => self.type_of(n),
        }
    }

    fn declare_local(&mut self, name: UniqueName) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.locals.insert(name.clone());
        }
        self.types.entry(name).or_insert(Type::Unknown);
    }

    fn unify_type(&mut self, name: &UniqueName, t: Type) -> Result<(), CompileError> {
        let current = self.type_of(name);
        let unified = Type::unify(current, t)
            .map_err(|msg| CompileError::ty(format!("in `{}`: {}", name, msg)))?;
        self.types.insert(name.clone(), unified);
        Ok(())
    }

    /// Records that the current (innermost) frame used `name`. If `name` is
    /// bound in some enclosing frame, it's pushed onto the `loans` list of
    /// every frame strictly between its binder and here.
    fn touch(&mut self, name: &UniqueName) -> Result<(), CompileError> {
        if self.globals.contains(name) || self.externals.contains_key(name) {
            return Ok(());
        }

        let found_at = self
            .scopes
            .iter()
            .enumerate()
            .rev()
            .find(|(_, frame)| frame.locals.contains(name) || frame.loans.contains(name))
            .map(|(idx, _)| idx)
            .ok_or_else(|| {
                CompileError::internal(format!("normalizer lost track of binding `{}`", name))
            })?;

        for frame in &mut self.scopes[found_at + 1..] {
            if !frame.loans.contains(name) {
                frame.loans.push(name.clone());
            }
        }
        Ok(())
    }

    fn lower_leaf(&mut self, leaf: Leaf) -> Result<NLeaf, CompileError> {
        match leaf {
            Leaf::Integer(n) => Ok(NLeaf::Integer(n)),
            Leaf::Name(n) => {
                self.touch(&n)?;
                Ok(NLeaf::Name(n))
            }
        }
    }

    fn arity_of_type(te: &TypeExpr) -> usize {
        match te {
            TypeExpr::Fn(args, ret) => args.len() + Self::arity_of_type(ret),
            TypeExpr::Name(_) => 0,
        }
    }

    fn register_external(
        &mut self,
        name: UniqueName,
        declared_arity: Option<usize>,
    ) -> Result<(), CompileError> {
        let previous = self.externals.get(&name).cloned().flatten();
        match (previous, declared_arity) {
            (Some(a), Some(b)) if a != b => {
                return Err(CompileError::ty(format!(
                    "external `{}` redeclared with a different arity",
                    name
                )))
            }
            _ => {}
        }
        if !self.externals.contains_key(&name) {
            self.external_order.push(name.clone());
        }
        let merged = self
            .externals
            .get(&name)
            .cloned()
            .flatten()
            .or(declared_arity);
        self.externals.insert(name.clone(), merged);
        self.globals.insert(name.clone());
        self.types.insert(name, Type::Int);
        Ok(())
    }

    fn check_external_arity(&mut self, name: &UniqueName, n: usize) -> Result<(), CompileError> {
        match self.externals.get(name).cloned().flatten() {
            Some(arity) if arity != n => Err(CompileError::ty(format!(
                "external `{}` expects {} argument(s), called with {}",
                name, arity, n
            ))),
            Some(_) => Ok(()),
            None => {
                self.externals.insert(name.clone(), Some(n));
                Ok(())
            }
        }
    }

    fn process_body(
        &mut self,
        statements: Vec<Statement>,
        result: Leaf,
    ) -> Result<Body, CompileError> {
        let mut out = Vec::new();
        for stmt in statements {
            self.process_statement(stmt, &mut out)?;
        }
        let result = self.lower_leaf(result)?;
        Ok(Body {
            statements: out,
            result,
        })
    }

    fn process_statement(
        &mut self,
        stmt: Statement,
        out: &mut Vec<NStatement>,
    ) -> Result<(), CompileError> {
        match stmt {
            Statement::Def { name, expression } => {
                let leaf = self.lower_leaf(expression)?;
                let t = self.leaf_type(&leaf);
                self.declare_local(name.clone());
                self.unify_type(&name, t)?;
                let vtype = self.type_of(&name);

                // A `Def` that just binds an already-hoisted function (the
                // common `name = (params) => body` shape, which the
                // flattener splits into a `Fn` plus a `Def` aliasing it)
                // must carry over that function's arity and parameter
                // types, or a call through `name` loses currying info.
                if let NLeaf::Name(target) = &leaf {
                    if let Some(arity) = self.fn_arity.get(target).copied() {
                        self.fn_arity.insert(name.clone(), arity);
                    }
                    if let Some(types) = self.fn_param_types.get(target).cloned() {
                        self.fn_param_types.insert(name.clone(), types);
                    }
                    if self.globals.contains(target) {
                        self.globals.insert(name.clone());
                    }
                }

                out.push(NStatement::Def {
                    name,
                    expression: leaf,
                    vtype,
                });
            }

            Statement::External { name, vtype } => {
                let arity = vtype.as_ref().map(Self::arity_of_type);
                self.register_external(name, arity)?;
            }

            Statement::Fn { name, args, body, ret } => {
                if args.is_empty() {
                    // The parser rejects `() => ...` outright (every
                    // function carries exactly one positional argument per
                    // curry stage once normalized — there's no nullary
                    // normal form for `build_curried_functions` to build),
                    // so reaching this with zero args means the parser's
                    // own invariant broke, not that the source is malformed.
                    return Err(CompileError::internal(
                        "normalizer received a function with no arguments",
                    ));
                }

                let mut locals = HashSet::new();
                for arg in &args {
                    locals.insert(arg.clone());
                    self.types.entry(arg.clone()).or_insert(Type::Unknown);
                }
                self.scopes.push(Frame {
                    locals,
                    loans: Vec::new(),
                });
                let inner_body = self.process_body(body, ret)?;
                let frame = self.scopes.pop().expect("frame pushed above");
                let outer_loans = frame.loans;

                let param_types = args.iter().map(|p| self.type_of(p)).collect();
                self.build_curried_functions(&name, &args, &outer_loans, inner_body)?;
                self.fn_arity.insert(name.clone(), args.len());
                self.fn_param_types.insert(name.clone(), param_types);
                self.globals.insert(name.clone());

                let captures = outer_loans.into_iter().map(NLeaf::Name).collect();
                out.push(NStatement::Closure {
                    name: name.clone(),
                    function: name,
                    captures,
                });
            }

            Statement::Call { name, call, args } => {
                self.process_call(name, call, args, out)?;
            }

            Statement::Instruction { name, opcode, args } => {
                let op = Opcode::from_name(&opcode).ok_or_else(|| {
                    CompileError::ty(format!("unknown instruction `{}`", opcode))
                })?;
                if args.len() != op.arity() {
                    return Err(CompileError::ty(format!(
                        "instruction `{}` expects {} argument(s), found {}",
                        opcode,
                        op.arity(),
                        args.len()
                    )));
                }
                let arg_leaves = args
                    .into_iter()
                    .map(|a| self.lower_leaf(a))
                    .collect::<Result<Vec<_>, _>>()?;
                for leaf in &arg_leaves {
                    if let NLeaf::Name(n) = leaf {
                        self.unify_type(n, Type::Int)?;
                    }
                }
                self.declare_local(name.clone());
                self.unify_type(&name, Type::Int)?;
                out.push(NStatement::Instruction {
                    name,
                    opcode: op,
                    args: arg_leaves,
                });
            }
        }
        Ok(())
    }

    fn process_call(
        &mut self,
        name: UniqueName,
        call: Leaf,
        args: Vec<Leaf>,
        out: &mut Vec<NStatement>,
    ) -> Result<(), CompileError> {
        let callee = self.lower_leaf(call)?;

        let is_external = matches!(&callee, NLeaf::Name(n) if self.externals.contains_key(n));
        if is_external {
            let external = match &callee {
                NLeaf::Name(n) => n.clone(),
                _ => unreachable!(),
            };
            let arg_leaves = args
                .into_iter()
                .map(|a| self.lower_leaf(a))
                .collect::<Result<Vec<_>, _>>()?;
            self.check_external_arity(&external, arg_leaves.len())?;
            self.declare_local(name.clone());
            self.unify_type(&name, Type::Int)?;
            out.push(NStatement::ExternalCall {
                name,
                external,
                args: arg_leaves,
            });
            return Ok(());
        }

        let known_arity = match &callee {
            NLeaf::Name(n) => self.fn_arity.get(n).copied(),
            _ => None,
        };
        let known_param_types = match &callee {
            NLeaf::Name(n) => self.fn_param_types.get(n).cloned(),
            _ => None,
        };
        let n_args = args.len();
        let mut current = callee;

        for (i, arg) in args.into_iter().enumerate() {
            let arg_leaf = self.lower_leaf(arg)?;
            let saturates = known_arity
                .map(|arity| i + 1 == arity)
                .unwrap_or(i + 1 == n_args);
            let step_name = if i + 1 == n_args {
                name.clone()
            } else {
                self.synth("call")
            };
            let arg_type = known_param_types
                .as_ref()
                .and_then(|types| types.get(i).cloned())
                .unwrap_or(Type::Int);
            let ret_type = if saturates {
                Type::Int
            } else {
                Type::func(Type::Unknown, Type::Unknown)
            };

            // `known_arity` is only populated from a hoisted function's own
            // arity table. When it's absent, the callee is some other
            // binding — most commonly a function parameter — whose type was
            // never constrained by being hoisted; unify it against the
            // shape this call site is actually applying it as, or it stays
            // `Unknown` (and wrongly gets emitted as a scalar) forever.
            if known_arity.is_none() {
                if let NLeaf::Name(callee_name) = &current {
                    self.unify_type(callee_name, Type::func(arg_type.clone(), ret_type.clone()))?;
                }
            }

            self.declare_local(step_name.clone());
            self.unify_type(&step_name, ret_type.clone())?;
            out.push(NStatement::Call {
                name: step_name.clone(),
                call: current,
                arg: arg_leaf,
                arg_type,
                ret_type,
            });
            current = NLeaf::Name(step_name);
        }

        Ok(())
    }

    fn curried_name(original: &UniqueName, stage: usize) -> UniqueName {
        if stage == 0 {
            original.clone()
        } else {
            UniqueName::new(format!("{}${}", original.as_str(), stage))
        }
    }

    /// Splits a multi-argument function into `params.len()` nested
    /// one-argument functions. Every stage but the last just constructs and
    /// returns the closure for the next stage; the last carries the real
    /// body. Built back-to-front so each stage's return type is already
    /// known when the stage before it needs it.
    fn build_curried_functions(
        &mut self,
        original_tag: &UniqueName,
        params: &[UniqueName],
        outer_loans: &[UniqueName],
        inner_body: Body,
    ) -> Result<(), CompileError> {
        let n = params.len();
        let mut next_ret_type: Option<Type> = None;
        let mut staged = Vec::with_capacity(n);

        for i in (0..n).rev() {
            let fn_name = Self::curried_name(original_tag, i);
            let env_names: Vec<UniqueName> = if i == 0 {
                outer_loans.to_vec()
            } else {
                outer_loans
                    .iter()
                    .cloned()
                    .chain(params[..i].iter().cloned())
                    .collect()
            };
            let env = env_names
                .iter()
                .map(|n| EnvEntry {
                    name: n.clone(),
                    vtype: self.type_of(n),
                })
                .collect();
            let arg = Arg {
                name: params[i].clone(),
                vtype: self.type_of(&params[i]),
            };

            let (body, ret_type) = if i + 1 == n {
                (inner_body.clone(), self.leaf_type(&inner_body.result))
            } else {
                let next_name = Self::curried_name(original_tag, i + 1);
                let next_env_names: Vec<UniqueName> = outer_loans
                    .iter()
                    .cloned()
                    .chain(params[..i + 1].iter().cloned())
                    .collect();
                let captures = next_env_names.into_iter().map(NLeaf::Name).collect();
                let result_name = self.synth(&format!("{}.clo", fn_name.as_str()));
                let body = Body {
                    statements: vec![NStatement::Closure {
                        name: result_name.clone(),
                        function: next_name,
                        captures,
                    }],
                    result: NLeaf::Name(result_name),
                };
                let ret_type = Type::func(
                    arg.vtype.clone(),
                    next_ret_type.clone().expect("later stage already built"),
                );
                (body, ret_type)
            };

            next_ret_type = Some(ret_type.clone());
            staged.push(Function {
                name: fn_name,
                env,
                arg,
                ret_type,
                body,
            });
        }

        // `original_tag` is stage 0's name, but referencing it as a value
        // (rather than calling it) means its type is the function's own
        // signature, one level up from whatever `next_ret_type` ended at.
        let stage0_ret = next_ret_type.unwrap_or(Type::Unknown);
        let value_type = Type::func(self.type_of(&params[0]), stage0_ret);
        self.types.insert(original_tag.clone(), value_type);
        self.fns.extend(staged.into_iter().rev());
        Ok(())
    }
}

/// Collapses any remaining `Unknown` to `Int`, the language's only concrete
/// scalar — recursively, so an unconstrained closure parameter or return
/// type (`Fn(Unknown, Unknown)`) becomes `Fn(Int, Int)` rather than staying
/// partially abstract. Unification never introduces `Unknown` itself, only
/// carries it forward when nothing ever constrained a binding; this is the
/// single place that resolves it, so the `Module` this function returns
/// satisfies spec.md §8's "no `Unknown` remains" invariant rather than
/// leaving that to whichever pass reads the module next.
fn concretize(t: Type) -> Type {
    match t {
        Type::Unknown => Type::Int,
        Type::Int => Type::Int,
        Type::Fn(arg, ret) => Type::func(concretize(*arg), concretize(*ret)),
    }
}

fn concretize_statement(stmt: &mut NStatement) {
    match stmt {
        NStatement::Def { vtype, .. } => {
            *vtype = concretize(vtype.clone());
        }
        NStatement::Call {
            arg_type, ret_type, ..
        } => {
            *arg_type = concretize(arg_type.clone());
            *ret_type = concretize(ret_type.clone());
        }
        NStatement::Closure { .. } | NStatement::ExternalCall { .. } | NStatement::Instruction { .. } => {}
    }
}

fn concretize_body(body: &mut Body) {
    for stmt in &mut body.statements {
        concretize_statement(stmt);
    }
}

fn concretize_function(f: &mut Function) {
    for entry in &mut f.env {
        entry.vtype = concretize(entry.vtype.clone());
    }
    f.arg.vtype = concretize(f.arg.vtype.clone());
    f.ret_type = concretize(f.ret_type.clone());
    concretize_body(&mut f.body);
}

pub fn normalize(flat: FlatProgram) -> Result<Module, CompileError> {
    let mut normalizer = Normalizer::new();
    let main = normalizer.process_body(flat.statements, flat.expression)?;
    let externals = normalizer
        .external_order
        .iter()
        .map(|name| Extern {
            name: name.clone(),
            arity: normalizer.externals.get(name).cloned().flatten().unwrap_or(0),
        })
        .collect();

    let mut module = Module {
        externals,
        fns: normalizer.fns,
        main,
    };
    for f in &mut module.fns {
        concretize_function(f);
    }
    concretize_body(&mut module.main);
    Ok(module)
}
