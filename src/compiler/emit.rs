use std::collections::HashMap;
use std::fmt::Write;

use crate::common::types::Type;
use crate::compiler::syntax::CompileError;
use crate::construct::module::{Body, Function, Module, NLeaf, NStatement, Opcode};
use crate::construct::symbol::UniqueName;

const TARGET_TRIPLE: &str = "x86_64-unknown-linux-gnu";

/// Every closure in this language shares one representation regardless of
/// the function it wraps: an opaque code pointer plus an opaque environment
/// pointer. The code pointer is bitcast to its real signature at the point
/// it's built and again at the point it's called, so nothing downstream of
/// construction needs to carry a precise per-closure type.
const CLOSURE_TY: &str = "{ i8*, i8* }";

fn ir_type(t: &Type) -> &'static str {
    match t {
        Type::Int => "i32",
        Type::Fn(..) => CLOSURE_TY,
        // The normalizer's final defaulting pass collapses every `Unknown`
        // in the module to `Int` before the emitter ever sees it; this arm
        // exists only so the match stays exhaustive, not as a fallback this
        // code path is meant to rely on.
        Type::Unknown => "i32",
    }
}

fn operand(leaf: &NLeaf) -> String {
    match leaf {
        NLeaf::Integer(n) => n.to_string(),
        NLeaf::Name(n) => format!("%{}", n.as_str()),
    }
}

fn env_type_name(f: &Function) -> String {
    format!("%env.{}", f.name.as_str())
}

fn code_ptr_ty(f: &Function) -> String {
    format!("{} (i8*, {})*", ir_type(&f.ret_type), ir_type(&f.arg.vtype))
}

struct Emitter<'a> {
    out: String,
    fns: HashMap<&'a str, &'a Function>,
}

impl<'a> Emitter<'a> {
    fn new(module: &'a Module) -> Emitter<'a> {
        let fns = module
            .fns
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();
        Emitter {
            out: String::new(),
            fns,
        }
    }

    fn lookup(&self, name: &UniqueName) -> Result<&'a Function, CompileError> {
        self.fns.get(name.as_str()).copied().ok_or_else(|| {
            CompileError::internal(format!(
                "closure construction references unknown function `{}`",
                name
            ))
        })
    }

    fn emit_module(&mut self, module: &'a Module) -> Result<(), CompileError> {
        writeln!(self.out, "target triple = \"{}\"", TARGET_TRIPLE).unwrap();
        writeln!(self.out).unwrap();

        for ext in &module.externals {
            let params = vec!["i32"; ext.arity].join(", ");
            writeln!(self.out, "declare i32 @{}({})", ext.name.as_str(), params).unwrap();
        }
        if !module.externals.is_empty() {
            writeln!(self.out).unwrap();
        }

        for f in &module.fns {
            if !f.env.is_empty() {
                let fields = f
                    .env
                    .iter()
                    .map(|e| ir_type(&e.vtype))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(self.out, "{} = type {{ {} }}", env_type_name(f), fields).unwrap();
            }
        }
        writeln!(self.out).unwrap();

        for f in &module.fns {
            self.emit_function(f)?;
            writeln!(self.out).unwrap();
        }

        self.emit_main(&module.main)?;
        Ok(())
    }

    fn emit_function(&mut self, f: &Function) -> Result<(), CompileError> {
        writeln!(
            self.out,
            "define {} @{}(i8* %env_ptr, {} %{}) {{",
            ir_type(&f.ret_type),
            f.name.as_str(),
            ir_type(&f.arg.vtype),
            f.arg.name.as_str()
        )
        .unwrap();
        writeln!(self.out, "entry:").unwrap();

        if !f.env.is_empty() {
            let ty = env_type_name(f);
            writeln!(self.out, "  %env = bitcast i8* %env_ptr to {}*", ty).unwrap();
            for (i, entry) in f.env.iter().enumerate() {
                let field_ty = ir_type(&entry.vtype);
                writeln!(
                    self.out,
                    "  %{}.ptr = getelementptr inbounds {}, {}* %env, i32 0, i32 {}",
                    entry.name.as_str(),
                    ty,
                    ty,
                    i
                )
                .unwrap();
                writeln!(
                    self.out,
                    "  %{} = load {}, {}* %{}.ptr",
                    entry.name.as_str(),
                    field_ty,
                    field_ty,
                    entry.name.as_str()
                )
                .unwrap();
            }
        }

        self.emit_body(&f.body, &f.ret_type)?;
        writeln!(self.out, "}}").unwrap();
        Ok(())
    }

    fn emit_main(&mut self, body: &Body) -> Result<(), CompileError> {
        writeln!(self.out, "define i32 @main() {{").unwrap();
        writeln!(self.out, "entry:").unwrap();
        self.emit_body(body, &Type::Int)?;
        writeln!(self.out, "}}").unwrap();
        Ok(())
    }

    fn emit_body(&mut self, body: &Body, ret_type: &Type) -> Result<(), CompileError> {
        for stmt in &body.statements {
            self.emit_statement(stmt)?;
        }
        writeln!(
            self.out,
            "  ret {} {}",
            ir_type(ret_type),
            operand(&body.result)
        )
        .unwrap();
        Ok(())
    }

    fn emit_statement(&mut self, stmt: &NStatement) -> Result<(), CompileError> {
        match stmt {
            NStatement::Def {
                name,
                expression,
                vtype,
            } => {
                let ty = ir_type(vtype);
                let value = operand(expression);
                if matches!(vtype, Type::Int) {
                    writeln!(self.out, "  %{} = add i32 0, {}", name.as_str(), value).unwrap();
                } else {
                    writeln!(
                        self.out,
                        "  %{} = select i1 true, {} {}, {} {}",
                        name.as_str(),
                        ty,
                        value,
                        ty,
                        value
                    )
                    .unwrap();
                }
            }

            NStatement::Closure {
                name,
                function,
                captures,
            } => self.emit_closure(name, function, captures)?,

            NStatement::Call {
                name,
                call,
                arg,
                arg_type,
                ret_type,
            } => {
                let code_ty = format!("{} (i8*, {})*", ir_type(ret_type), ir_type(arg_type));
                let callee = operand(call);
                writeln!(
                    self.out,
                    "  %{}.code = extractvalue {} {}, 0",
                    name.as_str(),
                    CLOSURE_TY,
                    callee
                )
                .unwrap();
                writeln!(
                    self.out,
                    "  %{}.env = extractvalue {} {}, 1",
                    name.as_str(),
                    CLOSURE_TY,
                    callee
                )
                .unwrap();
                writeln!(
                    self.out,
                    "  %{}.fn = bitcast i8* %{}.code to {}",
                    name.as_str(),
                    name.as_str(),
                    code_ty
                )
                .unwrap();
                writeln!(
                    self.out,
                    "  %{} = call {} %{}.fn(i8* %{}.env, {} {})",
                    name.as_str(),
                    ir_type(ret_type),
                    name.as_str(),
                    name.as_str(),
                    ir_type(arg_type),
                    operand(arg)
                )
                .unwrap();
            }

            NStatement::ExternalCall { name, external, args } => {
                let operands = args
                    .iter()
                    .map(|a| format!("i32 {}", operand(a)))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    self.out,
                    "  %{} = call i32 @{}({})",
                    name.as_str(),
                    external.as_str(),
                    operands
                )
                .unwrap();
            }

            NStatement::Instruction { name, opcode, args } => {
                let op = match opcode {
                    Opcode::Add => "add",
                    Opcode::Sub => "sub",
                };
                writeln!(
                    self.out,
                    "  %{} = {} i32 {}, {}",
                    name.as_str(),
                    op,
                    operand(&args[0]),
                    operand(&args[1])
                )
                .unwrap();
            }
        }
        Ok(())
    }

    fn emit_closure(
        &mut self,
        name: &UniqueName,
        function: &UniqueName,
        captures: &[NLeaf],
    ) -> Result<(), CompileError> {
        let target = self.lookup(function)?;
        let code_ty = code_ptr_ty(target);

        writeln!(
            self.out,
            "  %{}.code = bitcast {} @{} to i8*",
            name.as_str(),
            code_ty,
            function.as_str()
        )
        .unwrap();

        let env_ptr = if captures.is_empty() {
            "null".to_string()
        } else {
            let env_ty = env_type_name(target);
            writeln!(self.out, "  %{}.env = alloca {}", name.as_str(), env_ty).unwrap();
            for (i, (cap, entry)) in captures.iter().zip(target.env.iter()).enumerate() {
                let field_ty = ir_type(&entry.vtype);
                writeln!(
                    self.out,
                    "  %{}.gep{} = getelementptr inbounds {}, {}* %{}.env, i32 0, i32 {}",
                    name.as_str(),
                    i,
                    env_ty,
                    env_ty,
                    name.as_str(),
                    i
                )
                .unwrap();
                writeln!(
                    self.out,
                    "  store {} {}, {}* %{}.gep{}",
                    field_ty,
                    operand(cap),
                    field_ty,
                    name.as_str(),
                    i
                )
                .unwrap();
            }
            writeln!(
                self.out,
                "  %{}.envptr = bitcast {}* %{}.env to i8*",
                name.as_str(),
                env_ty,
                name.as_str()
            )
            .unwrap();
            format!("%{}.envptr", name.as_str())
        };

        writeln!(
            self.out,
            "  %{}.0 = insertvalue {} undef, i8* %{}.code, 0",
            name.as_str(),
            CLOSURE_TY,
            name.as_str()
        )
        .unwrap();
        writeln!(
            self.out,
            "  %{} = insertvalue {} %{}.0, i8* {}, 1",
            name.as_str(),
            CLOSURE_TY,
            name.as_str(),
            env_ptr
        )
        .unwrap();
        Ok(())
    }
}

pub fn emit(module: &Module) -> Result<String, CompileError> {
    let mut emitter = Emitter::new(module);
    emitter.emit_module(module)?;
    Ok(emitter.out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::flatten::flatten;
    use crate::compiler::group::group;
    use crate::compiler::lex::Lexer;
    use crate::compiler::name::name;
    use crate::compiler::normalize::normalize;
    use crate::compiler::parse::parse;

    fn emit_str(s: &str) -> String {
        let tokens = Lexer::new(s).lex().unwrap();
        let tree = group(tokens).unwrap();
        let ast = parse(tree).unwrap();
        let named = name(ast).unwrap();
        let flat = flatten(named).unwrap();
        let module = normalize(flat).unwrap();
        emit(&module).unwrap()
    }

    #[test]
    fn constant_scenario_emits_a_nullary_main() {
        let ir = emit_str("x = 3; x");
        assert!(ir.contains("target triple = \"x86_64-unknown-linux-gnu\""));
        assert!(ir.contains("define i32 @main() {"));
        assert!(ir.contains("ret i32 %"));
    }

    #[test]
    fn primitive_scenario_emits_an_add_instruction() {
        let ir = emit_str("x = 3; y = 4; instruction add (x, y)");
        assert!(ir.contains("= add i32 %"));
    }

    #[test]
    fn identity_function_takes_a_null_environment() {
        let ir = emit_str("id = (a) => a; id(5)");
        assert!(ir.contains("define i32 @.module$fn(i8* %env_ptr, i32 %"));
        assert!(ir.contains("insertvalue { i8*, i8* }"));
    }

    #[test]
    fn capture_scenario_loads_its_environment() {
        let ir = emit_str("k = 10; addk = (a) => instruction add(a, k); addk(7)");
        assert!(ir.contains("= type { i32 }"));
        assert!(ir.contains("bitcast i8* %env_ptr to %env."));
        assert!(ir.contains("getelementptr inbounds"));
    }

    #[test]
    fn external_scenario_uses_the_plain_calling_convention() {
        let ir = emit_str("external puts; puts(0)");
        assert!(ir.contains("declare i32 @puts(i32)"));
        assert!(ir.contains("call i32 @puts(i32 0)"));
    }

    #[test]
    fn currying_scenario_applies_one_argument_at_a_time() {
        let ir = emit_str("f = (a,b) => instruction add(a, b); f(2)(3)");
        // Two chained applications, each extracting a code pointer and an
        // environment pointer out of the closure it's applied to.
        let extract_count = ir.matches("extractvalue").count();
        assert_eq!(extract_count, 4);
    }
}
