//! Compilation-unit glue (§4.9): the public API a driver depends on.
//! `compile_unit` enumerates a set of modules meant to be compiled
//! together, builds their combined class table, orders them so
//! cross-module bases are declared before their derivatives, enforces
//! the out-of-unit base-class rule, and then drives every module through
//! the declaration pass, the body pass, the three transform passes (in
//! their mandated order), and emission.

#![warn(missing_docs)]

mod cycle;
mod diagnose;
mod error;
mod options;
mod unit;

pub use error::CompileError;
pub use options::CompileOptions;
pub use unit::{CompiledModule, CompiledUnit};

use std::collections::HashSet;

use mypyc_ir::{Diagnostic, DiagnosticSink, ModuleIr, Severity, SourceSpan};
use mypyc_irgen::{
    build_function, declare_module, BuildError, ModuleDecl, TypedClassDef, TypedFunctionDef,
    TypedModule, TypedStmt,
};
use mypyc_passes::run_all_passes;
use mypyc_registry::Registry;

/// Base classes a native class may inherit from even when they aren't
/// declared anywhere in the unit (§4.4's "supported standard metaclass"
/// allow-list; named in §8 scenario 6 as "ABC, Generic, trait").
const SUPPORTED_EXTERNAL_BASES: &[&str] = &["ABC", "Generic", "Protocol"];

/// Compiles `modules` together as one compilation unit (§4.9).
///
/// A condition fatal to the whole unit — a duplicate module name, an
/// import cycle among cross-module class bases, a name collision, or an
/// internal invariant failure surfaced during declaration — aborts
/// immediately and returns `Err` with that single diagnostic. Every
/// other failure (an unsupported construct, a type contract violation,
/// a layout conflict confined to one class, a pass or emission bug in
/// one function) is recorded on the returned `CompiledUnit` and its
/// definition is simply left out of emission, so the rest of the unit
/// still compiles (§7.1).
#[tracing::instrument(skip(modules, options), fields(modules = modules.len()))]
pub fn compile_unit(
    modules: &[TypedModule],
    options: &CompileOptions,
) -> Result<CompiledUnit, Vec<Diagnostic>> {
    let mut seen_names = HashSet::new();
    for module in modules {
        if !seen_names.insert(module.name.as_str()) {
            return Err(vec![unit_fatal(&CompileError::DuplicateModule {
                name: module.name.clone(),
            })]);
        }
    }

    let order = cycle::topo_sort_modules(modules).map_err(|e| vec![unit_fatal(&e)])?;

    let registry =
        mypyc_registry::standard().map_err(|e| vec![unit_fatal(&CompileError::Registry(e))])?;

    let all_class_names: HashSet<&str> = modules
        .iter()
        .flat_map(cycle::class_defs)
        .map(|c| c.name.as_str())
        .collect();

    let mut sink = DiagnosticSink::new();
    let mut compiled = CompiledUnit::default();

    for &idx in &order {
        let module = &modules[idx];
        let decl = match declare_module(module) {
            Ok(decl) => decl,
            Err(err @ (BuildError::NameCollision { .. } | BuildError::Internal { .. })) => {
                return Err(vec![diagnose::from_build_error(&err)]);
            }
            Err(err) => {
                sink.push(diagnose::from_build_error(&err));
                continue;
            }
        };

        let mut mod_ir = ModuleIr::new(module.name.clone());

        for (name, value) in &decl.finals {
            mod_ir.push_final_const(mypyc_ir::FinalConst {
                name: name.clone(),
                value: value.clone(),
            });
        }

        for class_def in cycle::class_defs(module) {
            if !admit_class(class_def, &all_class_names, options, &mut sink) {
                continue;
            }
            let Some(class_ir) = decl.classes.get(&class_def.name) else {
                continue;
            };
            mod_ir.push_class(class_ir.clone());

            for method in &class_def.methods {
                let qualified = qualify_method(method, &class_def.name);
                build_one(&qualified, &module.name, &decl, &registry, &mut mod_ir, &mut sink);
            }
        }

        for stmt in &module.body {
            if let TypedStmt::FunctionDef(f) = stmt {
                build_one(f, &module.name, &decl, &registry, &mut mod_ir, &mut sink);
            }
        }

        match mypyc_emit::emit_module(&mod_ir) {
            Ok(c_source) => compiled.modules.push(CompiledModule {
                name: module.name.clone(),
                c_source,
            }),
            Err(err) => sink.push(diagnose::from_emit_error(&err)),
        }
    }

    compiled.diagnostics = sink.into_vec();
    Ok(compiled)
}

/// Builds one function (or qualified method) through the body pass and
/// all three transform passes, recording a diagnostic and dropping it
/// from `mod_ir` on any failure instead of propagating (§7.1).
fn build_one(
    func_def: &TypedFunctionDef,
    module_name: &str,
    decl: &ModuleDecl,
    registry: &Registry,
    mod_ir: &mut ModuleIr,
    sink: &mut DiagnosticSink,
) {
    let mut func = match build_function(func_def, module_name, decl, registry) {
        Ok(f) => f,
        Err(err) => {
            sink.push(diagnose::from_build_error(&err));
            return;
        }
    };
    if let Err(err) = run_all_passes(&mut func) {
        sink.push(diagnose::from_pass_error(&err));
        return;
    }
    mod_ir.push_func(func);
}

/// A method's `TypedFunctionDef` carries its bare name (`"foo"`); the
/// declaration pass records it under `"Class.foo"` so `build_function`'s
/// own `"{module}.{name}"` lookup key needs the same qualification.
fn qualify_method(method: &TypedFunctionDef, class_name: &str) -> TypedFunctionDef {
    let mut qualified = method.clone();
    qualified.name = format!("{class_name}.{}", method.name);
    qualified
}

/// Decides whether `class_def` may be emitted as a native class (§4.4,
/// §4.9, §8 scenario 6). Returns `false` (and records the reason) when
/// its primary base is declared neither anywhere in the unit nor in
/// [`SUPPORTED_EXTERNAL_BASES`] and the unit's options don't permit an
/// interpreted-subclass fallback, or when they do but the fallback
/// itself is configured to be fatal.
fn admit_class(
    class_def: &TypedClassDef,
    all_class_names: &HashSet<&str>,
    options: &CompileOptions,
    sink: &mut DiagnosticSink,
) -> bool {
    let Some(base) = class_def.bases.first() else {
        return true;
    };
    if all_class_names.contains(base.as_str()) || SUPPORTED_EXTERNAL_BASES.contains(&base.as_str())
    {
        return true;
    }
    if options.allow_interpreted_subclass_fallback {
        let severity = if options.non_native_downgrade_is_fatal {
            Severity::Error
        } else {
            Severity::Warning
        };
        sink.push(Diagnostic::new(
            severity,
            "non-native-class-fallback",
            format!(
                "class {} has an out-of-unit base {base}; falling back to an interpreted class",
                class_def.name
            ),
            SourceSpan::synthetic(),
        ));
    } else {
        sink.push(Diagnostic::new(
            Severity::Error,
            "unsupported-external-base",
            format!(
                "class {} has an out-of-unit base {base}, and interpreted-subclass fallback is disabled",
                class_def.name
            ),
            SourceSpan::synthetic(),
        ));
    }
    false
}

fn unit_fatal(err: &CompileError) -> Diagnostic {
    let (severity, code) = match err {
        CompileError::DuplicateModule { .. } => (Severity::Error, "name-collision"),
        CompileError::ImportCycle(_) => (Severity::Error, "import-cycle"),
        CompileError::Build(BuildError::Internal { .. }) => {
            (Severity::Bug, "internal-invariant-failure")
        }
        CompileError::Build(_) => (Severity::Error, "name-collision"),
        CompileError::Registry(_) => (Severity::Bug, "internal-invariant-failure"),
    };
    Diagnostic::new(severity, code, err.to_string(), SourceSpan::synthetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mypyc_irgen::{Param, TypedExpr};
    use mypyc_registry::BinarySymbol;
    use mypyc_types::RType;

    fn add_module() -> TypedModule {
        let span = SourceSpan::synthetic();
        let body = vec![TypedStmt::Return(
            Some(TypedExpr::BinaryOp {
                op: BinarySymbol::Add,
                left: Box::new(TypedExpr::Name {
                    name: "x".into(),
                    ty: RType::int(),
                    span: span.clone(),
                }),
                right: Box::new(TypedExpr::Name {
                    name: "y".into(),
                    ty: RType::int(),
                    span: span.clone(),
                }),
                ty: RType::int(),
                span: span.clone(),
            }),
            span.clone(),
        )];
        TypedModule {
            name: "pkg.mod".into(),
            body: vec![TypedStmt::FunctionDef(TypedFunctionDef {
                name: "add".into(),
                params: vec![
                    Param { name: "x".into(), ty: RType::int() },
                    Param { name: "y".into(), ty: RType::int() },
                ],
                ret: RType::int(),
                body,
                is_generator: false,
            })],
        }
    }

    #[test]
    fn compiles_a_single_module_to_c_source() {
        let modules = vec![add_module()];
        let compiled = compile_unit(&modules, &CompileOptions::default()).unwrap();
        assert_eq!(compiled.modules.len(), 1);
        assert!(!compiled.has_errors());
        assert!(compiled.modules[0].c_source.contains("CPyDef_pkg_mod_add"));
    }

    #[test]
    fn duplicate_module_names_abort_the_unit() {
        let modules = vec![add_module(), add_module()];
        let err = compile_unit(&modules, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].code, "name-collision");
    }

    #[test]
    fn class_with_unsupported_external_base_is_downgraded_not_emitted() {
        let module = TypedModule {
            name: "pkg.mod".into(),
            body: vec![TypedStmt::ClassDef(TypedClassDef {
                name: "Widget".into(),
                bases: vec!["SomeExternalBase".into()],
                attrs: vec![],
                methods: vec![],
            })],
        };
        let modules = vec![module];
        let compiled = compile_unit(&modules, &CompileOptions::default()).unwrap();
        assert_eq!(compiled.modules.len(), 1);
        assert!(!compiled.modules[0].c_source.contains("Widget"));
        assert!(compiled
            .diagnostics
            .iter()
            .any(|d| d.code == "non-native-class-fallback"));
    }
}
