use std::collections::HashMap;

use mypyc_ir::{
    ClassFlags, ClassId, ClassIr, FuncFlags, FuncIr, FuncRef, LiteralValue, Signature, VtableEntry,
};

use crate::ast::{TypedClassDef, TypedExpr, TypedModule, TypedStmt};
use crate::error::BuildError;

/// The declaration pass's output for one module (§4.4): every global's
/// type, every class's skeleton (attribute layout and vtable, methods
/// not yet given bodies), and every function's signature — enough for
/// the body pass to early-bind any reference within the unit.
#[derive(Debug, Default)]
pub struct ModuleDecl {
    /// Module-level globals and their declared types.
    pub globals: HashMap<String, mypyc_types::RType>,
    /// Module-level `Final` names whose initializer is a compile-time
    /// constant, recorded so the body pass can inline every read of them
    /// as a `LoadLiteral` instead of a global load (§4.4).
    pub finals: HashMap<String, LiteralValue>,
    /// Native class skeletons, keyed by name.
    pub classes: HashMap<String, ClassIr>,
    /// Function signatures, keyed by fully-qualified name
    /// (`"module.func"` or `"module.Class.method"`).
    pub funcs: HashMap<String, Signature>,
    /// Whether a given fully-qualified function name is a generator.
    pub generators: HashMap<String, bool>,
}

/// The compile-time-constant value of `expr`, if it has one — the set of
/// literal forms a `Final` initializer may inline to (§4.4).
fn const_literal(expr: &TypedExpr) -> Option<LiteralValue> {
    match expr {
        TypedExpr::IntLiteral { value, .. } => Some(LiteralValue::Int(*value)),
        TypedExpr::BoolLiteral { value, .. } => Some(LiteralValue::Bool(*value)),
        TypedExpr::FloatLiteral { value, .. } => Some(LiteralValue::Float(*value)),
        TypedExpr::StrLiteral { value, .. } => Some(LiteralValue::Str(value.clone())),
        TypedExpr::NoneLiteral { .. } => Some(LiteralValue::None),
        _ => None,
    }
}

/// Run the declaration pass over `module`, populating a [`ModuleDecl`].
///
/// Classes are processed in dependency order (base before derived) so
/// that a derived class's vtable can be seeded from its base's. Traits
/// are ordinary classes with `ClassFlags::is_trait` and are declared
/// like any other base.
#[tracing::instrument(skip(module), fields(module = %module.name))]
pub fn declare_module(module: &TypedModule) -> Result<ModuleDecl, BuildError> {
    let mut decl = ModuleDecl::default();
    let mut next_class_id = 0u32;

    let class_defs: Vec<&TypedClassDef> = module
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            TypedStmt::ClassDef(c) => Some(c),
            _ => None,
        })
        .collect();

    let ordered = topo_sort_classes(&class_defs)?;

    for class_def in ordered {
        declare_class(&module.name, class_def, &mut decl, &mut next_class_id)?;
    }

    for stmt in &module.body {
        match stmt {
            TypedStmt::FunctionDef(f) => {
                let qualified = format!("{}.{}", module.name, f.name);
                if decl.funcs.contains_key(&qualified) {
                    return Err(BuildError::NameCollision { name: qualified });
                }
                let sig = Signature::new(
                    f.params.iter().map(|p| p.ty.clone()).collect(),
                    f.ret.clone(),
                );
                decl.generators.insert(qualified.clone(), f.is_generator);
                decl.funcs.insert(qualified, sig);
            }
            TypedStmt::Assign {
                target,
                value,
                is_final,
                ..
            } => {
                if *is_final {
                    if let Some(literal) = const_literal(value) {
                        decl.finals.insert(target.clone(), literal);
                        continue;
                    }
                }
                decl.globals.insert(target.clone(), value.ty());
            }
            _ => {}
        }
    }

    Ok(decl)
}

fn topo_sort_classes<'a>(
    classes: &[&'a TypedClassDef],
) -> Result<Vec<&'a TypedClassDef>, BuildError> {
    let by_name: HashMap<&str, &TypedClassDef> =
        classes.iter().map(|c| (c.name.as_str(), *c)).collect();
    let mut order = Vec::new();
    let mut done: HashMap<&str, bool> = HashMap::new();

    fn visit<'a>(
        name: &'a str,
        by_name: &HashMap<&'a str, &'a TypedClassDef>,
        done: &mut HashMap<&'a str, bool>,
        order: &mut Vec<&'a TypedClassDef>,
    ) -> Result<(), BuildError> {
        match done.get(name) {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(BuildError::LayoutConflict {
                    class: name.to_string(),
                    detail: "base-class cycle".into(),
                })
            }
            None => {}
        }
        let Some(def) = by_name.get(name) else {
            return Ok(());
        };
        done.insert(name, false);
        for base in &def.bases {
            visit(base, by_name, done, order)?;
        }
        done.insert(name, true);
        order.push(def);
        Ok(())
    }

    for c in classes {
        visit(&c.name, &by_name, &mut done, &mut order)?;
    }
    Ok(order)
}

fn declare_class(
    module_name: &str,
    class_def: &TypedClassDef,
    decl: &mut ModuleDecl,
    next_class_id: &mut u32,
) -> Result<(), BuildError> {
    if decl.classes.contains_key(&class_def.name) {
        return Err(BuildError::NameCollision {
            name: class_def.name.clone(),
        });
    }

    let primary_base = class_def
        .bases
        .first()
        .and_then(|b| decl.classes.get(b))
        .map(ClassIr::id);

    let id = ClassId::from_raw(*next_class_id);
    *next_class_id += 1;

    let mut class_ir = ClassIr::new(id, &class_def.name, primary_base, ClassFlags::default());

    if let Some(base) = class_def.bases.first().and_then(|b| decl.classes.get(b)) {
        for attr in base.attrs() {
            class_ir.push_attr(attr.clone());
        }
        for entry in base.vtable() {
            class_ir.push_vtable_entry(entry.clone());
        }
    }
    for trait_id in class_def
        .bases
        .iter()
        .skip(1)
        .filter_map(|b| decl.classes.get(b).map(ClassIr::id))
        .collect::<Vec<_>>()
    {
        class_ir.add_trait(trait_id);
    }

    for (name, ty) in &class_def.attrs {
        class_ir.push_attr(mypyc_ir::AttrEntry {
            name: name.clone(),
            ty: ty.clone(),
            has_default: false,
        });
    }

    for method in &class_def.methods {
        let qualified = format!("{module_name}.{}.{}", class_def.name, method.name);
        let func_ref = FuncRef::new(qualified.clone());
        match class_ir.vtable_slot(&method.name) {
            Some(slot) => class_ir.override_vtable_entry(slot, func_ref),
            None => class_ir.push_vtable_entry(VtableEntry {
                name: method.name.clone(),
                func: func_ref,
            }),
        }
        let sig = Signature::new(
            method.params.iter().map(|p| p.ty.clone()).collect(),
            method.ret.clone(),
        );
        decl.generators.insert(qualified.clone(), method.is_generator);
        decl.funcs.insert(qualified, sig);
    }

    if let Some(base) = class_def.bases.first().and_then(|b| decl.classes.get(b)) {
        if !class_ir.vtable_is_consistent_with(base) {
            return Err(BuildError::LayoutConflict {
                class: class_def.name.clone(),
                detail: format!(
                    "vtable of {} does not preserve the prefix of base {}",
                    class_def.name,
                    base.name()
                ),
            });
        }
    }

    decl.classes.insert(class_def.name.clone(), class_ir);
    Ok(())
}

/// Build the empty-signature skeleton `FuncIr` a declared function will
/// be filled into by the body pass, with argument registers already
/// allocated per its signature.
pub fn new_func_skeleton(name: &str, sig: &Signature, arg_names: Vec<String>, is_generator: bool) -> FuncIr {
    let mut flags = FuncFlags::default();
    flags.is_generator = is_generator;
    FuncIr::new(name, sig.clone(), arg_names, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mypyc_ir::SourceSpan;

    #[test]
    fn final_assign_with_literal_initializer_is_recorded_as_a_constant() {
        let module = TypedModule {
            name: "pkg.mod".into(),
            body: vec![TypedStmt::Assign {
                target: "LIMIT".into(),
                value: TypedExpr::IntLiteral {
                    value: 100,
                    span: SourceSpan::synthetic(),
                },
                is_final: true,
                span: SourceSpan::synthetic(),
            }],
        };

        let decl = declare_module(&module).unwrap();
        assert_eq!(decl.finals.get("LIMIT"), Some(&LiteralValue::Int(100)));
        assert!(!decl.globals.contains_key("LIMIT"));
    }

    #[test]
    fn non_final_assign_is_recorded_as_an_ordinary_global() {
        let module = TypedModule {
            name: "pkg.mod".into(),
            body: vec![TypedStmt::Assign {
                target: "counter".into(),
                value: TypedExpr::IntLiteral {
                    value: 0,
                    span: SourceSpan::synthetic(),
                },
                is_final: false,
                span: SourceSpan::synthetic(),
            }],
        };

        let decl = declare_module(&module).unwrap();
        assert!(decl.finals.is_empty());
        assert_eq!(decl.globals.get("counter"), Some(&mypyc_types::RType::int()));
    }
}
