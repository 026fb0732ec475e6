use std::fmt::Write as _;

use mypyc_ir::ClassIr;

use crate::ctype::c_type_name;

/// Emits a native class's C struct, vtable array, and a `PyTypeObject`
/// skeleton (§4.8). The struct lays out `PyObject_HEAD` followed by
/// attributes in declaration order (base-class fields first, per
/// `ClassIr::attrs`'s documented ordering), matching the generated-code
/// ABI in §6.
pub fn emit_class(class: &ClassIr, module_name: &str) -> String {
    let mut out = String::new();
    let c_name = format!("{module_name}_{}", class.name());

    writeln!(out, "typedef struct {{").ok();
    writeln!(out, "    PyObject_HEAD").ok();
    for attr in class.attrs() {
        writeln!(out, "    {} {};", c_type_name(&attr.ty), attr.name).ok();
    }
    writeln!(out, "}} {c_name}Object;").ok();
    out.push('\n');

    if !class.vtable().is_empty() {
        writeln!(out, "static void *{c_name}_vtable[{}] = {{", class.vtable().len()).ok();
        for entry in class.vtable() {
            writeln!(out, "    (void *)CPyDef_{}, /* {} */", mangle(entry.func.qualified_name()), entry.name).ok();
        }
        writeln!(out, "}};").ok();
        out.push('\n');
    }

    for prop in class.properties() {
        writeln!(
            out,
            "/* property {}: getter {}{} */",
            prop.name,
            prop.getter.qualified_name(),
            prop.setter
                .as_ref()
                .map(|s| format!(", setter {}", s.qualified_name()))
                .unwrap_or_default()
        )
        .ok();
    }

    writeln!(out, "static PyTypeObject {c_name}_Type = {{").ok();
    writeln!(out, "    PyVarObject_HEAD_INIT(NULL, 0)").ok();
    writeln!(out, "    .tp_name = \"{}.{}\",", module_name, class.name()).ok();
    writeln!(out, "    .tp_basicsize = sizeof({c_name}Object),").ok();
    if !class.vtable().is_empty() {
        writeln!(out, "    .tp_as_mypyc_vtable = {c_name}_vtable,").ok();
    }
    writeln!(out, "}};").ok();

    out
}

fn mangle(qualified_name: &str) -> String {
    qualified_name.replace('.', "_")
}
