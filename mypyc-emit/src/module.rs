use std::fmt::Write as _;

use mypyc_ir::ModuleIr;

use crate::class::emit_class;
use crate::error::EmitError;
use crate::func::emit_function;

/// Emits one module's complete C source (§4.8): a header section (struct
/// and prototype declarations are emitted inline above their
/// definitions, since this is a single translation unit per module),
/// constants, every class, every function, and a `PyInit_<module>` entry
/// point.
pub fn emit_module(module: &ModuleIr) -> Result<String, EmitError> {
    let mut out = String::new();
    writeln!(out, "/* generated by mypyc — module {} */", module.name()).ok();
    writeln!(out, "#include <Python.h>").ok();
    writeln!(out, "#include \"CPy.h\"").ok();
    out.push('\n');

    if !module.final_consts().is_empty() {
        writeln!(out, "/* final constants */").ok();
        for c in module.final_consts() {
            writeln!(
                out,
                "static PyObject *{}_{};",
                module.name().replace('.', "_"),
                c.name
            )
            .ok();
        }
        out.push('\n');
    }

    if !module.globals().is_empty() {
        writeln!(out, "/* module globals */").ok();
        for g in module.globals() {
            writeln!(
                out,
                "static {} {}_{};",
                crate::ctype::c_type_name(&g.ty),
                module.name().replace('.', "_"),
                g.name
            )
            .ok();
        }
        out.push('\n');
    }

    for class in module.classes() {
        out.push_str(&emit_class(class, module.name()));
        out.push('\n');
    }

    for func in module.funcs() {
        out.push_str(&emit_function(func, module.name())?);
        out.push('\n');
    }

    writeln!(
        out,
        "static struct PyModuleDef {}_module = {{",
        module.name().replace('.', "_")
    )
    .ok();
    writeln!(out, "    PyModuleDef_HEAD_INIT,").ok();
    writeln!(out, "    \"{}\",", module.name()).ok();
    writeln!(out, "    NULL,").ok();
    writeln!(out, "    -1,").ok();
    writeln!(out, "    NULL,").ok();
    writeln!(out, "}};").ok();
    out.push('\n');

    writeln!(
        out,
        "PyMODINIT_FUNC PyInit_{}(void) {{",
        module.name().replace('.', "_")
    )
    .ok();
    for class in module.classes() {
        writeln!(
            out,
            "    if (PyType_Ready(&{}_{}_Type) < 0) return NULL;",
            module.name(),
            class.name()
        )
        .ok();
    }
    writeln!(out, "    PyObject *m = PyModule_Create(&{}_module);", module.name().replace('.', "_")).ok();
    writeln!(out, "    if (m == NULL) return NULL;").ok();
    for func in module.funcs() {
        writeln!(
            out,
            "    /* register wrapper CPyWrapper_{}_{} under \"{}\" */",
            module.name().replace('.', "_"),
            func.name(),
            func.name()
        )
        .ok();
    }
    writeln!(out, "    return m;").ok();
    writeln!(out, "}}").ok();

    Ok(out)
}
