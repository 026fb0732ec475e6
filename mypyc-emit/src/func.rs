use std::fmt::Write as _;

use mypyc_ir::{FuncIr, Terminator};

use crate::ctype::c_type_name;
use crate::error::EmitError;
use crate::op::emit_op;

/// Emits one `FuncIr` as its native C function plus a Python-C-API
/// wrapper (§4.8): the native function uses the fixed calling convention
/// described in §6 (arguments and return value in their RType's native
/// representation); the wrapper unboxes `PyObject *` arguments, calls the
/// native function, and boxes the result back for CPython.
pub fn emit_function(func: &FuncIr, module_name: &str) -> Result<String, EmitError> {
    let mut out = String::new();
    let qualified = format!("{module_name}.{}", func.name());
    let c_name = format!("CPyDef_{}", qualified.replace('.', "_"));

    let ret_ty = c_type_name(func.signature().return_type());
    let params: Vec<String> = func
        .arg_registers()
        .iter()
        .map(|r| format!("{} {r}", c_type_name(func.register(*r).ty())))
        .collect();
    writeln!(out, "static {ret_ty} {c_name}({}) {{", params.join(", ")).ok();

    for reg in func.registers() {
        if reg.is_argument() {
            continue;
        }
        writeln!(out, "    {} {};", c_type_name(reg.ty()), reg.id()).ok();
    }

    for block in func.blocks() {
        writeln!(out, "{}:", block.id()).ok();
        for op in block.ops() {
            emit_op(&mut out, &qualified, op)?;
        }
        match block.terminator() {
            Some(Terminator::Goto(target)) => {
                writeln!(out, "    goto {target};").ok();
            }
            Some(Terminator::Branch {
                cond,
                then_target,
                else_target,
                negate,
            }) => {
                let test = if *negate { format!("!{cond}") } else { format!("{cond}") };
                writeln!(out, "    if ({test}) goto {then_target}; else goto {else_target};").ok();
            }
            Some(Terminator::Return(Some(r))) => {
                writeln!(out, "    return {r};").ok();
            }
            Some(Terminator::Return(None)) => {
                writeln!(out, "    return;").ok();
            }
            Some(Terminator::Unreachable) => {
                writeln!(out, "    __builtin_unreachable();").ok();
            }
            Some(Terminator::RaiseAndReturn { error }) => {
                let sentinel = error
                    .map(|r| format!("{r}"))
                    .unwrap_or_else(|| sentinel_for(func));
                writeln!(out, "    return {sentinel};").ok();
            }
            None => {
                return Err(EmitError::MissingTerminator {
                    func: qualified,
                    block: format!("{}", block.id()),
                });
            }
        }
    }

    writeln!(out, "}}").ok();

    let wrapper = emit_wrapper(func, module_name, &c_name)?;
    out.push_str(&wrapper);
    Ok(out)
}

fn sentinel_for(func: &FuncIr) -> String {
    match func.signature().return_type().error_sentinel() {
        mypyc_types::ErrorSentinel::Bits(bits) => {
            format!("({})0x{bits:x}", c_type_name(func.signature().return_type()))
        }
        mypyc_types::ErrorSentinel::None => "NULL".to_string(),
    }
}

/// A `PyCFunction`-shaped wrapper: unboxes each `PyObject*` argument into
/// its native argument's representation, calls the native function, and
/// boxes a non-void result back up.
fn emit_wrapper(func: &FuncIr, module_name: &str, native_name: &str) -> Result<String, EmitError> {
    let mut out = String::new();
    let qualified = format!("{module_name}.{}", func.name());
    let wrapper_name = format!("CPyWrapper_{}", qualified.replace('.', "_"));

    writeln!(
        out,
        "static PyObject *{wrapper_name}(PyObject *self, PyObject *const *args, Py_ssize_t nargs) {{"
    )
    .ok();
    if !func.arg_registers().is_empty() {
        writeln!(out, "    if (nargs != {}) {{", func.arg_registers().len()).ok();
        writeln!(out, "        PyErr_SetString(PyExc_TypeError, \"wrong argument count\");").ok();
        writeln!(out, "        return NULL;").ok();
        writeln!(out, "    }}").ok();
    }

    let mut native_args = Vec::new();
    for (i, reg_id) in func.arg_registers().iter().enumerate() {
        let ty = func.register(*reg_id).ty();
        let local = format!("arg{i}");
        if ty.is_unboxed() {
            writeln!(
                out,
                "    {} {local} = ({})CPy_Unbox(args[{i}]);",
                c_type_name(ty),
                c_type_name(ty)
            )
            .ok();
        } else {
            writeln!(out, "    PyObject *{local} = args[{i}];").ok();
        }
        native_args.push(local);
    }

    let ret_ty = func.signature().return_type();
    let call = format!("{native_name}({})", native_args.join(", "));
    if matches!(ret_ty, mypyc_types::RType::RVoid) {
        writeln!(out, "    {call};").ok();
        writeln!(out, "    Py_RETURN_NONE;").ok();
    } else if ret_ty.is_unboxed() {
        writeln!(out, "    {} native_result = {call};", c_type_name(ret_ty)).ok();
        writeln!(out, "    return CPy_Box(native_result);").ok();
    } else {
        writeln!(out, "    return {call};").ok();
    }
    writeln!(out, "}}").ok();
    Ok(out)
}
