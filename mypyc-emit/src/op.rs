use std::fmt::Write as _;

use mypyc_ir::{LiteralValue, Op, OpKind};

use crate::ctype::c_type_name;
use crate::error::EmitError;

/// Emits one op's fixed C template into `out`, indented four spaces
/// (§4.8): a single statement (or short statement sequence) that never
/// introduces implicit control flow and performs no allocation without a
/// corresponding `IncRef`/`DecRef` already present in the IR.
pub fn emit_op(out: &mut String, func_name: &str, op: &Op) -> Result<(), EmitError> {
    let dest = op.dest().map(|d| format!("{d}"));
    match op.kind() {
        OpKind::Assign { src } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = {src};").ok();
        }
        OpKind::LoadLiteral { value } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = {};", literal_text(value)).ok();
        }
        OpKind::LoadAddress { target } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = (PyObject *)&{target};").ok();
        }
        OpKind::IntOp { kind, lhs, rhs } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPyTagged_{kind}({lhs}, {rhs});").ok();
        }
        OpKind::ComparisonOp { kind, lhs, rhs } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPyTagged_Compare{kind}({lhs}, {rhs});").ok();
        }
        OpKind::FloatOp { kind, lhs, rhs } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPyFloat_{kind}({lhs}, {rhs});").ok();
        }
        OpKind::FloatComparisonOp { kind, lhs, rhs } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPyFloat_Compare{kind}({lhs}, {rhs});").ok();
        }
        OpKind::FloatNeg { src } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = -{src};").ok();
        }
        OpKind::BoolOp { kind, lhs, rhs } => {
            let dest = require_dest(func_name, op, &dest)?;
            match kind {
                mypyc_ir::BoolOpKind::Not => writeln!(out, "    {dest} = !{lhs};").ok(),
                _ => writeln!(out, "    {dest} = CPyBool_{kind}({lhs}, {rhs});").ok(),
            };
        }
        OpKind::GetAttr { obj, name } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPyObject_GetAttrString({obj}, \"{name}\");").ok();
        }
        OpKind::SetAttr { obj, name, value } => {
            writeln!(out, "    CPyObject_SetAttrString({obj}, \"{name}\", {value});").ok();
        }
        OpKind::GetElementPtr { base, index } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = {base} + {index};").ok();
        }
        OpKind::LoadMem { addr } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = *({addr});").ok();
        }
        OpKind::StoreMem { addr, value } => {
            writeln!(out, "    *({addr}) = {value};").ok();
        }
        OpKind::Box { src } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPy_Box({src});").ok();
        }
        OpKind::Unbox { src, target_type } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(
                out,
                "    {dest} = ({})CPy_Unbox({src});",
                c_type_name(target_type)
            )
            .ok();
        }
        OpKind::Cast { src, target_type } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(
                out,
                "    {dest} = ({})CPy_Cast({src});",
                c_type_name(target_type)
            )
            .ok();
        }
        OpKind::Call { func, args } => {
            emit_call(out, &dest, &format!("CPyDef_{}", mangle(func.qualified_name())), &args.positional)
        }
        OpKind::MethodCall { obj, method_name, args } => {
            let mut all = vec![*obj];
            all.extend(args.positional.iter().copied());
            emit_call(out, &dest, &format!("CPy_Vtable_{method_name}"), &all)
        }
        OpKind::CallC { c_function, args } => emit_call(out, &dest, c_function, &args.positional),
        OpKind::PyCall { obj, args, kwargs } => {
            let dest = require_dest(func_name, op, &dest)?;
            let arg_list = args.iter().map(|r| format!("{r}")).collect::<Vec<_>>().join(", ");
            let kw_list = kwargs
                .iter()
                .map(|(k, r)| format!("\"{k}\", {r}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "    {dest} = CPyObject_Call({obj}, {{{arg_list}}}, {{{kw_list}}});").ok();
        }
        OpKind::IncRef { src } => {
            writeln!(out, "    CPy_INCREF({src});").ok();
        }
        OpKind::DecRef { src, is_xdec } => {
            let helper = if *is_xdec { "CPy_XDECREF" } else { "CPy_DECREF" };
            writeln!(out, "    {helper}({src});").ok();
        }
        OpKind::KeepAlive { vars } => {
            for v in vars {
                writeln!(out, "    CPy_KEEP_ALIVE({v});").ok();
            }
        }
        OpKind::RaiseStandardError { kind, message } => {
            let msg = message.as_deref().unwrap_or("");
            writeln!(out, "    CPyErr_SetString(PyExc_{kind}, \"{msg}\");").ok();
        }
        OpKind::ErrorValue { ty } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = {};", sentinel_text(ty)).ok();
        }
        OpKind::IsAssigned { local } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = ({local} != CPY_UNASSIGNED_SENTINEL);").ok();
        }
        OpKind::ListNew { items } => {
            let dest = require_dest(func_name, op, &dest)?;
            let list = items.iter().map(|r| format!("{r}")).collect::<Vec<_>>().join(", ");
            writeln!(out, "    {dest} = CPyList_Build({}, {list});", items.len()).ok();
        }
        OpKind::ListGet { list, index } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPyList_GetItem({list}, {index});").ok();
        }
        OpKind::ListSet { list, index, value } => {
            writeln!(out, "    CPyList_SetItem({list}, {index}, {value});").ok();
        }
        OpKind::DictNew { items } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPyDict_Build({});", items.len()).ok();
            for (k, v) in items {
                writeln!(out, "    CPyDict_SetItem({dest}, {k}, {v});").ok();
            }
        }
        OpKind::DictGet { dict, key } => {
            let dest = require_dest(func_name, op, &dest)?;
            writeln!(out, "    {dest} = CPyDict_GetItem({dict}, {key});").ok();
        }
        OpKind::DictSet { dict, key, value } => {
            writeln!(out, "    CPyDict_SetItem({dict}, {key}, {value});").ok();
        }
        OpKind::TupleNew { items } => {
            let dest = require_dest(func_name, op, &dest)?;
            let list = items.iter().map(|r| format!("{r}")).collect::<Vec<_>>().join(", ");
            writeln!(out, "    {dest} = CPyTuple_Build({}, {list});", items.len()).ok();
        }
    }
    Ok(())
}

fn emit_call(out: &mut String, dest: &Option<String>, callee: &str, args: &[mypyc_ir::RegisterId]) {
    let arg_list = args.iter().map(|r| format!("{r}")).collect::<Vec<_>>().join(", ");
    match dest {
        Some(d) => {
            writeln!(out, "    {d} = {callee}({arg_list});").ok();
        }
        None => {
            writeln!(out, "    {callee}({arg_list});").ok();
        }
    };
}

fn require_dest<'a>(func_name: &str, op: &Op, dest: &'a Option<String>) -> Result<&'a str, EmitError> {
    dest.as_deref().ok_or_else(|| EmitError::UnsupportedOp {
        func: func_name.to_string(),
        op: format!("{:?} has no destination register", op.kind()),
    })
}

fn literal_text(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Int(i) => format!("CPyTagged_FromInt64({i})"),
        LiteralValue::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
        LiteralValue::Float(f) => format!("{f:?}"),
        LiteralValue::Str(s) => format!("CPyStr_FromLiteral(\"{}\")", escape(s)),
        LiteralValue::Bytes(b) => format!("CPyBytes_FromLiteral({} /* {} bytes */)", b.len(), b.len()),
        LiteralValue::None => "Py_None".to_string(),
    }
}

fn sentinel_text(ty: &mypyc_types::RType) -> String {
    match ty.error_sentinel() {
        mypyc_types::ErrorSentinel::Bits(bits) => format!("({})0x{bits:x}", c_type_name(ty)),
        mypyc_types::ErrorSentinel::None => "NULL".to_string(),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn mangle(qualified_name: &str) -> String {
    qualified_name.replace('.', "_")
}
