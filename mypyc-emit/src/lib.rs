//! Per-module C source emission (§4.8): one `emit_module` call per
//! compiled `ModuleIr` produces the module's complete translation unit —
//! struct/type-object declarations, the native and wrapper form of every
//! function, and a `PyInit_<module>` entry point.

#![warn(missing_docs)]

mod class;
mod ctype;
mod error;
mod func;
mod module;
mod op;

pub use ctype::c_type_name;
pub use error::EmitError;
pub use module::emit_module;

#[cfg(test)]
mod tests {
    use super::*;
    use mypyc_ir::{
        CanRaise, ErrorKind, FuncFlags, FuncIr, LiteralValue, ModuleIr, OpKind, Op, SourceSpan,
        Signature, Terminator,
    };
    use mypyc_types::RType;

    #[test]
    fn emits_a_prototype_and_a_return_statement() {
        let mut f = FuncIr::new(
            "add_one",
            Signature::new(vec![RType::int()], RType::int()),
            vec!["x".to_string()],
            FuncFlags::default(),
        );
        let entry = f.entry_block();
        let one = f.new_register(RType::int(), "r0");
        f.block_mut(entry).push_op(Op::new(
            Some(one),
            OpKind::LoadLiteral {
                value: LiteralValue::Int(1),
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        let arg = f.arg_registers()[0];
        let sum = f.new_register(RType::int(), "r1");
        f.block_mut(entry).push_op(Op::new(
            Some(sum),
            OpKind::IntOp {
                kind: mypyc_ir::IntOpKind::Add,
                lhs: arg,
                rhs: one,
            },
            CanRaise::Never,
            ErrorKind::None,
            SourceSpan::synthetic(),
        ));
        f.block_mut(entry).set_terminator(Terminator::Return(Some(sum)));

        let mut module = ModuleIr::new("pkg.mod");
        module.push_func(f);

        let c_src = emit_module(&module).unwrap();
        assert!(c_src.contains("CPyDef_pkg_mod_add_one"));
        assert!(c_src.contains("CPyWrapper_pkg_mod_add_one"));
        assert!(c_src.contains("PyInit_pkg_mod"));
    }

    #[test]
    fn missing_terminator_is_an_emit_error() {
        let f = FuncIr::new(
            "bad",
            Signature::new(vec![], RType::RVoid),
            vec![],
            FuncFlags::default(),
        );
        let mut module = ModuleIr::new("m");
        module.push_func(f);
        assert!(emit_module(&module).is_err());
    }
}
