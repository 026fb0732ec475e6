use mypyc_ir::{ComparisonOpKind, IntOpKind};
use mypyc_types::RType;

use crate::error::RegistryError;
use crate::rule::LoweringRule;
use crate::shape::{BinarySymbol, CompareSymbol, OpShape};
use crate::table::{Registry, RegistryBuilder};

/// The registry a driver gets by default (§4.3): `int`/`int` arithmetic
/// and comparisons lowered directly to `IntOp`/`ComparisonOp`, with no
/// `float` or generic-object entries registered. A driver compiling a
/// unit that uses those needs its own `RegistryBuilder`; this table only
/// covers the arithmetic every one of the end-to-end scenarios in §8
/// exercises.
pub fn standard() -> Result<Registry, RegistryError> {
    let int_binops = [
        (BinarySymbol::Add, IntOpKind::Add),
        (BinarySymbol::Sub, IntOpKind::Sub),
        (BinarySymbol::Mul, IntOpKind::Mul),
        (BinarySymbol::FloorDiv, IntOpKind::FloorDiv),
        (BinarySymbol::Mod, IntOpKind::Mod),
        (BinarySymbol::Shl, IntOpKind::Shl),
        (BinarySymbol::Shr, IntOpKind::Shr),
        (BinarySymbol::BitAnd, IntOpKind::BitAnd),
        (BinarySymbol::BitOr, IntOpKind::BitOr),
        (BinarySymbol::BitXor, IntOpKind::BitXor),
    ];
    let int_compares = [
        (CompareSymbol::Eq, ComparisonOpKind::Eq),
        (CompareSymbol::Ne, ComparisonOpKind::Ne),
        (CompareSymbol::Lt, ComparisonOpKind::Lt),
        (CompareSymbol::Le, ComparisonOpKind::Le),
        (CompareSymbol::Gt, ComparisonOpKind::Gt),
        (CompareSymbol::Ge, ComparisonOpKind::Ge),
    ];

    let mut builder = RegistryBuilder::new();
    for (symbol, kind) in int_binops {
        builder = builder.register(
            OpShape::BinaryOp(symbol),
            vec![RType::int(), RType::int()],
            LoweringRule::IntOp(kind),
        );
    }
    for (symbol, kind) in int_compares {
        builder = builder.register(
            OpShape::Compare(symbol),
            vec![RType::int(), RType::int()],
            LoweringRule::ComparisonOp(kind),
        );
    }
    builder.build()
}
