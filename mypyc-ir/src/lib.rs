//! The IR model (§4.2): [`Register`], [`Op`], [`BasicBlock`], [`FuncIR`],
//! [`ClassIR`], [`ModuleIR`] — the arena-allocated, index-addressed data
//! structures every pass in `mypyc-passes` mutates and `mypyc-emit` reads.
//!
//! Cyclic references (a class pointing at its methods, methods pointing
//! back at their containing class) are modeled as non-owning integer
//! indices rather than pointers, so every IR object lives in exactly one
//! arena and is addressed by a small `Id` newtype.

#![warn(missing_docs)]

mod block;
mod cfg;
mod class;
mod diagnostic;
mod error;
mod exception_table;
mod func;
mod location;
mod module;
mod op;
mod register;

pub use block::{BasicBlock, BlockId, Terminator};
pub use cfg::Cfg;
pub use class::{AttrEntry, ClassFlags, ClassIr, PropertyEntry, TraitId, VtableEntry};
pub use diagnostic::{Diagnostic, DiagnosticSink, Severity};
pub use error::IrError;
pub use exception_table::{ExceptionTable, HandlerRegion};
pub use func::{FuncFlags, FuncIr, FuncRef, Signature};
pub use location::SourceSpan;
pub use module::{FinalConst, GlobalVar, ModuleIr};
pub use op::{
    BoolOpKind, CallArgs, CanRaise, ComparisonOpKind, ErrorKind, FloatOpKind, IntOpKind,
    LiteralValue, Op, OpKind, StandardErrorKind,
};
pub use register::{Register, RegisterId};

/// Re-exported so callers of `mypyc-ir` never need a direct `mypyc-types`
/// dependency just to name a class handle.
pub use mypyc_types::ClassId;
