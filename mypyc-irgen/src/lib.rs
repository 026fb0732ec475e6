//! The typed-AST input contract (§4.4.1) and the two-pass IR builder
//! (§4.4): a declaration pass that populates a module's decl table and
//! vtable layouts, and a body pass that lowers each function body to
//! `mypyc_ir::FuncIr`.

#![warn(missing_docs)]

mod ast;
mod build;
mod declare;
mod error;
mod symbol;

pub use ast::{
    ExceptHandler, Param, TypedClassDef, TypedExpr, TypedFunctionDef, TypedModule, TypedStmt,
};
pub use build::build_function;
pub use declare::{declare_module, ModuleDecl};
pub use error::BuildError;
pub use symbol::{SymbolEntry, SymbolKind, SymbolTable};
