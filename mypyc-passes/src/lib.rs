//! The three mandatory IR transform passes (§4.5-4.7), run in this
//! fixed order on every `FuncIr`: [`run_uninit_pass`],
//! [`run_exception_pass`], [`run_refcount_pass`]. No pass may be
//! skipped (§5).

#![warn(missing_docs)]

mod error;
mod exception;
mod refcount;
mod uninit;

pub use error::PassError;
pub use exception::run_exception_pass;
pub use refcount::run_refcount_pass;
pub use uninit::run_uninit_pass;

use mypyc_ir::FuncIr;

/// Run all three passes, in the mandated order, on `func`.
#[tracing::instrument(skip(func), fields(func = func.name()))]
pub fn run_all_passes(func: &mut FuncIr) -> Result<(), PassError> {
    run_uninit_pass(func)?;
    run_exception_pass(func)?;
    run_refcount_pass(func)?;
    Ok(())
}
