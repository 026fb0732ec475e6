//! The RType system: typed value representations used throughout the
//! mypyc compiler core.
//!
//! An [`RType`] is the statically known runtime representation of every
//! register, argument and return value in the IR (see `mypyc-ir`). The
//! lattice is closed: [`RType::join`] always terminates in [`RType::object`]
//! when no tighter upper bound exists.

#![warn(missing_docs)]

mod class_id;
mod error;
mod primitive;
mod rtype;

pub use class_id::ClassId;
pub use error::RTypeError;
pub use primitive::{ErrorSentinel, Primitive, PrimitiveKind};
pub use rtype::{RStruct, RStructField, RTuple, RType};
