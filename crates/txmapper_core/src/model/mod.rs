//! Entity reflection model.
//!
//! # Responsibility
//! - Define how caller structs describe their table mapping.
//! - Provide zero-value detection per column type.
//!
//! # Invariants
//! - Mapper code never retains entity values beyond a single call.

pub mod entity;
mod macros;
pub mod timestamp;
