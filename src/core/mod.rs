//! Core types: operators, scalars, linear programs and boundary errors.

pub mod error;
pub mod opcode;
pub mod program;
pub mod traits;
