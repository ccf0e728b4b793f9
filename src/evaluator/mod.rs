//! Conversion between expression trees and bytecode, and running bytecode.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │  CodeTree   │ -> │ Synthesizer  │ -> │  StackMachine   │
//! │   (arena)   │    │  (bytecode)  │    │ (bounded stack) │
//! └─────────────┘    └──────────────┘    └─────────────────┘
//! ```
//!
//! - [`compiler`]: tree to bytecode, with immediate dedup and peak stack depth
//! - [`execution`]: the stack machine

mod compiler;
mod execution;

pub use execution::StackMachine;
