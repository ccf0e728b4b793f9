//! Bytecode optimizer for numeric expression programs
//!
//! A parsed expression arrives as a linear stack program. The optimizer lifts
//! it into an expression tree, rewrites the tree with a data-driven grammar,
//! and emits a new, usually shorter program that computes the same value.
//!
//! # Pipeline
//! - [`CodeTree::from_program`]: bytecode to a canonical tree with shared subtrees
//! - [`Optimizer::run`]: rule sets applied until a full round changes nothing
//! - [`CodeTree::to_program`]: post-order emission with immediate dedup and
//!   peak stack depth
//! - [`FunctionParser::optimize`]: the whole pipeline on a parser's program
//!
//! Which rules apply depends on the scalar type through [`Rewritable`].
//! Floating-point and integer types get their own grammars; types that do not
//! opt in keep their code unchanged.
//!
//! # Example
//! ```
//! use symb_opt::{Func, FunctionParser, ProgramBuilder};
//!
//! // x + 0
//! let program = ProgramBuilder::new(1)
//!     .var(0)
//!     .constant(0.0)
//!     .op(Func::Add)
//!     .build()
//!     .expect("valid program");
//! let mut parser = FunctionParser::from_program(program).expect("valid program");
//! parser.optimize();
//! assert_eq!(parser.program().code().len(), 1);
//! assert_eq!(parser.stack_size(), 1);
//! ```
//!
//! # Features
//! - `rational` (default): [`num_rational::Rational64`] as a scalar type
//!   without rewrite rules
//! - `parallel`: batch evaluation on the Rayon pool

pub mod codetree;
pub mod core;
pub mod evaluator;
mod function;
mod optimize;
pub mod simplification;

#[cfg(feature = "parallel")]
pub mod parallel;


pub use codetree::{CodeTree, NodeId, Op};
pub use crate::core::error::{EvalError, ProgramError};
pub use crate::core::opcode::{Func, Opcode};
pub use crate::core::program::{Program, ProgramBuilder};
pub use crate::core::traits::{Rewritable, Scalar};
pub use evaluator::StackMachine;
pub use function::FunctionParser;
pub use simplification::{Optimizer, RewriteStats, Rule, RuleSet};
