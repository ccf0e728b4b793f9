//! Grammar engine: data-driven rewrite rules applied to a fixpoint.
pub mod engine;
pub mod patterns;
pub mod rules;

pub use engine::{DEFAULT_MAX_NODE_REWRITES, DEFAULT_MAX_PASSES, Optimizer, RewriteStats};
pub use patterns::{Bindings, Guard, Hole, Pattern, Template};
pub use rules::{FLOAT_GRAMMAR, INTEGER_GRAMMAR, Rule, RuleSet};
