//! Optimize entry point: program to tree, rewrite, back to program.
//!
//! ```text
//! Unshared -> Detaching -> TreeBuilt -> Rewriting -> Synthesized -> Committed
//! ```
//!
//! The parser's program is replaced in one assignment at the end. Until then
//! the tree is private to the call, and it is dropped on return. The parser
//! holds no evaluation stack, so committing a new stack size never
//! reallocates anything.

use crate::codetree::CodeTree;
use crate::core::traits::Rewritable;
use crate::function::FunctionParser;
use crate::simplification::{Optimizer, RewriteStats};
use std::sync::Arc;

impl<T: Rewritable> FunctionParser<T> {
    /// Rewrite the program with the grammar of `T` and the default caps.
    ///
    /// Evaluation results are unchanged, up to the rounding of folded
    /// constants. Optimizing an already optimized parser leaves its program
    /// byte-identical. For scalar types without rules only the stack size is
    /// recomputed.
    ///
    /// # Panics
    ///
    /// Panics if the grammar does not reach a fixpoint within the default
    /// caps, which means the rule tables are broken.
    pub fn optimize(&mut self) {
        self.optimize_with(&Optimizer::new());
    }

    /// Like [`optimize`](Self::optimize), with explicit caps.
    ///
    /// # Panics
    ///
    /// Panics if `optimizer`'s caps are exceeded.
    pub fn optimize_with(&mut self, optimizer: &Optimizer) -> RewriteStats {
        let span = tracing::debug_span!("optimize", scalar = T::NAME);
        let _enter = span.enter();

        let shared = self.is_shared();
        let data = Arc::make_mut(&mut self.data);
        tracing::debug!(shared, "detached");

        let sets = T::rule_sets();
        if sets.is_empty() {
            let Ok(stack_size) = data.program.validate() else {
                unreachable!("parser holds a program that no longer validates");
            };
            data.stack_size = stack_size;
            tracing::debug!(stack_size, "no rules for this scalar type");
            return RewriteStats::default();
        }

        let var_count = data.program.var_count();
        let mut tree = CodeTree::from_program(&data.program);
        tracing::debug!(
            opcodes = data.program.code().len(),
            nodes = tree.len(),
            "tree built"
        );

        let stats = optimizer.run(&mut tree, sets);

        let (program, stack_size) = tree.to_program(var_count);
        tracing::debug!(
            opcodes = program.code().len(),
            immediates = program.immed().len(),
            stack_size,
            "synthesized"
        );

        data.stack_size = stack_size;
        data.program = program;
        tracing::debug!(rewrites = stats.rewrites, "committed");
        stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::opcode::{Func, Opcode};
    use crate::core::program::ProgramBuilder;

    #[test]
    fn test_optimize_folds_and_shrinks() {
        let program = ProgramBuilder::new(1)
            .constant(2.0)
            .constant(3.0)
            .op(Func::Add)
            .var(0)
            .op(Func::Mul)
            .build()
            .unwrap();
        let mut parser = FunctionParser::from_program(program).unwrap();
        assert_eq!(parser.stack_size(), 2);
        let stats = parser.optimize_with(&Optimizer::new());
        assert!(stats.rewrites > 0);
        assert_eq!(
            parser.program().code(),
            &[Opcode::Immed(0), Opcode::Var(0), Opcode::Func(Func::Mul)]
        );
        assert_eq!(parser.program().immed(), &[5.0]);
        assert_eq!(parser.stack_size(), 2);
    }

    #[test]
    fn test_optimize_detaches_from_clones() {
        let program = ProgramBuilder::new(1)
            .var(0)
            .constant(0.0)
            .op(Func::Add)
            .build()
            .unwrap();
        let mut parser = FunctionParser::from_program(program).unwrap();
        let original = parser.clone();
        parser.optimize();
        assert!(!parser.is_shared());
        assert_eq!(parser.program().code(), &[Opcode::Var(0)]);
        assert_eq!(parser.stack_size(), 1);
        assert_eq!(original.program().code().len(), 3);
        assert_eq!(original.stack_size(), 2);
    }
}
