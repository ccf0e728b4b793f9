//! The owning parser object.

use crate::core::error::{EvalError, ProgramError};
use crate::core::program::Program;
use crate::core::traits::Scalar;
use crate::evaluator::StackMachine;
use std::sync::Arc;

/// Program and cached stack size, shared between clones of a parser.
#[derive(Debug, Clone)]
pub(crate) struct ParserData<T> {
    pub(crate) program: Program<T>,
    pub(crate) stack_size: usize,
}

/// Owns one validated [`Program`].
///
/// Clones share the program until one of them is optimized, which detaches
/// that clone first. Other clones keep the code they had.
///
/// The parser keeps no evaluation stack of its own. Each [`eval`](Self::eval)
/// sizes a fresh [`StackMachine`] from the cached stack size, so a parser can
/// be evaluated through `&self` from several threads at once.
///
/// # Example
///
/// ```
/// use symb_opt::{Func, FunctionParser, ProgramBuilder};
///
/// // (2 + 3) * x
/// let program = ProgramBuilder::new(1)
///     .constant(2.0)
///     .constant(3.0)
///     .op(Func::Add)
///     .var(0)
///     .op(Func::Mul)
///     .build()
///     .expect("valid program");
/// let mut parser = FunctionParser::from_program(program).expect("valid program");
/// parser.optimize();
///
/// assert_eq!(parser.program().code().len(), 3);
/// assert_eq!(parser.eval(&[4.0]), Ok(20.0));
/// ```
#[derive(Debug, Clone)]
pub struct FunctionParser<T> {
    pub(crate) data: Arc<ParserData<T>>,
}

impl<T: Scalar> FunctionParser<T> {
    /// Take ownership of `program` after validating it.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found by [`Program::validate`].
    pub fn from_program(program: Program<T>) -> Result<Self, ProgramError> {
        let stack_size = program.validate()?;
        tracing::debug!(
            scalar = T::NAME,
            opcodes = program.code().len(),
            stack_size,
            "parser created"
        );
        Ok(Self {
            data: Arc::new(ParserData {
                program,
                stack_size,
            }),
        })
    }

    /// The current program.
    #[must_use]
    pub fn program(&self) -> &Program<T> {
        &self.data.program
    }

    /// Stack depth the current program needs.
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.data.stack_size
    }

    /// Number of variables the program reads.
    #[must_use]
    pub fn var_count(&self) -> u32 {
        self.data.program.var_count()
    }

    /// Whether another clone currently shares this parser's program.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }

    /// A stack machine sized for this parser's program.
    #[must_use]
    pub fn machine(&self) -> StackMachine<T> {
        StackMachine::new(self.stack_size())
    }

    /// Evaluate at one point.
    ///
    /// # Errors
    ///
    /// See [`StackMachine::run`].
    pub fn eval(&self, vars: &[T]) -> Result<T, EvalError> {
        self.machine().run(self.program(), vars)
    }

    /// Evaluate at many points, reusing one stack machine.
    pub fn eval_batch<V: AsRef<[T]>>(&self, points: &[V]) -> Vec<Result<T, EvalError>> {
        let mut machine = self.machine();
        points
            .iter()
            .map(|vars| machine.run(self.program(), vars.as_ref()))
            .collect()
    }
}
