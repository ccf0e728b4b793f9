//! Stack machine that runs linear programs.
//!
//! The machine owns a reusable operand stack with a fixed capacity. Running a
//! program whose peak depth exceeds the capacity fails with
//! [`EvalError::StackOverflow`] instead of growing the stack, so the machine
//! doubles as a check that a reported stack size is really sufficient.

use crate::core::error::{EvalError, ProgramError};
use crate::core::opcode::Opcode;
use crate::core::program::Program;
use crate::core::traits::Scalar;

/// Operands per function call are never more than this.
const MAX_ARITY: usize = 3;

/// Reusable evaluator for [`Program`]s.
#[derive(Debug, Clone)]
pub struct StackMachine<T> {
    stack: Vec<T>,
    capacity: usize,
}

impl<T: Scalar> StackMachine<T> {
    /// Machine whose operand stack holds at most `capacity` values.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            stack: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum stack depth.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `program` with the variable values `vars`.
    ///
    /// # Errors
    ///
    /// - [`EvalError::VariableCount`] if `vars` does not match the program
    /// - [`EvalError::StackOverflow`] if a push exceeds the capacity
    /// - [`EvalError::RuntimeCondition`] if an operation fails, such as integer
    ///   division by zero
    /// - [`EvalError::StackUnderflow`], [`EvalError::UnbalancedStack`] or
    ///   [`EvalError::Malformed`] for programs that were never validated
    pub fn run(&mut self, program: &Program<T>, vars: &[T]) -> Result<T, EvalError> {
        if vars.len() != program.var_count() as usize {
            return Err(EvalError::VariableCount {
                expected: program.var_count() as usize,
                got: vars.len(),
            });
        }

        self.stack.clear();
        let immed = program.immed();
        let mut args = [T::zero(); MAX_ARITY];
        for (at, &op) in program.code().iter().enumerate() {
            let value = match op {
                Opcode::Immed(index) => *immed.get(index as usize).ok_or(
                    ProgramError::ImmediateOutOfRange {
                        at,
                        index,
                        len: immed.len(),
                    },
                )?,
                Opcode::Var(index) => {
                    *vars
                        .get(index as usize)
                        .ok_or(ProgramError::VariableOutOfRange {
                            at,
                            index,
                            count: program.var_count(),
                        })?
                }
                Opcode::Func(func) => {
                    let arity = func.arity();
                    let Some(base) = self.stack.len().checked_sub(arity) else {
                        return Err(EvalError::StackUnderflow { at });
                    };
                    args[..arity].copy_from_slice(&self.stack[base..]);
                    self.stack.truncate(base);
                    T::apply(func, &args[..arity])
                        .ok_or(EvalError::RuntimeCondition { func, at })?
                }
            };
            if self.stack.len() >= self.capacity {
                return Err(EvalError::StackOverflow {
                    capacity: self.capacity,
                    at,
                });
            }
            self.stack.push(value);
        }

        match self.stack.as_slice() {
            &[result] => Ok(result),
            rest => Err(EvalError::UnbalancedStack(rest.len())),
        }
    }
}
