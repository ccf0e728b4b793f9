//! Linear programs: stack bytecode plus an immediate pool.

use crate::core::error::ProgramError;
use crate::core::opcode::{Func, Opcode};
use crate::core::traits::Scalar;
use std::fmt;

/// Stack bytecode over scalar type `T`.
///
/// Every opcode that consumes N operands finds at least N values on the
/// stack, and the program ends with exactly one value. [`Program::validate`]
/// checks this and computes the peak stack depth.
#[derive(Debug, Clone, PartialEq)]
pub struct Program<T> {
    pub(crate) code: Vec<Opcode>,
    pub(crate) immed: Vec<T>,
    pub(crate) var_count: u32,
}

impl<T: Scalar> Program<T> {
    /// Assemble a program from raw parts without validating it.
    #[must_use]
    pub const fn from_parts(code: Vec<Opcode>, immed: Vec<T>, var_count: u32) -> Self {
        Self {
            code,
            immed,
            var_count,
        }
    }

    /// The opcode sequence.
    #[must_use]
    pub fn code(&self) -> &[Opcode] {
        &self.code
    }

    /// The immediate pool.
    #[must_use]
    pub fn immed(&self) -> &[T] {
        &self.immed
    }

    /// Number of variables the program reads.
    #[must_use]
    pub const fn var_count(&self) -> u32 {
        self.var_count
    }

    /// Check the structural invariants and return the peak stack depth.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant, naming the opcode position.
    pub fn validate(&self) -> Result<usize, ProgramError> {
        let mut depth = 0usize;
        let mut peak = 0usize;
        for (at, &op) in self.code.iter().enumerate() {
            match op {
                Opcode::Immed(index) => {
                    if index as usize >= self.immed.len() {
                        return Err(ProgramError::ImmediateOutOfRange {
                            at,
                            index,
                            len: self.immed.len(),
                        });
                    }
                }
                Opcode::Var(index) => {
                    if index >= self.var_count {
                        return Err(ProgramError::VariableOutOfRange {
                            at,
                            index,
                            count: self.var_count,
                        });
                    }
                }
                Opcode::Func(func) => {
                    if !T::supports(func) {
                        return Err(ProgramError::UnsupportedOperation {
                            func,
                            scalar: T::NAME,
                        });
                    }
                    if depth < func.arity() {
                        return Err(ProgramError::StackUnderflow {
                            at,
                            op,
                            needed: func.arity(),
                            available: depth,
                        });
                    }
                    depth -= func.arity();
                }
            }
            depth += 1;
            peak = peak.max(depth);
        }
        if depth == 1 {
            Ok(peak)
        } else {
            Err(ProgramError::UnbalancedStack(depth))
        }
    }

    /// Same opcodes and bit-identical immediates.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        self.code == other.code
            && self.var_count == other.var_count
            && self.immed.len() == other.immed.len()
            && self
                .immed
                .iter()
                .zip(&other.immed)
                .all(|(&a, &b)| a.identical(b))
    }
}

impl<T: fmt::Display> fmt::Display for Program<T> {
    /// One opcode per line; immediates are shown with their value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (at, op) in self.code.iter().enumerate() {
            match op {
                Opcode::Immed(k) => match self.immed.get(*k as usize) {
                    Some(value) => writeln!(f, "{at:4}  immed {k} ({value})")?,
                    None => writeln!(f, "{at:4}  immed {k} (?)")?,
                },
                other => writeln!(f, "{at:4}  {other}")?,
            }
        }
        Ok(())
    }
}

/// Emits a program the way an expression parser would: operands in postfix
/// order, one immediate per literal.
///
/// ```
/// use symb_opt::{Func, ProgramBuilder};
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
/// assert_eq!(program.code().len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct ProgramBuilder<T> {
    code: Vec<Opcode>,
    immed: Vec<T>,
    var_count: u32,
}

impl<T: Scalar> ProgramBuilder<T> {
    /// Start an empty program over `var_count` variables.
    #[must_use]
    pub const fn new(var_count: u32) -> Self {
        Self {
            code: Vec::new(),
            immed: Vec::new(),
            var_count,
        }
    }

    /// Push a literal.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Immediate pools are bounded by program length, far below u32::MAX"
    )]
    pub fn constant(mut self, value: T) -> Self {
        self.code.push(Opcode::Immed(self.immed.len() as u32));
        self.immed.push(value);
        self
    }

    /// Push variable `index`.
    #[must_use]
    pub fn var(mut self, index: u32) -> Self {
        self.code.push(Opcode::Var(index));
        self
    }

    /// Apply an operation to the topmost operands.
    #[must_use]
    pub fn op(mut self, func: Func) -> Self {
        self.code.push(Opcode::Func(func));
        self
    }

    /// Validate and finish.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found by [`Program::validate`].
    pub fn build(self) -> Result<Program<T>, ProgramError> {
        let program = Program::from_parts(self.code, self.immed, self.var_count);
        program.validate()?;
        Ok(program)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reports_peak_depth() {
        // 1 + (2 * (3 - x))
        let program = ProgramBuilder::new(1)
            .constant(1.0)
            .constant(2.0)
            .constant(3.0)
            .var(0)
            .op(Func::Sub)
            .op(Func::Mul)
            .op(Func::Add)
            .build()
            .unwrap();
        assert_eq!(program.validate(), Ok(4));
    }

    #[test]
    fn test_validate_rejects_underflow() {
        let err = ProgramBuilder::<f64>::new(1)
            .var(0)
            .op(Func::Add)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ProgramError::StackUnderflow {
                at: 1,
                op: Opcode::Func(Func::Add),
                needed: 2,
                available: 1,
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let bad_var = ProgramBuilder::<f64>::new(1).var(3).build().unwrap_err();
        assert!(matches!(
            bad_var,
            ProgramError::VariableOutOfRange { index: 3, .. }
        ));

        let bad_immed = Program::<f64>::from_parts(vec![Opcode::Immed(2)], vec![1.0], 0);
        assert!(matches!(
            bad_immed.validate(),
            Err(ProgramError::ImmediateOutOfRange { index: 2, len: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unbalanced() {
        let err = ProgramBuilder::<f64>::new(2).var(0).var(1).build().unwrap_err();
        assert_eq!(err, ProgramError::UnbalancedStack(2));
        let empty = ProgramBuilder::<f64>::new(0).build().unwrap_err();
        assert_eq!(empty, ProgramError::UnbalancedStack(0));
    }

    #[test]
    fn test_validate_rejects_unsupported_operation() {
        let err = ProgramBuilder::<i64>::new(1)
            .var(0)
            .op(Func::Sqrt)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ProgramError::UnsupportedOperation {
                func: Func::Sqrt,
                scalar: "i64"
            }
        );
    }

    #[test]
    fn test_display_lists_opcodes() {
        let program = ProgramBuilder::new(1)
            .constant(2.5)
            .var(0)
            .op(Func::Mul)
            .build()
            .unwrap();
        let text = program.to_string();
        assert!(text.contains("immed 0 (2.5)"));
        assert!(text.contains("var 0"));
        assert!(text.contains("mul"));
    }
}
