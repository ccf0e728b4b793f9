//! Errors reported at the crate boundary.
//!
//! The optimizer itself has no error path: a program that reached it has been
//! validated, and violating that is a logic error. These types cover programs
//! handed in by a host ([`ProgramError`]) and running them ([`EvalError`]).

use crate::core::opcode::{Func, Opcode};

/// A linear program that breaks one of its structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    /// An opcode pops more values than the stack holds.
    #[error("stack underflow at opcode {at} ({op}): needs {needed}, stack holds {available}")]
    StackUnderflow {
        /// Position of the offending opcode
        at: usize,
        /// The offending opcode
        op: Opcode,
        /// Operands required
        needed: usize,
        /// Operands available
        available: usize,
    },
    /// `Immed(k)` with `k` outside the immediate pool.
    #[error("immediate index {index} at opcode {at} is out of range (pool holds {len})")]
    ImmediateOutOfRange {
        /// Position of the offending opcode
        at: usize,
        /// Requested index
        index: u32,
        /// Pool length
        len: usize,
    },
    /// `Var(i)` with `i` outside the variable count.
    #[error("variable index {index} at opcode {at} is out of range ({count} variables)")]
    VariableOutOfRange {
        /// Position of the offending opcode
        at: usize,
        /// Requested index
        index: u32,
        /// Declared variable count
        count: u32,
    },
    /// The program does not leave exactly one value on the stack.
    #[error("program leaves {0} values on the stack, expected exactly one")]
    UnbalancedStack(usize),
    /// The scalar type cannot evaluate this operation.
    #[error("operation '{func}' is not supported for {scalar} scalars")]
    UnsupportedOperation {
        /// The operation
        func: Func,
        /// `Scalar::NAME` of the value type
        scalar: &'static str,
    },
}

/// Failure while running a program on the stack machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The caller passed the wrong number of variable values.
    #[error("expected {expected} variable values, got {got}")]
    VariableCount {
        /// Declared variable count
        expected: usize,
        /// Values supplied
        got: usize,
    },
    /// A push would exceed the machine's stack capacity.
    #[error("stack overflow: capacity {capacity} exceeded at opcode {at}")]
    StackOverflow {
        /// Configured capacity
        capacity: usize,
        /// Position of the offending opcode
        at: usize,
    },
    /// An opcode found too few operands.
    #[error("stack underflow at opcode {at}")]
    StackUnderflow {
        /// Position of the offending opcode
        at: usize,
    },
    /// The operation raised a runtime condition, such as integer division by zero.
    #[error("'{func}' raised a runtime condition at opcode {at}")]
    RuntimeCondition {
        /// The operation
        func: Func,
        /// Position of the offending opcode
        at: usize,
    },
    /// The program did not finish with exactly one value.
    #[error("program finished with {0} values on the stack")]
    UnbalancedStack(usize),
    /// The program references an immediate or variable it does not have.
    #[error(transparent)]
    Malformed(#[from] ProgramError),
}
