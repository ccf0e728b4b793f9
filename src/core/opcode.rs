//! Operator tags and bytecode opcodes.
//!
//! [`Func`] names every primitive operation the stack machine understands.
//! The same tags label operator nodes in the expression tree, so folding a
//! constant node and executing the bytecode go through one evaluation path
//! ([`Scalar::apply`](crate::Scalar::apply)).

use std::fmt;

/// A primitive operation.
///
/// The declaration order is part of the canonical term order: operator nodes
/// with equal size are ranked by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Func {
    // Arithmetic
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// Remainder with the sign of the dividend
    Mod,
    /// `a ^ b`
    Pow,
    /// `-a`
    Neg,

    // Selection
    /// Smaller operand
    Min,
    /// Larger operand
    Max,

    // Comparison (result is 0 or 1)
    /// `a < b`
    Less,
    /// `a <= b`
    LessOrEq,
    /// `a > b`
    Greater,
    /// `a >= b`
    GreaterOrEq,
    /// `a == b`
    Equal,
    /// `a != b`
    NotEqual,

    // Logic (operands are read through the scalar's truthiness)
    /// Logical and
    And,
    /// Logical or
    Or,
    /// Logical not
    Not,

    // Functions
    /// Absolute value
    Abs,
    /// Square root
    Sqrt,
    /// Natural exponential
    Exp,
    /// Natural logarithm
    Ln,
    /// Sine
    Sin,
    /// Cosine
    Cos,
    /// Tangent
    Tan,
    /// Round toward negative infinity
    Floor,
    /// Round toward positive infinity
    Ceil,
    /// Two-argument arctangent `atan2(y, x)`
    Atan2,

    /// `select(cond, a, b)`: `a` if `cond` is truthy, else `b`
    Select,
}

impl Func {
    /// Number of operands the bytecode form pops.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Neg
            | Self::Not
            | Self::Abs
            | Self::Sqrt
            | Self::Exp
            | Self::Ln
            | Self::Sin
            | Self::Cos
            | Self::Tan
            | Self::Floor
            | Self::Ceil => 1,
            Self::Select => 3,
            _ => 2,
        }
    }

    /// Operand order does not matter.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Mul
                | Self::Min
                | Self::Max
                | Self::Equal
                | Self::NotEqual
                | Self::And
                | Self::Or
        )
    }

    /// Nested applications may be flattened into one n-ary node.
    #[must_use]
    pub const fn is_associative(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::Min | Self::Max | Self::And | Self::Or
        )
    }

    /// Lower-case name used when printing trees and programs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Pow => "pow",
            Self::Neg => "neg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Less => "less",
            Self::LessOrEq => "less_eq",
            Self::Greater => "greater",
            Self::GreaterOrEq => "greater_eq",
            Self::Equal => "eq",
            Self::NotEqual => "neq",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Atan2 => "atan2",
            Self::Select => "select",
        }
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One bytecode instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Push `immed[k]`
    Immed(u32),
    /// Push variable `i`
    Var(u32),
    /// Pop `arity` operands, push the result
    Func(Func),
}

impl Opcode {
    /// Values popped by this instruction.
    #[must_use]
    pub const fn pops(self) -> usize {
        match self {
            Self::Immed(_) | Self::Var(_) => 0,
            Self::Func(f) => f.arity(),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immed(k) => write!(f, "immed {k}"),
            Self::Var(i) => write!(f, "var {i}"),
            Self::Func(func) => write!(f, "{func}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_classes() {
        assert_eq!(Func::Neg.arity(), 1);
        assert_eq!(Func::Atan2.arity(), 2);
        assert_eq!(Func::Select.arity(), 3);
        assert_eq!(Opcode::Immed(0).pops(), 0);
        assert_eq!(Opcode::Func(Func::Sub).pops(), 2);
    }

    #[test]
    fn test_associative_implies_commutative() {
        for f in [
            Func::Add,
            Func::Sub,
            Func::Mul,
            Func::Min,
            Func::Max,
            Func::And,
            Func::Or,
            Func::Equal,
            Func::Pow,
        ] {
            if f.is_associative() {
                assert!(f.is_commutative(), "{f} is associative but not commutative");
            }
        }
        assert!(!Func::Sub.is_commutative());
        assert!(Func::Equal.is_commutative() && !Func::Equal.is_associative());
    }
}
