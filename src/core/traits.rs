//! Scalar abstraction shared by the tree, the rewriter and the stack machine.
//!
//! A [`Scalar`] knows how to evaluate every [`Func`] it supports, and the
//! optimizer never computes a constant any other way. Constant folding therefore
//! reproduces runtime rounding exactly, and operations that raise a runtime
//! condition (integer division by zero) are never folded away.
//!
//! Whether a type gets rewritten at all is a separate capability,
//! [`Rewritable`]. Its default rule list is empty, which is how a type opts out
//! of optimization.

use crate::core::opcode::Func;
use crate::simplification::RuleSet;
use num_traits::Num;
use std::fmt::{Debug, Display};
use std::ops::Neg;

/// Absolute tolerance used by `f64` equality and ordering tests.
pub const F64_EPSILON: f64 = 1e-12;
/// Absolute tolerance used by `f32` equality and ordering tests.
pub const F32_EPSILON: f32 = 1e-5;

/// Numeric value type that programs compute with.
pub trait Scalar:
    Num + Neg<Output = Self> + Copy + Debug + Display + PartialEq + PartialOrd + Send + Sync + 'static
{
    /// Short name used in logs and error messages.
    const NAME: &'static str;

    /// Convert a small integer literal.
    fn from_int(value: i64) -> Self;

    /// The value has no fractional part.
    fn is_integer(self) -> bool;

    /// False for infinities and NaN.
    fn is_finite(self) -> bool {
        true
    }

    /// Equality as seen by `Equal` / `NotEqual` at runtime.
    fn approx_eq(self, other: Self) -> bool {
        self == other
    }

    /// Bit-for-bit identity. Used for immediate-pool dedup and structural
    /// equality of constant nodes.
    fn identical(self, other: Self) -> bool {
        self == other
    }

    /// Hash key consistent with [`identical`](Self::identical).
    fn key_bits(self) -> u64;

    /// Truth value of an operand of `And`, `Or`, `Not` and `Select`.
    fn is_truthy(self) -> bool;

    /// `1` for true, `0` for false.
    fn from_bool(value: bool) -> Self {
        if value { Self::one() } else { Self::zero() }
    }

    /// Whether programs over this type may use `func`.
    fn supports(func: Func) -> bool {
        let _ = func;
        true
    }

    /// Whether `func` can raise a runtime condition. `operands` holds the
    /// operand values that are known constants.
    ///
    /// Rules that drop a subtree only fire where nothing in it can raise. The
    /// default answers yes for every operation.
    fn may_raise(func: Func, operands: &[Option<Self>]) -> bool {
        let _ = (func, operands);
        true
    }

    /// Evaluate one primitive operation.
    ///
    /// Returns `None` when the operation raises a runtime condition for these
    /// operands, when `func` is unsupported, or when the operand count does not
    /// match the arity.
    fn apply(func: Func, args: &[Self]) -> Option<Self>;
}

/// Per-type rewrite capability.
///
/// The default rule list is empty: the optimizer leaves such programs
/// untouched apart from recomputing their stack size.
pub trait Rewritable: Scalar {
    /// Rule sets applied in order, each to a local fixpoint.
    fn rule_sets() -> &'static [&'static RuleSet] {
        &[]
    }
}

macro_rules! impl_float_scalar {
    ($t:ty, $name:literal, $eps:expr) => {
        impl Scalar for $t {
            const NAME: &'static str = $name;

            #[allow(
                clippy::cast_precision_loss,
                reason = "Literals used by rewrite rules are small integers"
            )]
            fn from_int(value: i64) -> Self {
                value as $t
            }

            fn is_integer(self) -> bool {
                <$t>::is_finite(self) && self.fract() == 0.0
            }

            fn is_finite(self) -> bool {
                <$t>::is_finite(self)
            }

            fn approx_eq(self, other: Self) -> bool {
                (self - other).abs() <= $eps
            }

            fn identical(self, other: Self) -> bool {
                self.to_bits() == other.to_bits()
            }

            fn key_bits(self) -> u64 {
                u64::from(self.to_bits())
            }

            fn is_truthy(self) -> bool {
                self.abs() >= 0.5
            }

            // IEEE arithmetic saturates to infinities and NaN instead.
            fn may_raise(_func: Func, _operands: &[Option<Self>]) -> bool {
                false
            }

            fn apply(func: Func, args: &[Self]) -> Option<Self> {
                let eps: $t = $eps;
                let value = match (func, args) {
                    (Func::Add, &[a, b]) => a + b,
                    (Func::Sub, &[a, b]) => a - b,
                    (Func::Mul, &[a, b]) => a * b,
                    (Func::Div, &[a, b]) => a / b,
                    (Func::Mod, &[a, b]) => a % b,
                    (Func::Pow, &[a, b]) => a.powf(b),
                    (Func::Neg, &[a]) => -a,
                    (Func::Min, &[a, b]) => a.min(b),
                    (Func::Max, &[a, b]) => a.max(b),
                    (Func::Less, &[a, b]) => Self::from_bool(a < b - eps),
                    (Func::LessOrEq, &[a, b]) => Self::from_bool(a <= b + eps),
                    (Func::Greater, &[a, b]) => Self::from_bool(a > b + eps),
                    (Func::GreaterOrEq, &[a, b]) => Self::from_bool(a >= b - eps),
                    (Func::Equal, &[a, b]) => Self::from_bool(a.approx_eq(b)),
                    (Func::NotEqual, &[a, b]) => Self::from_bool(!a.approx_eq(b)),
                    (Func::And, &[a, b]) => Self::from_bool(a.is_truthy() && b.is_truthy()),
                    (Func::Or, &[a, b]) => Self::from_bool(a.is_truthy() || b.is_truthy()),
                    (Func::Not, &[a]) => Self::from_bool(!a.is_truthy()),
                    (Func::Abs, &[a]) => a.abs(),
                    (Func::Sqrt, &[a]) => a.sqrt(),
                    (Func::Exp, &[a]) => a.exp(),
                    (Func::Ln, &[a]) => a.ln(),
                    (Func::Sin, &[a]) => a.sin(),
                    (Func::Cos, &[a]) => a.cos(),
                    (Func::Tan, &[a]) => a.tan(),
                    (Func::Floor, &[a]) => a.floor(),
                    (Func::Ceil, &[a]) => a.ceil(),
                    (Func::Atan2, &[a, b]) => a.atan2(b),
                    (Func::Select, &[c, a, b]) => {
                        if c.is_truthy() {
                            a
                        } else {
                            b
                        }
                    }
                    _ => return None,
                };
                Some(value)
            }
        }
    };
}

impl_float_scalar!(f64, "f64", F64_EPSILON);
impl_float_scalar!(f32, "f32", F32_EPSILON);

/// Integer power with wrapping multiplication.
///
/// Negative exponents truncate toward zero the way integer division does:
/// only `1` and `-1` keep a non-zero result, and `0` raises a runtime condition.
fn int_pow(base: i64, exp: i64) -> Option<i64> {
    let Ok(mut exp) = u64::try_from(exp) else {
        return match base {
            0 => None,
            1 => Some(1),
            -1 => Some(if exp % 2 == 0 { 1 } else { -1 }),
            _ => Some(0),
        };
    };
    let mut result: i64 = 1;
    let mut base = base;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    Some(result)
}

impl Scalar for i64 {
    const NAME: &'static str = "i64";

    fn from_int(value: i64) -> Self {
        value
    }

    fn is_integer(self) -> bool {
        true
    }

    fn key_bits(self) -> u64 {
        u64::from_ne_bytes(self.to_ne_bytes())
    }

    fn is_truthy(self) -> bool {
        self != 0
    }

    fn supports(func: Func) -> bool {
        !matches!(
            func,
            Func::Sqrt | Func::Exp | Func::Ln | Func::Sin | Func::Cos | Func::Tan | Func::Atan2
        )
    }

    fn may_raise(func: Func, operands: &[Option<Self>]) -> bool {
        match (func, operands) {
            (Func::Div | Func::Mod, &[_, divisor]) => !matches!(divisor, Some(d) if d != 0),
            (Func::Pow, &[base, exp]) => {
                !matches!(exp, Some(e) if e >= 0) && !matches!(base, Some(b) if b != 0)
            }
            _ => false,
        }
    }

    fn apply(func: Func, args: &[Self]) -> Option<Self> {
        let value = match (func, args) {
            (Func::Add, &[a, b]) => a.wrapping_add(b),
            (Func::Sub, &[a, b]) => a.wrapping_sub(b),
            (Func::Mul, &[a, b]) => a.wrapping_mul(b),
            (Func::Div, &[_, 0]) | (Func::Mod, &[_, 0]) => return None,
            (Func::Div, &[a, b]) => a.wrapping_div(b),
            (Func::Mod, &[a, b]) => a.wrapping_rem(b),
            (Func::Pow, &[a, b]) => return int_pow(a, b),
            (Func::Neg, &[a]) => a.wrapping_neg(),
            (Func::Min, &[a, b]) => a.min(b),
            (Func::Max, &[a, b]) => a.max(b),
            (Func::Less, &[a, b]) => Self::from_bool(a < b),
            (Func::LessOrEq, &[a, b]) => Self::from_bool(a <= b),
            (Func::Greater, &[a, b]) => Self::from_bool(a > b),
            (Func::GreaterOrEq, &[a, b]) => Self::from_bool(a >= b),
            (Func::Equal, &[a, b]) => Self::from_bool(a == b),
            (Func::NotEqual, &[a, b]) => Self::from_bool(a != b),
            (Func::And, &[a, b]) => Self::from_bool(a != 0 && b != 0),
            (Func::Or, &[a, b]) => Self::from_bool(a != 0 || b != 0),
            (Func::Not, &[a]) => Self::from_bool(a == 0),
            (Func::Abs, &[a]) => a.wrapping_abs(),
            (Func::Floor | Func::Ceil, &[a]) => a,
            (Func::Select, &[c, a, b]) => {
                if c != 0 {
                    a
                } else {
                    b
                }
            }
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(feature = "rational")]
mod rational {
    use super::{Func, Rewritable, Scalar};
    use num_rational::Rational64;
    use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, One, Zero};
    use rustc_hash::FxHasher;
    use std::hash::{Hash, Hasher};

    /// Largest exponent magnitude folded or evaluated for rationals.
    const MAX_RATIONAL_EXPONENT: u64 = 64;

    fn rational_pow(base: Rational64, exp: Rational64) -> Option<Rational64> {
        if !exp.is_integer() || exp.numer().unsigned_abs() > MAX_RATIONAL_EXPONENT {
            return None;
        }
        let e = *exp.numer();
        if e < 0 && base.is_zero() {
            return None;
        }
        let mut result = Rational64::one();
        for _ in 0..e.unsigned_abs() {
            result = result.checked_mul(&base)?;
        }
        if e < 0 {
            Rational64::one().checked_div(&result)
        } else {
            Some(result)
        }
    }

    fn checked_neg(value: Rational64) -> Option<Rational64> {
        Some(Rational64::new_raw(value.numer().checked_neg()?, *value.denom()))
    }

    // Truncated remainder, `a - b * trunc(a / b)`.
    fn checked_rem(a: Rational64, b: Rational64) -> Option<Rational64> {
        let quotient = a.checked_div(&b)?.trunc();
        a.checked_sub(&b.checked_mul(&quotient)?)
    }

    // The denominator of a reduced ratio is positive, so Euclidean division
    // is floor division and cannot overflow.
    fn floor(value: Rational64) -> Rational64 {
        Rational64::from_integer(value.numer().div_euclid(*value.denom()))
    }

    fn ceil(value: Rational64) -> Rational64 {
        let (numer, denom) = (*value.numer(), *value.denom());
        let floor = numer.div_euclid(denom);
        Rational64::from_integer(if numer.rem_euclid(denom) == 0 { floor } else { floor + 1 })
    }

    impl Scalar for Rational64 {
        const NAME: &'static str = "rational";

        fn from_int(value: i64) -> Self {
            Self::from_integer(value)
        }

        fn is_integer(self) -> bool {
            *self.denom() == 1
        }

        fn key_bits(self) -> u64 {
            let mut hasher = FxHasher::default();
            self.numer().hash(&mut hasher);
            self.denom().hash(&mut hasher);
            hasher.finish()
        }

        fn is_truthy(self) -> bool {
            !self.is_zero()
        }

        fn supports(func: Func) -> bool {
            !matches!(
                func,
                Func::Sqrt | Func::Exp | Func::Ln | Func::Sin | Func::Cos | Func::Tan | Func::Atan2
            )
        }

        fn apply(func: Func, args: &[Self]) -> Option<Self> {
            let value = match (func, args) {
                (Func::Add, [a, b]) => a.checked_add(b)?,
                (Func::Sub, [a, b]) => a.checked_sub(b)?,
                (Func::Mul, [a, b]) => a.checked_mul(b)?,
                (Func::Div, [a, b]) => a.checked_div(b)?,
                (Func::Mod, &[a, b]) => return checked_rem(a, b),
                (Func::Pow, &[a, b]) => return rational_pow(a, b),
                (Func::Neg, &[a]) => return checked_neg(a),
                (Func::Min, &[a, b]) => {
                    if b < a {
                        b
                    } else {
                        a
                    }
                }
                (Func::Max, &[a, b]) => {
                    if b > a {
                        b
                    } else {
                        a
                    }
                }
                (Func::Less, [a, b]) => Self::from_bool(a < b),
                (Func::LessOrEq, [a, b]) => Self::from_bool(a <= b),
                (Func::Greater, [a, b]) => Self::from_bool(a > b),
                (Func::GreaterOrEq, [a, b]) => Self::from_bool(a >= b),
                (Func::Equal, [a, b]) => Self::from_bool(a == b),
                (Func::NotEqual, [a, b]) => Self::from_bool(a != b),
                (Func::And, [a, b]) => Self::from_bool(!a.is_zero() && !b.is_zero()),
                (Func::Or, [a, b]) => Self::from_bool(!a.is_zero() || !b.is_zero()),
                (Func::Not, [a]) => Self::from_bool(a.is_zero()),
                (Func::Abs, &[a]) => {
                    if *a.numer() < 0 {
                        return checked_neg(a);
                    }
                    a
                }
                (Func::Floor, &[a]) => floor(a),
                (Func::Ceil, &[a]) => ceil(a),
                (Func::Select, &[c, a, b]) => {
                    if c.is_zero() {
                        b
                    } else {
                        a
                    }
                }
                _ => return None,
            };
            Some(value)
        }
    }

    // Exact rationals carry no rewrite rules.
    impl Rewritable for Rational64 {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_float_truthiness_and_tolerance() {
        assert!(f64::is_truthy(0.5));
        assert!(f64::is_truthy(-0.7));
        assert!(!f64::is_truthy(0.49));
        assert_eq!(f64::apply(Func::Equal, &[1.0, 1.0 + 1e-14]), Some(1.0));
        assert_eq!(f64::apply(Func::Less, &[1.0, 1.0 + 1e-14]), Some(0.0));
        assert_eq!(f64::apply(Func::LessOrEq, &[1.0 + 1e-14, 1.0]), Some(1.0));
    }

    #[test]
    fn test_greater_mirrors_less() {
        for (a, b) in [(1.0, 2.0), (2.0, 1.0), (3.0, 3.0), (-1.0, 0.5)] {
            assert_eq!(
                f64::apply(Func::Greater, &[a, b]),
                f64::apply(Func::Less, &[b, a])
            );
            assert_eq!(
                f64::apply(Func::GreaterOrEq, &[a, b]),
                f64::apply(Func::LessOrEq, &[b, a])
            );
        }
    }

    #[test]
    fn test_float_identity_distinguishes_signed_zero() {
        assert!(0.0_f64.approx_eq(-0.0));
        assert!(!0.0_f64.identical(-0.0));
        assert_ne!(0.0_f64.key_bits(), (-0.0_f64).key_bits());
    }

    #[test]
    fn test_arity_mismatch_is_none() {
        assert_eq!(f64::apply(Func::Add, &[1.0]), None);
        assert_eq!(i64::apply(Func::Neg, &[1, 2]), None);
    }

    #[test]
    fn test_integer_division_by_zero_is_a_runtime_condition() {
        assert_eq!(i64::apply(Func::Div, &[7, 0]), None);
        assert_eq!(i64::apply(Func::Mod, &[7, 0]), None);
        assert_eq!(i64::apply(Func::Div, &[7, 2]), Some(3));
        assert_eq!(i64::apply(Func::Div, &[i64::MIN, -1]), Some(i64::MIN));
    }

    #[test]
    fn test_integer_pow() {
        assert_eq!(int_pow(3, 4), Some(81));
        assert_eq!(int_pow(2, 0), Some(1));
        assert_eq!(int_pow(0, 0), Some(1));
        assert_eq!(int_pow(2, -1), Some(0));
        assert_eq!(int_pow(-1, -3), Some(-1));
        assert_eq!(int_pow(0, -2), None);
        assert_eq!(int_pow(2, 64), Some(0));
    }

    #[test]
    fn test_integer_unsupported_functions() {
        assert!(!i64::supports(Func::Sqrt));
        assert!(i64::supports(Func::Mod));
        assert_eq!(i64::apply(Func::Sin, &[1]), None);
    }

    #[cfg(feature = "rational")]
    #[test]
    fn test_rational_arithmetic() {
        use num_rational::Rational64;
        let half = Rational64::new(1, 2);
        let third = Rational64::new(1, 3);
        assert_eq!(
            Rational64::apply(Func::Add, &[half, third]),
            Some(Rational64::new(5, 6))
        );
        assert_eq!(
            Rational64::apply(Func::Pow, &[half, Rational64::from_int(-2)]),
            Some(Rational64::from_int(4))
        );
        assert_eq!(
            Rational64::apply(Func::Div, &[half, Rational64::from_int(0)]),
            None
        );
        assert!(Rational64::rule_sets().is_empty());
        assert!(!half.is_integer());
    }

    #[cfg(feature = "rational")]
    #[test]
    fn test_rational_overflow_is_a_runtime_condition() {
        use num_rational::Rational64;
        let min = Rational64::from_int(i64::MIN);
        assert_eq!(Rational64::apply(Func::Neg, &[min]), None);
        assert_eq!(Rational64::apply(Func::Abs, &[min]), None);
        assert_eq!(Rational64::apply(Func::Mod, &[min, Rational64::new(3, 2)]), None);
        assert_eq!(
            Rational64::apply(Func::Pow, &[Rational64::from_int(2), min]),
            None
        );
        assert_eq!(Rational64::apply(Func::Floor, &[min]), Some(min));
        assert_eq!(
            Rational64::apply(Func::Ceil, &[Rational64::new(i64::MIN + 1, 2)]),
            Some(Rational64::from_int(i64::MIN / 2 + 1))
        );
    }

    #[cfg(feature = "rational")]
    #[test]
    fn test_rational_rounding_and_remainder() {
        use num_rational::Rational64;
        let r = Rational64::new;
        assert_eq!(Rational64::apply(Func::Floor, &[r(-7, 2)]), Some(r(-4, 1)));
        assert_eq!(Rational64::apply(Func::Ceil, &[r(-7, 2)]), Some(r(-3, 1)));
        assert_eq!(Rational64::apply(Func::Ceil, &[r(7, 2)]), Some(r(4, 1)));
        assert_eq!(Rational64::apply(Func::Abs, &[r(-7, 2)]), Some(r(7, 2)));
        assert_eq!(Rational64::apply(Func::Mod, &[r(7, 2), r(1, 1)]), Some(r(1, 2)));
        assert_eq!(Rational64::apply(Func::Mod, &[r(-7, 2), r(1, 1)]), Some(r(-1, 2)));
        assert_eq!(Rational64::apply(Func::Mod, &[r(7, 2), r(0, 1)]), None);
    }

    #[test]
    fn test_integer_may_raise() {
        assert!(i64::may_raise(Func::Div, &[None, None]));
        assert!(i64::may_raise(Func::Mod, &[Some(3), Some(0)]));
        assert!(!i64::may_raise(Func::Div, &[None, Some(-2)]));
        assert!(i64::may_raise(Func::Pow, &[None, Some(-1)]));
        assert!(!i64::may_raise(Func::Pow, &[Some(2), None]));
        assert!(!i64::may_raise(Func::Pow, &[None, Some(3)]));
        assert!(!i64::may_raise(Func::Mul, &[None, None]));
        assert!(!f64::may_raise(Func::Div, &[None, Some(0.0)]));
    }
}
