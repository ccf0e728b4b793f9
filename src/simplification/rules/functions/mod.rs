//! Rules for powers and elementary functions.
//!
//! Power rules only combine non-negative integer exponents, where
//! `(x^a)^b = x^(a*b)` holds for every base including negative ones and zero.
//! Both exponents are at most [`MAX_MERGED_EXPONENT`], so the merged exponent
//! is computed exactly: it neither wraps for integers nor rounds to a
//! different parity for floats.
//!
//! [`MAX_MERGED_EXPONENT`]: crate::simplification::patterns::MAX_MERGED_EXPONENT

use crate::core::opcode::Func;
use crate::simplification::patterns::{Guard, Pattern, Template};
use crate::simplification::rules::{Rule, RuleSet};

// |-x| -> |x|
const ABS_NEG: Rule = Rule {
    name: "abs_neg",
    pattern: Pattern::Node {
        func: Func::Abs,
        params: &[Pattern::Node {
            func: Func::Neg,
            params: &[Pattern::Any(0)],
            rest: None,
        }],
        rest: None,
    },
    replacement: Template::Node(Func::Abs, &[Template::Hole(0)]),
};

// ||x|| -> |x|
const ABS_ABS: Rule = Rule {
    name: "abs_abs",
    pattern: Pattern::Node {
        func: Func::Abs,
        params: &[Pattern::Node {
            func: Func::Abs,
            params: &[Pattern::Any(0)],
            rest: None,
        }],
        rest: None,
    },
    replacement: Template::Node(Func::Abs, &[Template::Hole(0)]),
};

// (x^a)^b -> x^(a*b)
const POW_POW: Rule = Rule {
    name: "pow_pow",
    pattern: Pattern::Node {
        func: Func::Pow,
        params: &[
            Pattern::Node {
                func: Func::Pow,
                params: &[Pattern::Any(0), Pattern::Const(1, Guard::SmallExponent)],
                rest: None,
            },
            Pattern::Const(2, Guard::SmallExponent),
        ],
        rest: None,
    },
    replacement: Template::Node(
        Func::Pow,
        &[
            Template::Hole(0),
            Template::Compute(Func::Mul, &[Template::Hole(1), Template::Hole(2)]),
        ],
    ),
};

// x^a * x^b -> x^(a+b)
const POW_PRODUCT: Rule = Rule {
    name: "pow_product",
    pattern: Pattern::Node {
        func: Func::Mul,
        params: &[
            Pattern::Node {
                func: Func::Pow,
                params: &[Pattern::Any(0), Pattern::Const(1, Guard::SmallExponent)],
                rest: None,
            },
            Pattern::Node {
                func: Func::Pow,
                params: &[Pattern::Same(0), Pattern::Const(2, Guard::SmallExponent)],
                rest: None,
            },
        ],
        rest: Some(3),
    },
    replacement: Template::Node(
        Func::Mul,
        &[
            Template::Node(
                Func::Pow,
                &[
                    Template::Hole(0),
                    Template::Compute(Func::Add, &[Template::Hole(1), Template::Hole(2)]),
                ],
            ),
            Template::Rest(3),
        ],
    ),
};

// x * x^a -> x^(a+1)
const POW_TIMES_BASE: Rule = Rule {
    name: "pow_times_base",
    pattern: Pattern::Node {
        func: Func::Mul,
        params: &[
            Pattern::Any(0),
            Pattern::Node {
                func: Func::Pow,
                params: &[Pattern::Same(0), Pattern::Const(1, Guard::SmallExponent)],
                rest: None,
            },
        ],
        rest: Some(2),
    },
    replacement: Template::Node(
        Func::Mul,
        &[
            Template::Node(
                Func::Pow,
                &[
                    Template::Hole(0),
                    Template::Compute(Func::Add, &[Template::Hole(1), Template::Lit(1)]),
                ],
            ),
            Template::Rest(2),
        ],
    ),
};

// x * x -> x^2
const SQUARE: Rule = Rule {
    name: "square",
    pattern: Pattern::Node {
        func: Func::Mul,
        params: &[Pattern::Term(0), Pattern::Same(0)],
        rest: Some(1),
    },
    replacement: Template::Node(
        Func::Mul,
        &[
            Template::Node(Func::Pow, &[Template::Hole(0), Template::Lit(2)]),
            Template::Rest(1),
        ],
    ),
};

/// Function rules for floating-point scalars.
pub static FUNCTIONS: RuleSet = RuleSet {
    name: "functions",
    rules: &[
        ABS_NEG,
        ABS_ABS,
        POW_POW,
        POW_PRODUCT,
        POW_TIMES_BASE,
        SQUARE,
        // ln(exp(x)) -> x
        Rule {
            name: "ln_exp",
            pattern: Pattern::Node {
                func: Func::Ln,
                params: &[Pattern::Node {
                    func: Func::Exp,
                    params: &[Pattern::Any(0)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Hole(0),
        },
        // sqrt(x^2) -> |x|
        Rule {
            name: "sqrt_square",
            pattern: Pattern::Node {
                func: Func::Sqrt,
                params: &[Pattern::Node {
                    func: Func::Pow,
                    params: &[Pattern::Any(0), Pattern::Lit(2)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Node(Func::Abs, &[Template::Hole(0)]),
        },
        // cos(-x) -> cos(x)
        Rule {
            name: "cos_neg",
            pattern: Pattern::Node {
                func: Func::Cos,
                params: &[Pattern::Node {
                    func: Func::Neg,
                    params: &[Pattern::Any(0)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Node(Func::Cos, &[Template::Hole(0)]),
        },
        // sin(-x) -> -sin(x)
        Rule {
            name: "sin_neg",
            pattern: Pattern::Node {
                func: Func::Sin,
                params: &[Pattern::Node {
                    func: Func::Neg,
                    params: &[Pattern::Any(0)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Node(
                Func::Neg,
                &[Template::Node(Func::Sin, &[Template::Hole(0)])],
            ),
        },
    ],
};

/// Function rules that hold exactly in wrapping integer arithmetic.
pub static INTEGER_FUNCTIONS: RuleSet = RuleSet {
    name: "integer_functions",
    rules: &[ABS_NEG, ABS_ABS, POW_POW, POW_PRODUCT, POW_TIMES_BASE, SQUARE],
};
