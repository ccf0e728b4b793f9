//! Constant folding, identity and absorption rules.
//!
//! These hold for every scalar type with wrapping or IEEE arithmetic, so both
//! the float and the integer grammar start with this set. Rules that drop a
//! subtree only match where that subtree cannot raise a runtime condition.

use crate::core::opcode::Func;
use crate::simplification::patterns::{Guard, Pattern, Template};
use crate::simplification::rules::{Rule, RuleSet};

// op(c1, c2, ..., rest) -> op(folded constants, rest)
const fn fold_constant_operands(name: &'static str, func: Func) -> Rule {
    Rule {
        name,
        pattern: Pattern::Node {
            func,
            params: &[Pattern::Const(0, Guard::Any), Pattern::Const(1, Guard::Any)],
            rest: Some(2),
        },
        replacement: Template::Node(func, &[Template::FoldConsts, Template::Terms]),
    }
}

/// Folding and identities.
pub static NUMERIC: RuleSet = RuleSet {
    name: "numeric",
    rules: &[
        // op(c1, c2, ...) -> value
        Rule {
            name: "fold_constants",
            pattern: Pattern::AllConst,
            replacement: Template::Fold,
        },
        // c1 + c2 + ... + rest -> (c1 + c2 + ...) + rest
        fold_constant_operands("fold_sum_constants", Func::Add),
        fold_constant_operands("fold_product_constants", Func::Mul),
        fold_constant_operands("fold_min_constants", Func::Min),
        fold_constant_operands("fold_max_constants", Func::Max),
        // Pairwise fallback for when the full fold is not finite
        Rule {
            name: "merge_sum_constants",
            pattern: Pattern::Node {
                func: Func::Add,
                params: &[Pattern::Const(0, Guard::Any), Pattern::Const(1, Guard::Any)],
                rest: Some(2),
            },
            replacement: Template::Node(
                Func::Add,
                &[
                    Template::Compute(Func::Add, &[Template::Hole(0), Template::Hole(1)]),
                    Template::Rest(2),
                ],
            ),
        },
        Rule {
            name: "merge_product_constants",
            pattern: Pattern::Node {
                func: Func::Mul,
                params: &[Pattern::Const(0, Guard::Any), Pattern::Const(1, Guard::Any)],
                rest: Some(2),
            },
            replacement: Template::Node(
                Func::Mul,
                &[
                    Template::Compute(Func::Mul, &[Template::Hole(0), Template::Hole(1)]),
                    Template::Rest(2),
                ],
            ),
        },
        Rule {
            name: "merge_min_constants",
            pattern: Pattern::Node {
                func: Func::Min,
                params: &[Pattern::Const(0, Guard::Any), Pattern::Const(1, Guard::Any)],
                rest: Some(2),
            },
            replacement: Template::Node(
                Func::Min,
                &[
                    Template::Compute(Func::Min, &[Template::Hole(0), Template::Hole(1)]),
                    Template::Rest(2),
                ],
            ),
        },
        Rule {
            name: "merge_max_constants",
            pattern: Pattern::Node {
                func: Func::Max,
                params: &[Pattern::Const(0, Guard::Any), Pattern::Const(1, Guard::Any)],
                rest: Some(2),
            },
            replacement: Template::Node(
                Func::Max,
                &[
                    Template::Compute(Func::Max, &[Template::Hole(0), Template::Hole(1)]),
                    Template::Rest(2),
                ],
            ),
        },
        // x + 0 -> x
        Rule {
            name: "add_zero",
            pattern: Pattern::Node {
                func: Func::Add,
                params: &[Pattern::Lit(0)],
                rest: Some(0),
            },
            replacement: Template::Node(Func::Add, &[Template::Rest(0)]),
        },
        // x * 1 -> x
        Rule {
            name: "mul_one",
            pattern: Pattern::Node {
                func: Func::Mul,
                params: &[Pattern::Lit(1)],
                rest: Some(0),
            },
            replacement: Template::Node(Func::Mul, &[Template::Rest(0)]),
        },
        // x * 0 -> 0
        Rule {
            name: "mul_zero",
            pattern: Pattern::Safe(&Pattern::Node {
                func: Func::Mul,
                params: &[Pattern::Lit(0)],
                rest: Some(0),
            }),
            replacement: Template::Lit(0),
        },
        // x * -1 -> -x
        Rule {
            name: "mul_neg_one",
            pattern: Pattern::Node {
                func: Func::Mul,
                params: &[Pattern::Lit(-1)],
                rest: Some(0),
            },
            replacement: Template::Node(
                Func::Neg,
                &[Template::Node(Func::Mul, &[Template::Rest(0)])],
            ),
        },
        // --x -> x
        Rule {
            name: "neg_neg",
            pattern: Pattern::Node {
                func: Func::Neg,
                params: &[Pattern::Node {
                    func: Func::Neg,
                    params: &[Pattern::Any(0)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Hole(0),
        },
        // -(c * x) -> (-c) * x
        Rule {
            name: "neg_product_constant",
            pattern: Pattern::Node {
                func: Func::Neg,
                params: &[Pattern::Node {
                    func: Func::Mul,
                    params: &[Pattern::Const(0, Guard::Any)],
                    rest: Some(1),
                }],
                rest: None,
            },
            replacement: Template::Node(
                Func::Mul,
                &[
                    Template::Compute(Func::Neg, &[Template::Hole(0)]),
                    Template::Rest(1),
                ],
            ),
        },
        // x / 1 -> x
        Rule {
            name: "div_one",
            pattern: Pattern::Node {
                func: Func::Div,
                params: &[Pattern::Any(0), Pattern::Lit(1)],
                rest: None,
            },
            replacement: Template::Hole(0),
        },
        // x ^ 1 -> x
        Rule {
            name: "pow_one",
            pattern: Pattern::Node {
                func: Func::Pow,
                params: &[Pattern::Any(0), Pattern::Lit(1)],
                rest: None,
            },
            replacement: Template::Hole(0),
        },
        // x ^ 0 -> 1
        Rule {
            name: "pow_zero",
            pattern: Pattern::Node {
                func: Func::Pow,
                params: &[Pattern::Safe(&Pattern::Any(0)), Pattern::Lit(0)],
                rest: None,
            },
            replacement: Template::Lit(1),
        },
        Rule {
            name: "and_truthy",
            pattern: Pattern::Node {
                func: Func::And,
                params: &[Pattern::Const(0, Guard::Truthy)],
                rest: Some(1),
            },
            replacement: Template::Node(Func::And, &[Template::Rest(1)]),
        },
        Rule {
            name: "and_falsy",
            pattern: Pattern::Safe(&Pattern::Node {
                func: Func::And,
                params: &[Pattern::Const(0, Guard::Falsy)],
                rest: Some(1),
            }),
            replacement: Template::Lit(0),
        },
        Rule {
            name: "or_falsy",
            pattern: Pattern::Node {
                func: Func::Or,
                params: &[Pattern::Const(0, Guard::Falsy)],
                rest: Some(1),
            },
            replacement: Template::Node(Func::Or, &[Template::Rest(1)]),
        },
        Rule {
            name: "or_truthy",
            pattern: Pattern::Safe(&Pattern::Node {
                func: Func::Or,
                params: &[Pattern::Const(0, Guard::Truthy)],
                rest: Some(1),
            }),
            replacement: Template::Lit(1),
        },
        // !!!x -> !x
        Rule {
            name: "triple_not",
            pattern: Pattern::Node {
                func: Func::Not,
                params: &[Pattern::Node {
                    func: Func::Not,
                    params: &[Pattern::Node {
                        func: Func::Not,
                        params: &[Pattern::Any(0)],
                        rest: None,
                    }],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Node(Func::Not, &[Template::Hole(0)]),
        },
        // !(a < b) -> b <= a
        Rule {
            name: "not_less",
            pattern: Pattern::Node {
                func: Func::Not,
                params: &[Pattern::Node {
                    func: Func::Less,
                    params: &[Pattern::Any(0), Pattern::Any(1)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Node(Func::LessOrEq, &[Template::Hole(1), Template::Hole(0)]),
        },
        // !(a <= b) -> b < a
        Rule {
            name: "not_less_or_eq",
            pattern: Pattern::Node {
                func: Func::Not,
                params: &[Pattern::Node {
                    func: Func::LessOrEq,
                    params: &[Pattern::Any(0), Pattern::Any(1)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Node(Func::Less, &[Template::Hole(1), Template::Hole(0)]),
        },
        Rule {
            name: "not_equal",
            pattern: Pattern::Node {
                func: Func::Not,
                params: &[Pattern::Node {
                    func: Func::Equal,
                    params: &[Pattern::Any(0), Pattern::Any(1)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Node(Func::NotEqual, &[Template::Hole(0), Template::Hole(1)]),
        },
        Rule {
            name: "not_not_equal",
            pattern: Pattern::Node {
                func: Func::Not,
                params: &[Pattern::Node {
                    func: Func::NotEqual,
                    params: &[Pattern::Any(0), Pattern::Any(1)],
                    rest: None,
                }],
                rest: None,
            },
            replacement: Template::Node(Func::Equal, &[Template::Hole(0), Template::Hole(1)]),
        },
        // select(c, a, b) with constant c
        Rule {
            name: "select_truthy",
            pattern: Pattern::Node {
                func: Func::Select,
                params: &[
                    Pattern::Const(0, Guard::Truthy),
                    Pattern::Any(1),
                    Pattern::Safe(&Pattern::Any(2)),
                ],
                rest: None,
            },
            replacement: Template::Hole(1),
        },
        Rule {
            name: "select_falsy",
            pattern: Pattern::Node {
                func: Func::Select,
                params: &[
                    Pattern::Const(0, Guard::Falsy),
                    Pattern::Safe(&Pattern::Any(1)),
                    Pattern::Any(2),
                ],
                rest: None,
            },
            replacement: Template::Hole(2),
        },
        // select(c, a, a) -> a
        Rule {
            name: "select_same",
            pattern: Pattern::Node {
                func: Func::Select,
                params: &[
                    Pattern::Safe(&Pattern::Any(0)),
                    Pattern::Any(1),
                    Pattern::Same(1),
                ],
                rest: None,
            },
            replacement: Template::Hole(1),
        },
    ],
};
