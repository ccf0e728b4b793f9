//! Term collection, factoring and self-comparison rules.
//!
//! Factoring only pulls out non-constant terms and expansion only distributes
//! constants, so the two never undo each other. Cancellation and
//! self-comparison drop their operand, so they only match operands that
//! cannot raise a runtime condition.

use crate::core::opcode::Func;
use crate::simplification::patterns::{Guard, Pattern, Template};
use crate::simplification::rules::{Rule, RuleSet};

/// Algebraic rewrites over sums and products.
pub static ALGEBRAIC: RuleSet = RuleSet {
    name: "algebraic",
    rules: &[
        // x + -x -> 0
        Rule {
            name: "cancel_negation",
            pattern: Pattern::Node {
                func: Func::Add,
                params: &[
                    Pattern::Safe(&Pattern::Any(0)),
                    Pattern::Node {
                        func: Func::Neg,
                        params: &[Pattern::Same(0)],
                        rest: None,
                    },
                ],
                rest: Some(1),
            },
            replacement: Template::Node(Func::Add, &[Template::Rest(1)]),
        },
        // x + x -> 2 * x
        Rule {
            name: "double_term",
            pattern: Pattern::Node {
                func: Func::Add,
                params: &[Pattern::Any(0), Pattern::Same(0)],
                rest: Some(1),
            },
            replacement: Template::Node(
                Func::Add,
                &[
                    Template::Node(Func::Mul, &[Template::Lit(2), Template::Hole(0)]),
                    Template::Rest(1),
                ],
            ),
        },
        // x + c * x -> (c + 1) * x
        Rule {
            name: "collect_term",
            pattern: Pattern::Node {
                func: Func::Add,
                params: &[
                    Pattern::Any(0),
                    Pattern::Node {
                        func: Func::Mul,
                        params: &[Pattern::Const(1, Guard::Any), Pattern::Same(0)],
                        rest: None,
                    },
                ],
                rest: Some(2),
            },
            replacement: Template::Node(
                Func::Add,
                &[
                    Template::Node(
                        Func::Mul,
                        &[
                            Template::Compute(Func::Add, &[Template::Hole(1), Template::Lit(1)]),
                            Template::Hole(0),
                        ],
                    ),
                    Template::Rest(2),
                ],
            ),
        },
        // a * x + b * x -> (a + b) * x
        Rule {
            name: "collect_terms",
            pattern: Pattern::Node {
                func: Func::Add,
                params: &[
                    Pattern::Node {
                        func: Func::Mul,
                        params: &[Pattern::Const(1, Guard::Any), Pattern::Any(0)],
                        rest: None,
                    },
                    Pattern::Node {
                        func: Func::Mul,
                        params: &[Pattern::Const(2, Guard::Any), Pattern::Same(0)],
                        rest: None,
                    },
                ],
                rest: Some(3),
            },
            replacement: Template::Node(
                Func::Add,
                &[
                    Template::Node(
                        Func::Mul,
                        &[
                            Template::Compute(Func::Add, &[Template::Hole(1), Template::Hole(2)]),
                            Template::Hole(0),
                        ],
                    ),
                    Template::Rest(3),
                ],
            ),
        },
        // a * t + b * t -> t * (a + b) for a non-constant t
        Rule {
            name: "factor_common",
            pattern: Pattern::Node {
                func: Func::Add,
                params: &[
                    Pattern::Node {
                        func: Func::Mul,
                        params: &[Pattern::Term(0)],
                        rest: Some(1),
                    },
                    Pattern::Node {
                        func: Func::Mul,
                        params: &[Pattern::Same(0)],
                        rest: Some(2),
                    },
                ],
                rest: Some(3),
            },
            replacement: Template::Node(
                Func::Add,
                &[
                    Template::Node(
                        Func::Mul,
                        &[
                            Template::Hole(0),
                            Template::Node(
                                Func::Add,
                                &[
                                    Template::Node(Func::Mul, &[Template::Rest(1)]),
                                    Template::Node(Func::Mul, &[Template::Rest(2)]),
                                ],
                            ),
                        ],
                    ),
                    Template::Rest(3),
                ],
            ),
        },
        // c1 * (c2 + r) -> c1 * c2 + c1 * r
        Rule {
            name: "expand_constant_product",
            pattern: Pattern::Node {
                func: Func::Mul,
                params: &[
                    Pattern::Const(0, Guard::Any),
                    Pattern::Node {
                        func: Func::Add,
                        params: &[Pattern::Const(1, Guard::Any)],
                        rest: Some(2),
                    },
                ],
                rest: None,
            },
            replacement: Template::Node(
                Func::Add,
                &[
                    Template::Compute(Func::Mul, &[Template::Hole(0), Template::Hole(1)]),
                    Template::Node(
                        Func::Mul,
                        &[
                            Template::Hole(0),
                            Template::Node(Func::Add, &[Template::Rest(2)]),
                        ],
                    ),
                ],
            ),
        },
        Rule {
            name: "min_same",
            pattern: Pattern::Node {
                func: Func::Min,
                params: &[Pattern::Any(0), Pattern::Same(0)],
                rest: Some(1),
            },
            replacement: Template::Node(Func::Min, &[Template::Hole(0), Template::Rest(1)]),
        },
        Rule {
            name: "max_same",
            pattern: Pattern::Node {
                func: Func::Max,
                params: &[Pattern::Any(0), Pattern::Same(0)],
                rest: Some(1),
            },
            replacement: Template::Node(Func::Max, &[Template::Hole(0), Template::Rest(1)]),
        },
        Rule {
            name: "equal_self",
            pattern: Pattern::Node {
                func: Func::Equal,
                params: &[Pattern::Safe(&Pattern::Any(0)), Pattern::Same(0)],
                rest: None,
            },
            replacement: Template::Lit(1),
        },
        Rule {
            name: "not_equal_self",
            pattern: Pattern::Node {
                func: Func::NotEqual,
                params: &[Pattern::Safe(&Pattern::Any(0)), Pattern::Same(0)],
                rest: None,
            },
            replacement: Template::Lit(0),
        },
        Rule {
            name: "less_self",
            pattern: Pattern::Node {
                func: Func::Less,
                params: &[Pattern::Safe(&Pattern::Any(0)), Pattern::Same(0)],
                rest: None,
            },
            replacement: Template::Lit(0),
        },
        Rule {
            name: "less_or_eq_self",
            pattern: Pattern::Node {
                func: Func::LessOrEq,
                params: &[Pattern::Safe(&Pattern::Any(0)), Pattern::Same(0)],
                rest: None,
            },
            replacement: Template::Lit(1),
        },
    ],
};
