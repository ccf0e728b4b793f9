//! Rewrite rules and the grammars built from them.
//!
//! A [`Rule`] is a pattern plus a replacement template, both plain data. Rules
//! are grouped into ordered [`RuleSet`]s. A grammar is the list of rule sets
//! a scalar type returns from [`Rewritable::rule_sets`].
//!
//! When several rules of one set match the same node, the first one declared
//! wins.

pub mod algebraic;
pub mod functions;
pub mod numeric;

use crate::codetree::{CodeTree, NodeId, Op};
use crate::core::traits::{Rewritable, Scalar};
use crate::simplification::patterns::{Matcher, Pattern, Template, can_instantiate, instantiate};

/// One rewrite rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Name used in trace output
    pub name: &'static str,
    /// Shape to look for
    pub pattern: Pattern,
    /// What to replace a match with
    pub replacement: Template,
}

impl Rule {
    /// Rewrite the node at `id` if the rule applies.
    ///
    /// Returns the replacement node. The matched node itself is left intact,
    /// so other referrers of a shared node keep seeing the original.
    pub fn apply<T: Scalar>(&self, tree: &mut CodeTree<T>, id: NodeId) -> Option<NodeId> {
        let mut outer = &self.pattern;
        while let Pattern::Safe(inner) = *outer {
            outer = inner;
        }
        let candidate = match (*outer, tree.op(id)) {
            (Pattern::Node { func, .. }, Op::Func(f)) => func == f,
            (Pattern::AllConst, Op::Func(_)) => true,
            _ => false,
        };
        if !candidate {
            return None;
        }
        let bindings = Matcher::new(tree).first_match(&self.pattern, id, |b| {
            can_instantiate(tree, &self.replacement, b, id)
        })?;
        instantiate(tree, &self.replacement, &bindings, id)
    }
}

/// Ordered group of rules run together to a fixpoint.
#[derive(Debug)]
pub struct RuleSet {
    /// Name used in trace output
    pub name: &'static str,
    /// Rules in priority order
    pub rules: &'static [Rule],
}

/// Grammar for floating-point scalars.
pub static FLOAT_GRAMMAR: [&RuleSet; 3] = [
    &numeric::NUMERIC,
    &algebraic::ALGEBRAIC,
    &functions::FUNCTIONS,
];

/// Grammar for wrapping integer scalars.
pub static INTEGER_GRAMMAR: [&RuleSet; 3] = [
    &numeric::NUMERIC,
    &algebraic::ALGEBRAIC,
    &functions::INTEGER_FUNCTIONS,
];

impl Rewritable for f64 {
    fn rule_sets() -> &'static [&'static RuleSet] {
        &FLOAT_GRAMMAR
    }
}

impl Rewritable for f32 {
    fn rule_sets() -> &'static [&'static RuleSet] {
        &FLOAT_GRAMMAR
    }
}

impl Rewritable for i64 {
    fn rule_sets() -> &'static [&'static RuleSet] {
        &INTEGER_GRAMMAR
    }
}
