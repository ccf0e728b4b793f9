//! Fixpoint driver for rule sets.
//!
//! A pass walks the tree bottom-up and rewrites each node with the first rule
//! of the current set that applies, repeating at that node until none does.
//! Each set is run pass after pass until a pass changes nothing. Then the next
//! set runs, and the whole battery repeats until a full round is quiet.
//!
//! Both loops are capped. The per-node cap grows with the node's operand
//! count, since rules that each drop one operand of an n-ary node may
//! legitimately fire once per operand. A rule table that makes the rewriter cycle is a
//! logic error, so hitting a cap panics instead of returning a half-rewritten
//! tree.

use super::rules::RuleSet;
use crate::codetree::{CodeTree, NodeId};
use crate::core::traits::{Rewritable, Scalar};
use rustc_hash::FxHashMap;

/// Default cap on passes over the tree in one run.
pub const DEFAULT_MAX_PASSES: usize = 10_000;
/// Default cap on consecutive rewrites of a single node within one pass, on
/// top of the node's operand count.
pub const DEFAULT_MAX_NODE_REWRITES: usize = 256;

/// Work done by one [`Optimizer::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewriteStats {
    /// Passes over the tree, summed over all rule sets and rounds
    pub passes: usize,
    /// Rounds through the whole battery of rule sets
    pub rounds: usize,
    /// Rules applied
    pub rewrites: usize,
}

/// Applies a grammar to an expression tree until nothing changes.
#[derive(Debug, Clone)]
pub struct Optimizer {
    max_passes: usize,
    max_node_rewrites: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Optimizer with the default caps.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            max_node_rewrites: DEFAULT_MAX_NODE_REWRITES,
        }
    }

    /// Cap on passes over the tree (default: 10 000).
    #[must_use]
    pub const fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Cap on consecutive rewrites of one node in a pass, added to the
    /// node's operand count (default: 256).
    #[must_use]
    pub const fn with_max_node_rewrites(mut self, max_node_rewrites: usize) -> Self {
        self.max_node_rewrites = max_node_rewrites;
        self
    }

    /// Configured pass cap.
    #[must_use]
    pub const fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Run the grammar of `T` on `tree`.
    pub fn optimize_tree<T: Rewritable>(&self, tree: &mut CodeTree<T>) -> RewriteStats {
        self.run(tree, T::rule_sets())
    }

    /// Run `sets` in order on `tree` until a full round changes nothing.
    ///
    /// # Panics
    ///
    /// Panics if the pass cap or the per-node rewrite cap is exceeded, which
    /// means the rule sets do not terminate on this tree.
    pub fn run<T: Scalar>(&self, tree: &mut CodeTree<T>, sets: &[&RuleSet]) -> RewriteStats {
        let mut stats = RewriteStats::default();
        if sets.is_empty() || tree.root().is_none() {
            return stats;
        }

        loop {
            stats.rounds += 1;
            let mut round_changed = false;
            for set in sets {
                loop {
                    stats.passes += 1;
                    if stats.passes > self.max_passes {
                        tracing::error!(
                            max_passes = self.max_passes,
                            set = set.name,
                            "rewriting did not reach a fixpoint"
                        );
                        panic!(
                            "rule set '{}' exceeded {} passes without reaching a fixpoint",
                            set.name, self.max_passes
                        );
                    }
                    let rewrites = Pass::new(tree, set, self.max_node_rewrites).run();
                    tree.collect_garbage();
                    if rewrites == 0 {
                        break;
                    }
                    stats.rewrites += rewrites;
                    round_changed = true;
                }
            }
            if !round_changed {
                break;
            }
        }

        tracing::debug!(
            passes = stats.passes,
            rounds = stats.rounds,
            rewrites = stats.rewrites,
            nodes = tree.len(),
            "grammar applied"
        );
        stats
    }
}

/// One bottom-up traversal with a single rule set.
struct Pass<'a, T> {
    tree: &'a mut CodeTree<T>,
    set: &'a RuleSet,
    max_node_rewrites: usize,
    /// Original node -> (rewritten node, changed). Shared subtrees are
    /// rewritten once per pass.
    memo: FxHashMap<NodeId, (NodeId, bool)>,
    rewrites: usize,
}

impl<'a, T: Scalar> Pass<'a, T> {
    fn new(tree: &'a mut CodeTree<T>, set: &'a RuleSet, max_node_rewrites: usize) -> Self {
        Self {
            tree,
            set,
            max_node_rewrites,
            memo: FxHashMap::default(),
            rewrites: 0,
        }
    }

    /// Returns the number of rules applied.
    fn run(mut self) -> usize {
        let Some(root) = self.tree.root() else {
            return 0;
        };
        let (new_root, _) = self.visit(root);
        if new_root != root {
            self.tree.set_root(new_root);
        }
        self.rewrites
    }

    fn visit(&mut self, id: NodeId) -> (NodeId, bool) {
        if let Some(&done) = self.memo.get(&id) {
            return done;
        }

        let children = self.tree.children(id).to_vec();
        let mut rewritten = Vec::with_capacity(children.len());
        let mut changed = false;
        for child in children {
            let (new_child, child_changed) = self.visit(child);
            changed |= child_changed;
            rewritten.push(new_child);
        }
        let mut current = if changed {
            self.tree.set_children(id, rewritten)
        } else {
            id
        };

        let budget = self.max_node_rewrites + self.tree.children(current).len();
        let mut local = 0;
        while let Some(replacement) = self.apply_first(current) {
            local += 1;
            if local > budget {
                tracing::error!(
                    set = self.set.name,
                    node = %self.tree.display(current),
                    "node keeps being rewritten"
                );
                panic!(
                    "rule set '{}' rewrote one node more than {budget} times",
                    self.set.name
                );
            }
            current = replacement;
            changed = true;
        }

        self.memo.insert(id, (current, changed));
        (current, changed)
    }

    fn apply_first(&mut self, id: NodeId) -> Option<NodeId> {
        for rule in self.set.rules {
            if let Some(replacement) = rule.apply(self.tree, id) {
                tracing::trace!(
                    set = self.set.name,
                    rule = rule.name,
                    before = %self.tree.display(id),
                    after = %self.tree.display(replacement),
                    "rewrite"
                );
                self.rewrites += 1;
                return Some(replacement);
            }
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::opcode::Func;
    use crate::simplification::patterns::{Guard, Pattern, Template};
    use crate::simplification::rules::Rule;

    fn optimized(tree: &mut CodeTree<f64>) -> String {
        Optimizer::new().optimize_tree(tree);
        tree.display(tree.root().unwrap()).to_string()
    }

    #[test]
    fn test_folds_nested_constants() {
        // mul(add(2, 3), x) -> mul(5, x)
        let mut tree = CodeTree::<f64>::new();
        let two = tree.constant(2.0);
        let three = tree.constant(3.0);
        let x = tree.var(0);
        let sum = tree.func(Func::Add, vec![two, three]);
        let product = tree.func(Func::Mul, vec![sum, x]);
        tree.set_root(product);
        assert_eq!(optimized(&mut tree), "mul(5, x0)");
    }

    #[test]
    fn test_removes_additive_identity() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let zero = tree.constant(0.0);
        let sum = tree.func(Func::Add, vec![x, zero]);
        tree.set_root(sum);
        assert_eq!(optimized(&mut tree), "x0");
    }

    #[test]
    fn test_rewrites_shared_subtree_once() {
        // sin(x + 0) * cos(x + 0): both operands share the sum
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let zero = tree.constant(0.0);
        let sum = tree.func(Func::Add, vec![x, zero]);
        let sin = tree.func(Func::Sin, vec![sum]);
        let cos = tree.func(Func::Cos, vec![sum]);
        let product = tree.func(Func::Mul, vec![sin, cos]);
        tree.set_root(product);
        let stats = Optimizer::new().optimize_tree(&mut tree);
        assert_eq!(stats.rewrites, 1);
        assert_eq!(
            tree.display(tree.root().unwrap()).to_string(),
            "mul(sin(x0), cos(x0))"
        );
    }

    #[test]
    fn test_quiet_round_terminates() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let sum = tree.func(Func::Add, vec![x, y]);
        tree.set_root(sum);
        let stats = Optimizer::new().optimize_tree(&mut tree);
        assert_eq!(stats.rewrites, 0);
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.passes, FLOAT_SET_COUNT);
    }

    const FLOAT_SET_COUNT: usize = 3;

    static FLIP_FLOP: RuleSet = RuleSet {
        name: "flip_flop",
        rules: &[
            Rule {
                name: "sin_to_cos",
                pattern: Pattern::Node {
                    func: Func::Sin,
                    params: &[Pattern::Any(0)],
                    rest: None,
                },
                replacement: Template::Node(Func::Cos, &[Template::Hole(0)]),
            },
            Rule {
                name: "cos_to_sin",
                pattern: Pattern::Node {
                    func: Func::Cos,
                    params: &[Pattern::Any(0)],
                    rest: None,
                },
                replacement: Template::Node(Func::Sin, &[Template::Hole(0)]),
            },
        ],
    };

    #[test]
    #[should_panic(expected = "more than 9 times")]
    fn test_cycling_rules_hit_node_cap() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let sin = tree.func(Func::Sin, vec![x]);
        tree.set_root(sin);
        Optimizer::new()
            .with_max_node_rewrites(8)
            .run(&mut tree, &[&FLIP_FLOP]);
    }

    // x + 1 + 2 + ... + 300 in one flat sum
    fn wide_sum(constants: usize) -> CodeTree<i64> {
        let mut tree = CodeTree::<i64>::new();
        let mut operands = vec![tree.var(0)];
        for c in 1..=constants {
            operands.push(tree.constant(i64::try_from(c).unwrap()));
        }
        let sum = tree.func(Func::Add, operands);
        tree.set_root(sum);
        tree
    }

    #[test]
    fn test_wide_sum_folds_in_one_rewrite() {
        let mut tree = wide_sum(300);
        let stats = Optimizer::new().optimize_tree(&mut tree);
        assert_eq!(stats.rewrites, 1);
        assert_eq!(tree.display(tree.root().unwrap()).to_string(), "add(45150, x0)");
    }

    static PAIRWISE_ONLY: RuleSet = RuleSet {
        name: "pairwise",
        rules: &[Rule {
            name: "merge_two",
            pattern: Pattern::Node {
                func: Func::Add,
                params: &[
                    Pattern::Const(0, Guard::Any),
                    Pattern::Const(1, Guard::Any),
                ],
                rest: Some(2),
            },
            replacement: Template::Node(
                Func::Add,
                &[
                    Template::Compute(Func::Add, &[Template::Hole(0), Template::Hole(1)]),
                    Template::Rest(2),
                ],
            ),
        }],
    };

    #[test]
    fn test_node_cap_scales_with_operand_count() {
        // one merge per operand is more than the base cap allows
        let mut tree = wide_sum(300);
        let stats = Optimizer::new().run(&mut tree, &[&PAIRWISE_ONLY]);
        assert_eq!(stats.rewrites, 299);
        assert_eq!(tree.display(tree.root().unwrap()).to_string(), "add(45150, x0)");
    }

    #[test]
    fn test_empty_grammar_is_a_no_op() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let zero = tree.constant(0.0);
        let sum = tree.func(Func::Add, vec![x, zero]);
        tree.set_root(sum);
        let stats = Optimizer::new().run(&mut tree, &[]);
        assert_eq!(stats, RewriteStats::default());
        assert_eq!(tree.root(), Some(sum));
    }
}
