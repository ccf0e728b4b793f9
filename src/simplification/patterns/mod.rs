//! Rule patterns, replacement templates and the matcher that interprets them.
//!
//! Every rewrite rule is plain data: a [`Pattern`] with numbered holes and a
//! [`Template`] that rebuilds the replacement from what the holes bound. A
//! single backtracking matcher handles all rules. Operands of commutative
//! operators are tried in every order, and `rest` captures the operands of an
//! n-ary node that no parameter claimed.

use crate::codetree::{CodeTree, NodeId, Op};
use crate::core::opcode::Func;
use crate::core::traits::Scalar;

/// Index of a pattern hole.
pub type Hole = u8;

/// Predicate on the value of a constant hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Any constant
    Any,
    /// Whole number
    Integer,
    /// Strictly below zero
    Negative,
    /// Strictly above zero
    Positive,
    /// Not zero
    NonZero,
    /// Truthy under the scalar's truth test
    Truthy,
    /// Not truthy
    Falsy,
    /// Whole number in `0..=MAX_MERGED_EXPONENT`
    SmallExponent,
}

/// Largest exponent a power rule merges.
///
/// The sum or product of two such exponents is below `2^24`, which every
/// scalar type represents exactly, `f32` included.
pub const MAX_MERGED_EXPONENT: i64 = 1 << 12;

impl Guard {
    /// Whether `value` satisfies the guard.
    #[must_use]
    pub fn holds<T: Scalar>(self, value: T) -> bool {
        match self {
            Self::Any => true,
            Self::Integer => value.is_integer(),
            Self::Negative => value < T::zero(),
            Self::Positive => value > T::zero(),
            Self::NonZero => value != T::zero(),
            Self::Truthy => value.is_truthy(),
            Self::Falsy => !value.is_truthy(),
            Self::SmallExponent => {
                value.is_integer()
                    && value >= T::zero()
                    && value <= T::from_int(MAX_MERGED_EXPONENT)
            }
        }
    }
}

/// Shape a subtree must have.
#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// Binds any subtree.
    Any(Hole),
    /// Binds any subtree that is not a constant.
    Term(Hole),
    /// Binds a constant that satisfies the guard.
    Const(Hole, Guard),
    /// A constant equal to this integer.
    Lit(i8),
    /// A subtree structurally equal to an earlier binding.
    Same(Hole),
    /// An operator node.
    ///
    /// For commutative operators the parameters match operands in any order.
    /// Without `rest` the operand count must equal the parameter count; with
    /// it, the unclaimed operands are bound to that hole.
    Node {
        /// Operator to match
        func: Func,
        /// Operand patterns
        params: &'static [Pattern],
        /// Hole receiving the unclaimed operands
        rest: Option<Hole>,
    },
    /// Any operator node whose operands are all constants.
    AllConst,
    /// Matches like the inner pattern, but only where evaluating the subtree
    /// can never raise a runtime condition. Rules that drop a subtree wrap it
    /// in this.
    Safe(&'static Pattern),
}

/// Recipe for a replacement subtree.
#[derive(Debug, Clone, Copy)]
pub enum Template {
    /// The subtree bound to a hole.
    Hole(Hole),
    /// The operands bound to a `rest` hole, spliced into the enclosing node.
    Rest(Hole),
    /// An integer constant.
    Lit(i8),
    /// A constant computed from constant templates with the scalar's own
    /// arithmetic.
    Compute(Func, &'static [Template]),
    /// An operator node, built in canonical form.
    Node(Func, &'static [Template]),
    /// The value of the matched all-constant node.
    Fold,
    /// The constant operands of the matched n-ary node, folded with its
    /// operator.
    FoldConsts,
    /// The non-constant operands of the matched node, spliced into the
    /// enclosing node.
    Terms,
}

#[derive(Debug, Clone)]
enum Bound {
    Node(NodeId),
    Rest(Vec<NodeId>),
}

/// Hole assignments of one match.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    slots: Vec<(Hole, Bound)>,
}

impl Bindings {
    /// Subtree bound to `hole`.
    #[must_use]
    pub fn node(&self, hole: Hole) -> Option<NodeId> {
        self.slots.iter().rev().find_map(|(h, bound)| match bound {
            Bound::Node(id) if *h == hole => Some(*id),
            _ => None,
        })
    }

    /// Operands bound to the `rest` hole `hole`.
    #[must_use]
    pub fn rest(&self, hole: Hole) -> Option<&[NodeId]> {
        self.slots.iter().rev().find_map(|(h, bound)| match bound {
            Bound::Rest(ids) if *h == hole => Some(ids.as_slice()),
            _ => None,
        })
    }

    fn mark(&self) -> usize {
        self.slots.len()
    }

    fn reset(&mut self, mark: usize) {
        self.slots.truncate(mark);
    }
}

type Continuation<'k> = dyn FnMut(&mut Bindings) -> bool + 'k;

/// Backtracking pattern matcher over one tree.
pub(crate) struct Matcher<'t, T> {
    tree: &'t CodeTree<T>,
}

impl<'t, T: Scalar> Matcher<'t, T> {
    pub(crate) const fn new(tree: &'t CodeTree<T>) -> Self {
        Self { tree }
    }

    /// Find the first binding of `pattern` at `id` accepted by `accept`.
    pub(crate) fn first_match(
        &self,
        pattern: &Pattern,
        id: NodeId,
        mut accept: impl FnMut(&Bindings) -> bool,
    ) -> Option<Bindings> {
        let mut bindings = Bindings::default();
        let mut found = None;
        self.matches(pattern, id, &mut bindings, &mut |b: &mut Bindings| {
            if accept(b) {
                found = Some(b.clone());
                true
            } else {
                false
            }
        });
        found
    }

    /// Match `pattern` at `id`, then run the continuation on the extended
    /// bindings. Alternatives are explored until the continuation accepts.
    fn matches(
        &self,
        pattern: &Pattern,
        id: NodeId,
        b: &mut Bindings,
        k: &mut Continuation<'_>,
    ) -> bool {
        let mark = b.mark();
        let found = match *pattern {
            Pattern::Any(hole) => {
                b.slots.push((hole, Bound::Node(id)));
                k(b)
            }
            Pattern::Term(hole) => {
                if self.tree.op(id) == Op::Const {
                    false
                } else {
                    b.slots.push((hole, Bound::Node(id)));
                    k(b)
                }
            }
            Pattern::Const(hole, guard) => match self.tree.value(id) {
                Some(value) if guard.holds(value) => {
                    b.slots.push((hole, Bound::Node(id)));
                    k(b)
                }
                _ => false,
            },
            Pattern::Lit(n) => {
                self.tree
                    .value(id)
                    .is_some_and(|value| value == T::from_int(n.into()))
                    && k(b)
            }
            Pattern::Same(hole) => {
                b.node(hole)
                    .is_some_and(|bound| self.tree.equal(bound, id))
                    && k(b)
            }
            Pattern::Safe(inner) => !self.tree.may_raise(id) && self.matches(inner, id, b, k),
            Pattern::AllConst => {
                let node = self.tree.node(id);
                matches!(node.op(), Op::Func(_))
                    && !node.children().is_empty()
                    && node
                        .children()
                        .iter()
                        .all(|&child| self.tree.op(child) == Op::Const)
                    && k(b)
            }
            Pattern::Node { func, params, rest } => {
                if self.tree.op(id) == Op::Func(func) {
                    let children = self.tree.children(id);
                    let count_ok = match rest {
                        Some(_) => children.len() >= params.len(),
                        None => children.len() == params.len(),
                    };
                    if !count_ok {
                        false
                    } else if func.is_commutative() {
                        let mut used = vec![false; children.len()];
                        self.match_unordered(children, params, &mut used, rest, b, k)
                    } else {
                        self.match_ordered(children, params, b, k)
                    }
                } else {
                    false
                }
            }
        };
        if !found {
            b.reset(mark);
        }
        found
    }

    fn match_ordered(
        &self,
        children: &[NodeId],
        params: &[Pattern],
        b: &mut Bindings,
        k: &mut Continuation<'_>,
    ) -> bool {
        match (children.split_first(), params.split_first()) {
            (Some((&child, children)), Some((param, params))) => {
                self.matches(param, child, b, &mut |b: &mut Bindings| {
                    self.match_ordered(children, params, b, k)
                })
            }
            _ => k(b),
        }
    }

    fn match_unordered(
        &self,
        children: &[NodeId],
        params: &[Pattern],
        used: &mut [bool],
        rest: Option<Hole>,
        b: &mut Bindings,
        k: &mut Continuation<'_>,
    ) -> bool {
        let Some((param, params)) = params.split_first() else {
            let leftover: Vec<NodeId> = children
                .iter()
                .zip(used.iter())
                .filter(|&(_, &taken)| !taken)
                .map(|(&child, _)| child)
                .collect();
            return match rest {
                Some(hole) => {
                    let mark = b.mark();
                    b.slots.push((hole, Bound::Rest(leftover)));
                    let found = k(b);
                    if !found {
                        b.reset(mark);
                    }
                    found
                }
                None => leftover.is_empty() && k(b),
            };
        };
        for i in 0..children.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            let found = self.matches(param, children[i], b, &mut |b: &mut Bindings| {
                self.match_unordered(children, params, used, rest, b, k)
            });
            used[i] = false;
            if found {
                return true;
            }
        }
        false
    }
}

/// Constant value a template denotes, if it denotes one.
///
/// Computations that raise a runtime condition or produce a non-finite value
/// yield `None`, which makes the rule inapplicable.
pub(crate) fn constant_value<T: Scalar>(
    tree: &CodeTree<T>,
    template: &Template,
    b: &Bindings,
    matched: NodeId,
) -> Option<T> {
    match *template {
        Template::Hole(hole) => b.node(hole).and_then(|id| tree.value(id)),
        Template::Lit(n) => Some(T::from_int(n.into())),
        Template::Compute(func, args) => {
            let values = args
                .iter()
                .map(|arg| constant_value(tree, arg, b, matched))
                .collect::<Option<Vec<T>>>()?;
            T::apply(func, &values).filter(|value| value.is_finite())
        }
        Template::Fold => fold(tree, matched),
        Template::FoldConsts => fold_constant_operands(tree, matched),
        Template::Rest(_) | Template::Terms | Template::Node(..) => None,
    }
}

/// Evaluate an operator node whose operands are all constants.
fn fold<T: Scalar>(tree: &CodeTree<T>, id: NodeId) -> Option<T> {
    let node = tree.node(id);
    let Op::Func(func) = node.op() else {
        return None;
    };
    let values = node
        .children()
        .iter()
        .map(|&child| tree.value(child))
        .collect::<Option<Vec<T>>>()?;
    fold_values(func, &values)
}

/// Fold only the constant operands of an associative node.
fn fold_constant_operands<T: Scalar>(tree: &CodeTree<T>, id: NodeId) -> Option<T> {
    let node = tree.node(id);
    let Op::Func(func) = node.op() else {
        return None;
    };
    if !func.is_associative() {
        return None;
    }
    let values: Vec<T> = node
        .children()
        .iter()
        .filter_map(|&child| tree.value(child))
        .collect();
    if values.len() < 2 {
        return None;
    }
    fold_values(func, &values)
}

fn fold_values<T: Scalar>(func: Func, values: &[T]) -> Option<T> {
    let value = if func.is_associative() {
        let (&first, rest) = values.split_first()?;
        rest.iter()
            .try_fold(first, |acc, &value| T::apply(func, &[acc, value]))?
    } else {
        T::apply(func, values)?
    };
    value.is_finite().then_some(value)
}

/// Whether [`instantiate`] would succeed without allocating anything.
pub(crate) fn can_instantiate<T: Scalar>(
    tree: &CodeTree<T>,
    template: &Template,
    b: &Bindings,
    matched: NodeId,
) -> bool {
    match *template {
        Template::Hole(hole) => b.node(hole).is_some(),
        Template::Rest(hole) => b.rest(hole).is_some(),
        Template::Lit(_) | Template::Terms => true,
        Template::Compute(..) | Template::Fold | Template::FoldConsts => {
            constant_value(tree, template, b, matched).is_some()
        }
        Template::Node(_, children) => children
            .iter()
            .all(|child| can_instantiate(tree, child, b, matched)),
    }
}

/// Build the replacement described by `template`.
pub(crate) fn instantiate<T: Scalar>(
    tree: &mut CodeTree<T>,
    template: &Template,
    b: &Bindings,
    matched: NodeId,
) -> Option<NodeId> {
    match *template {
        Template::Hole(hole) => b.node(hole),
        Template::Rest(_) | Template::Terms => None,
        Template::Lit(n) => Some(tree.constant(T::from_int(n.into()))),
        Template::Compute(..) | Template::Fold | Template::FoldConsts => {
            let value = constant_value(tree, template, b, matched)?;
            Some(tree.constant(value))
        }
        Template::Node(func, children) => {
            let mut operands = Vec::with_capacity(children.len());
            for child in children {
                match *child {
                    Template::Rest(hole) => operands.extend_from_slice(b.rest(hole)?),
                    Template::Terms => operands.extend(
                        tree.children(matched)
                            .iter()
                            .copied()
                            .filter(|&child| tree.op(child) != Op::Const),
                    ),
                    _ => operands.push(instantiate(tree, child, b, matched)?),
                }
            }
            Some(tree.func(func, operands))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SUM_WITH_NEGATION: Pattern = Pattern::Node {
        func: Func::Add,
        params: &[
            Pattern::Any(0),
            Pattern::Node {
                func: Func::Neg,
                params: &[Pattern::Same(0)],
                rest: None,
            },
        ],
        rest: Some(1),
    };

    #[test]
    fn test_unordered_match_backtracks() {
        // x + y + neg(y): binding hole 0 to x fails, so the matcher has to
        // retry with y.
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let neg_y = tree.func(Func::Neg, vec![y]);
        let sum = tree.func(Func::Add, vec![neg_y, y, x]);
        assert_eq!(tree.children(sum)[0], x);

        let matcher = Matcher::new(&tree);
        let b = matcher
            .first_match(&SUM_WITH_NEGATION, sum, |_| true)
            .unwrap();
        assert_eq!(b.node(0), Some(y));
        assert_eq!(b.rest(1), Some(&[x][..]));
    }

    #[test]
    fn test_match_fails_without_partner() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let neg_y = tree.func(Func::Neg, vec![y]);
        let sum = tree.func(Func::Add, vec![x, neg_y]);
        let matcher = Matcher::new(&tree);
        assert!(matcher.first_match(&SUM_WITH_NEGATION, sum, |_| true).is_none());
    }

    #[test]
    fn test_accept_rejects_and_matcher_continues() {
        let mut tree = CodeTree::<f64>::new();
        let two = tree.constant(2.0);
        let three = tree.constant(3.0);
        let x = tree.var(0);
        let product = tree.func(Func::Mul, vec![x, three, two]);
        let pattern = Pattern::Node {
            func: Func::Mul,
            params: &[Pattern::Const(0, Guard::Any)],
            rest: Some(1),
        };
        let matcher = Matcher::new(&tree);
        let b = matcher
            .first_match(&pattern, product, |b| b.node(0) != Some(two))
            .unwrap();
        assert_eq!(b.node(0), Some(three));
        assert_eq!(b.rest(1).unwrap().len(), 2);
    }

    #[test]
    fn test_guard_filters_constants() {
        assert!(Guard::SmallExponent.holds(3.0_f64));
        assert!(!Guard::SmallExponent.holds(-3.0_f64));
        assert!(Guard::SmallExponent.holds(4096_i64));
        assert!(!Guard::SmallExponent.holds(4097_i64));
        assert!(!Guard::SmallExponent.holds(f64::from(1 << 30) + 1.0));
        assert!(!Guard::Integer.holds(2.5_f64));
        assert!(Guard::Truthy.holds(-1_i64));
        assert!(Guard::Falsy.holds(0.2_f64));
    }

    #[test]
    fn test_compute_rejects_non_finite() {
        let mut tree = CodeTree::<f64>::new();
        let zero = tree.constant(0.0);
        let one = tree.constant(1.0);
        let quotient = tree.func(Func::Div, vec![one, zero]);
        let b = Bindings::default();
        assert_eq!(constant_value(&tree, &Template::Fold, &b, quotient), None);

        let mut int_tree = CodeTree::<i64>::new();
        let zero = int_tree.constant(0);
        let seven = int_tree.constant(7);
        let quotient = int_tree.func(Func::Div, vec![seven, zero]);
        assert_eq!(constant_value(&int_tree, &Template::Fold, &b, quotient), None);
    }

    #[test]
    fn test_instantiate_splices_rest() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let z = tree.var(2);
        let sum = tree.func(Func::Add, vec![x, y, z]);
        let pattern = Pattern::Node {
            func: Func::Add,
            params: &[Pattern::Any(0)],
            rest: Some(1),
        };
        let b = Matcher::new(&tree).first_match(&pattern, sum, |_| true).unwrap();
        let template = Template::Node(Func::Mul, &[Template::Lit(2), Template::Rest(1)]);
        let built = instantiate(&mut tree, &template, &b, sum).unwrap();
        assert_eq!(tree.display(built).to_string(), "mul(2, x1, x2)");
    }

    #[test]
    fn test_fold_consts_keeps_terms() {
        // 2 * x * 3 * y * 4 -> 24 * x * y
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let operands = vec![
            tree.constant(2.0),
            x,
            tree.constant(3.0),
            y,
            tree.constant(4.0),
        ];
        let product = tree.func(Func::Mul, operands);
        let template = Template::Node(Func::Mul, &[Template::FoldConsts, Template::Terms]);
        let b = Bindings::default();
        assert!(can_instantiate(&tree, &template, &b, product));
        let built = instantiate(&mut tree, &template, &b, product).unwrap();
        assert_eq!(tree.display(built).to_string(), "mul(24, x0, x1)");
    }

    const MUL_BY_ZERO: Pattern = Pattern::Safe(&Pattern::Node {
        func: Func::Mul,
        params: &[Pattern::Lit(0)],
        rest: Some(0),
    });

    #[test]
    fn test_safe_skips_subtrees_that_can_raise() {
        let mut tree = CodeTree::<i64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let two = tree.constant(2);
        let zero = tree.constant(0);
        let by_var = tree.func(Func::Div, vec![x, y]);
        let by_two = tree.func(Func::Div, vec![x, two]);
        let risky = tree.func(Func::Mul, vec![by_var, zero]);
        let harmless = tree.func(Func::Mul, vec![by_two, zero]);
        let matcher = Matcher::new(&tree);
        assert!(matcher.first_match(&MUL_BY_ZERO, risky, |_| true).is_none());
        assert!(matcher.first_match(&MUL_BY_ZERO, harmless, |_| true).is_some());
    }
}
