//! Canonical term order.
//!
//! Constants sort first (by value), then variables (by index), then operator
//! nodes: smaller subtrees first, then by operator tag, operand count and
//! operands. The order is total on structure, so sorting the operands of a
//! commutative node gives one representative per equivalence class.

use super::{CodeTree, NodeId, Op};
use crate::core::traits::Scalar;
use std::cmp::Ordering;

const fn rank(op: Op) -> u8 {
    match op {
        Op::Const => 0,
        Op::Var(_) => 1,
        Op::Func(_) => 2,
    }
}

fn compare_values<T: Scalar>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a
            .partial_cmp(&b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key_bits().cmp(&b.key_bits())),
        _ => Ordering::Equal,
    }
}

impl<T: Scalar> CodeTree<T> {
    /// Compare two subtrees in canonical order.
    #[must_use]
    pub fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (x, y) = (&self.nodes[a], &self.nodes[b]);
        rank(x.op).cmp(&rank(y.op)).then_with(|| match (x.op, y.op) {
            (Op::Const, Op::Const) => compare_values(x.value, y.value),
            (Op::Var(i), Op::Var(j)) => i.cmp(&j),
            (Op::Func(f), Op::Func(g)) => x
                .size
                .cmp(&y.size)
                .then(f.cmp(&g))
                .then(x.children.len().cmp(&y.children.len()))
                .then_with(|| {
                    x.children
                        .iter()
                        .zip(&y.children)
                        .map(|(&p, &q)| self.compare(p, q))
                        .find(|ord| ord.is_ne())
                        .unwrap_or(Ordering::Equal)
                }),
            _ => Ordering::Equal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::opcode::Func;

    #[test]
    fn test_constants_then_variables_then_operators() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let c = tree.constant(10.0);
        let d = tree.constant(-3.0);
        let neg = tree.func(Func::Neg, vec![x]);

        assert_eq!(tree.compare(d, c), Ordering::Less);
        assert_eq!(tree.compare(c, x), Ordering::Less);
        assert_eq!(tree.compare(x, y), Ordering::Less);
        assert_eq!(tree.compare(y, neg), Ordering::Less);
        assert_eq!(tree.compare(neg, c), Ordering::Greater);
    }

    #[test]
    fn test_smaller_operator_nodes_first() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let small = tree.func(Func::Sin, vec![x]);
        let large = tree.func(Func::Mul, vec![x, y]);
        assert_eq!(tree.compare(small, large), Ordering::Less);
    }

    #[test]
    fn test_equal_structure_compares_equal() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let x_again = tree.var(0);
        let a = tree.func(Func::Cos, vec![x]);
        let b = tree.func(Func::Cos, vec![x_again]);
        assert_eq!(tree.compare(a, b), Ordering::Equal);
    }
}
