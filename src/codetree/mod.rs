//! Expression tree arena.
//!
//! Nodes live in a [`SlotMap`] and refer to each other through [`NodeId`]
//! handles. Structurally equal subtrees may share one node. Each node counts
//! its referrers, and [`CodeTree::make_mut`] clones a node with more than one
//! referrer before it is modified, so an edit through one parent is never seen
//! through another.
//!
//! Operator nodes are kept canonical as they are built:
//! - associative operands are flattened into one n-ary node
//! - commutative operands are sorted by [`CodeTree::compare`]
//! - n-ary nodes with one operand collapse to that operand
//!
//! Nodes that become unreachable are reclaimed by
//! [`CodeTree::collect_garbage`].

mod builder;
mod display;
mod ordering;

pub use display::DisplayNode;

use crate::core::opcode::Func;
use crate::core::traits::Scalar;
use rustc_hash::{FxHashSet, FxHasher};
use slotmap::SlotMap;
use std::hash::{Hash, Hasher};

slotmap::new_key_type! {
    /// Handle to a node in a [`CodeTree`].
    pub struct NodeId;
}

/// Operation tag of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Immediate constant; the value is stored on the node
    Const,
    /// Variable reference
    Var(u32),
    /// Operator applied to the node's children
    Func(Func),
}

/// One arena slot.
#[derive(Debug, Clone)]
pub struct Node<T> {
    op: Op,
    children: Vec<NodeId>,
    value: Option<T>,
    hash: u64,
    size: u32,
    refs: u32,
}

impl<T: Copy> Node<T> {
    /// Operation tag.
    #[must_use]
    pub const fn op(&self) -> Op {
        self.op
    }

    /// Operand handles, in canonical order for commutative operators.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Value of a constant node.
    #[must_use]
    pub const fn value(&self) -> Option<T> {
        self.value
    }

    /// Structural hash; equal subtrees hash equally.
    #[must_use]
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    /// Number of nodes in the subtree, counting shared nodes once per use.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }
}

/// Arena-backed expression tree.
#[derive(Debug, Clone)]
pub struct CodeTree<T> {
    nodes: SlotMap<NodeId, Node<T>>,
    root: Option<NodeId>,
}

impl<T: Scalar> Default for CodeTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> CodeTree<T> {
    /// Empty arena without a root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
        }
    }

    /// Root of the expression, once set.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Make `id` the root, releasing the previous root.
    pub fn set_root(&mut self, id: NodeId) {
        self.nodes[id].refs += 1;
        if let Some(old) = self.root.replace(id) {
            self.release(old);
        }
    }

    /// Number of allocated nodes, including unreclaimed garbage.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// No nodes allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Access a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was reclaimed.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id]
    }

    /// Operation tag of `id`.
    #[must_use]
    pub fn op(&self, id: NodeId) -> Op {
        self.nodes[id].op
    }

    /// Operands of `id`.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Value of `id` if it is a constant.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<T> {
        self.nodes[id].value
    }

    /// Number of parents (and root handles) referring to `id`.
    #[must_use]
    pub fn refs(&self, id: NodeId) -> u32 {
        self.nodes[id].refs
    }

    /// Allocate a constant.
    pub fn constant(&mut self, value: T) -> NodeId {
        self.alloc(Op::Const, Vec::new(), Some(value))
    }

    /// Allocate a variable reference.
    pub fn var(&mut self, index: u32) -> NodeId {
        self.alloc(Op::Var(index), Vec::new(), None)
    }

    /// Build an operator node in canonical form.
    ///
    /// The result may be an existing node: an n-ary operator with a single
    /// operand is that operand, and one with no operands is its identity
    /// constant. `And`/`Or` of one operand become `not(not(x))` so the
    /// result stays a truth value.
    pub fn func(&mut self, func: Func, children: Vec<NodeId>) -> NodeId {
        let children = self.canonical_children(func, children);
        if func.is_associative() {
            match *children.as_slice() {
                [] => return self.constant(identity(func)),
                [only] if matches!(func, Func::And | Func::Or) => {
                    let inner = self.alloc(Op::Func(Func::Not), vec![only], None);
                    return self.alloc(Op::Func(Func::Not), vec![inner], None);
                }
                [only] => return only,
                _ => {}
            }
        }
        self.alloc(Op::Func(func), children, None)
    }

    /// Return a node that may be modified without affecting other referrers.
    ///
    /// A node with at most one referrer is returned as is. A shared node is
    /// cloned into a fresh slot with no referrers; the caller links the clone
    /// in place of the original.
    pub fn make_mut(&mut self, id: NodeId) -> NodeId {
        if self.nodes[id].refs <= 1 {
            return id;
        }
        let mut copy = self.nodes[id].clone();
        copy.refs = 0;
        for &child in &copy.children {
            self.nodes[child].refs += 1;
        }
        self.nodes.insert(copy)
    }

    /// Replace the operands of `id`, copying it first if shared.
    ///
    /// Returns the handle of the modified node, which differs from `id` when a
    /// copy was made. The operands are re-canonicalized.
    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) -> NodeId {
        let id = self.make_mut(id);
        let children = match self.nodes[id].op {
            Op::Func(func) => self.canonical_children(func, children),
            Op::Const | Op::Var(_) => children,
        };
        for &child in &children {
            self.nodes[child].refs += 1;
        }
        let old = std::mem::replace(&mut self.nodes[id].children, children);
        for child in old {
            self.release(child);
        }
        let node = &self.nodes[id];
        let hash = self.structural_hash(node.op, &node.children, node.value);
        let size = self.subtree_size(&node.children);
        let node = &mut self.nodes[id];
        node.hash = hash;
        node.size = size;
        id
    }

    /// Structural equality: same operations, bit-identical constants and
    /// pairwise equal operands.
    #[must_use]
    pub fn equal(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let (x, y) = (&self.nodes[a], &self.nodes[b]);
        x.hash == y.hash
            && x.op == y.op
            && x.children.len() == y.children.len()
            && match (x.value, y.value) {
                (Some(p), Some(q)) => p.identical(q),
                (None, None) => true,
                _ => false,
            }
            && x
                .children
                .iter()
                .zip(&y.children)
                .all(|(&p, &q)| self.equal(p, q))
    }

    /// Whether evaluating the subtree at `id` can raise a runtime condition
    /// for some variable values.
    #[must_use]
    pub fn may_raise(&self, id: NodeId) -> bool {
        self.may_raise_in(id, &mut FxHashSet::default())
    }

    // A node already in `checked` was found safe, otherwise the walk would
    // have stopped there.
    fn may_raise_in(&self, id: NodeId, checked: &mut FxHashSet<NodeId>) -> bool {
        if !checked.insert(id) {
            return false;
        }
        let node = &self.nodes[id];
        let Op::Func(func) = node.op else {
            return false;
        };
        if node
            .children
            .iter()
            .any(|&child| self.may_raise_in(child, checked))
        {
            return true;
        }
        let operands: Vec<Option<T>> = node
            .children
            .iter()
            .map(|&child| self.nodes[child].value)
            .collect();
        T::may_raise(func, &operands)
    }

    /// Drop every node not reachable from the root and recount referrers.
    pub fn collect_garbage(&mut self) {
        let mut live = FxHashSet::default();
        let mut pending: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = pending.pop() {
            if live.insert(id) {
                pending.extend_from_slice(&self.nodes[id].children);
            }
        }
        self.nodes.retain(|id, _| live.contains(&id));

        for node in self.nodes.values_mut() {
            node.refs = 0;
        }
        let links: Vec<NodeId> = self
            .nodes
            .values()
            .flat_map(|node| node.children.iter().copied())
            .collect();
        for child in links {
            self.nodes[child].refs += 1;
        }
        if let Some(root) = self.root {
            self.nodes[root].refs += 1;
        }
    }

    fn alloc(&mut self, op: Op, children: Vec<NodeId>, value: Option<T>) -> NodeId {
        let hash = self.structural_hash(op, &children, value);
        let size = self.subtree_size(&children);
        for &child in &children {
            self.nodes[child].refs += 1;
        }
        self.nodes.insert(Node {
            op,
            children,
            value,
            hash,
            size,
            refs: 0,
        })
    }

    fn release(&mut self, id: NodeId) {
        let node = &mut self.nodes[id];
        node.refs = node.refs.saturating_sub(1);
    }

    fn canonical_children(&self, func: Func, children: Vec<NodeId>) -> Vec<NodeId> {
        let nested = |id: &NodeId| self.nodes[*id].op == Op::Func(func);
        let mut children = if func.is_associative() && children.iter().any(nested) {
            let mut flat = Vec::with_capacity(children.len() + 2);
            for child in children {
                if nested(&child) {
                    flat.extend_from_slice(&self.nodes[child].children);
                } else {
                    flat.push(child);
                }
            }
            flat
        } else {
            children
        };
        if func.is_commutative() {
            children.sort_by(|&a, &b| self.compare(a, b));
        }
        children
    }

    fn structural_hash(&self, op: Op, children: &[NodeId], value: Option<T>) -> u64 {
        let mut hasher = FxHasher::default();
        op.hash(&mut hasher);
        if let Some(value) = value {
            value.key_bits().hash(&mut hasher);
        }
        for &child in children {
            self.nodes[child].hash.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn subtree_size(&self, children: &[NodeId]) -> u32 {
        children
            .iter()
            .fold(1u32, |acc, &child| acc.saturating_add(self.nodes[child].size))
    }
}

/// Value of an n-ary operator applied to no operands.
fn identity<T: Scalar>(func: Func) -> T {
    match func {
        Func::Add | Func::Or => T::zero(),
        Func::Mul | Func::And => T::one(),
        // Rules only ever drop duplicate min/max operands, never the last one.
        _ => unreachable!("'{func}' has no identity element"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_commutative_operands_are_sorted() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let two = tree.constant(2.0);
        let a = tree.func(Func::Add, vec![y, x, two]);
        let b = tree.func(Func::Add, vec![two, x, y]);
        assert!(tree.equal(a, b));
        assert_eq!(tree.children(a), &[two, x, y]);
    }

    #[test]
    fn test_associative_operands_are_flattened() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let z = tree.var(2);
        let inner = tree.func(Func::Mul, vec![x, y]);
        let outer = tree.func(Func::Mul, vec![inner, z]);
        assert_eq!(tree.children(outer).len(), 3);
    }

    #[test]
    fn test_nary_collapse() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        assert_eq!(tree.func(Func::Add, vec![x]), x);

        let empty_sum = tree.func(Func::Add, vec![]);
        assert_eq!(tree.value(empty_sum), Some(0.0));
        let empty_product = tree.func(Func::Mul, vec![]);
        assert_eq!(tree.value(empty_product), Some(1.0));

        let truth = tree.func(Func::And, vec![x]);
        assert_eq!(tree.op(truth), Op::Func(Func::Not));
        let inner = tree.children(truth)[0];
        assert_eq!(tree.op(inner), Op::Func(Func::Not));
    }

    #[test]
    fn test_make_mut_copies_shared_node() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let shared = tree.func(Func::Mul, vec![x, y]);
        let left = tree.func(Func::Neg, vec![shared]);
        let right = tree.func(Func::Sin, vec![shared]);
        let root = tree.func(Func::Add, vec![left, right]);
        tree.set_root(root);
        assert_eq!(tree.refs(shared), 2);

        // Rewrite the product under `left` only.
        let three = tree.constant(3.0);
        let edited = tree.set_children(shared, vec![x, three]);
        assert_ne!(edited, shared);
        let left = tree.set_children(left, vec![edited]);

        assert_eq!(tree.children(right), &[shared]);
        assert_eq!(tree.children(shared), &[x, y]);
        assert_eq!(tree.children(left), &[edited]);
        assert_eq!(tree.children(edited), &[three, x]);
    }

    #[test]
    fn test_make_mut_keeps_unshared_node() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let neg = tree.func(Func::Neg, vec![x]);
        tree.set_root(neg);
        assert_eq!(tree.make_mut(neg), neg);
        let y = tree.var(1);
        assert_eq!(tree.set_children(neg, vec![y]), neg);
        assert_eq!(tree.children(neg), &[y]);
    }

    #[test]
    fn test_collect_garbage_drops_unreachable_nodes() {
        let mut tree = CodeTree::<f64>::new();
        let x = tree.var(0);
        let _orphan = tree.constant(7.0);
        let root = tree.func(Func::Neg, vec![x]);
        tree.set_root(root);
        assert_eq!(tree.len(), 3);
        tree.collect_garbage();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.refs(root), 1);
        assert_eq!(tree.refs(x), 1);
    }

    #[test]
    fn test_equal_distinguishes_signed_zero() {
        let mut tree = CodeTree::<f64>::new();
        let pos = tree.constant(0.0);
        let neg = tree.constant(-0.0);
        let again = tree.constant(0.0);
        assert!(!tree.equal(pos, neg));
        assert!(tree.equal(pos, again));
    }

    #[test]
    fn test_may_raise_follows_divisors() {
        let mut tree = CodeTree::<i64>::new();
        let x = tree.var(0);
        let y = tree.var(1);
        let two = tree.constant(2);
        let zero = tree.constant(0);
        let by_var = tree.func(Func::Div, vec![x, y]);
        let by_two = tree.func(Func::Div, vec![x, two]);
        let by_zero = tree.func(Func::Mod, vec![x, zero]);
        let nested = tree.func(Func::Add, vec![x, by_var]);
        assert!(tree.may_raise(by_var));
        assert!(!tree.may_raise(by_two));
        assert!(tree.may_raise(by_zero));
        assert!(tree.may_raise(nested));
        assert!(!tree.may_raise(x));

        let mut floats = CodeTree::<f64>::new();
        let x = floats.var(0);
        let y = floats.var(1);
        let quotient = floats.func(Func::Div, vec![x, y]);
        assert!(!floats.may_raise(quotient));
    }
}
