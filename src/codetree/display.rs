//! Prefix rendering of subtrees, used in logs and tests.
//!
//! `(2 + 3) * x0` prints as `mul(add(2, 3), x0)`.

use super::{CodeTree, NodeId, Op};
use crate::core::traits::Scalar;
use std::fmt;

/// Displays one subtree of a [`CodeTree`].
pub struct DisplayNode<'a, T> {
    tree: &'a CodeTree<T>,
    id: NodeId,
}

impl<T: Scalar> CodeTree<T> {
    /// Render the subtree at `id`.
    #[must_use]
    pub const fn display(&self, id: NodeId) -> DisplayNode<'_, T> {
        DisplayNode { tree: self, id }
    }
}

impl<T: Scalar> fmt::Display for DisplayNode<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.tree.node(self.id);
        match node.op {
            Op::Const => match node.value {
                Some(value) => write!(f, "{value}"),
                None => f.write_str("?"),
            },
            Op::Var(index) => write!(f, "x{index}"),
            Op::Func(func) => {
                write!(f, "{func}(")?;
                for (i, &child) in node.children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.tree.display(child))?;
                }
                f.write_str(")")
            }
        }
    }
}
