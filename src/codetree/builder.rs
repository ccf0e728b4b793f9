//! Building a tree from a linear program.
//!
//! Opcodes are replayed against a stack of node handles. A few operators are
//! rewritten into the forms the rule tables expect:
//! - `sub(a, b)` becomes `add(a, neg(b))`
//! - `greater(a, b)` becomes `less(b, a)`
//! - `greater_eq(a, b)` becomes `less_eq(b, a)`
//!
//! Equal subtrees are hash-consed onto one node.

use super::{CodeTree, NodeId};
use crate::core::opcode::{Func, Opcode};
use crate::core::program::Program;
use crate::core::traits::Scalar;
use rustc_hash::FxHashMap;

impl<T: Scalar> CodeTree<T> {
    /// Build the tree of a validated program.
    ///
    /// # Panics
    ///
    /// Panics if the program is malformed: an operand underflow, an index out
    /// of range, or a final stack holding other than one value. Programs that
    /// passed [`Program::validate`] never panic.
    #[must_use]
    pub fn from_program(program: &Program<T>) -> Self {
        let mut tree = Self::new();
        let mut interned: FxHashMap<u64, Vec<NodeId>> = FxHashMap::default();
        let mut stack: Vec<NodeId> = Vec::with_capacity(program.code.len());

        for (at, &op) in program.code.iter().enumerate() {
            let node = match op {
                Opcode::Immed(index) => {
                    let Some(&value) = program.immed.get(index as usize) else {
                        panic!("malformed program: immediate {index} at opcode {at} is out of range");
                    };
                    tree.constant(value)
                }
                Opcode::Var(index) => tree.var(index),
                Opcode::Func(func) => {
                    let arity = func.arity();
                    assert!(
                        stack.len() >= arity,
                        "malformed program: '{func}' at opcode {at} needs {arity} operands, stack holds {}",
                        stack.len()
                    );
                    let operands = stack.split_off(stack.len() - arity);
                    tree.operation(func, operands)
                }
            };
            stack.push(tree.intern(&mut interned, node));
        }

        let [root] = stack[..] else {
            panic!(
                "malformed program: finished with {} values on the stack",
                stack.len()
            );
        };
        tree.set_root(root);
        tree.collect_garbage();
        tree
    }

    fn operation(&mut self, func: Func, operands: Vec<NodeId>) -> NodeId {
        match func {
            Func::Sub => {
                let negated = self.func(Func::Neg, vec![operands[1]]);
                self.func(Func::Add, vec![operands[0], negated])
            }
            Func::Greater => self.func(Func::Less, vec![operands[1], operands[0]]),
            Func::GreaterOrEq => self.func(Func::LessOrEq, vec![operands[1], operands[0]]),
            _ => self.func(func, operands),
        }
    }

    fn intern(&self, interned: &mut FxHashMap<u64, Vec<NodeId>>, id: NodeId) -> NodeId {
        let bucket = interned.entry(self.nodes[id].hash).or_default();
        if let Some(&existing) = bucket.iter().find(|&&other| self.equal(other, id)) {
            existing
        } else {
            bucket.push(id);
            id
        }
    }
}
