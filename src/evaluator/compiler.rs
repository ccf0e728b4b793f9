//! Bytecode synthesis from an expression tree.
//!
//! A single post-order walk emits each node after its operands. While
//! emitting, the synthesizer:
//! - deduplicates constants against the immediate pool by bit pattern
//! - tracks the stack depth of the generated code and records its peak
//!
//! N-ary nodes become chains of binary opcodes. Sums emit their plain operands
//! first and then subtract the negated ones, so `add(a, neg(b))` comes out as
//! `a b sub`.

use crate::codetree::{CodeTree, NodeId, Op};
use crate::core::opcode::{Func, Opcode};
use crate::core::program::Program;
use crate::core::traits::Scalar;
use rustc_hash::FxHashMap;

/// Emits bytecode for one tree.
pub(crate) struct Synthesizer<'t, T> {
    tree: &'t CodeTree<T>,
    /// Emitted opcodes
    code: Vec<Opcode>,
    /// Constant pool
    immed: Vec<T>,
    /// `key_bits` -> pool slots with that key
    immed_index: FxHashMap<u64, Vec<u32>>,
    /// Stack depth after the last emitted opcode
    current_stack: usize,
    /// Peak stack depth so far
    max_stack: usize,
}

impl<'t, T: Scalar> Synthesizer<'t, T> {
    pub(crate) fn new(tree: &'t CodeTree<T>) -> Self {
        Self {
            tree,
            code: Vec::new(),
            immed: Vec::new(),
            immed_index: FxHashMap::default(),
            current_stack: 0,
            max_stack: 0,
        }
    }

    /// Emit the subtree at `root` and return the program with its peak stack
    /// depth.
    pub(crate) fn synthesize(mut self, root: NodeId, var_count: u32) -> (Program<T>, usize) {
        self.emit_node(root);
        let program = Program::from_parts(self.code, self.immed, var_count);
        (program, self.max_stack)
    }

    /// Pool slot for `value`, reusing a bit-identical entry.
    pub(crate) fn add_const(&mut self, value: T) -> u32 {
        let slots = self.immed_index.entry(value.key_bits()).or_default();
        if let Some(&slot) = slots
            .iter()
            .find(|&&slot| self.immed[slot as usize].identical(value))
        {
            return slot;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Immediate pools are bounded by tree size, far below u32::MAX"
        )]
        let slot = self.immed.len() as u32;
        self.immed.push(value);
        slots.push(slot);
        slot
    }

    fn push(&mut self) {
        self.current_stack += 1;
        self.max_stack = self.max_stack.max(self.current_stack);
    }

    const fn pop(&mut self, count: usize) {
        self.current_stack = self.current_stack.saturating_sub(count);
    }

    fn emit_op(&mut self, func: Func) {
        self.code.push(Opcode::Func(func));
        self.pop(func.arity());
        self.push();
    }

    fn emit_node(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.op(id) {
            Op::Const => {
                let Some(value) = tree.value(id) else {
                    unreachable!("constant node without a value");
                };
                let slot = self.add_const(value);
                self.code.push(Opcode::Immed(slot));
                self.push();
            }
            Op::Var(index) => {
                self.code.push(Opcode::Var(index));
                self.push();
            }
            Op::Func(Func::Add) => self.emit_sum(tree.children(id)),
            Op::Func(func) if func.is_associative() => {
                let children = tree.children(id);
                if let Some((&first, rest)) = children.split_first() {
                    self.emit_node(first);
                    for &child in rest {
                        self.emit_node(child);
                        self.emit_op(func);
                    }
                }
            }
            Op::Func(func) => {
                for &child in tree.children(id) {
                    self.emit_node(child);
                }
                self.emit_op(func);
            }
        }
    }

    fn emit_sum(&mut self, children: &[NodeId]) {
        let tree = self.tree;
        let (negated, plain): (Vec<NodeId>, Vec<NodeId>) = children
            .iter()
            .partition(|&&child| tree.op(child) == Op::Func(Func::Neg));
        let subtrahends: Vec<NodeId> = negated
            .iter()
            .map(|&neg| tree.children(neg)[0])
            .collect();

        let rest = if let Some((&first, rest)) = plain.split_first() {
            self.emit_node(first);
            for &term in rest {
                self.emit_node(term);
                self.emit_op(Func::Add);
            }
            &subtrahends[..]
        } else if let Some((&first, rest)) = subtrahends.split_first() {
            self.emit_node(first);
            self.emit_op(Func::Neg);
            rest
        } else {
            &[]
        };
        for &term in rest {
            self.emit_node(term);
            self.emit_op(Func::Sub);
        }
    }
}

impl<T: Scalar> CodeTree<T> {
    /// Linearize the tree into a program over `var_count` variables.
    ///
    /// Returns the program and its peak stack depth.
    ///
    /// # Panics
    ///
    /// Panics if the tree has no root.
    #[must_use]
    pub fn to_program(&self, var_count: u32) -> (Program<T>, usize) {
        let Some(root) = self.root() else {
            panic!("cannot synthesize a tree without a root");
        };
        Synthesizer::new(self).synthesize(root, var_count)
    }
}
