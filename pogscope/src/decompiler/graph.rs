//! The expression arena.
//!
//! Expression recovery builds one tree per statement out of [`OpNode`]s. Nodes live in a
//! per-function [`ExprArena`] and refer to each other by [`NodeId`]; structural rewrites
//! (else-jump marking, cast splicing) replace nodes in place and never free, so ids stay
//! valid for the lifetime of the function.

use rustc_hash::FxHashSet;

use crate::{
    assembly::{Opcode, Operation},
    package::UNKNOWN_TYPE,
};

/// Index of a node in an [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

const ELSE_JUMP_MARKER: &str = "else_jump";

/// One node of a recovered expression tree.
///
/// Children are stored in pop order: child 0 is the operand that was on top of the
/// stack, which for calls is the *last* source-order argument.
pub struct OpNode {
    /// The operation this node wraps.
    pub operation: Operation,
    /// Operand subtrees, in pop order.
    pub children: Vec<NodeId>,
    /// Inferred type, [`UNKNOWN_TYPE`] until inference fills it in.
    pub type_name: String,
    /// Override text; when set, rendering emits this instead of deriving text from
    /// the operation.
    pub code: Option<String>,
}

/// Arena of expression nodes for one function.
#[derive(Default)]
pub struct ExprArena {
    nodes: Vec<OpNode>,
}

impl ExprArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        ExprArena::default()
    }

    /// Allocate a node wrapping `operation`.
    pub fn alloc(&mut self, operation: Operation, code: Option<String>) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(OpNode {
            operation,
            children: Vec::new(),
            type_name: UNKNOWN_TYPE.to_string(),
            code,
        });
        id
    }

    /// Access a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &OpNode {
        &self.nodes[id.0 as usize]
    }

    /// Mutable access to a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut OpNode {
        &mut self.nodes[id.0 as usize]
    }

    /// All variable stack indices referenced in the subtree, deduplicated.
    #[must_use]
    pub fn referenced_variable_indices(&self, id: NodeId) -> FxHashSet<u32> {
        let mut result = FxHashSet::default();
        self.collect_variable_indices(id, &mut |index| {
            result.insert(index);
        });
        result
    }

    /// All variable stack indices in the subtree, in visit order with duplicates.
    #[must_use]
    pub fn variable_indices(&self, id: NodeId) -> Vec<u32> {
        let mut result = Vec::new();
        self.collect_variable_indices(id, &mut |index| result.push(index));
        result
    }

    fn collect_variable_indices(&self, id: NodeId, sink: &mut impl FnMut(u32)) {
        let node = self.node(id);
        if let Some(index) = node.operation.variable_index() {
            sink(index);
        }
        for &child in &node.children {
            self.collect_variable_indices(child, sink);
        }
    }

    /// The minimum and maximum operation offsets in the subtree.
    #[must_use]
    pub fn offset_range(&self, id: NodeId) -> (u32, u32) {
        let node = self.node(id);
        let mut min = node.operation.offset;
        let mut max = node.operation.offset;

        for &child in &node.children {
            let (child_min, child_max) = self.offset_range(child);
            min = min.min(child_min);
            max = max.max(child_max);
        }

        (min, max)
    }

    /// The argument subtree for source-order parameter `parameter_index` of a call node.
    ///
    /// Arguments are stored in reverse order, so parameter 0 is the last child.
    #[must_use]
    pub fn function_parameter_child(&self, id: NodeId, parameter_index: usize) -> Option<NodeId> {
        let node = self.node(id);
        if !node.operation.opcode.is_function_call() {
            return None;
        }
        let op_index = node.children.len().checked_sub(1 + parameter_index)?;
        node.children.get(op_index).copied()
    }

    /// Mark an unconditional jump as the jump over an else block, to be consumed by the
    /// if-block detector.
    pub fn flag_as_else_jump(&mut self, id: NodeId) {
        self.node_mut(id).code = Some(ELSE_JUMP_MARKER.to_string());
    }

    /// Whether [`ExprArena::flag_as_else_jump`] marked this node.
    #[must_use]
    pub fn is_else_jump(&self, id: NodeId) -> bool {
        self.node(id)
            .code
            .as_deref()
            .is_some_and(|code| code == ELSE_JUMP_MARKER)
    }

    /// Whether a statement rooted at `id` produces output.
    ///
    /// Two artifact shapes are suppressed: the string-local teardown
    /// `POP_STACK(UNKNOWN_3B(VARIABLE_READ))` and the default-init
    /// `POP_STACK(VARIABLE_WRITE(VARIABLE_INIT))`.
    #[must_use]
    pub fn should_render(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if node.operation.opcode != Opcode::PopStack {
            return true;
        }
        let Some(&child) = node.children.first() else {
            return true;
        };
        let child_node = self.node(child);
        let Some(&grandchild) = child_node.children.first() else {
            return true;
        };
        let grandchild_opcode = self.node(grandchild).operation.opcode;

        if child_node.operation.opcode == Opcode::Unknown3B
            && grandchild_opcode == Opcode::VariableRead
        {
            return false;
        }

        if child_node.operation.opcode == Opcode::VariableWrite
            && grandchild_opcode == Opcode::VariableInit
        {
            return false;
        }

        true
    }
}

/// A statement: one fully reduced expression tree.
#[derive(Debug, Clone, Copy)]
pub struct Statement {
    /// Root node of the expression.
    pub root: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::OperandData;

    fn op(offset: u32, opcode: Opcode, data: OperandData) -> Operation {
        Operation {
            offset,
            opcode,
            data,
        }
    }

    #[test]
    fn test_offset_range_spans_children() {
        let mut arena = ExprArena::new();
        let lhs = arena.alloc(op(4, Opcode::LiteralZero, OperandData::None), None);
        let rhs = arena.alloc(
            op(12, Opcode::VariableRead, OperandData::Variable { index: 0 }),
            None,
        );
        let add = arena.alloc(op(8, Opcode::IntAdd, OperandData::None), None);
        arena.node_mut(add).children = vec![rhs, lhs];

        assert_eq!(arena.offset_range(add), (4, 12));
    }

    #[test]
    fn test_variable_indices_in_order() {
        let mut arena = ExprArena::new();
        let read = arena.alloc(
            op(0, Opcode::VariableRead, OperandData::Variable { index: 2 }),
            None,
        );
        let write = arena.alloc(
            op(5, Opcode::VariableWrite, OperandData::Variable { index: 1 }),
            None,
        );
        arena.node_mut(write).children = vec![read];

        assert_eq!(arena.variable_indices(write), vec![1, 2]);
        let referenced = arena.referenced_variable_indices(write);
        assert!(referenced.contains(&1) && referenced.contains(&2));
    }

    #[test]
    fn test_parameter_child_reverses_order() {
        let mut arena = ExprArena::new();
        let arg0 = arena.alloc(op(0, Opcode::LiteralZero, OperandData::None), None);
        let arg1 = arena.alloc(op(1, Opcode::LiteralOne, OperandData::None), None);
        let call = arena.alloc(
            op(
                2,
                Opcode::FunctionCallImported,
                OperandData::Call {
                    decl: crate::package::DeclId(0),
                },
            ),
            None,
        );
        // Pop order: last source argument first
        arena.node_mut(call).children = vec![arg1, arg0];

        assert_eq!(arena.function_parameter_child(call, 0), Some(arg0));
        assert_eq!(arena.function_parameter_child(call, 1), Some(arg1));
        assert_eq!(arena.function_parameter_child(call, 2), None);
    }

    #[test]
    fn test_else_jump_marker() {
        let mut arena = ExprArena::new();
        let jump = arena.alloc(op(0, Opcode::Jump, OperandData::Jump { target: 32 }), None);
        assert!(!arena.is_else_jump(jump));
        arena.flag_as_else_jump(jump);
        assert!(arena.is_else_jump(jump));
    }

    #[test]
    fn test_teardown_statement_suppressed() {
        let mut arena = ExprArena::new();
        let read = arena.alloc(
            op(0, Opcode::VariableRead, OperandData::Variable { index: 0 }),
            None,
        );
        let deref = arena.alloc(op(5, Opcode::Unknown3B, OperandData::None), None);
        arena.node_mut(deref).children = vec![read];
        let pop = arena.alloc(op(6, Opcode::PopStack, OperandData::None), None);
        arena.node_mut(pop).children = vec![deref];

        assert!(!arena.should_render(pop));
    }
}
