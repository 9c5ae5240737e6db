//! Reconstructed structured blocks.
//!
//! A function body is a flat list of [`BlockElement`]s, each either a plain statement or
//! a structured block with nested bodies. The control-flow structurer in
//! [`crate::decompiler::structure`] produces these; type inference, code checks, naming,
//! and rendering all walk them recursively.

use crate::decompiler::graph::Statement;

/// Conditional body executed when the test is true.
pub struct IfBlock {
    /// The test expression.
    pub conditional: Statement,
    /// Elements executed when the test passes.
    pub body: Vec<BlockElement>,
}

/// Alternative body following an [`IfBlock`].
pub struct ElseBlock {
    /// Elements executed when the preceding if failed.
    pub body: Vec<BlockElement>,
}

/// Pre-tested loop.
pub struct WhileLoop {
    /// The test expression.
    pub conditional: Statement,
    /// Loop body.
    pub body: Vec<BlockElement>,
}

/// Post-tested loop.
pub struct DoWhileLoop {
    /// The test expression, evaluated after each iteration.
    pub conditional: Statement,
    /// Loop body.
    pub body: Vec<BlockElement>,
}

/// Counted loop recovered from an init/test/increment pattern.
pub struct ForLoop {
    /// Initialization statement hoisted from before the loop.
    pub init: Statement,
    /// The test expression.
    pub conditional: Statement,
    /// Increment statement hoisted from the body tail.
    pub increment: Statement,
    /// Loop body.
    pub body: Vec<BlockElement>,
}

/// One `case` (or `default`) of a switch.
pub struct CaseBlock {
    /// Offset of the first operation of this case's body.
    pub starting_offset: u32,
    /// Offset of the dispatch operation, for the assembly listing.
    pub jump_location: u32,
    /// The case value; `None` marks the default label.
    pub value: Option<i32>,
    /// Enum member name replacing the numeric value, when the scrutinee is an enum.
    pub value_code: Option<String>,
    /// Case body.
    pub body: Vec<BlockElement>,
}

/// A switch over an integer or enum scrutinee.
pub struct SwitchBlock {
    /// The scrutinee expression.
    pub conditional: Option<Statement>,
    /// Cases in dispatch order; the default label, when present, is last.
    pub cases: Vec<CaseBlock>,
}

/// Body executed only in debug builds of the engine.
pub struct DebugBlock {
    /// Elements guarded by the debug test.
    pub body: Vec<BlockElement>,
}

/// Body executed without task switching.
pub struct AtomicBlock {
    /// Elements inside the atomic region.
    pub body: Vec<BlockElement>,
}

/// One `every interval:` sub-block of a schedule.
pub struct ScheduleEveryBlock {
    /// Interval in seconds.
    pub interval: f32,
    /// Elements run on each tick.
    pub body: Vec<BlockElement>,
}

/// A schedule: an ordered set of every-blocks.
pub struct ScheduleBlock {
    /// The every-blocks, in stream order.
    pub every: Vec<ScheduleEveryBlock>,
}

/// A renderable unit of reconstructed source.
pub enum BlockElement {
    /// A plain statement.
    Statement(Statement),
    /// `if ( ... ) { ... }`
    If(IfBlock),
    /// `else { ... }`
    Else(ElseBlock),
    /// `while ( ... ) { ... }`
    While(WhileLoop),
    /// `do { ... } while ( ... );`
    DoWhile(DoWhileLoop),
    /// `for ( init; test; increment ) { ... }`
    For(ForLoop),
    /// `switch ( ... ) { case ...: }`
    Switch(SwitchBlock),
    /// `debug { ... }`
    Debug(DebugBlock),
    /// `atomic { ... }`
    Atomic(AtomicBlock),
    /// `schedule { every ...: { ... } }`
    Schedule(ScheduleBlock),
}

impl BlockElement {
    /// Whether this element renders as a braced block.
    #[must_use]
    pub fn is_block(&self) -> bool {
        !matches!(self, BlockElement::Statement(_))
    }

    /// Whether a blank line should separate this element from the one above.
    #[must_use]
    pub fn space_above(&self) -> bool {
        match self {
            BlockElement::Statement(_) => false,
            BlockElement::Debug(block) => match block.body.as_slice() {
                [only] => only.space_above(),
                _ => true,
            },
            _ => true,
        }
    }

    /// Whether a blank line should separate this element from the one below.
    #[must_use]
    pub fn space_below(&self) -> bool {
        match self {
            BlockElement::Statement(_) => false,
            BlockElement::Debug(block) => match block.body.as_slice() {
                [only] => only.space_below(),
                _ => true,
            },
            _ => true,
        }
    }

    /// The statement if this element is one.
    #[must_use]
    pub fn as_statement(&self) -> Option<&Statement> {
        match self {
            BlockElement::Statement(statement) => Some(statement),
            _ => None,
        }
    }
}

/// Structuring state threaded through recursive descent: where `break` and `continue`
/// land, and whether the enclosing block is an if (for else-jump classification).
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockContext {
    /// Jump target that classifies as `break`.
    pub break_offset: Option<u32>,
    /// Jump target that classifies as `continue`.
    pub continue_offset: Option<u32>,
    /// Whether the element being parsed is the body of an if block.
    pub in_if_block: bool,
}
