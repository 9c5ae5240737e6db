//! Decoded operations and their immediate operands.

use std::fmt::Write as _;

use crate::{
    assembly::Opcode,
    package::{Context, DeclId},
};

/// The decoded immediate operand of one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandData {
    /// No immediate data.
    None,
    /// `POP_STACK_N`: number of values to discard.
    PopCount {
        /// How many stack slots are popped
        count: u8,
    },
    /// `PUSH_STACK_N`: number of local slots to reserve.
    PushCount {
        /// How many stack slots are pushed
        count: u32,
    },
    /// `LITERAL_BYTE` immediate.
    LiteralByte {
        /// The literal value
        value: i8,
    },
    /// `LITERAL_SHORT` immediate.
    LiteralShort {
        /// The literal value
        value: i16,
    },
    /// `LITERAL_INT` immediate.
    LiteralInt {
        /// The literal value
        value: i32,
    },
    /// `LITERAL_FLT` immediate.
    LiteralFloat {
        /// The literal value
        value: f32,
    },
    /// Variable read/write slot index.
    Variable {
        /// Stack slot index within the function scope
        index: u32,
    },
    /// Unconditional jump target (also `JUMP_IF_NOT_DEBUG`).
    Jump {
        /// Absolute byte offset of the target operation
        target: u32,
    },
    /// Conditional jump target; pops the condition.
    ConditionalJump {
        /// Absolute byte offset of the target operation
        target: u32,
    },
    /// Function or task call; resolved to a declaration at decode time.
    Call {
        /// The callee
        decl: DeclId,
    },
    /// `VARIABLE_INIT` immediate (string/handle default initialization).
    Init {
        /// Raw init operand
        value: u32,
    },
    /// String-table index of a string literal.
    LiteralString {
        /// Index into the global string table
        index: u32,
    },
    /// `SCHEDULE_EVERY`: skip target, an unexplained middle word, and the interval.
    ScheduleEvery {
        /// Absolute byte offset just past this every-block's body
        skip_offset: u32,
        /// Middle operand word; meaning unknown, preserved for the listing
        middle: u32,
        /// Interval in seconds
        interval: f32,
    },
}

/// One decoded operation: its code-section offset, opcode, and operand.
///
/// Offsets are unique within a package's code section and serve as the identity
/// for jump targets and function entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Byte offset of the opcode within the code section.
    pub offset: u32,
    /// The opcode.
    pub opcode: Opcode,
    /// The decoded immediate operand.
    pub data: OperandData,
}

impl Operation {
    /// How many operands this operation pops from the stack.
    ///
    /// Calls pop one value per declared parameter, which is why the
    /// declaration registry is needed.
    #[must_use]
    pub fn pop_count(&self, ctx: &Context) -> usize {
        match self.opcode {
            Opcode::PopStack
            | Opcode::JumpIfFalse
            | Opcode::JumpIfTrue
            | Opcode::VariableWrite
            | Opcode::StringVariableWrite
            | Opcode::IntNeg
            | Opcode::FltNeg
            | Opcode::LogicalNot
            | Opcode::CastIntToFlt
            | Opcode::CastFltToInt
            | Opcode::CastToBool
            | Opcode::Unknown3B
            | Opcode::Unknown3C => 1,
            Opcode::IntAdd
            | Opcode::IntSub
            | Opcode::IntMul
            | Opcode::IntDiv
            | Opcode::IntMod
            | Opcode::Equals
            | Opcode::NotEquals
            | Opcode::IntGt
            | Opcode::IntLt
            | Opcode::IntGtEquals
            | Opcode::IntLtEquals
            | Opcode::FltAdd
            | Opcode::FltSub
            | Opcode::FltMul
            | Opcode::FltDiv
            | Opcode::FltGt
            | Opcode::FltLt
            | Opcode::FltGtEquals
            | Opcode::FltLtEquals
            | Opcode::LogicalAnd
            | Opcode::LogicalOr
            | Opcode::BitwiseAnd
            | Opcode::BitwiseOr
            | Opcode::StringEquals => 2,
            Opcode::PopStackN => match self.data {
                OperandData::PopCount { count } => count as usize,
                _ => 0,
            },
            _ if self.opcode.is_function_call() => match self.data {
                OperandData::Call { decl } => ctx.decl(decl).parameter_count(),
                _ => 0,
            },
            _ => 0,
        }
    }

    /// Whether this operation pushes a value (0 or 1).
    #[must_use]
    pub fn push_count(&self) -> usize {
        match self.opcode {
            Opcode::LiteralZero
            | Opcode::LiteralOne
            | Opcode::LiteralByte
            | Opcode::LiteralShort
            | Opcode::LiteralInt
            | Opcode::LiteralFloat
            | Opcode::LiteralString
            | Opcode::VariableRead
            | Opcode::VariableWrite
            | Opcode::StringVariableWrite
            | Opcode::VariableInit
            | Opcode::IntAdd
            | Opcode::IntSub
            | Opcode::IntMul
            | Opcode::IntDiv
            | Opcode::IntMod
            | Opcode::IntNeg
            | Opcode::Equals
            | Opcode::NotEquals
            | Opcode::IntGt
            | Opcode::IntLt
            | Opcode::IntGtEquals
            | Opcode::IntLtEquals
            | Opcode::FltAdd
            | Opcode::FltSub
            | Opcode::FltMul
            | Opcode::FltDiv
            | Opcode::FltNeg
            | Opcode::FltGt
            | Opcode::FltLt
            | Opcode::FltGtEquals
            | Opcode::FltLtEquals
            | Opcode::LogicalAnd
            | Opcode::LogicalOr
            | Opcode::LogicalNot
            | Opcode::BitwiseAnd
            | Opcode::BitwiseOr
            | Opcode::CastIntToFlt
            | Opcode::CastFltToInt
            | Opcode::CastToBool
            | Opcode::Unknown3B
            | Opcode::Unknown3C
            | Opcode::StringEquals => 1,
            _ if self.opcode.is_function_call() => 1,
            _ => 0,
        }
    }

    /// Jump target of any jump-carrying operation.
    #[must_use]
    pub fn jump_target(&self) -> Option<u32> {
        match self.data {
            OperandData::Jump { target } | OperandData::ConditionalJump { target } => Some(target),
            _ => None,
        }
    }

    /// Variable slot index for read/write operations.
    #[must_use]
    pub fn variable_index(&self) -> Option<u32> {
        match self.data {
            OperandData::Variable { index } if self.opcode.is_variable() => Some(index),
            _ => None,
        }
    }

    /// The callee of a call operation.
    #[must_use]
    pub fn call_target(&self) -> Option<DeclId> {
        match self.data {
            OperandData::Call { decl } => Some(decl),
            _ => None,
        }
    }

    /// The value of an integer-valued literal operation.
    #[must_use]
    pub fn literal_integer_value(&self) -> Option<i32> {
        match (self.opcode, &self.data) {
            (Opcode::LiteralZero, _) => Some(0),
            (Opcode::LiteralOne, _) => Some(1),
            (Opcode::LiteralByte, OperandData::LiteralByte { value }) => Some(i32::from(*value)),
            (Opcode::LiteralShort, OperandData::LiteralShort { value }) => Some(i32::from(*value)),
            (Opcode::LiteralInt, OperandData::LiteralInt { value }) => Some(*value),
            _ => None,
        }
    }

    /// Erase this operation once a structural rewrite has consumed it.
    pub fn remove(&mut self) {
        self.opcode = Opcode::Removed;
        self.data = OperandData::None;
    }

    /// Whether expression recovery skips this operation entirely.
    #[must_use]
    pub fn skipped_in_recovery(&self) -> bool {
        self.opcode.omitted()
    }

    /// Format `OP_NAME operand` for the assembly listing.
    #[must_use]
    pub fn assembly_line(&self, ctx: &Context) -> String {
        let mut line = self.opcode.name().to_string();
        match &self.data {
            OperandData::None => {}
            OperandData::PopCount { count } => {
                let _ = write!(line, " {count}");
            }
            OperandData::PushCount { count } => {
                let _ = write!(line, " {count}");
            }
            OperandData::LiteralByte { value } => {
                let _ = write!(line, " {value}");
            }
            OperandData::LiteralShort { value } => {
                let _ = write!(line, " {value}");
            }
            OperandData::LiteralInt { value } => {
                let _ = write!(line, " {value}");
            }
            OperandData::LiteralFloat { value } => {
                let _ = write!(line, " {value:.6}");
            }
            OperandData::Variable { index } => {
                let _ = write!(line, " {index}");
            }
            OperandData::Jump { target } | OperandData::ConditionalJump { target } => {
                let _ = write!(line, " 0x{target:08X}");
            }
            OperandData::Call { decl } => {
                let declaration = ctx.decl(*decl);
                let _ = write!(
                    line,
                    " {} {}",
                    declaration.scoped_name(),
                    declaration.parameter_count()
                );
            }
            OperandData::Init { value } => {
                let _ = write!(line, " {value}");
            }
            OperandData::LiteralString { index } => {
                let value = ctx.string(*index).unwrap_or("");
                let _ = write!(line, " \"{}\"", value.replace('\n', "\\n"));
            }
            OperandData::ScheduleEvery {
                skip_offset,
                middle,
                interval,
            } => {
                let _ = write!(line, " 0x{skip_offset:08X} {middle}, {interval:.6}");
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::DecompileOptions;

    fn op(opcode: Opcode, data: OperandData) -> Operation {
        Operation {
            offset: 0,
            opcode,
            data,
        }
    }

    #[test]
    fn test_stack_effects() {
        let ctx = Context::new(DecompileOptions::default());

        let add = op(Opcode::IntAdd, OperandData::None);
        assert_eq!(add.pop_count(&ctx), 2);
        assert_eq!(add.push_count(), 1);

        let write = op(Opcode::VariableWrite, OperandData::Variable { index: 0 });
        assert_eq!(write.pop_count(&ctx), 1);
        assert_eq!(write.push_count(), 1);

        let pop = op(Opcode::PopStack, OperandData::None);
        assert_eq!(pop.pop_count(&ctx), 1);
        assert_eq!(pop.push_count(), 0);

        let popn = op(Opcode::PopStackN, OperandData::PopCount { count: 3 });
        assert_eq!(popn.pop_count(&ctx), 3);

        let cond = op(Opcode::JumpIfFalse, OperandData::ConditionalJump { target: 8 });
        assert_eq!(cond.pop_count(&ctx), 1);
        assert_eq!(cond.push_count(), 0);
    }

    #[test]
    fn test_call_pop_count_follows_declaration() {
        let mut ctx = Context::new(DecompileOptions::default());
        let decl = ctx.new_local_function(0x100, Some(3), false);

        let call = op(Opcode::FunctionCallLocal, OperandData::Call { decl });
        assert_eq!(call.pop_count(&ctx), 3);
        assert_eq!(call.push_count(), 1);
    }

    #[test]
    fn test_literal_integer_value() {
        let ctx_ops = [
            (op(Opcode::LiteralZero, OperandData::None), Some(0)),
            (op(Opcode::LiteralOne, OperandData::None), Some(1)),
            (
                op(Opcode::LiteralByte, OperandData::LiteralByte { value: -4 }),
                Some(-4),
            ),
            (
                op(Opcode::LiteralInt, OperandData::LiteralInt { value: 1234 }),
                Some(1234),
            ),
            (op(Opcode::LiteralFloat, OperandData::LiteralFloat { value: 1.0 }), None),
        ];
        for (operation, expected) in ctx_ops {
            assert_eq!(operation.literal_integer_value(), expected);
        }
    }

    #[test]
    fn test_remove() {
        let mut jump = op(Opcode::Jump, OperandData::Jump { target: 16 });
        assert!(!jump.skipped_in_recovery());
        jump.remove();
        assert_eq!(jump.opcode, Opcode::Removed);
        assert!(jump.skipped_in_recovery());
    }
}
