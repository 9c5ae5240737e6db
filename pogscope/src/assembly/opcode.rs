//! The POG opcode set and its static descriptors.
//!
//! Each opcode has a fixed immediate-data size and a flag controlling whether it is
//! omitted from expression recovery. Stack effects depend on the decoded operand for a
//! few opcodes (pop-n, calls) and therefore live on [`crate::assembly::Operation`], not
//! here.

/// A single opcode of the POG virtual machine.
///
/// The discriminants are the on-disk opcode bytes. `Removed` is never decoded from a
/// stream; the control-flow structurer rewrites operations to it once a jump has served
/// its structural purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    PopStack = 0x01,
    PopStackN = 0x02,
    CloneStack = 0x03,

    LiteralZero = 0x04,
    LiteralOne = 0x05,
    LiteralByte = 0x06,
    LiteralShort = 0x07,
    LiteralInt = 0x08,
    LiteralFloat = 0x0B,

    VariableRead = 0x0C,
    VariableWrite = 0x0D,
    PushStackN = 0x0E,

    Jump = 0x0F,
    JumpIfFalse = 0x10,
    JumpIfTrue = 0x11,

    FunctionEnd = 0x13,
    FunctionCallLocal = 0x14,
    FunctionCallImported = 0x15,
    TaskCallLocal = 0x17,
    TaskCallImported = 0x18,

    IntAdd = 0x1A,
    IntSub = 0x1B,
    IntMul = 0x1C,
    IntDiv = 0x1D,
    IntMod = 0x1E,
    IntNeg = 0x1F,

    Equals = 0x20,
    NotEquals = 0x21,
    IntGt = 0x22,
    IntLt = 0x23,
    IntGtEquals = 0x24,
    IntLtEquals = 0x25,

    FltAdd = 0x26,
    FltSub = 0x27,
    FltMul = 0x28,
    FltDiv = 0x29,
    FltNeg = 0x2B,

    FltGt = 0x2C,
    FltLt = 0x2D,
    FltGtEquals = 0x2E,
    FltLtEquals = 0x2F,

    LogicalAnd = 0x30,
    LogicalOr = 0x31,
    LogicalNot = 0x32,

    BitwiseAnd = 0x33,
    BitwiseOr = 0x34,

    CastIntToFlt = 0x37,
    CastFltToInt = 0x38,
    CastToBool = 0x39,

    VariableInit = 0x3A,

    // 0x3B appears to be a read-through before string operations; 0x3C appears to move
    // the stack top into the function return slot. Both are modeled empirically.
    Unknown3B = 0x3B,
    Unknown3C = 0x3C,
    StringVariableWrite = 0x3D,

    LiteralString = 0x3E,
    StringEquals = 0x3F,

    Unknown40 = 0x40, // Something to do with lists?

    ScheduleStart = 0x41,
    ScheduleEvery = 0x42,

    AtomicStart = 0x43,
    AtomicStop = 0x44,

    JumpIfNotDebug = 0x45,

    Removed = 0xFF,
}

impl Opcode {
    /// Decode an opcode byte, returning `None` for unrecognized values.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        let opcode = match byte {
            0x01 => Opcode::PopStack,
            0x02 => Opcode::PopStackN,
            0x03 => Opcode::CloneStack,
            0x04 => Opcode::LiteralZero,
            0x05 => Opcode::LiteralOne,
            0x06 => Opcode::LiteralByte,
            0x07 => Opcode::LiteralShort,
            0x08 => Opcode::LiteralInt,
            0x0B => Opcode::LiteralFloat,
            0x0C => Opcode::VariableRead,
            0x0D => Opcode::VariableWrite,
            0x0E => Opcode::PushStackN,
            0x0F => Opcode::Jump,
            0x10 => Opcode::JumpIfFalse,
            0x11 => Opcode::JumpIfTrue,
            0x13 => Opcode::FunctionEnd,
            0x14 => Opcode::FunctionCallLocal,
            0x15 => Opcode::FunctionCallImported,
            0x17 => Opcode::TaskCallLocal,
            0x18 => Opcode::TaskCallImported,
            0x1A => Opcode::IntAdd,
            0x1B => Opcode::IntSub,
            0x1C => Opcode::IntMul,
            0x1D => Opcode::IntDiv,
            0x1E => Opcode::IntMod,
            0x1F => Opcode::IntNeg,
            0x20 => Opcode::Equals,
            0x21 => Opcode::NotEquals,
            0x22 => Opcode::IntGt,
            0x23 => Opcode::IntLt,
            0x24 => Opcode::IntGtEquals,
            0x25 => Opcode::IntLtEquals,
            0x26 => Opcode::FltAdd,
            0x27 => Opcode::FltSub,
            0x28 => Opcode::FltMul,
            0x29 => Opcode::FltDiv,
            0x2B => Opcode::FltNeg,
            0x2C => Opcode::FltGt,
            0x2D => Opcode::FltLt,
            0x2E => Opcode::FltGtEquals,
            0x2F => Opcode::FltLtEquals,
            0x30 => Opcode::LogicalAnd,
            0x31 => Opcode::LogicalOr,
            0x32 => Opcode::LogicalNot,
            0x33 => Opcode::BitwiseAnd,
            0x34 => Opcode::BitwiseOr,
            0x37 => Opcode::CastIntToFlt,
            0x38 => Opcode::CastFltToInt,
            0x39 => Opcode::CastToBool,
            0x3A => Opcode::VariableInit,
            0x3B => Opcode::Unknown3B,
            0x3C => Opcode::Unknown3C,
            0x3D => Opcode::StringVariableWrite,
            0x3E => Opcode::LiteralString,
            0x3F => Opcode::StringEquals,
            0x40 => Opcode::Unknown40,
            0x41 => Opcode::ScheduleStart,
            0x42 => Opcode::ScheduleEvery,
            0x43 => Opcode::AtomicStart,
            0x44 => Opcode::AtomicStop,
            0x45 => Opcode::JumpIfNotDebug,
            _ => return None,
        };
        Some(opcode)
    }

    /// Mnemonic used by the assembly listing.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Opcode::PopStack => "OP_POP_STACK",
            Opcode::PopStackN => "OP_POP_STACK_N",
            Opcode::CloneStack => "OP_CLONE_STACK",
            Opcode::LiteralZero => "OP_LITERAL_ZERO",
            Opcode::LiteralOne => "OP_LITERAL_ONE",
            Opcode::LiteralByte => "OP_LITERAL_BYTE",
            Opcode::LiteralShort => "OP_LITERAL_SHORT",
            Opcode::LiteralInt => "OP_LITERAL_INT",
            Opcode::LiteralFloat => "OP_LITERAL_FLT",
            Opcode::VariableRead => "OP_VARIABLE_READ",
            Opcode::VariableWrite => "OP_VARIABLE_WRITE",
            Opcode::PushStackN => "OP_PUSH_STACK_N",
            Opcode::Jump => "OP_JUMP",
            Opcode::JumpIfFalse => "OP_JUMP_IF_FALSE",
            Opcode::JumpIfTrue => "OP_JUMP_IF_TRUE",
            Opcode::FunctionEnd => "OP_FUNCTION_END",
            Opcode::FunctionCallLocal => "OP_FUNCTION_CALL_LOCAL",
            Opcode::FunctionCallImported => "OP_FUNCTION_CALL_IMPORTED",
            Opcode::TaskCallLocal => "OP_TASK_CALL_LOCAL",
            Opcode::TaskCallImported => "OP_TASK_CALL_IMPORTED",
            Opcode::IntAdd => "OP_INT_ADD",
            Opcode::IntSub => "OP_INT_SUB",
            Opcode::IntMul => "OP_INT_MUL",
            Opcode::IntDiv => "OP_INT_DIV",
            Opcode::IntMod => "OP_INT_MOD",
            Opcode::IntNeg => "OP_INT_NEG",
            Opcode::Equals => "OP_EQUALS",
            Opcode::NotEquals => "OP_NOT_EQUALS",
            Opcode::IntGt => "OP_INT_GT",
            Opcode::IntLt => "OP_INT_LT",
            Opcode::IntGtEquals => "OP_INT_GT_EQUALS",
            Opcode::IntLtEquals => "OP_INT_LT_EQUALS",
            Opcode::FltAdd => "OP_FLT_ADD",
            Opcode::FltSub => "OP_FLT_SUB",
            Opcode::FltMul => "OP_FLT_MUL",
            Opcode::FltDiv => "OP_FLT_DIV",
            Opcode::FltNeg => "OP_FLT_NEG",
            Opcode::FltGt => "OP_FLT_GT",
            Opcode::FltLt => "OP_FLT_LT",
            Opcode::FltGtEquals => "OP_FLT_GT_EQUALS",
            Opcode::FltLtEquals => "OP_FLT_LT_EQUALS",
            Opcode::LogicalAnd => "OP_LOGICAL_AND",
            Opcode::LogicalOr => "OP_LOGICAL_OR",
            Opcode::LogicalNot => "OP_LOGICAL_NOT",
            Opcode::BitwiseAnd => "OP_BITWISE_AND",
            Opcode::BitwiseOr => "OP_BITWISE_OR",
            Opcode::CastIntToFlt => "OP_CAST_INT_TO_FLT",
            Opcode::CastFltToInt => "OP_CAST_FLT_TO_INT",
            Opcode::CastToBool => "OP_CAST_TO_BOOL",
            Opcode::VariableInit => "OP_VARIABLE_INIT",
            Opcode::Unknown3B => "OP_UNKNOWN_3B",
            Opcode::Unknown3C => "OP_UNKNOWN_3C",
            Opcode::StringVariableWrite => "OP_STRING_VARIABLE_WRITE",
            Opcode::LiteralString => "OP_LITERAL_STRING",
            Opcode::StringEquals => "OP_STRING_EQUALS",
            Opcode::Unknown40 => "OP_UNKNOWN_40",
            Opcode::ScheduleStart => "OP_SCHEDULE_START",
            Opcode::ScheduleEvery => "OP_SCHEDULE_EVERY",
            Opcode::AtomicStart => "OP_ATOMIC_START",
            Opcode::AtomicStop => "OP_ATOMIC_STOP",
            Opcode::JumpIfNotDebug => "OP_JUMP_IF_NOT_DEBUG",
            Opcode::Removed => "OP_REMOVED",
        }
    }

    /// Size in bytes of the immediate data following the opcode byte.
    #[must_use]
    pub fn data_size(self) -> usize {
        match self {
            Opcode::PopStackN | Opcode::LiteralByte => 1,
            Opcode::LiteralShort => 2,
            Opcode::LiteralInt
            | Opcode::LiteralFloat
            | Opcode::VariableRead
            | Opcode::VariableWrite
            | Opcode::PushStackN
            | Opcode::Jump
            | Opcode::JumpIfFalse
            | Opcode::JumpIfTrue
            | Opcode::VariableInit
            | Opcode::StringVariableWrite
            | Opcode::LiteralString
            | Opcode::JumpIfNotDebug => 4,
            Opcode::FunctionCallLocal
            | Opcode::FunctionCallImported
            | Opcode::TaskCallLocal
            | Opcode::TaskCallImported
            | Opcode::ScheduleEvery => 12,
            _ => 0,
        }
    }

    /// True for opcodes that never take part in expression recovery.
    #[must_use]
    pub fn omitted(self) -> bool {
        matches!(
            self,
            Opcode::CloneStack
                | Opcode::PushStackN
                | Opcode::FunctionEnd
                | Opcode::Unknown40
                | Opcode::AtomicStop
                | Opcode::Removed
        )
    }

    /// True for the four call opcodes.
    #[must_use]
    pub fn is_function_call(self) -> bool {
        matches!(
            self,
            Opcode::FunctionCallLocal
                | Opcode::FunctionCallImported
                | Opcode::TaskCallLocal
                | Opcode::TaskCallImported
        )
    }

    /// True for the two task-call opcodes, which always produce an `htask`.
    #[must_use]
    pub fn is_task_call(self) -> bool {
        matches!(self, Opcode::TaskCallLocal | Opcode::TaskCallImported)
    }

    /// True for the cast opcodes.
    #[must_use]
    pub fn is_cast(self) -> bool {
        matches!(
            self,
            Opcode::CastIntToFlt | Opcode::CastFltToInt | Opcode::CastToBool
        )
    }

    /// True for opcodes that read or write a variable slot.
    #[must_use]
    pub fn is_variable(self) -> bool {
        matches!(
            self,
            Opcode::VariableRead | Opcode::VariableWrite | Opcode::StringVariableWrite
        )
    }

    /// True for opcodes pushing an integer-valued literal.
    #[must_use]
    pub fn is_literal_integer(self) -> bool {
        matches!(
            self,
            Opcode::LiteralZero
                | Opcode::LiteralOne
                | Opcode::LiteralByte
                | Opcode::LiteralShort
                | Opcode::LiteralInt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_bytes() {
        for byte in 0u8..=0x45 {
            if let Some(opcode) = Opcode::from_byte(byte) {
                assert_eq!(opcode as u8, byte);
            }
        }
    }

    #[test]
    fn test_unassigned_bytes_rejected() {
        for byte in [0x00, 0x09, 0x0A, 0x12, 0x16, 0x19, 0x2A, 0x35, 0x36, 0x46, 0xFF] {
            assert!(Opcode::from_byte(byte).is_none(), "0x{byte:02X}");
        }
    }

    #[test]
    fn test_data_sizes() {
        assert_eq!(Opcode::PopStack.data_size(), 0);
        assert_eq!(Opcode::PopStackN.data_size(), 1);
        assert_eq!(Opcode::LiteralShort.data_size(), 2);
        assert_eq!(Opcode::VariableRead.data_size(), 4);
        assert_eq!(Opcode::FunctionCallLocal.data_size(), 12);
        assert_eq!(Opcode::ScheduleEvery.data_size(), 12);
    }
}
