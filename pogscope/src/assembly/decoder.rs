//! Opcode stream decoding.
//!
//! Transforms the raw bytes of a `CODE` section into an ordered [`Operation`] list.
//! Call operands are resolved against the declaration registry as they are decoded,
//! synthesizing `local_function_N` declarations for calls into unregistered offsets.
//!
//! An unrecognized opcode abandons only the surrounding function: the decoder records
//! a poisoned range, scans forward to the next `OP_FUNCTION_END` byte, and resumes.

use log::error;

use crate::{
    assembly::{OperandData, Operation},
    file::Parser,
    package::Context,
    Opcode, Result,
};

/// A decoded `CODE` section.
pub struct CodeSection {
    /// All operations, in stream order.
    pub operations: Vec<Operation>,
    /// Offset ranges `[start, end)` where decoding failed; functions overlapping
    /// these are abandoned.
    pub poisoned: Vec<(u32, u32)>,
}

impl CodeSection {
    /// Whether the inclusive offset range `[start, end]` overlaps a poisoned span.
    #[must_use]
    pub fn is_poisoned(&self, start: u32, end: u32) -> bool {
        self.poisoned
            .iter()
            .any(|&(from, to)| start < to && end >= from)
    }
}

/// Decode a full code section.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if an operation's immediate data is truncated.
pub fn decode_code_section(ctx: &mut Context, code: &[u8]) -> Result<CodeSection> {
    let mut parser = Parser::new(code);
    let mut operations = Vec::new();
    let mut poisoned = Vec::new();

    while parser.has_more_data() {
        let offset = u32::try_from(parser.pos()).unwrap_or(u32::MAX);
        let byte = parser.read_le::<u8>()?;

        let Some(opcode) = Opcode::from_byte(byte) else {
            error!("Unknown opcode 0x{byte:02X} at offset 0x{offset:08X}, abandoning function");

            // Resynchronize at the next function boundary. The 0x13 byte may sit
            // inside an operand of the undecodable region, in which case more than
            // one function lands in the poisoned span and is dropped with it.
            while parser.has_more_data() && parser.peek_byte()? != Opcode::FunctionEnd as u8 {
                parser.advance_by(1)?;
            }
            if parser.has_more_data() {
                let end_offset = u32::try_from(parser.pos()).unwrap_or(u32::MAX);
                operations.push(Operation {
                    offset: end_offset,
                    opcode: Opcode::FunctionEnd,
                    data: OperandData::None,
                });
                parser.advance_by(1)?;
                poisoned.push((offset, end_offset));
            } else {
                poisoned.push((offset, u32::try_from(code.len()).unwrap_or(u32::MAX)));
            }
            continue;
        };

        let data = decode_operand(ctx, opcode, &mut parser, offset)?;
        operations.push(Operation {
            offset,
            opcode,
            data,
        });
    }

    Ok(CodeSection {
        operations,
        poisoned,
    })
}

/// Decode the immediate operand of `opcode`, resolving call targets.
fn decode_operand(
    ctx: &mut Context,
    opcode: Opcode,
    parser: &mut Parser<'_>,
    op_offset: u32,
) -> Result<OperandData> {
    let data = match opcode {
        Opcode::PopStackN => OperandData::PopCount {
            count: parser.read_le::<u8>()?,
        },
        Opcode::PushStackN => OperandData::PushCount {
            count: parser.read_le::<u32>()?,
        },
        Opcode::LiteralByte => OperandData::LiteralByte {
            value: parser.read_le::<i8>()?,
        },
        Opcode::LiteralShort => OperandData::LiteralShort {
            value: parser.read_le::<i16>()?,
        },
        Opcode::LiteralInt => OperandData::LiteralInt {
            value: parser.read_le::<i32>()?,
        },
        Opcode::LiteralFloat => OperandData::LiteralFloat {
            value: parser.read_le::<f32>()?,
        },
        Opcode::VariableRead | Opcode::VariableWrite | Opcode::StringVariableWrite => {
            OperandData::Variable {
                index: parser.read_le::<u32>()?,
            }
        }
        Opcode::Jump | Opcode::JumpIfNotDebug => OperandData::Jump {
            target: parser.read_le::<u32>()?,
        },
        Opcode::JumpIfFalse | Opcode::JumpIfTrue => OperandData::ConditionalJump {
            target: parser.read_le::<u32>()?,
        },
        Opcode::FunctionCallLocal | Opcode::TaskCallLocal => {
            let _unused = parser.read_le::<u32>()?;
            let target = parser.read_le::<u32>()?;
            let parameter_count = parser.read_le::<u32>()?;

            let decl = match ctx.functions_by_offset.get(&target) {
                Some(&decl) => decl,
                None => ctx.new_local_function(
                    target,
                    Some(parameter_count),
                    opcode == Opcode::TaskCallLocal,
                ),
            };
            OperandData::Call { decl }
        }
        Opcode::FunctionCallImported | Opcode::TaskCallImported => {
            let _unused = parser.read_le::<u32>()?;
            let _target = parser.read_le::<u32>()?;
            let parameter_count = parser.read_le::<u32>()?;

            let decl = match ctx.imports_by_offset.get(&op_offset) {
                Some(&decl) => decl,
                None => {
                    error!(
                        "Imported call at 0x{op_offset:08X} has no FIMP entry, synthesizing a declaration"
                    );
                    ctx.add_function_declaration("", &format!("imported_function_{op_offset:08X}"))
                }
            };

            if ctx.decl(decl).parameters.is_none() {
                let params = (0..parameter_count)
                    .map(|ii| crate::package::FunctionParameter {
                        type_name: crate::package::UNKNOWN_TYPE.to_string(),
                        name: format!("param_{ii}"),
                        variable: None,
                    })
                    .collect();
                ctx.decl_mut(decl).parameters = Some(params);
            }
            OperandData::Call { decl }
        }
        Opcode::VariableInit => OperandData::Init {
            value: parser.read_le::<u32>()?,
        },
        Opcode::LiteralString => OperandData::LiteralString {
            index: parser.read_le::<u32>()?,
        },
        Opcode::ScheduleEvery => {
            let skip_offset = parser.read_le::<u32>()?;
            let middle = parser.read_le::<u32>()?;
            let interval = parser.read_le::<f32>()?;
            OperandData::ScheduleEvery {
                skip_offset,
                middle,
                interval,
            }
        }
        _ => OperandData::None,
    };

    debug_assert_eq!(opcode.data_size(), parser.pos() - op_offset as usize - 1);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::DecompileOptions;

    #[test]
    fn test_decode_simple_stream() {
        // LITERAL_BYTE 5; VARIABLE_WRITE 0; POP_STACK; FUNCTION_END
        let code = [
            0x06, 0x05, // LITERAL_BYTE 5
            0x0D, 0x00, 0x00, 0x00, 0x00, // VARIABLE_WRITE 0
            0x01, // POP_STACK
            0x13, // FUNCTION_END
        ];

        let mut ctx = Context::new(DecompileOptions::default());
        let section = decode_code_section(&mut ctx, &code).unwrap();

        assert!(section.poisoned.is_empty());
        let opcodes: Vec<Opcode> = section.operations.iter().map(|op| op.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::LiteralByte,
                Opcode::VariableWrite,
                Opcode::PopStack,
                Opcode::FunctionEnd
            ]
        );
        assert_eq!(section.operations[1].offset, 2);
        assert_eq!(section.operations[2].offset, 7);
        assert_eq!(
            section.operations[0].data,
            OperandData::LiteralByte { value: 5 }
        );
    }

    #[test]
    fn test_decode_local_call_creates_declaration() {
        // FUNCTION_CALL_LOCAL -> offset 0x40, 2 parameters
        let code = [
            0x14, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
            0x13, // FUNCTION_END
        ];

        let mut ctx = Context::new(DecompileOptions::default());
        let section = decode_code_section(&mut ctx, &code).unwrap();

        let decl = section.operations[0].call_target().unwrap();
        assert_eq!(ctx.decl(decl).name, "local_function_0");
        assert_eq!(ctx.decl(decl).parameter_count(), 2);
        assert_eq!(ctx.functions_by_offset.get(&0x40), Some(&decl));
    }

    #[test]
    fn test_unknown_opcode_poisons_until_function_end() {
        let code = [
            0x06, 0x01, // LITERAL_BYTE 1
            0x13, // FUNCTION_END
            0xEE, 0xEE, // unknown garbage
            0x13, // FUNCTION_END
            0x04, // LITERAL_ZERO (healthy again)
            0x13, // FUNCTION_END
        ];

        let mut ctx = Context::new(DecompileOptions::default());
        let section = decode_code_section(&mut ctx, &code).unwrap();

        assert_eq!(section.poisoned, vec![(3, 5)]);
        assert!(section.is_poisoned(3, 5));
        assert!(section.is_poisoned(0, 8));
        assert!(!section.is_poisoned(6, 8));

        // Decoding resumed cleanly after the poisoned span
        let last = section.operations.last().unwrap();
        assert_eq!(last.opcode, Opcode::FunctionEnd);
        assert_eq!(last.offset, 7);
    }

    #[test]
    fn test_truncated_operand_errors() {
        let code = [0x08, 0x01, 0x02]; // LITERAL_INT missing two bytes
        let mut ctx = Context::new(DecompileOptions::default());
        assert!(decode_code_section(&mut ctx, &code).is_err());
    }
}
