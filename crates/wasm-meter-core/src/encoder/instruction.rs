use crate::cursor::ByteBuffer;
use crate::error::EncodeError;
use crate::ir::{Immediate, Instruction};
use crate::opcode::{lookup_mnemonic, ImmediateClass};

/// Writes one instruction: its opcode byte, then its immediate.
///
/// The immediate must have the shape the opcode table prescribes for the
/// instruction; anything else is a [`EncodeError::MalformedImmediate`].
pub(crate) fn encode_instruction(
    out: &mut ByteBuffer,
    instruction: &Instruction,
) -> Result<(), EncodeError> {
    let op = lookup_mnemonic(instruction.qualifier, instruction.name).ok_or_else(|| {
        EncodeError::UnknownInstruction {
            name: instruction.mnemonic(),
        }
    })?;
    out.write_byte(op.opcode);

    let class = op.immediate_class();
    match (class, &instruction.immediate) {
        (None, None) => {}
        (Some(ImmediateClass::Varuint1), Some(Immediate::Varuint1(v))) => out.write_byte(*v),
        (Some(ImmediateClass::Varuint32), Some(Immediate::Varuint32(v))) => out.write_var_u32(*v),
        (Some(ImmediateClass::Varint32), Some(Immediate::Varint32(v))) => out.write_var_i32(*v),
        (Some(ImmediateClass::Varint64), Some(Immediate::Varint64(v))) => out.write_var_i64(*v),
        (Some(ImmediateClass::Raw4), Some(Immediate::Raw4(bytes))) => out.write(bytes),
        (Some(ImmediateClass::Raw8), Some(Immediate::Raw8(bytes))) => out.write(bytes),
        (Some(ImmediateClass::BlockType), Some(Immediate::BlockType(ty))) => {
            out.write_byte(ty.to_byte())
        }
        (Some(ImmediateClass::BranchTable), Some(Immediate::BranchTable { targets, default })) => {
            out.write_len("br_table", targets.len())?;
            for target in targets {
                out.write_var_u32(*target);
            }
            out.write_var_u32(*default);
        }
        (
            Some(ImmediateClass::CallIndirect),
            Some(Immediate::CallIndirect {
                type_index,
                reserved,
            }),
        ) => {
            out.write_var_u32(*type_index);
            out.write_byte(*reserved);
        }
        (
            Some(ImmediateClass::MemoryImmediate),
            Some(Immediate::MemoryImmediate { flags, offset }),
        ) => {
            out.write_var_u32(*flags);
            out.write_var_u32(*offset);
        }
        (class, _) => {
            return Err(EncodeError::MalformedImmediate {
                name: instruction.mnemonic(),
                expected: class.map_or("no", ImmediateClass::name),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Qualifier;
    use crate::opcode::asm::assemble;

    fn encode_text(text: &str) -> Vec<u8> {
        let mut out = ByteBuffer::new();
        for instruction in assemble(text).unwrap() {
            encode_instruction(&mut out, &instruction).unwrap();
        }
        out.into_bytes()
    }

    #[test]
    fn encodes_immediates() {
        assert_eq!(encode_text("i32.const -1"), [0x41, 0x7f]);
        assert_eq!(encode_text("i64.const 128 call 3"), [0x42, 0x80, 0x01, 0x10, 0x03]);
        assert_eq!(encode_text("br_table 0 1 2"), [0x0e, 0x02, 0x00, 0x01, 0x02]);
        assert_eq!(encode_text("block end"), [0x02, 0x40, 0x0b]);
        assert_eq!(encode_text("f64.const 1"), [0x44, 0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
    }

    #[test]
    fn unknown_instruction() {
        let mut out = ByteBuffer::new();
        let bogus = Instruction::new("frobnicate", Some(Qualifier::I32), None);
        assert_eq!(
            encode_instruction(&mut out, &bogus),
            Err(EncodeError::UnknownInstruction {
                name: "i32.frobnicate".to_string()
            })
        );
    }

    #[test]
    fn immediate_shape_must_match_opcode() {
        let mut out = ByteBuffer::new();
        let call = Instruction::new("call", None, Some(Immediate::Varint64(1)));
        assert_eq!(
            encode_instruction(&mut out, &call),
            Err(EncodeError::MalformedImmediate {
                name: "call".to_string(),
                expected: "varuint32"
            })
        );
        let drop = Instruction::new("drop", None, Some(Immediate::Varuint32(0)));
        assert_eq!(
            encode_instruction(&mut out, &drop),
            Err(EncodeError::MalformedImmediate {
                name: "drop".to_string(),
                expected: "no"
            })
        );
    }
}
