//! Instruction decoding: one opcode byte, then the immediate its class
//! prescribes.

use super::read_val_type;
use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::ir::{Immediate, Instruction};
use crate::opcode::{lookup_opcode, ImmediateClass};

pub(crate) fn decode_instruction(cursor: &mut ByteCursor<'_>) -> Result<Instruction, DecodeError> {
    let offset = cursor.offset();
    let opcode = cursor.read_byte()?;
    let op = lookup_opcode(opcode).ok_or(DecodeError::UnknownOpcode { opcode, offset })?;
    let immediate = match op.immediate_class() {
        Some(class) => Some(decode_immediate(class, cursor)?),
        None => None,
    };
    Ok(Instruction::new(op.name, op.qualifier, immediate))
}

fn decode_immediate(
    class: ImmediateClass,
    cursor: &mut ByteCursor<'_>,
) -> Result<Immediate, DecodeError> {
    Ok(match class {
        ImmediateClass::Varuint1 => Immediate::Varuint1(cursor.read_byte()?),
        ImmediateClass::Varuint32 => Immediate::Varuint32(cursor.read_var_u32()?),
        ImmediateClass::Varint32 => Immediate::Varint32(cursor.read_var_i32()?),
        ImmediateClass::Varint64 => Immediate::Varint64(cursor.read_var_i64()?),
        ImmediateClass::Raw4 => Immediate::Raw4(cursor.read_array()?),
        ImmediateClass::Raw8 => Immediate::Raw8(cursor.read_array()?),
        ImmediateClass::BlockType => Immediate::BlockType(read_val_type(cursor)?),
        ImmediateClass::BranchTable => {
            let count = cursor.read_var_u32()? as usize;
            let mut targets = Vec::with_capacity(count.min(cursor.remaining()));
            for _ in 0..count {
                targets.push(cursor.read_var_u32()?);
            }
            let default = cursor.read_var_u32()?;
            Immediate::BranchTable { targets, default }
        }
        ImmediateClass::CallIndirect => Immediate::CallIndirect {
            type_index: cursor.read_var_u32()?,
            reserved: cursor.read_byte()?,
        },
        ImmediateClass::MemoryImmediate => Immediate::MemoryImmediate {
            flags: cursor.read_var_u32()?,
            offset: cursor.read_var_u32()?,
        },
    })
}
