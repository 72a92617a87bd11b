//! Tiny text assembler.
//!
//! Turns a space-separated string such as `"i64.const 7 call 3"` into
//! [`Instruction`]s using the same opcode and immediate tables as the codec.
//! It exists to build the metering call sequence; it is not a WAT parser
//! (no folded expressions, labels or symbolic indices).

use super::{lookup_mnemonic, ImmediateClass};
use crate::error::AssembleError;
use crate::ir::{Immediate, Instruction, Qualifier, ValType};
use std::iter::Peekable;
use std::str::{FromStr, SplitWhitespace};

type Tokens<'t> = Peekable<SplitWhitespace<'t>>;

/// Assembles `text` into a sequence of instructions.
pub fn assemble(text: &str) -> Result<Vec<Instruction>, AssembleError> {
    let mut tokens = text.split_whitespace().peekable();
    let mut out = Vec::new();
    while let Some(token) = tokens.next() {
        out.push(assemble_one(token, &mut tokens)?);
    }
    Ok(out)
}

fn assemble_one(mnemonic: &str, tokens: &mut Tokens<'_>) -> Result<Instruction, AssembleError> {
    let (qualifier, name) = match mnemonic.split_once('.') {
        Some((prefix, name)) => {
            let qualifier = Qualifier::from_name(prefix)
                .ok_or_else(|| AssembleError::UnknownMnemonic(mnemonic.to_string()))?;
            (Some(qualifier), name)
        }
        None => (None, mnemonic),
    };
    let op = lookup_mnemonic(qualifier, name)
        .ok_or_else(|| AssembleError::UnknownMnemonic(mnemonic.to_string()))?;

    let immediate = match op.immediate_class() {
        None => None,
        Some(class) => Some(operand(class, mnemonic, tokens)?),
    };
    Ok(Instruction::new(op.name, op.qualifier, immediate))
}

fn operand(
    class: ImmediateClass,
    mnemonic: &str,
    tokens: &mut Tokens<'_>,
) -> Result<Immediate, AssembleError> {
    Ok(match class {
        ImmediateClass::Varuint1 => Immediate::Varuint1(number(mnemonic, tokens)?),
        ImmediateClass::Varuint32 => Immediate::Varuint32(number(mnemonic, tokens)?),
        ImmediateClass::Varint32 => Immediate::Varint32(number(mnemonic, tokens)?),
        ImmediateClass::Varint64 => Immediate::Varint64(number(mnemonic, tokens)?),
        ImmediateClass::Raw4 => Immediate::Raw4(number::<f32>(mnemonic, tokens)?.to_le_bytes()),
        ImmediateClass::Raw8 => Immediate::Raw8(number::<f64>(mnemonic, tokens)?.to_le_bytes()),
        ImmediateClass::BlockType => {
            // the result type is optional; a bare `block` is the empty type
            let ty = tokens.peek().and_then(|t| ValType::from_name(t));
            if ty.is_some() {
                tokens.next();
            }
            Immediate::BlockType(ty.unwrap_or(ValType::Empty))
        }
        ImmediateClass::BranchTable => {
            let mut labels: Vec<u32> = Vec::new();
            while let Some(label) = tokens.peek().and_then(|t| t.parse().ok()) {
                labels.push(label);
                tokens.next();
            }
            let default = labels.pop().ok_or_else(|| AssembleError::MissingOperand {
                mnemonic: mnemonic.to_string(),
            })?;
            Immediate::BranchTable {
                targets: labels,
                default,
            }
        }
        ImmediateClass::CallIndirect => Immediate::CallIndirect {
            type_index: number(mnemonic, tokens)?,
            reserved: 0,
        },
        ImmediateClass::MemoryImmediate => Immediate::MemoryImmediate {
            flags: number(mnemonic, tokens)?,
            offset: number(mnemonic, tokens)?,
        },
    })
}

fn number<T: FromStr>(mnemonic: &str, tokens: &mut Tokens<'_>) -> Result<T, AssembleError> {
    let token = tokens.next().ok_or_else(|| AssembleError::MissingOperand {
        mnemonic: mnemonic.to_string(),
    })?;
    token.parse().map_err(|_| AssembleError::InvalidOperand {
        mnemonic: mnemonic.to_string(),
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_then_plain() {
        let ops = assemble("i32.const 32 drop").unwrap();
        assert_eq!(ops, vec![Instruction::i32_const(32), Instruction::plain("drop")]);
    }

    #[test]
    fn metering_sequence() {
        let ops = assemble("i64.const 7 call 3").unwrap();
        assert_eq!(ops, vec![Instruction::i64_const(7), Instruction::call(3)]);
    }

    #[test]
    fn branch_table_takes_every_label() {
        let ops = assemble("br_table 0 1 2 3 i64.const 24").unwrap();
        assert_eq!(
            ops[0].immediate,
            Some(Immediate::BranchTable {
                targets: vec![0, 1, 2],
                default: 3
            })
        );
        assert_eq!(ops[1], Instruction::i64_const(24));
    }

    #[test]
    fn call_indirect_and_memory_immediates() {
        let ops = assemble("call_indirect 1 i32.load 0 1").unwrap();
        assert_eq!(
            ops[0].immediate,
            Some(Immediate::CallIndirect {
                type_index: 1,
                reserved: 0
            })
        );
        assert_eq!(ops[1].qualifier, Some(Qualifier::I32));
        assert_eq!(
            ops[1].immediate,
            Some(Immediate::MemoryImmediate { flags: 0, offset: 1 })
        );
    }

    #[test]
    fn float_constants_are_raw_little_endian() {
        let ops = assemble("f32.const 1.5 f64.const 2").unwrap();
        assert_eq!(ops[0].immediate, Some(Immediate::Raw4(1.5f32.to_le_bytes())));
        assert_eq!(ops[1].immediate, Some(Immediate::Raw8(2.0f64.to_le_bytes())));
    }

    #[test]
    fn block_type_is_optional() {
        let ops = assemble("block i32 end loop end").unwrap();
        assert_eq!(ops[0].immediate, Some(Immediate::BlockType(ValType::I32)));
        assert_eq!(ops[2].immediate, Some(Immediate::BlockType(ValType::Empty)));
    }

    #[test]
    fn errors_name_the_offending_token() {
        assert_eq!(
            assemble("i32.frobnicate"),
            Err(AssembleError::UnknownMnemonic("i32.frobnicate".to_string()))
        );
        assert_eq!(
            assemble("call"),
            Err(AssembleError::MissingOperand {
                mnemonic: "call".to_string()
            })
        );
        assert_eq!(
            assemble("i32.const x"),
            Err(AssembleError::InvalidOperand {
                mnemonic: "i32.const".to_string(),
                token: "x".to_string()
            })
        );
    }
}
