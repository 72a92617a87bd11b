//! Instructions and their immediates.

use super::types::ValType;
use std::fmt;

/// The namespace written before the dot of a qualified mnemonic,
/// e.g. the `i64` of `i64.const` or the `local` of `local.get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    I32,
    I64,
    F32,
    F64,
    Local,
    Global,
}

impl Qualifier {
    pub fn name(self) -> &'static str {
        match self {
            Qualifier::I32 => "i32",
            Qualifier::I64 => "i64",
            Qualifier::F32 => "f32",
            Qualifier::F64 => "f64",
            Qualifier::Local => "local",
            Qualifier::Global => "global",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i32" => Qualifier::I32,
            "i64" => Qualifier::I64,
            "f32" => Qualifier::F32,
            "f64" => Qualifier::F64,
            "local" => Qualifier::Local,
            "global" => Qualifier::Global,
            _ => return None,
        })
    }

    /// The numeric qualifier naming `ty`, if it is a value type.
    pub fn from_val_type(ty: ValType) -> Option<Self> {
        match ty {
            ValType::I32 => Some(Qualifier::I32),
            ValType::I64 => Some(Qualifier::I64),
            ValType::F32 => Some(Qualifier::F32),
            ValType::F64 => Some(Qualifier::F64),
            _ => None,
        }
    }

    /// The value type named by a numeric qualifier.
    pub fn val_type(self) -> Option<ValType> {
        match self {
            Qualifier::I32 => Some(ValType::I32),
            Qualifier::I64 => Some(ValType::I64),
            Qualifier::F32 => Some(ValType::F32),
            Qualifier::F64 => Some(ValType::F64),
            Qualifier::Local | Qualifier::Global => None,
        }
    }
}

/// Operand data following an opcode byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Immediate {
    /// Single raw byte (`memory.size` / `memory.grow` reserved index).
    Varuint1(u8),
    Varuint32(u32),
    Varint32(i32),
    Varint64(i64),
    /// Little-endian bits of an `f32.const`.
    Raw4([u8; 4]),
    /// Little-endian bits of an `f64.const`.
    Raw8([u8; 8]),
    BlockType(ValType),
    BranchTable { targets: Vec<u32>, default: u32 },
    CallIndirect { type_index: u32, reserved: u8 },
    MemoryImmediate { flags: u32, offset: u32 },
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Varuint1(v) => write!(f, "{v}"),
            Immediate::Varuint32(v) => write!(f, "{v}"),
            Immediate::Varint32(v) => write!(f, "{v}"),
            Immediate::Varint64(v) => write!(f, "{v}"),
            Immediate::Raw4(bytes) => write!(f, "{}", f32::from_le_bytes(*bytes)),
            Immediate::Raw8(bytes) => write!(f, "{}", f64::from_le_bytes(*bytes)),
            Immediate::BlockType(ty) => write!(f, "{ty}"),
            Immediate::BranchTable { targets, default } => {
                for target in targets {
                    write!(f, "{target} ")?;
                }
                write!(f, "{default}")
            }
            Immediate::CallIndirect { type_index, .. } => write!(f, "{type_index}"),
            Immediate::MemoryImmediate { flags, offset } => write!(f, "{flags} {offset}"),
        }
    }
}

/// One decoded instruction.
///
/// `name` is the base mnemonic without its qualifier (`add`, `const`, `get`);
/// it is also the key under which the cost model prices the instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub name: &'static str,
    pub qualifier: Option<Qualifier>,
    pub immediate: Option<Immediate>,
}

impl Instruction {
    pub fn new(
        name: &'static str,
        qualifier: Option<Qualifier>,
        immediate: Option<Immediate>,
    ) -> Self {
        Self {
            name,
            qualifier,
            immediate,
        }
    }

    /// An unqualified instruction without immediates, e.g. `end` or `drop`.
    pub fn plain(name: &'static str) -> Self {
        Self::new(name, None, None)
    }

    pub fn end() -> Self {
        Self::plain("end")
    }

    pub fn call(function_index: u32) -> Self {
        Self::new("call", None, Some(Immediate::Varuint32(function_index)))
    }

    pub fn i32_const(value: i32) -> Self {
        Self::new("const", Some(Qualifier::I32), Some(Immediate::Varint32(value)))
    }

    pub fn i64_const(value: i64) -> Self {
        Self::new("const", Some(Qualifier::I64), Some(Immediate::Varint64(value)))
    }

    /// Target of a direct `call`, if this is one.
    pub fn call_target(&self) -> Option<u32> {
        match (self.name, &self.immediate) {
            ("call", Some(Immediate::Varuint32(index))) => Some(*index),
            _ => None,
        }
    }

    /// Fully qualified mnemonic, e.g. `i32.add`.
    pub fn mnemonic(&self) -> String {
        match self.qualifier {
            Some(q) => format!("{}.{}", q.name(), self.name),
            None => self.name.to_string(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(q) = self.qualifier {
            write!(f, "{}.", q.name())?;
        }
        f.write_str(self.name)?;
        if let Some(imm) = &self.immediate {
            write!(f, " {imm}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_text_syntax() {
        assert_eq!(Instruction::i64_const(-7).to_string(), "i64.const -7");
        assert_eq!(Instruction::call(3).to_string(), "call 3");
        assert_eq!(Instruction::end().to_string(), "end");
        let load = Instruction::new(
            "load",
            Some(Qualifier::I32),
            Some(Immediate::MemoryImmediate { flags: 2, offset: 8 }),
        );
        assert_eq!(load.to_string(), "i32.load 2 8");
    }

    #[test]
    fn call_target_only_for_direct_calls() {
        assert_eq!(Instruction::call(9).call_target(), Some(9));
        let indirect = Instruction::new(
            "call_indirect",
            None,
            Some(Immediate::CallIndirect {
                type_index: 9,
                reserved: 0,
            }),
        );
        assert_eq!(indirect.call_target(), None);
    }
}
