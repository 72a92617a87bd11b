//! Static opcode table and immediate classes.
//!
//! Every MVP instruction is listed once, as `opcode => [qualifier] name`.
//! The [`opcode_table!`] macro expands that list into two `match`-based
//! lookups (byte → mnemonic and mnemonic → byte) plus a slice of all
//! entries, so the table is a single source of truth for the decoder, the
//! encoder and the assembler.

pub mod asm;

use crate::ir::Qualifier;

/// How the bytes following an opcode are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateClass {
    BlockType,
    Varuint1,
    Varuint32,
    Varint32,
    Varint64,
    Raw4,
    Raw8,
    MemoryImmediate,
    BranchTable,
    CallIndirect,
}

impl ImmediateClass {
    pub fn name(self) -> &'static str {
        match self {
            ImmediateClass::BlockType => "block_type",
            ImmediateClass::Varuint1 => "varuint1",
            ImmediateClass::Varuint32 => "varuint32",
            ImmediateClass::Varint32 => "varint32",
            ImmediateClass::Varint64 => "varint64",
            ImmediateClass::Raw4 => "uint32",
            ImmediateClass::Raw8 => "uint64",
            ImmediateClass::MemoryImmediate => "memory_immediate",
            ImmediateClass::BranchTable => "br_table",
            ImmediateClass::CallIndirect => "call_indirect",
        }
    }
}

/// One row of the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub opcode: u8,
    pub qualifier: Option<Qualifier>,
    pub name: &'static str,
}

impl OpInfo {
    pub fn immediate_class(&self) -> Option<ImmediateClass> {
        immediate_class(self.qualifier, self.name)
    }
}

macro_rules! qualifier {
    () => {
        None
    };
    ($q:ident) => {
        Some(Qualifier::$q)
    };
}

macro_rules! opcode_table {
    ($($byte:literal => [$($q:ident)?] $name:literal,)*) => {
        /// Every instruction this codec understands, in opcode order.
        pub const ALL_OPS: &[OpInfo] = &[
            $(OpInfo { opcode: $byte, qualifier: qualifier!($($q)?), name: $name },)*
        ];

        /// Looks up the instruction encoded by `byte`.
        pub fn lookup_opcode(byte: u8) -> Option<OpInfo> {
            match byte {
                $($byte => Some(OpInfo {
                    opcode: $byte,
                    qualifier: qualifier!($($q)?),
                    name: $name,
                }),)*
                _ => None,
            }
        }

        /// Looks up an instruction by qualifier and base name.
        pub fn lookup_mnemonic(qualifier: Option<Qualifier>, name: &str) -> Option<OpInfo> {
            match (qualifier, name) {
                $((qualifier!($($q)?), $name) => Some(OpInfo {
                    opcode: $byte,
                    qualifier: qualifier!($($q)?),
                    name: $name,
                }),)*
                _ => None,
            }
        }
    };
}

opcode_table! {
    0x00 => [] "unreachable",
    0x01 => [] "nop",
    0x02 => [] "block",
    0x03 => [] "loop",
    0x04 => [] "if",
    0x05 => [] "else",
    0x0b => [] "end",
    0x0c => [] "br",
    0x0d => [] "br_if",
    0x0e => [] "br_table",
    0x0f => [] "return",
    0x10 => [] "call",
    0x11 => [] "call_indirect",
    0x1a => [] "drop",
    0x1b => [] "select",
    0x20 => [Local] "get",
    0x21 => [Local] "set",
    0x22 => [Local] "tee",
    0x23 => [Global] "get",
    0x24 => [Global] "set",
    0x28 => [I32] "load",
    0x29 => [I64] "load",
    0x2a => [F32] "load",
    0x2b => [F64] "load",
    0x2c => [I32] "load8_s",
    0x2d => [I32] "load8_u",
    0x2e => [I32] "load16_s",
    0x2f => [I32] "load16_u",
    0x30 => [I64] "load8_s",
    0x31 => [I64] "load8_u",
    0x32 => [I64] "load16_s",
    0x33 => [I64] "load16_u",
    0x34 => [I64] "load32_s",
    0x35 => [I64] "load32_u",
    0x36 => [I32] "store",
    0x37 => [I64] "store",
    0x38 => [F32] "store",
    0x39 => [F64] "store",
    0x3a => [I32] "store8",
    0x3b => [I32] "store16",
    0x3c => [I64] "store8",
    0x3d => [I64] "store16",
    0x3e => [I64] "store32",
    0x3f => [] "current_memory",
    0x40 => [] "grow_memory",
    0x41 => [I32] "const",
    0x42 => [I64] "const",
    0x43 => [F32] "const",
    0x44 => [F64] "const",
    0x45 => [I32] "eqz",
    0x46 => [I32] "eq",
    0x47 => [I32] "ne",
    0x48 => [I32] "lt_s",
    0x49 => [I32] "lt_u",
    0x4a => [I32] "gt_s",
    0x4b => [I32] "gt_u",
    0x4c => [I32] "le_s",
    0x4d => [I32] "le_u",
    0x4e => [I32] "ge_s",
    0x4f => [I32] "ge_u",
    0x50 => [I64] "eqz",
    0x51 => [I64] "eq",
    0x52 => [I64] "ne",
    0x53 => [I64] "lt_s",
    0x54 => [I64] "lt_u",
    0x55 => [I64] "gt_s",
    0x56 => [I64] "gt_u",
    0x57 => [I64] "le_s",
    0x58 => [I64] "le_u",
    0x59 => [I64] "ge_s",
    0x5a => [I64] "ge_u",
    0x5b => [F32] "eq",
    0x5c => [F32] "ne",
    0x5d => [F32] "lt",
    0x5e => [F32] "gt",
    0x5f => [F32] "le",
    0x60 => [F32] "ge",
    0x61 => [F64] "eq",
    0x62 => [F64] "ne",
    0x63 => [F64] "lt",
    0x64 => [F64] "gt",
    0x65 => [F64] "le",
    0x66 => [F64] "ge",
    0x67 => [I32] "clz",
    0x68 => [I32] "ctz",
    0x69 => [I32] "popcnt",
    0x6a => [I32] "add",
    0x6b => [I32] "sub",
    0x6c => [I32] "mul",
    0x6d => [I32] "div_s",
    0x6e => [I32] "div_u",
    0x6f => [I32] "rem_s",
    0x70 => [I32] "rem_u",
    0x71 => [I32] "and",
    0x72 => [I32] "or",
    0x73 => [I32] "xor",
    0x74 => [I32] "shl",
    0x75 => [I32] "shr_s",
    0x76 => [I32] "shr_u",
    0x77 => [I32] "rotl",
    0x78 => [I32] "rotr",
    0x79 => [I64] "clz",
    0x7a => [I64] "ctz",
    0x7b => [I64] "popcnt",
    0x7c => [I64] "add",
    0x7d => [I64] "sub",
    0x7e => [I64] "mul",
    0x7f => [I64] "div_s",
    0x80 => [I64] "div_u",
    0x81 => [I64] "rem_s",
    0x82 => [I64] "rem_u",
    0x83 => [I64] "and",
    0x84 => [I64] "or",
    0x85 => [I64] "xor",
    0x86 => [I64] "shl",
    0x87 => [I64] "shr_s",
    0x88 => [I64] "shr_u",
    0x89 => [I64] "rotl",
    0x8a => [I64] "rotr",
    0x8b => [F32] "abs",
    0x8c => [F32] "neg",
    0x8d => [F32] "ceil",
    0x8e => [F32] "floor",
    0x8f => [F32] "trunc",
    0x90 => [F32] "nearest",
    0x91 => [F32] "sqrt",
    0x92 => [F32] "add",
    0x93 => [F32] "sub",
    0x94 => [F32] "mul",
    0x95 => [F32] "div",
    0x96 => [F32] "min",
    0x97 => [F32] "max",
    0x98 => [F32] "copysign",
    0x99 => [F64] "abs",
    0x9a => [F64] "neg",
    0x9b => [F64] "ceil",
    0x9c => [F64] "floor",
    0x9d => [F64] "trunc",
    0x9e => [F64] "nearest",
    0x9f => [F64] "sqrt",
    0xa0 => [F64] "add",
    0xa1 => [F64] "sub",
    0xa2 => [F64] "mul",
    0xa3 => [F64] "div",
    0xa4 => [F64] "min",
    0xa5 => [F64] "max",
    0xa6 => [F64] "copysign",
    0xa7 => [I32] "wrap_i64",
    0xa8 => [I32] "trunc_f32_s",
    0xa9 => [I32] "trunc_f32_u",
    0xaa => [I32] "trunc_f64_s",
    0xab => [I32] "trunc_f64_u",
    0xac => [I64] "extend_i32_s",
    0xad => [I64] "extend_i32_u",
    0xae => [I64] "trunc_f32_s",
    0xaf => [I64] "trunc_f32_u",
    0xb0 => [I64] "trunc_f64_s",
    0xb1 => [I64] "trunc_f64_u",
    0xb2 => [F32] "convert_i32_s",
    0xb3 => [F32] "convert_i32_u",
    0xb4 => [F32] "convert_i64_s",
    0xb5 => [F32] "convert_i64_u",
    0xb6 => [F32] "demote_f64",
    0xb7 => [F64] "convert_i32_s",
    0xb8 => [F64] "convert_i32_u",
    0xb9 => [F64] "convert_i64_s",
    0xba => [F64] "convert_i64_u",
    0xbb => [F64] "promote_f32",
    0xbc => [I32] "reinterpret_f32",
    0xbd => [I64] "reinterpret_f64",
    0xbe => [F32] "reinterpret_i32",
    0xbf => [F64] "reinterpret_i64",
}

/// Immediate layout for an instruction, keyed by base name, or by the
/// qualifier for `const`.
pub fn immediate_class(qualifier: Option<Qualifier>, name: &str) -> Option<ImmediateClass> {
    match name {
        "block" | "loop" | "if" => Some(ImmediateClass::BlockType),
        "br" | "br_if" | "call" | "get" | "set" | "tee" => Some(ImmediateClass::Varuint32),
        "br_table" => Some(ImmediateClass::BranchTable),
        "call_indirect" => Some(ImmediateClass::CallIndirect),
        "load" | "load8_s" | "load8_u" | "load16_s" | "load16_u" | "load32_s" | "load32_u"
        | "store" | "store8" | "store16" | "store32" => Some(ImmediateClass::MemoryImmediate),
        "current_memory" | "grow_memory" => Some(ImmediateClass::Varuint1),
        "const" => match qualifier {
            Some(Qualifier::I32) => Some(ImmediateClass::Varint32),
            Some(Qualifier::I64) => Some(ImmediateClass::Varint64),
            Some(Qualifier::F32) => Some(ImmediateClass::Raw4),
            Some(Qualifier::F64) => Some(ImmediateClass::Raw8),
            _ => None,
        },
        _ => None,
    }
}
