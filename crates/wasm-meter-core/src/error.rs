//! Error types for the codec and the metering pass.
//!
//! Every variant carries enough context (byte offset, section name or
//! function index) to localize the fault. All errors abort the whole
//! operation; there is no partial result.

use crate::metering::RegisterType;
use thiserror::Error;

/// Errors produced while decoding a binary module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated input at byte {offset}: needed {needed} more byte(s)")]
    TruncatedInput { offset: usize, needed: usize },

    #[error("{section} section declares {declared} byte(s) but its decoder consumed {consumed}")]
    UnexpectedEof {
        section: &'static str,
        declared: usize,
        consumed: usize,
    },

    #[error("unknown opcode 0x{opcode:02x} at byte {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("unknown section id {id} at byte {offset}")]
    UnknownSection { id: u8, offset: usize },

    #[error("invalid value type 0x{byte:02x} at byte {offset}")]
    InvalidValueType { byte: u8, offset: usize },

    #[error("invalid external kind 0x{byte:02x} at byte {offset}")]
    InvalidExternalKind { byte: u8, offset: usize },

    #[error("unsupported limits flags {flags} at byte {offset}")]
    InvalidLimits { flags: u32, offset: usize },

    #[error("invalid global mutability 0x{byte:02x} at byte {offset}")]
    InvalidMutability { byte: u8, offset: usize },

    #[error("initializer expression at byte {offset} is not terminated by `end`")]
    MalformedInitExpr { offset: usize },

    #[error("LEB128 value at byte {offset} overflows its target width")]
    VarintOverflow { offset: usize },

    #[error("invalid UTF-8 string at byte {offset}")]
    InvalidUtf8 { offset: usize },
}

/// Errors produced while encoding a module IR.
///
/// These indicate an IR that was constructed by hand and does not
/// correspond to anything the opcode table knows about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("no opcode for instruction `{name}`")]
    UnknownInstruction { name: String },

    #[error("instruction `{name}` expects a {expected} immediate")]
    MalformedImmediate { name: String, expected: &'static str },

    #[error("{what} length {len} does not fit in a u32")]
    LengthOverflow { what: &'static str, len: usize },
}

/// Errors produced by the text assembler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),

    #[error("`{mnemonic}` is missing an operand")]
    MissingOperand { mnemonic: String },

    #[error("`{mnemonic}` has an invalid operand `{token}`")]
    InvalidOperand { mnemonic: String, token: String },
}

/// Errors produced by the metering pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeteringError {
    #[error("module already imports {module}.{field}; metering twice is not allowed")]
    ConflictingImport { module: String, field: String },

    #[error("function {function} ends without a branch-class instruction")]
    MissingTerminator { function: u32 },

    #[error("{functions} function declaration(s) but {bodies} code bodies")]
    FunctionCodeMismatch { functions: usize, bodies: usize },

    #[error("module has more than one {section} section")]
    DuplicateSection { section: &'static str },

    #[error("function {function} references unknown type index {type_index}")]
    UnknownType { function: u32, type_index: u32 },

    #[error("segment cost {cost} cannot be represented as an {register} constant")]
    CostOverflow { cost: u64, register: RegisterType },

    #[error("failed to assemble metering call: {0}")]
    Assemble(#[from] AssembleError),
}
