//! Module intermediate representation.
//!
//! The decoder produces this IR from bytes, the metering pass rewrites it,
//! and the encoder serializes it back. It mirrors the binary layout closely
//! enough that an unmodified IR re-encodes to the original bytes.

mod instruction;
mod types;

pub use instruction::{Immediate, Instruction, Qualifier};
pub use types::*;
