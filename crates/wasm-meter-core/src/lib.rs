//! wasm-meter-core: WebAssembly binary codec and gas-metering pass.
//!
//! The crate decodes an MVP WebAssembly binary into a typed [`Module`] IR,
//! encodes that IR back to bytes, and rewrites it to charge gas through an
//! imported metering function.
//!
//! ```
//! use wasm_meter_core::{decode, encode, inject_metering, CostModel, MeteringOptions};
//!
//! let wasm = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
//! let module = decode(&wasm).unwrap();
//! let (metered, gas) =
//!     inject_metering(module, &CostModel::default(), &MeteringOptions::default()).unwrap();
//! assert_eq!(gas, 0);
//! assert!(encode(&metered).unwrap().len() > wasm.len());
//! ```

pub mod cursor;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod ir;
pub mod leb128;
pub mod metering;
pub mod opcode;

pub use decoder::decode;
pub use encoder::encode;
pub use error::{AssembleError, DecodeError, EncodeError, MeteringError};
pub use ir::{Instruction, Module, Section, SectionId};
pub use metering::{inject_metering, CostModel, CostTable, MeteringOptions, RegisterType};
pub use opcode::asm::assemble;
