//! wasm-meter: inject gas metering into WebAssembly modules.
//!
//! This crate wires the core codec and metering pass to the outside world:
//! it loads cost tables from JSON, ships a default table, and runs the
//! decode → instrument → encode pipeline in one call.

pub use anyhow::{Context, Result};
pub use wasm_meter_core::{CostModel, MeteringOptions, RegisterType};

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use wasm_meter_core::ir::{CustomPayload, Section, SectionId};
use wasm_meter_core::{decode, encode, inject_metering};

/// The bundled cost table, used when no other table is given.
pub const DEFAULT_COST_TABLE: &str = include_str!("default_cost_table.json");

/// Configuration for [`meter_wasm`].
#[derive(Debug, Clone, Default)]
pub struct MeterOptions {
    /// Import location and register type of the metering function
    pub metering: MeteringOptions,
    /// Cost table; `None` selects [`DEFAULT_COST_TABLE`]
    pub cost_model: Option<CostModel>,
}

/// Parses a cost table from JSON text.
pub fn parse_cost_table(json: &str) -> Result<CostModel> {
    serde_json::from_str(json).context("invalid cost table")
}

/// Reads and parses a cost table file.
pub fn load_cost_table(path: &Path) -> Result<CostModel> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read cost table {}", path.display()))?;
    parse_cost_table(&json).with_context(|| format!("failed to load {}", path.display()))
}

/// The bundled default cost model.
pub fn default_cost_model() -> Result<CostModel> {
    parse_cost_table(DEFAULT_COST_TABLE).context("bundled cost table is malformed")
}

/// Meters a WebAssembly binary.
///
/// Returns the instrumented binary and the total gas cost injected across
/// all functions.
///
/// # Example
/// ```no_run
/// use wasm_meter::{meter_wasm, MeterOptions};
///
/// let wasm = std::fs::read("input.wasm").unwrap();
/// let (metered, gas) = meter_wasm(&wasm, &MeterOptions::default()).unwrap();
/// std::fs::write("metered.wasm", metered).unwrap();
/// println!("{gas}");
/// ```
pub fn meter_wasm(wasm: &[u8], options: &MeterOptions) -> Result<(Vec<u8>, u64)> {
    let module = decode(wasm).context("failed to decode WebAssembly module")?;
    log::debug!("decoded {} sections", module.sections.len());

    let costs = match &options.cost_model {
        Some(costs) => Cow::Borrowed(costs),
        None => Cow::Owned(default_cost_model()?),
    };
    let (metered, gas) = inject_metering(module, &costs, &options.metering)
        .context("failed to inject metering")?;

    let bytes = encode(&metered).context("failed to encode metered module")?;
    Ok((bytes, gas))
}

/// Decodes and re-encodes `wasm` without changing it.
pub fn roundtrip(wasm: &[u8]) -> Result<Vec<u8>> {
    let module = decode(wasm).context("failed to decode WebAssembly module")?;
    encode(&module).context("failed to re-encode module")
}

/// One line of `inspect` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSummary {
    pub id: SectionId,
    /// Name of a custom section
    pub name: Option<String>,
    pub entries: usize,
    pub structured: bool,
}

impl fmt::Display for SectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if self.structured => {
                write!(f, "{:<10} \"{}\" {} subsections", self.id, name, self.entries)
            }
            Some(name) => write!(f, "{:<10} \"{}\" {} bytes", self.id, name, self.entries),
            None => write!(f, "{:<10} {} entries", self.id, self.entries),
        }
    }
}

/// Lists the sections of `wasm` in wire order.
pub fn inspect(wasm: &[u8]) -> Result<Vec<SectionSummary>> {
    let module = decode(wasm).context("failed to decode WebAssembly module")?;
    Ok(module
        .sections
        .iter()
        .map(|section| {
            let (name, structured) = match section {
                Section::Custom(custom) => (
                    Some(custom.name.clone()),
                    matches!(custom.payload, CustomPayload::Names(_)),
                ),
                _ => (None, false),
            };
            SectionSummary {
                id: section.id(),
                name,
                entries: section.entry_count(),
                structured,
            }
        })
        .collect())
}
