//! Gas-metering injection.
//!
//! [`inject_metering`] adds an imported function `module.field(cost)` and
//! splits every function body into straight-line segments, each ending at
//! a branch-class instruction. A segment with nonzero cost is prefixed by
//!
//! ```text
//! <register>.const <cost>
//! call <metering function>
//! ```
//!
//! so the host is charged before the segment runs.

pub mod cost;
mod remap;

pub use cost::{CostModel, CostNode, CostTable, Field, Priced, DEFAULT_KEY};
pub use remap::shift_function_space;

use crate::error::MeteringError;
use crate::ir::*;
use crate::opcode::asm::assemble;
use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Value type of the cost argument passed to the metering function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RegisterType {
    I32,
    #[default]
    I64,
    F32,
    F64,
}

impl RegisterType {
    pub fn val_type(self) -> ValType {
        match self {
            RegisterType::I32 => ValType::I32,
            RegisterType::I64 => ValType::I64,
            RegisterType::F32 => ValType::F32,
            RegisterType::F64 => ValType::F64,
        }
    }

    pub fn name(self) -> &'static str {
        self.val_type().name()
    }

    /// Whether `cost` can be passed as a constant of this type. Floats
    /// accept any cost, rounding to the nearest representable value.
    fn holds(self, cost: u64) -> bool {
        match self {
            RegisterType::I32 => i32::try_from(cost).is_ok(),
            RegisterType::I64 => i64::try_from(cost).is_ok(),
            RegisterType::F32 | RegisterType::F64 => true,
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown register type `{0}` (expected i32, i64, f32 or f64)")]
pub struct ParseRegisterTypeError(String);

impl FromStr for RegisterType {
    type Err = ParseRegisterTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i32" => Ok(RegisterType::I32),
            "i64" => Ok(RegisterType::I64),
            "f32" => Ok(RegisterType::F32),
            "f64" => Ok(RegisterType::F64),
            _ => Err(ParseRegisterTypeError(s.to_string())),
        }
    }
}

/// Where the metering function is imported from and how it takes its
/// argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeteringOptions {
    pub module_name: String,
    pub field_name: String,
    pub register_type: RegisterType,
}

impl Default for MeteringOptions {
    fn default() -> Self {
        Self {
            module_name: "metering".to_string(),
            field_name: "usegas".to_string(),
            register_type: RegisterType::default(),
        }
    }
}

/// Instructions that end a straight-line segment.
const BRANCH_CLASS: [&str; 9] = [
    "grow_memory",
    "end",
    "br",
    "br_table",
    "br_if",
    "if",
    "else",
    "return",
    "loop",
];

pub fn is_branch_class(instruction: &Instruction) -> bool {
    BRANCH_CLASS.contains(&instruction.name)
}

/// Instruments every function body of `module` with calls to the metering
/// import and returns the new module with the total injected cost.
///
/// Fails without producing anything if the module already imports the
/// metering function or if any body runs out of instructions mid-segment.
pub fn inject_metering(
    module: Module,
    costs: &CostModel,
    options: &MeteringOptions,
) -> Result<(Module, u64), MeteringError> {
    let import_name = format!("{}.{}", options.module_name, options.field_name);
    if let Some(existing) = module.import_entries().and_then(|imports| {
        imports
            .iter()
            .find(|i| i.module == options.module_name && i.field == options.field_name)
    }) {
        return Err(MeteringError::ConflictingImport {
            module: existing.module.clone(),
            field: existing.field.clone(),
        });
    }

    let mut module = module;
    let insertion_index = module.imported_function_count();
    let type_index = append_type(
        &mut module,
        FuncSignature::new(vec![options.register_type.val_type()], vec![]),
    );
    append_import(
        &mut module,
        ImportEntry {
            module: options.module_name.clone(),
            field: options.field_name.clone(),
            descriptor: ImportDescriptor::Function(type_index),
        },
    );
    info!("metering import {import_name} at function index {insertion_index}, type {type_index}");

    let mut module = shift_function_space(module, insertion_index, &import_name);

    let meter = Meter::new(costs, options.register_type, insertion_index)?;
    let prologue_costs = function_prologue_costs(&module, costs, insertion_index + 1)?;

    let mut total: u64 = 0;
    for section in &mut module.sections {
        let Section::Code(bodies) = section else {
            continue;
        };
        // one code section whose length matches `prologue_costs`
        for (i, (body, &signature_cost)) in bodies.iter_mut().zip(&prologue_costs).enumerate() {
            let function = insertion_index + 1 + i as u32;
            let initial = signature_cost.saturating_add(costs.locals_cost(&body.locals));
            let instructions = std::mem::take(&mut body.instructions);
            let (metered, cost) = meter.meter_body(instructions, initial, function)?;
            body.instructions = metered;
            total = total.saturating_add(cost);
        }
    }

    info!("metering injected, total cost {total}");
    Ok((module, total))
}

/// Appends `signature` to the type section, creating the section at its
/// canonical position if the module has none.
fn append_type(module: &mut Module, signature: FuncSignature) -> u32 {
    for section in &mut module.sections {
        if let Section::Type(entries) = section {
            entries.push(signature);
            return entries.len() as u32 - 1;
        }
    }
    module.insert_section(Section::Type(vec![signature]));
    0
}

/// Appends `import`, creating the import section if needed.
fn append_import(module: &mut Module, import: ImportEntry) {
    for section in &mut module.sections {
        if let Section::Import(entries) = section {
            entries.push(import);
            return;
        }
    }
    module.insert_section(Section::Import(vec![import]));
}

/// Signature cost of each defined function, checking that the function
/// and code sections pair up.
fn function_prologue_costs(
    module: &Module,
    costs: &CostModel,
    first_defined: u32,
) -> Result<Vec<u64>, MeteringError> {
    for id in [SectionId::Function, SectionId::Code] {
        if module.sections.iter().filter(|section| section.id() == id).count() > 1 {
            return Err(MeteringError::DuplicateSection { section: id.name() });
        }
    }
    let functions = module.function_entries().map(Vec::as_slice).unwrap_or_default();
    let bodies = module.code_entries().map(Vec::len).unwrap_or(0);
    if bodies != functions.len() && module.has_section(SectionId::Code) {
        return Err(MeteringError::FunctionCodeMismatch {
            functions: functions.len(),
            bodies,
        });
    }
    let types = module.type_entries().map(Vec::as_slice).unwrap_or_default();
    functions
        .iter()
        .enumerate()
        .map(|(i, &type_index)| {
            types
                .get(type_index as usize)
                .map(|signature| costs.signature_cost(signature))
                .ok_or(MeteringError::UnknownType {
                    function: first_defined + i as u32,
                    type_index,
                })
        })
        .collect()
}

/// Per-pass state: where the metering function lives and what calling it
/// costs.
struct Meter<'a> {
    costs: &'a CostModel,
    register: RegisterType,
    function_index: u32,
    self_cost: u64,
}

impl<'a> Meter<'a> {
    fn new(
        costs: &'a CostModel,
        register: RegisterType,
        function_index: u32,
    ) -> Result<Self, MeteringError> {
        let sequence = assemble(&format!("{register}.const 0 call {function_index}"))?;
        let self_cost = sequence
            .iter()
            .map(|instruction| costs.instruction_cost(instruction))
            .fold(0, u64::saturating_add);
        debug!("metering call sequence costs {self_cost}");
        Ok(Self {
            costs,
            register,
            function_index,
            self_cost,
        })
    }

    fn metering_call(&self, cost: u64) -> Result<Vec<Instruction>, MeteringError> {
        if !self.register.holds(cost) {
            return Err(MeteringError::CostOverflow {
                cost,
                register: self.register,
            });
        }
        Ok(assemble(&format!(
            "{}.const {} call {}",
            self.register, cost, self.function_index
        ))?)
    }

    /// Meters one body. `initial` is charged to the first segment.
    fn meter_body(
        &self,
        instructions: Vec<Instruction>,
        initial: u64,
        function: u32,
    ) -> Result<(Vec<Instruction>, u64), MeteringError> {
        let mut metered = Vec::with_capacity(instructions.len() + 2);
        let mut segment = Vec::new();
        let mut cost = initial;
        let mut total: u64 = 0;
        let mut injected = 0usize;

        for instruction in instructions {
            cost = cost.saturating_add(self.costs.instruction_cost(&instruction));
            let ends_segment = is_branch_class(&instruction);
            segment.push(instruction);
            if !ends_segment {
                continue;
            }
            if cost != 0 {
                cost = cost.saturating_add(self.self_cost);
                metered.extend(self.metering_call(cost)?);
                injected += 1;
            }
            total = total.saturating_add(cost);
            metered.append(&mut segment);
            cost = 0;
        }

        if !segment.is_empty() {
            return Err(MeteringError::MissingTerminator { function });
        }
        debug!("function {function}: {injected} metering call(s), cost {total}");
        Ok((metered, total))
    }
}
