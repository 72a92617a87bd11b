//! Shared fixtures and helpers for the end-to-end tests and benchmarks.
//!
//! Metered output is checked against `wasmparser`, an independent reader,
//! so the tests do not just compare the codec with itself.

use anyhow::{Context, Result};
use wasm_meter_core::CostModel;
use wasmparser::{ElementItems, ExternalKind, KnownCustom, Name, Operator, Parser, Payload, TypeRef};

/// WAT fixtures.
pub mod fixtures {
    /// Recursive factorial with an `if`/`else`.
    pub const FACTORIAL: &str = r#"
        (module
            (func $fac (export "fac") (param $n i64) (result i64)
                local.get $n
                i64.eqz
                if (result i64)
                    i64.const 1
                else
                    local.get $n
                    local.get $n
                    i64.const 1
                    i64.sub
                    call $fac
                    i64.mul
                end)
        )
    "#;

    /// Every kind of function-space reference: imports, exports, a table
    /// with elements, a start function and direct calls on both sides of
    /// the insertion point.
    pub const REFERENCES: &str = r#"
        (module
            (import "env" "print" (func $print (param i32)))
            (import "env" "memory" (memory 1))
            (import "env" "abort" (func $abort))
            (type $unary (func (param i32) (result i32)))
            (table 4 funcref)
            (elem (i32.const 0) $double $print $square $abort)
            (global $counter (mut i32) (i32.const 0))
            (func $double (type $unary)
                local.get 0
                i32.const 2
                i32.mul)
            (func $square (type $unary) (local $tmp i32)
                local.get 0
                local.tee $tmp
                local.get $tmp
                i32.mul)
            (func $main (export "main") (param i32) (result i32)
                local.get 0
                call $print
                local.get 0
                call $double
                call $square
                i32.const 1
                call_indirect (type $unary))
            (func $init
                global.get $counter
                i32.const 1
                i32.add
                global.set $counter
                call $abort)
            (start $init)
            (export "double" (func $double))
            (export "mem" (memory 0))
        )
    "#;

    /// Loops, nested blocks, `br_table`, memory access and growth.
    pub const CONTROL: &str = r#"
        (module
            (memory 1 4)
            (data (i32.const 0) "\01\02\03\04")
            (func $sum (export "sum") (param $len i32) (result i32)
                (local $i i32) (local $acc i32)
                block $done
                    loop $next
                        local.get $i
                        local.get $len
                        i32.ge_u
                        br_if $done
                        local.get $acc
                        local.get $i
                        i32.load8_u
                        i32.add
                        local.set $acc
                        local.get $i
                        i32.const 1
                        i32.add
                        local.set $i
                        br $next
                    end
                end
                local.get $acc)
            (func $dispatch (export "dispatch") (param i32) (result i32)
                block
                    block
                        local.get 0
                        br_table 0 1 1
                    end
                    i32.const 10
                    return
                end
                i32.const 1
                memory.grow
                drop
                f64.const 1.5
                f64.sqrt
                drop
                i32.const 20)
        )
    "#;

    /// Cost table under which every instruction costs one unit and nothing
    /// else is charged.
    pub const UNIT_COSTS: &str = r#"{ "code": { "code": { "DEFAULT": 1 } } }"#;
}

/// Compiles WAT text to a binary.
pub fn wasm(wat: &str) -> Result<Vec<u8>> {
    wat::parse_str(wat).context("invalid WAT fixture")
}

/// Validates a binary with `wasmparser`.
pub fn validate(wasm: &[u8]) -> Result<()> {
    wasmparser::Validator::new()
        .validate_all(wasm)
        .context("module failed validation")?;
    Ok(())
}

pub fn cost_model(json: &str) -> Result<CostModel> {
    serde_json::from_str(json).context("invalid cost table")
}

/// Function-space references read back with `wasmparser`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionReferences {
    pub imported_functions: u32,
    /// `(module, field)` of each function import, in order
    pub function_imports: Vec<(String, String)>,
    pub exports: Vec<(String, u32)>,
    pub elements: Vec<u32>,
    pub start: Option<u32>,
    /// Direct call targets per defined function, in body order
    pub calls: Vec<Vec<u32>>,
    pub function_names: Vec<(u32, String)>,
}

impl FunctionReferences {
    /// Every reference except names, flattened.
    pub fn all(&self) -> Vec<u32> {
        let mut all: Vec<u32> = self.exports.iter().map(|(_, index)| *index).collect();
        all.extend(&self.elements);
        all.extend(self.start);
        all.extend(self.calls.iter().flatten());
        all
    }
}

/// Reads every function-space reference out of `wasm`.
pub fn function_references(wasm: &[u8]) -> Result<FunctionReferences> {
    let mut refs = FunctionReferences::default();

    for payload in Parser::new(0).parse_all(wasm) {
        let payload = payload.context("parsing wasm payload")?;
        match payload {
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.context("reading import")?;
                    if let TypeRef::Func(_) = import.ty {
                        refs.imported_functions += 1;
                        refs.function_imports
                            .push((import.module.to_string(), import.name.to_string()));
                    }
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.context("reading export")?;
                    if export.kind == ExternalKind::Func {
                        refs.exports.push((export.name.to_string(), export.index));
                    }
                }
            }
            Payload::ElementSection(reader) => {
                for element in reader {
                    let element = element.context("reading element segment")?;
                    if let ElementItems::Functions(funcs) = element.items {
                        for func in funcs {
                            refs.elements.push(func.context("reading element func index")?);
                        }
                    }
                }
            }
            Payload::StartSection { func, .. } => refs.start = Some(func),
            Payload::CodeSectionEntry(body) => {
                let mut calls = Vec::new();
                let mut reader = body
                    .get_operators_reader()
                    .context("getting operators reader")?;
                while !reader.eof() {
                    let operator = reader.read().context("reading operator")?;
                    if let Operator::Call { function_index } = operator {
                        calls.push(function_index);
                    }
                }
                refs.calls.push(calls);
            }
            Payload::CustomSection(reader) => {
                if let KnownCustom::Name(names) = reader.as_known() {
                    for name in names {
                        if let Name::Function(map) = name.context("reading name subsection")? {
                            for naming in map {
                                let naming = naming.context("reading function name")?;
                                refs.function_names.push((naming.index, naming.name.to_string()));
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    Ok(refs)
}
