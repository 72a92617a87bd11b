//! End-to-end metering tests.
//!
//! These tests verify that:
//! 1. Metered modules still validate
//! 2. Every function-space reference is renumbered around the metering import
//! 3. The injected calls match the segment costs
//! 4. Instrumenting twice is refused

use anyhow::Result;
use wasm_meter::{meter_wasm, MeterOptions};
use wasm_meter_core::ir::{Immediate, Instruction};
use wasm_meter_core::metering::is_branch_class;
use wasm_meter_core::{
    decode, encode, inject_metering, MeteringError, MeteringOptions, RegisterType,
};
use wasm_meter_tests::{cost_model, fixtures, function_references, validate, wasm};

fn meter(bytes: &[u8], costs_json: &str, options: &MeteringOptions) -> Result<(Vec<u8>, u64)> {
    let module = decode(bytes)?;
    let (metered, gas) = inject_metering(module, &cost_model(costs_json)?, options)?;
    Ok((encode(&metered)?, gas))
}

// ── Validity ──

#[test]
fn test_metered_fixtures_validate() -> Result<()> {
    for fixture in [fixtures::FACTORIAL, fixtures::REFERENCES, fixtures::CONTROL] {
        let (metered, gas) = meter(
            &wasm(fixture)?,
            fixtures::UNIT_COSTS,
            &MeteringOptions::default(),
        )?;
        validate(&metered)?;
        assert!(gas > 0);
    }
    Ok(())
}

#[test]
fn test_every_register_type_validates() -> Result<()> {
    for register_type in [
        RegisterType::I32,
        RegisterType::I64,
        RegisterType::F32,
        RegisterType::F64,
    ] {
        let options = MeteringOptions {
            register_type,
            ..MeteringOptions::default()
        };
        let (metered, _) = meter(&wasm(fixtures::CONTROL)?, fixtures::UNIT_COSTS, &options)?;
        validate(&metered)?;
    }
    Ok(())
}

#[test]
fn test_default_cost_table_pipeline() -> Result<()> {
    let (metered, gas) = meter_wasm(&wasm(fixtures::REFERENCES)?, &MeterOptions::default())?;
    validate(&metered)?;
    assert!(gas > 0);
    Ok(())
}

// ── Index remapping ──

#[test]
fn test_function_space_references_are_shifted() -> Result<()> {
    let original = wasm(fixtures::REFERENCES)?;
    let before = function_references(&original)?;
    let (metered, _) = meter(&original, fixtures::UNIT_COSTS, &MeteringOptions::default())?;
    let after = function_references(&metered)?;

    let insertion = before.imported_functions;
    assert_eq!(insertion, 2);
    assert_eq!(after.imported_functions, insertion + 1);
    assert_eq!(
        after.function_imports.last(),
        Some(&("metering".to_string(), "usegas".to_string()))
    );

    let shift = |index: u32| if index >= insertion { index + 1 } else { index };
    let expected: Vec<u32> = before.all().into_iter().map(shift).collect();

    // injected calls all target the import; strip them to compare the rest
    let mut remaining = after.clone();
    for calls in &mut remaining.calls {
        calls.retain(|&target| target != insertion);
    }
    assert_eq!(remaining.all(), expected);
    assert!(after.calls.iter().flatten().any(|&target| target == insertion));
    Ok(())
}

#[test]
fn test_function_names_follow_their_functions() -> Result<()> {
    let original = wasm(fixtures::REFERENCES)?;
    let before = function_references(&original)?;
    let (metered, _) = meter(&original, fixtures::UNIT_COSTS, &MeteringOptions::default())?;
    let after = function_references(&metered)?;

    for (index, name) in &before.function_names {
        let new_index = if *index >= 2 { index + 1 } else { *index };
        assert!(
            after.function_names.contains(&(new_index, name.clone())),
            "{name} should be at {new_index}"
        );
    }
    assert!(after
        .function_names
        .contains(&(2, "metering.usegas".to_string())));
    Ok(())
}

// ── Cost accounting ──

#[test]
fn test_injected_costs_sum_to_total() -> Result<()> {
    let costs = r#"{ "code": { "code": { "DEFAULT": 1, "call": 4, "const": 2 } } }"#;
    let (metered, gas) = meter(
        &wasm(fixtures::CONTROL)?,
        costs,
        &MeteringOptions::default(),
    )?;
    let module = decode(&metered)?;

    let mut injected = 0u64;
    for body in module.code_entries().expect("fixture has code") {
        let ops = &body.instructions;
        for pair in ops.windows(2) {
            if pair[1] == Instruction::call(0) {
                if let Some(Immediate::Varint64(cost)) = pair[0].immediate {
                    injected += cost as u64;
                }
            }
        }
    }
    assert_eq!(injected, gas);
    Ok(())
}

#[test]
fn test_every_segment_is_metered_at_its_start() -> Result<()> {
    let (metered, _) = meter(
        &wasm(fixtures::FACTORIAL)?,
        fixtures::UNIT_COSTS,
        &MeteringOptions::default(),
    )?;
    let module = decode(&metered)?;
    let body = &module.code_entries().expect("fixture has code")[0];

    // under unit costs every segment is nonzero, so the body alternates
    // `i64.const; call 0; <segment ending in a branch>`
    let mut rest = body.instructions.as_slice();
    while !rest.is_empty() {
        assert_eq!(rest[0].mnemonic(), "i64.const");
        assert_eq!(rest[1], Instruction::call(0));
        let end = rest[2..]
            .iter()
            .position(is_branch_class)
            .expect("segment ends in a branch");
        rest = &rest[2 + end + 1..];
    }
    Ok(())
}

#[test]
fn test_zero_cost_table_changes_only_imports() -> Result<()> {
    let original = wasm(fixtures::CONTROL)?;
    let (metered, gas) = meter(&original, r#"{}"#, &MeteringOptions::default())?;
    assert_eq!(gas, 0);
    let before = decode(&original)?;
    let after = decode(&metered)?;
    assert_eq!(before.code_entries(), after.code_entries());
    Ok(())
}

// ── Refusals ──

#[test]
fn test_metering_twice_is_refused() -> Result<()> {
    let (once, _) = meter(
        &wasm(fixtures::FACTORIAL)?,
        fixtures::UNIT_COSTS,
        &MeteringOptions::default(),
    )?;
    let result = inject_metering(
        decode(&once)?,
        &cost_model(fixtures::UNIT_COSTS)?,
        &MeteringOptions::default(),
    );
    assert_eq!(
        result,
        Err(MeteringError::ConflictingImport {
            module: "metering".to_string(),
            field: "usegas".to_string()
        })
    );

    // a different import location is fine
    let options = MeteringOptions {
        field_name: "usegas2".to_string(),
        ..MeteringOptions::default()
    };
    let (twice, _) = meter(&once, fixtures::UNIT_COSTS, &options)?;
    validate(&twice)?;
    Ok(())
}
