//! Codec round-trip tests.
//!
//! These tests verify that:
//! 1. encode(decode(w)) reproduces `w` byte for byte
//! 2. decode(encode(decode(w))) equals decode(w)
//! 3. decode errors localize the fault

use anyhow::Result;
use wasm_meter_core::ir::{CustomPayload, NameSubsection, Section};
use wasm_meter_core::{decode, encode, DecodeError};
use wasm_meter_tests::{fixtures, validate, wasm};

fn assert_roundtrip(bytes: &[u8]) -> Result<()> {
    let module = decode(bytes)?;
    let encoded = encode(&module)?;
    assert_eq!(encoded, bytes, "re-encoded bytes differ");
    assert_eq!(decode(&encoded)?, module, "re-decoded IR differs");
    Ok(())
}

#[test]
fn test_roundtrip_fixtures() -> Result<()> {
    for fixture in [fixtures::FACTORIAL, fixtures::REFERENCES, fixtures::CONTROL] {
        assert_roundtrip(&wasm(fixture)?)?;
    }
    Ok(())
}

#[test]
fn test_roundtrip_minimal_module() -> Result<()> {
    let bytes = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
    let module = decode(&bytes)?;
    assert!(module.sections.is_empty());
    assert_eq!(encode(&module)?, bytes);
    Ok(())
}

#[test]
fn test_roundtrip_every_numeric_constant_form() -> Result<()> {
    let bytes = wasm(
        r#"
        (module
            (global i32 (i32.const -2147483648))
            (global i64 (i64.const 9223372036854775807))
            (global f32 (f32.const -0.0))
            (global f64 (f64.const nan:0x8000000000001))
            (func (result i64)
                i32.const 63
                i32.const 64
                i32.add
                drop
                i32.const -65
                i64.extend_i32_u
                drop
                i64.const 0)
        )
        "#,
    )?;
    validate(&bytes)?;
    assert_roundtrip(&bytes)
}

#[test]
fn test_name_section_is_structured() -> Result<()> {
    let bytes = wasm(fixtures::FACTORIAL)?;
    let module = decode(&bytes)?;
    let names = module
        .sections
        .iter()
        .find_map(|section| match section {
            Section::Custom(custom) if custom.name == "name" => Some(&custom.payload),
            _ => None,
        })
        .expect("wat emits a name section for named functions");
    let CustomPayload::Names(subsections) = names else {
        panic!("name section kept as raw bytes");
    };
    assert!(subsections.iter().any(|subsection| matches!(
        subsection,
        NameSubsection::FunctionNames(names) if names.len() == 1 && names[0].name == "fac"
    )));
    Ok(())
}

#[test]
fn test_reencoded_module_validates() -> Result<()> {
    for fixture in [fixtures::FACTORIAL, fixtures::REFERENCES, fixtures::CONTROL] {
        let bytes = encode(&decode(&wasm(fixture)?)?)?;
        validate(&bytes)?;
    }
    Ok(())
}

#[test]
fn test_truncated_module_is_rejected() -> Result<()> {
    let bytes = wasm(fixtures::CONTROL)?;
    for cut in [5, 9, bytes.len() - 3, bytes.len() - 1] {
        let err = decode(&bytes[..cut]).unwrap_err();
        assert!(
            matches!(
                err,
                DecodeError::TruncatedInput { .. } | DecodeError::UnexpectedEof { .. }
            ),
            "cut at {cut}: {err}"
        );
    }
    Ok(())
}

#[test]
fn test_unknown_opcode_is_not_skipped() -> Result<()> {
    let mut bytes = wasm("(module (func nop))")?;
    // the body is `nop end`; replace `nop` with an unassigned opcode
    let nop = bytes.len() - 2;
    assert_eq!(bytes[nop], 0x01);
    bytes[nop] = 0xd5;
    assert_eq!(
        decode(&bytes),
        Err(DecodeError::UnknownOpcode {
            opcode: 0xd5,
            offset: nop
        })
    );
    Ok(())
}
