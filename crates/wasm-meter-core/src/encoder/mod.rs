//! Binary module encoder, the mirror of [`crate::decoder`].
//!
//! Sections, function bodies and name subsections are written into a
//! scratch [`ByteBuffer`] first and then appended behind their byte length,
//! so all length prefixes come out as minimal LEB128.

mod instruction;

pub(crate) use instruction::encode_instruction;

use crate::cursor::ByteBuffer;
use crate::error::EncodeError;
use crate::ir::*;
use log::debug;

/// Encodes a module to its binary form.
pub fn encode(module: &Module) -> Result<Vec<u8>, EncodeError> {
    let mut out = ByteBuffer::new();
    out.write(&module.preamble.magic);
    out.write(&module.preamble.version);

    for section in &module.sections {
        let id = section.id();
        let mut payload = ByteBuffer::new();
        encode_section_payload(&mut payload, section)?;
        debug!("encoded {} section: {} bytes", id, payload.bytes_written());
        out.write_byte(id as u8);
        out.write_sized(id.name(), payload)?;
    }
    Ok(out.into_bytes())
}

fn encode_section_payload(out: &mut ByteBuffer, section: &Section) -> Result<(), EncodeError> {
    match section {
        Section::Custom(custom) => {
            out.write_name(&custom.name)?;
            match &custom.payload {
                CustomPayload::Raw(bytes) => out.write(bytes),
                CustomPayload::Names(subsections) => encode_name_section(out, subsections)?,
            }
        }
        Section::Type(entries) => write_vec(out, "type", entries, encode_signature)?,
        Section::Import(entries) => write_vec(out, "import", entries, encode_import)?,
        Section::Function(entries) => write_vec(out, "function", entries, |out, index| {
            out.write_var_u32(*index);
            Ok(())
        })?,
        Section::Table(entries) => write_vec(out, "table", entries, |out, table| {
            encode_table_type(out, table);
            Ok(())
        })?,
        Section::Memory(entries) => write_vec(out, "memory", entries, |out, limits| {
            encode_limits(out, limits);
            Ok(())
        })?,
        Section::Global(entries) => write_vec(out, "global", entries, |out, global| {
            encode_global_type(out, &global.ty);
            encode_init_expr(out, &global.init)
        })?,
        Section::Export(entries) => write_vec(out, "export", entries, |out, export| {
            out.write_name(&export.field)?;
            out.write_byte(export.kind.to_byte());
            out.write_var_u32(export.index);
            Ok(())
        })?,
        Section::Start(index) => out.write_var_u32(*index),
        Section::Element(entries) => write_vec(out, "element", entries, |out, element| {
            out.write_var_u32(element.table_index);
            encode_init_expr(out, &element.offset)?;
            write_vec(out, "element", &element.function_indices, |out, index| {
                out.write_var_u32(*index);
                Ok(())
            })
        })?,
        Section::Code(bodies) => write_vec(out, "code", bodies, encode_body)?,
        Section::Data(entries) => write_vec(out, "data", entries, |out, segment| {
            out.write_var_u32(segment.memory_index);
            encode_init_expr(out, &segment.offset)?;
            out.write_bytes_vec("data segment", &segment.bytes)
        })?,
        Section::DataCount(count) => out.write_var_u32(*count),
    }
    Ok(())
}

/// Writes a count-prefixed vector, encoding each entry with `entry`.
fn write_vec<T>(
    out: &mut ByteBuffer,
    what: &'static str,
    items: &[T],
    mut entry: impl FnMut(&mut ByteBuffer, &T) -> Result<(), EncodeError>,
) -> Result<(), EncodeError> {
    out.write_len(what, items.len())?;
    for item in items {
        entry(out, item)?;
    }
    Ok(())
}

fn write_val_types(out: &mut ByteBuffer, types: &[ValType]) -> Result<(), EncodeError> {
    write_vec(out, "type", types, |out, ty| {
        out.write_byte(ty.to_byte());
        Ok(())
    })
}

fn encode_signature(out: &mut ByteBuffer, signature: &FuncSignature) -> Result<(), EncodeError> {
    out.write_byte(signature.form.to_byte());
    write_val_types(out, &signature.params)?;
    write_val_types(out, &signature.returns)
}

fn encode_limits(out: &mut ByteBuffer, limits: &MemoryLimits) {
    match limits.maximum {
        None => {
            out.write_var_u32(0);
            out.write_var_u32(limits.initial);
        }
        Some(maximum) => {
            out.write_var_u32(1);
            out.write_var_u32(limits.initial);
            out.write_var_u32(maximum);
        }
    }
}

fn encode_table_type(out: &mut ByteBuffer, table: &TableType) {
    out.write_byte(table.element_type.to_byte());
    encode_limits(out, &table.limits);
}

fn encode_global_type(out: &mut ByteBuffer, global: &GlobalType) {
    out.write_byte(global.content_type.to_byte());
    out.write_byte(u8::from(global.mutable));
}

fn encode_import(out: &mut ByteBuffer, import: &ImportEntry) -> Result<(), EncodeError> {
    out.write_name(&import.module)?;
    out.write_name(&import.field)?;
    out.write_byte(import.kind().to_byte());
    match &import.descriptor {
        ImportDescriptor::Function(type_index) => out.write_var_u32(*type_index),
        ImportDescriptor::Table(table) => encode_table_type(out, table),
        ImportDescriptor::Memory(limits) => encode_limits(out, limits),
        ImportDescriptor::Global(global) => encode_global_type(out, global),
    }
    Ok(())
}

fn encode_init_expr(out: &mut ByteBuffer, instruction: &Instruction) -> Result<(), EncodeError> {
    encode_instruction(out, instruction)?;
    encode_instruction(out, &Instruction::end())
}

fn encode_body(out: &mut ByteBuffer, body: &FunctionBody) -> Result<(), EncodeError> {
    let mut scratch = ByteBuffer::new();
    write_vec(&mut scratch, "locals", &body.locals, |out, group| {
        out.write_var_u32(group.count);
        out.write_byte(group.ty.to_byte());
        Ok(())
    })?;
    for instruction in &body.instructions {
        encode_instruction(&mut scratch, instruction)?;
    }
    out.write_sized("function body", scratch)
}

fn encode_name_map(out: &mut ByteBuffer, names: &[NameAssoc]) -> Result<(), EncodeError> {
    write_vec(out, "name map", names, |out, assoc| {
        out.write_var_u32(assoc.index);
        out.write_name(&assoc.name)
    })
}

fn encode_name_section(
    out: &mut ByteBuffer,
    subsections: &[NameSubsection],
) -> Result<(), EncodeError> {
    for subsection in subsections {
        let mut payload = ByteBuffer::new();
        match subsection {
            NameSubsection::ModuleName(name) => payload.write_name(name)?,
            NameSubsection::FunctionNames(names) => encode_name_map(&mut payload, names)?,
            NameSubsection::LocalNames(groups) => {
                write_vec(&mut payload, "local names", groups, |out, group| {
                    out.write_var_u32(group.function_index);
                    encode_name_map(out, &group.names)
                })?
            }
            NameSubsection::Unknown { payload: bytes, .. } => payload.write(bytes),
        }
        out.write_byte(subsection.kind());
        out.write_sized("name subsection", payload)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    fn roundtrip(wat: &str) {
        let wasm = wat::parse_str(wat).unwrap();
        let module = decode(&wasm).unwrap();
        let encoded = encode(&module).unwrap();
        assert_eq!(encoded, wasm);
        assert_eq!(decode(&encoded).unwrap(), module);
    }

    #[test]
    fn test_empty_module_is_eight_bytes() {
        let bytes = encode(&Module::new()).unwrap();
        assert_eq!(bytes, [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_roundtrip_control_flow() {
        roundtrip(
            r#"
            (module
                (func $fac (export "fac") (param i64) (result i64)
                    local.get 0
                    i64.eqz
                    if (result i64)
                        i64.const 1
                    else
                        local.get 0
                        local.get 0
                        i64.const 1
                        i64.sub
                        call $fac
                        i64.mul
                    end)
                (func (param i32)
                    block
                        loop
                            local.get 0
                            br_table 0 1 0
                        end
                    end)
            )
            "#,
        );
    }

    #[test]
    fn test_roundtrip_memory_tables_and_data() {
        roundtrip(
            r#"
            (module
                (import "env" "mem" (memory 1))
                (import "env" "g" (global $g i32))
                (type $t (func (param i32) (result i32)))
                (table 2 funcref)
                (elem (i32.const 0) $id $id)
                (global $h (mut f64) (f64.const 2.5))
                (func $id (type $t) local.get 0)
                (func $indirect (param i32) (result i32)
                    local.get 0
                    i32.const 1
                    call_indirect (type $t)
                    f32.const 1.5
                    drop
                    i32.load offset=8
                    memory.grow)
                (func $start)
                (start $start)
                (data (i32.const 16) "hello")
            )
            "#,
        );
    }

    #[test]
    fn test_hand_built_module_with_names() {
        let module = Module {
            preamble: Preamble::default(),
            sections: vec![
                Section::Type(vec![FuncSignature::new(vec![], vec![])]),
                Section::Function(vec![0]),
                Section::Code(vec![FunctionBody {
                    locals: vec![],
                    instructions: vec![Instruction::plain("nop"), Instruction::end()],
                }]),
                Section::Custom(CustomSection {
                    name: "name".to_string(),
                    payload: CustomPayload::Names(vec![
                        NameSubsection::ModuleName("demo".to_string()),
                        NameSubsection::FunctionNames(vec![NameAssoc {
                            index: 0,
                            name: "main".to_string(),
                        }]),
                    ]),
                }),
            ],
        };
        let bytes = encode(&module).unwrap();
        assert_eq!(decode(&bytes).unwrap(), module);
    }

    #[test]
    fn test_encode_rejects_unknown_instruction() {
        let module = Module {
            preamble: Preamble::default(),
            sections: vec![Section::Code(vec![FunctionBody {
                locals: vec![],
                instructions: vec![Instruction::plain("frobnicate")],
            }])],
        };
        assert_eq!(
            encode(&module),
            Err(EncodeError::UnknownInstruction {
                name: "frobnicate".to_string()
            })
        );
    }
}
