//! Binary module decoder.
//!
//! Reads the 8-byte preamble and then sections until the input is
//! exhausted. Each section is decoded from a bounded sub-cursor over its
//! declared payload. A decoder that stops short of the declared length, or
//! needs more bytes than it, is reported as [`DecodeError::UnexpectedEof`]
//! naming the section; it never reads into the next section.

mod instruction;
mod names;

pub(crate) use instruction::decode_instruction;

use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::ir::*;
use log::debug;

/// Decodes a complete module.
///
/// The preamble is copied through as-is; the magic and version are not
/// checked.
///
/// Padded (non-minimal) LEB128 values are accepted and decode to their
/// value, but [`encode`](crate::encode) always writes the minimal form.
/// `encode(decode(w)) == w` therefore holds only for modules whose LEB128
/// values are minimal, as toolchains emit them; for any other accepted
/// input `decode(encode(decode(w))) == decode(w)` still holds.
pub fn decode(bytes: &[u8]) -> Result<Module, DecodeError> {
    let mut cursor = ByteCursor::new(bytes);
    let preamble = Preamble {
        magic: cursor.read_array()?,
        version: cursor.read_array()?,
    };

    let mut sections = Vec::new();
    while !cursor.is_empty() {
        sections.push(decode_section(&mut cursor)?);
    }
    debug!("decoded module: {} bytes, {} sections", bytes.len(), sections.len());

    Ok(Module { preamble, sections })
}

fn decode_section(cursor: &mut ByteCursor<'_>) -> Result<Section, DecodeError> {
    let offset = cursor.offset();
    let byte = cursor.read_byte()?;
    let id = SectionId::from_byte(byte).ok_or(DecodeError::UnknownSection { id: byte, offset })?;
    let declared = cursor.read_var_u32()? as usize;
    let mut payload = cursor.sub_cursor(declared)?;
    let start = payload.offset();

    let section = decode_payload(id, &mut payload).map_err(|err| match err {
        DecodeError::TruncatedInput { offset, needed } if offset + needed > start + declared => {
            DecodeError::UnexpectedEof {
                section: id.name(),
                declared,
                consumed: offset + needed - start,
            }
        }
        other => other,
    })?;

    if !payload.is_empty() {
        return Err(DecodeError::UnexpectedEof {
            section: id.name(),
            declared,
            consumed: payload.bytes_read(),
        });
    }
    debug!(
        "decoded {} section at byte {}: {} bytes, {} entries",
        id,
        offset,
        declared,
        section.entry_count()
    );
    Ok(section)
}

fn decode_payload(id: SectionId, payload: &mut ByteCursor<'_>) -> Result<Section, DecodeError> {
    Ok(match id {
        SectionId::Custom => Section::Custom(decode_custom(payload)?),
        SectionId::Type => Section::Type(read_vec(payload, decode_signature)?),
        SectionId::Import => Section::Import(read_vec(payload, decode_import)?),
        SectionId::Function => Section::Function(read_vec(payload, |c| c.read_var_u32())?),
        SectionId::Table => Section::Table(read_vec(payload, decode_table_type)?),
        SectionId::Memory => Section::Memory(read_vec(payload, decode_limits)?),
        SectionId::Global => Section::Global(read_vec(payload, decode_global)?),
        SectionId::Export => Section::Export(read_vec(payload, decode_export)?),
        SectionId::Start => Section::Start(payload.read_var_u32()?),
        SectionId::Element => Section::Element(read_vec(payload, decode_element)?),
        SectionId::Code => Section::Code(read_vec(payload, decode_body)?),
        SectionId::Data => Section::Data(read_vec(payload, decode_data)?),
        SectionId::DataCount => Section::DataCount(payload.read_var_u32()?),
    })
}

/// Reads a count-prefixed vector, decoding each entry with `entry`.
pub(crate) fn read_vec<'a, T>(
    cursor: &mut ByteCursor<'a>,
    mut entry: impl FnMut(&mut ByteCursor<'a>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let count = cursor.read_var_u32()? as usize;
    // every entry is at least one byte, so `remaining` bounds a sane count
    let mut out = Vec::with_capacity(count.min(cursor.remaining()));
    for _ in 0..count {
        out.push(entry(cursor)?);
    }
    Ok(out)
}

pub(crate) fn read_val_type(cursor: &mut ByteCursor<'_>) -> Result<ValType, DecodeError> {
    let offset = cursor.offset();
    let byte = cursor.read_byte()?;
    ValType::from_byte(byte).ok_or(DecodeError::InvalidValueType { byte, offset })
}

fn decode_custom(cursor: &mut ByteCursor<'_>) -> Result<CustomSection, DecodeError> {
    let name = cursor.read_name()?;
    let payload = if name == names::NAME_SECTION {
        CustomPayload::Names(names::decode_name_section(cursor)?)
    } else {
        CustomPayload::Raw(cursor.read_rest().to_vec())
    };
    Ok(CustomSection { name, payload })
}

fn decode_signature(cursor: &mut ByteCursor<'_>) -> Result<FuncSignature, DecodeError> {
    let form = read_val_type(cursor)?;
    let params = read_vec(cursor, read_val_type)?;
    let returns = read_vec(cursor, read_val_type)?;
    Ok(FuncSignature {
        form,
        params,
        returns,
    })
}

fn decode_limits(cursor: &mut ByteCursor<'_>) -> Result<MemoryLimits, DecodeError> {
    let offset = cursor.offset();
    let flags = cursor.read_var_u32()?;
    let initial = cursor.read_var_u32()?;
    let maximum = match flags {
        0 => None,
        1 => Some(cursor.read_var_u32()?),
        _ => return Err(DecodeError::InvalidLimits { flags, offset }),
    };
    Ok(MemoryLimits { initial, maximum })
}

fn decode_table_type(cursor: &mut ByteCursor<'_>) -> Result<TableType, DecodeError> {
    Ok(TableType {
        element_type: read_val_type(cursor)?,
        limits: decode_limits(cursor)?,
    })
}

fn decode_global_type(cursor: &mut ByteCursor<'_>) -> Result<GlobalType, DecodeError> {
    let content_type = read_val_type(cursor)?;
    let offset = cursor.offset();
    let mutable = match cursor.read_byte()? {
        0 => false,
        1 => true,
        byte => return Err(DecodeError::InvalidMutability { byte, offset }),
    };
    Ok(GlobalType {
        content_type,
        mutable,
    })
}

fn read_external_kind(cursor: &mut ByteCursor<'_>) -> Result<ExternalKind, DecodeError> {
    let offset = cursor.offset();
    let byte = cursor.read_byte()?;
    ExternalKind::from_byte(byte).ok_or(DecodeError::InvalidExternalKind { byte, offset })
}

fn decode_import(cursor: &mut ByteCursor<'_>) -> Result<ImportEntry, DecodeError> {
    let module = cursor.read_name()?;
    let field = cursor.read_name()?;
    let descriptor = match read_external_kind(cursor)? {
        ExternalKind::Function => ImportDescriptor::Function(cursor.read_var_u32()?),
        ExternalKind::Table => ImportDescriptor::Table(decode_table_type(cursor)?),
        ExternalKind::Memory => ImportDescriptor::Memory(decode_limits(cursor)?),
        ExternalKind::Global => ImportDescriptor::Global(decode_global_type(cursor)?),
    };
    Ok(ImportEntry {
        module,
        field,
        descriptor,
    })
}

/// An initializer: exactly one instruction followed by `end`.
fn decode_init_expr(cursor: &mut ByteCursor<'_>) -> Result<Instruction, DecodeError> {
    let instruction = decode_instruction(cursor)?;
    let offset = cursor.offset();
    if cursor.read_byte()? != 0x0b {
        return Err(DecodeError::MalformedInitExpr { offset });
    }
    Ok(instruction)
}

fn decode_global(cursor: &mut ByteCursor<'_>) -> Result<GlobalEntry, DecodeError> {
    Ok(GlobalEntry {
        ty: decode_global_type(cursor)?,
        init: decode_init_expr(cursor)?,
    })
}

fn decode_export(cursor: &mut ByteCursor<'_>) -> Result<ExportEntry, DecodeError> {
    Ok(ExportEntry {
        field: cursor.read_name()?,
        kind: read_external_kind(cursor)?,
        index: cursor.read_var_u32()?,
    })
}

fn decode_element(cursor: &mut ByteCursor<'_>) -> Result<ElementEntry, DecodeError> {
    Ok(ElementEntry {
        table_index: cursor.read_var_u32()?,
        offset: decode_init_expr(cursor)?,
        function_indices: read_vec(cursor, |c| c.read_var_u32())?,
    })
}

fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<FunctionBody, DecodeError> {
    let size = cursor.read_var_u32()? as usize;
    let mut body = cursor.sub_cursor(size)?;
    let locals = read_vec(&mut body, |c| {
        Ok(LocalGroup {
            count: c.read_var_u32()?,
            ty: read_val_type(c)?,
        })
    })?;
    let mut instructions = Vec::new();
    while !body.is_empty() {
        instructions.push(decode_instruction(&mut body)?);
    }
    Ok(FunctionBody {
        locals,
        instructions,
    })
}

fn decode_data(cursor: &mut ByteCursor<'_>) -> Result<DataSegment, DecodeError> {
    Ok(DataSegment {
        memory_index: cursor.read_var_u32()?,
        offset: decode_init_expr(cursor)?,
        bytes: cursor.read_bytes_vec()?.to_vec(),
    })
}
