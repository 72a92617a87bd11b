//! The `name` custom section.
//!
//! Subsections are `id: u8`, `size: varuint32`, then the payload. Ids 0
//! (module name), 1 (function names) and 2 (local names) are decoded; any
//! other subsection is kept as raw bytes.

use super::read_vec;
use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::ir::{LocalNameGroup, NameAssoc, NameSubsection};

pub(crate) const NAME_SECTION: &str = "name";

pub(crate) fn decode_name_section(
    cursor: &mut ByteCursor<'_>,
) -> Result<Vec<NameSubsection>, DecodeError> {
    let mut subsections = Vec::new();
    while !cursor.is_empty() {
        let kind = cursor.read_byte()?;
        let declared = cursor.read_var_u32()? as usize;
        let mut payload = cursor.sub_cursor(declared)?;
        let subsection = match kind {
            0 => NameSubsection::ModuleName(payload.read_name()?),
            1 => NameSubsection::FunctionNames(read_name_map(&mut payload)?),
            2 => NameSubsection::LocalNames(read_vec(&mut payload, |c| {
                Ok(LocalNameGroup {
                    function_index: c.read_var_u32()?,
                    names: read_name_map(c)?,
                })
            })?),
            _ => NameSubsection::Unknown {
                kind,
                payload: payload.read_rest().to_vec(),
            },
        };
        if !payload.is_empty() {
            return Err(DecodeError::UnexpectedEof {
                section: NAME_SECTION,
                declared,
                consumed: payload.bytes_read(),
            });
        }
        subsections.push(subsection);
    }
    Ok(subsections)
}

fn read_name_map(cursor: &mut ByteCursor<'_>) -> Result<Vec<NameAssoc>, DecodeError> {
    read_vec(cursor, |c| {
        Ok(NameAssoc {
            index: c.read_var_u32()?,
            name: c.read_name()?,
        })
    })
}
