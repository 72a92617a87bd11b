//! Module IR type definitions.
//!
//! A [`Module`] is a preamble followed by an ordered list of [`Section`]s,
//! kept in the order they appeared on the wire. Each section kind is its own
//! variant with typed entries, so the encoder can match exhaustively and
//! never has to guess at a payload's shape.

use super::instruction::Instruction;
use std::fmt;

/// The `\0asm` magic.
pub const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

/// Binary format version 1.
pub const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Language types as they appear in the binary format.
///
/// This covers value types plus the other one-byte type codes the MVP
/// format uses: `anyfunc` for table elements, `func` as the signature form,
/// and the empty block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
    AnyFunc,
    Func,
    Empty,
}

impl ValType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x7f => ValType::I32,
            0x7e => ValType::I64,
            0x7d => ValType::F32,
            0x7c => ValType::F64,
            0x70 => ValType::AnyFunc,
            0x60 => ValType::Func,
            0x40 => ValType::Empty,
            _ => return None,
        })
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ValType::I32 => 0x7f,
            ValType::I64 => 0x7e,
            ValType::F32 => 0x7d,
            ValType::F64 => 0x7c,
            ValType::AnyFunc => 0x70,
            ValType::Func => 0x60,
            ValType::Empty => 0x40,
        }
    }

    /// The textual name, also used as the cost-table key.
    pub fn name(self) -> &'static str {
        match self {
            ValType::I32 => "i32",
            ValType::I64 => "i64",
            ValType::F32 => "f32",
            ValType::F64 => "f64",
            ValType::AnyFunc => "anyfunc",
            ValType::Func => "func",
            ValType::Empty => "empty",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i32" => ValType::I32,
            "i64" => ValType::I64,
            "f32" => ValType::F32,
            "f64" => ValType::F64,
            "anyfunc" | "funcref" => ValType::AnyFunc,
            "func" => ValType::Func,
            "empty" => ValType::Empty,
            _ => return None,
        })
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of an import or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalKind {
    Function,
    Table,
    Memory,
    Global,
}

impl ExternalKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => ExternalKind::Function,
            1 => ExternalKind::Table,
            2 => ExternalKind::Memory,
            3 => ExternalKind::Global,
            _ => return None,
        })
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ExternalKind::Function => 0,
            ExternalKind::Table => 1,
            ExternalKind::Memory => 2,
            ExternalKind::Global => 3,
        }
    }
}

/// The 8-byte module header, copied through without validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub magic: [u8; 4],
    pub version: [u8; 4],
}

impl Default for Preamble {
    fn default() -> Self {
        Self {
            magic: WASM_MAGIC,
            version: WASM_VERSION,
        }
    }
}

/// A function type from the type section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncSignature {
    /// Always [`ValType::Func`] in MVP modules.
    pub form: ValType,
    pub params: Vec<ValType>,
    pub returns: Vec<ValType>,
}

impl FuncSignature {
    pub fn new(params: Vec<ValType>, returns: Vec<ValType>) -> Self {
        Self {
            form: ValType::Func,
            params,
            returns,
        }
    }
}

/// Resizable limits shared by memories and tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub initial: u32,
    /// `None` = no maximum declared (flags byte 0).
    pub maximum: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub element_type: ValType,
    pub limits: MemoryLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub content_type: ValType,
    pub mutable: bool,
}

/// What an import brings in. The [`ExternalKind`] is implied by the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDescriptor {
    /// Type-section index of the imported function's signature.
    Function(u32),
    Table(TableType),
    Memory(MemoryLimits),
    Global(GlobalType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub module: String,
    pub field: String,
    pub descriptor: ImportDescriptor,
}

impl ImportEntry {
    pub fn kind(&self) -> ExternalKind {
        match self.descriptor {
            ImportDescriptor::Function(_) => ExternalKind::Function,
            ImportDescriptor::Table(_) => ExternalKind::Table,
            ImportDescriptor::Memory(_) => ExternalKind::Memory,
            ImportDescriptor::Global(_) => ExternalKind::Global,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.descriptor, ImportDescriptor::Function(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalEntry {
    pub ty: GlobalType,
    /// Single constant instruction; the trailing `end` is implicit.
    pub init: Instruction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub field: String,
    pub kind: ExternalKind,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementEntry {
    pub table_index: u32,
    pub offset: Instruction,
    /// Indices into the function space.
    pub function_indices: Vec<u32>,
}

/// `count` consecutive locals of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalGroup {
    pub count: u32,
    pub ty: ValType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionBody {
    pub locals: Vec<LocalGroup>,
    /// Full instruction list, conventionally ending in `end`.
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub memory_index: u32,
    pub offset: Instruction,
    pub bytes: Vec<u8>,
}

/// An `(index, name)` pair from the name section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAssoc {
    pub index: u32,
    pub name: String,
}

/// Local names of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNameGroup {
    pub function_index: u32,
    pub names: Vec<NameAssoc>,
}

/// One subsection of the `name` custom section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSubsection {
    ModuleName(String),
    FunctionNames(Vec<NameAssoc>),
    LocalNames(Vec<LocalNameGroup>),
    /// Any subsection id other than 0, 1 and 2, kept verbatim.
    Unknown { kind: u8, payload: Vec<u8> },
}

impl NameSubsection {
    pub fn kind(&self) -> u8 {
        match self {
            NameSubsection::ModuleName(_) => 0,
            NameSubsection::FunctionNames(_) => 1,
            NameSubsection::LocalNames(_) => 2,
            NameSubsection::Unknown { kind, .. } => *kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomPayload {
    Raw(Vec<u8>),
    Names(Vec<NameSubsection>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSection {
    pub name: String,
    pub payload: CustomPayload,
}

/// Section ids of the binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    Custom = 0,
    Type = 1,
    Import = 2,
    Function = 3,
    Table = 4,
    Memory = 5,
    Global = 6,
    Export = 7,
    Start = 8,
    Element = 9,
    Code = 10,
    Data = 11,
    DataCount = 12,
}

impl SectionId {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => SectionId::Custom,
            1 => SectionId::Type,
            2 => SectionId::Import,
            3 => SectionId::Function,
            4 => SectionId::Table,
            5 => SectionId::Memory,
            6 => SectionId::Global,
            7 => SectionId::Export,
            8 => SectionId::Start,
            9 => SectionId::Element,
            10 => SectionId::Code,
            11 => SectionId::Data,
            12 => SectionId::DataCount,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionId::Custom => "custom",
            SectionId::Type => "type",
            SectionId::Import => "import",
            SectionId::Function => "function",
            SectionId::Table => "table",
            SectionId::Memory => "memory",
            SectionId::Global => "global",
            SectionId::Export => "export",
            SectionId::Start => "start",
            SectionId::Element => "element",
            SectionId::Code => "code",
            SectionId::Data => "data",
            SectionId::DataCount => "data_count",
        }
    }

    /// Position in the canonical section order. Custom sections may appear
    /// anywhere and have no rank. The data-count section is ordered before
    /// code even though its id is larger.
    pub fn canonical_rank(self) -> Option<u8> {
        Some(match self {
            SectionId::Custom => return None,
            SectionId::Type => 1,
            SectionId::Import => 2,
            SectionId::Function => 3,
            SectionId::Table => 4,
            SectionId::Memory => 5,
            SectionId::Global => 6,
            SectionId::Export => 7,
            SectionId::Start => 8,
            SectionId::Element => 9,
            SectionId::DataCount => 10,
            SectionId::Code => 11,
            SectionId::Data => 12,
        })
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A decoded section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Custom(CustomSection),
    Type(Vec<FuncSignature>),
    Import(Vec<ImportEntry>),
    /// Type index of each defined function, parallel to the code section.
    Function(Vec<u32>),
    Table(Vec<TableType>),
    Memory(Vec<MemoryLimits>),
    Global(Vec<GlobalEntry>),
    Export(Vec<ExportEntry>),
    /// Function-space index of the start function.
    Start(u32),
    Element(Vec<ElementEntry>),
    Code(Vec<FunctionBody>),
    Data(Vec<DataSegment>),
    DataCount(u32),
}

impl Section {
    pub fn id(&self) -> SectionId {
        match self {
            Section::Custom(_) => SectionId::Custom,
            Section::Type(_) => SectionId::Type,
            Section::Import(_) => SectionId::Import,
            Section::Function(_) => SectionId::Function,
            Section::Table(_) => SectionId::Table,
            Section::Memory(_) => SectionId::Memory,
            Section::Global(_) => SectionId::Global,
            Section::Export(_) => SectionId::Export,
            Section::Start(_) => SectionId::Start,
            Section::Element(_) => SectionId::Element,
            Section::Code(_) => SectionId::Code,
            Section::Data(_) => SectionId::Data,
            Section::DataCount(_) => SectionId::DataCount,
        }
    }

    /// Number of entries, for diagnostics. Single-value sections count as one.
    pub fn entry_count(&self) -> usize {
        match self {
            Section::Custom(custom) => match &custom.payload {
                CustomPayload::Raw(bytes) => bytes.len(),
                CustomPayload::Names(subsections) => subsections.len(),
            },
            Section::Type(entries) => entries.len(),
            Section::Import(entries) => entries.len(),
            Section::Function(entries) => entries.len(),
            Section::Table(entries) => entries.len(),
            Section::Memory(entries) => entries.len(),
            Section::Global(entries) => entries.len(),
            Section::Export(entries) => entries.len(),
            Section::Start(_) | Section::DataCount(_) => 1,
            Section::Element(entries) => entries.len(),
            Section::Code(entries) => entries.len(),
            Section::Data(entries) => entries.len(),
        }
    }
}

/// A whole module: preamble plus sections in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub preamble: Preamble,
    pub sections: Vec<Section>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_entries(&self) -> Option<&Vec<FuncSignature>> {
        self.sections.iter().find_map(|s| match s {
            Section::Type(entries) => Some(entries),
            _ => None,
        })
    }

    pub fn import_entries(&self) -> Option<&Vec<ImportEntry>> {
        self.sections.iter().find_map(|s| match s {
            Section::Import(entries) => Some(entries),
            _ => None,
        })
    }

    pub fn function_entries(&self) -> Option<&Vec<u32>> {
        self.sections.iter().find_map(|s| match s {
            Section::Function(entries) => Some(entries),
            _ => None,
        })
    }

    pub fn code_entries(&self) -> Option<&Vec<FunctionBody>> {
        self.sections.iter().find_map(|s| match s {
            Section::Code(entries) => Some(entries),
            _ => None,
        })
    }

    /// Number of imported functions; these occupy indices `0..N` of the
    /// function space, before any defined function.
    pub fn imported_function_count(&self) -> u32 {
        self.import_entries()
            .map(|entries| entries.iter().filter(|e| e.is_function()).count() as u32)
            .unwrap_or(0)
    }

    pub fn has_section(&self, id: SectionId) -> bool {
        self.sections.iter().any(|s| s.id() == id)
    }

    /// Inserts `section` at its canonical position: before the first
    /// non-custom section of greater rank, or at the end if there is none.
    pub fn insert_section(&mut self, section: Section) {
        let rank = section.id().canonical_rank();
        let position = self
            .sections
            .iter()
            .position(|existing| match (existing.id().canonical_rank(), rank) {
                (Some(existing_rank), Some(rank)) => existing_rank > rank,
                _ => false,
            })
            .unwrap_or(self.sections.len());
        self.sections.insert(position, section);
    }
}
