//! Function-space renumbering.
//!
//! Adding a function import at `insertion` shifts every function index at
//! or above it by one. This sweep rewrites each place a function index can
//! appear: function exports, element segments, the start function, direct
//! `call` immediates and the `name` section.

use crate::ir::*;

/// Returns `module` with all function-space references `>= insertion`
/// incremented, and `import_name` recorded as the name of the function now
/// at `insertion`.
pub fn shift_function_space(module: Module, insertion: u32, import_name: &str) -> Module {
    let sections = module
        .sections
        .into_iter()
        .map(|section| shift_section(section, insertion, import_name))
        .collect();
    Module {
        preamble: module.preamble,
        sections,
    }
}

fn shift(index: u32, insertion: u32) -> u32 {
    if index >= insertion {
        index.saturating_add(1)
    } else {
        index
    }
}

fn shift_section(section: Section, insertion: u32, import_name: &str) -> Section {
    match section {
        Section::Export(mut entries) => {
            for export in entries
                .iter_mut()
                .filter(|export| export.kind == ExternalKind::Function)
            {
                export.index = shift(export.index, insertion);
            }
            Section::Export(entries)
        }
        Section::Element(mut entries) => {
            for element in &mut entries {
                for index in &mut element.function_indices {
                    *index = shift(*index, insertion);
                }
            }
            Section::Element(entries)
        }
        Section::Start(index) => Section::Start(shift(index, insertion)),
        Section::Code(mut bodies) => {
            for instruction in bodies.iter_mut().flat_map(|body| &mut body.instructions) {
                if let ("call", Some(Immediate::Varuint32(target))) =
                    (instruction.name, &mut instruction.immediate)
                {
                    *target = shift(*target, insertion);
                }
            }
            Section::Code(bodies)
        }
        Section::Custom(CustomSection {
            name,
            payload: CustomPayload::Names(subsections),
        }) => Section::Custom(CustomSection {
            name,
            payload: CustomPayload::Names(
                subsections
                    .into_iter()
                    .map(|subsection| shift_names(subsection, insertion, import_name))
                    .collect(),
            ),
        }),
        other => other,
    }
}

fn shift_names(subsection: NameSubsection, insertion: u32, import_name: &str) -> NameSubsection {
    match subsection {
        NameSubsection::FunctionNames(mut names) => {
            let position = names
                .iter()
                .position(|assoc| assoc.index >= insertion)
                .unwrap_or(names.len());
            for assoc in &mut names[position..] {
                assoc.index = shift(assoc.index, insertion);
            }
            names.insert(
                position,
                NameAssoc {
                    index: insertion,
                    name: import_name.to_string(),
                },
            );
            NameSubsection::FunctionNames(names)
        }
        NameSubsection::LocalNames(mut groups) => {
            for group in &mut groups {
                group.function_index = shift(group.function_index, insertion);
            }
            NameSubsection::LocalNames(groups)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assoc(index: u32, name: &str) -> NameAssoc {
        NameAssoc {
            index,
            name: name.to_string(),
        }
    }

    fn module(sections: Vec<Section>) -> Module {
        Module {
            preamble: Preamble::default(),
            sections,
        }
    }

    #[test]
    fn shifts_every_reference_at_or_above_insertion() {
        let before = module(vec![
            Section::Export(vec![
                ExportEntry {
                    field: "low".to_string(),
                    kind: ExternalKind::Function,
                    index: 0,
                },
                ExportEntry {
                    field: "high".to_string(),
                    kind: ExternalKind::Function,
                    index: 2,
                },
                ExportEntry {
                    field: "mem".to_string(),
                    kind: ExternalKind::Memory,
                    index: 2,
                },
            ]),
            Section::Start(1),
            Section::Element(vec![ElementEntry {
                table_index: 0,
                offset: Instruction::i32_const(0),
                function_indices: vec![0, 1, 2],
            }]),
            Section::Code(vec![FunctionBody {
                locals: vec![],
                instructions: vec![Instruction::call(0), Instruction::call(3), Instruction::end()],
            }]),
        ]);

        let after = shift_function_space(before, 1, "metering.usegas");
        assert_eq!(
            after.sections,
            vec![
                Section::Export(vec![
                    ExportEntry {
                        field: "low".to_string(),
                        kind: ExternalKind::Function,
                        index: 0,
                    },
                    ExportEntry {
                        field: "high".to_string(),
                        kind: ExternalKind::Function,
                        index: 3,
                    },
                    ExportEntry {
                        field: "mem".to_string(),
                        kind: ExternalKind::Memory,
                        index: 2,
                    },
                ]),
                Section::Start(2),
                Section::Element(vec![ElementEntry {
                    table_index: 0,
                    offset: Instruction::i32_const(0),
                    function_indices: vec![0, 2, 3],
                }]),
                Section::Code(vec![FunctionBody {
                    locals: vec![],
                    instructions: vec![
                        Instruction::call(0),
                        Instruction::call(4),
                        Instruction::end()
                    ],
                }]),
            ]
        );
    }

    #[test]
    fn names_are_shifted_and_import_is_named() {
        let before = module(vec![Section::Custom(CustomSection {
            name: "name".to_string(),
            payload: CustomPayload::Names(vec![
                NameSubsection::ModuleName("m".to_string()),
                NameSubsection::FunctionNames(vec![assoc(0, "imported"), assoc(1, "main")]),
                NameSubsection::LocalNames(vec![
                    LocalNameGroup {
                        function_index: 0,
                        names: vec![assoc(0, "a")],
                    },
                    LocalNameGroup {
                        function_index: 1,
                        names: vec![assoc(0, "b")],
                    },
                ]),
            ]),
        })]);

        let after = shift_function_space(before, 1, "metering.usegas");
        let Section::Custom(CustomSection {
            payload: CustomPayload::Names(subsections),
            ..
        }) = &after.sections[0]
        else {
            panic!("expected name section");
        };
        assert_eq!(subsections[0], NameSubsection::ModuleName("m".to_string()));
        assert_eq!(
            subsections[1],
            NameSubsection::FunctionNames(vec![
                assoc(0, "imported"),
                assoc(1, "metering.usegas"),
                assoc(2, "main"),
            ])
        );
        assert_eq!(
            subsections[2],
            NameSubsection::LocalNames(vec![
                LocalNameGroup {
                    function_index: 0,
                    names: vec![assoc(0, "a")],
                },
                LocalNameGroup {
                    function_index: 2,
                    names: vec![assoc(0, "b")],
                },
            ])
        );
    }

    #[test]
    fn import_name_appended_when_all_names_are_lower() {
        let before = module(vec![Section::Custom(CustomSection {
            name: "name".to_string(),
            payload: CustomPayload::Names(vec![NameSubsection::FunctionNames(vec![assoc(0, "f")])]),
        })]);
        let after = shift_function_space(before, 1, "gas.use");
        assert_eq!(
            after.sections[0],
            Section::Custom(CustomSection {
                name: "name".to_string(),
                payload: CustomPayload::Names(vec![NameSubsection::FunctionNames(vec![
                    assoc(0, "f"),
                    assoc(1, "gas.use"),
                ])]),
            })
        );
    }
}
