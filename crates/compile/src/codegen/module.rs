//! Module-level symbol tables and the final section assembly.

use std::collections::HashMap;

use crate::ast::{Node, NodeId};
use crate::codegen::types::{Signature, TypeInterner};
use crate::codegen::writer::Writer;
use crate::error::{Error, Result};
use crate::parse::Ast;

/// A function known to the module, import or definition.
#[derive(Clone, Debug)]
pub(crate) struct FuncEntry {
    /// Global function index: imports occupy the low indices, definitions
    /// follow in source order. Fixed once the declaration pass completes.
    pub(crate) index: u32,
    /// Index of the interned signature in the Type section.
    pub(crate) type_index: u32,
    pub(crate) signature: Signature,
}

#[derive(Clone, Copy, Debug)]
struct Import<'src> {
    module: &'src str,
    field: &'src str,
    type_index: u32,
}

/// A function definition awaiting emission.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Definition<'src> {
    pub(crate) name: &'src str,
    pub(crate) node: NodeId,
}

/// Module-wide tables, populated once by [`declare()`] and read-only during
/// emission.
///
/// [`declare()`]: Module::declare
#[derive(Debug)]
pub(crate) struct Module<'src> {
    functions: HashMap<&'src str, FuncEntry>,
    pub(crate) definitions: Vec<Definition<'src>>,
    exports: Vec<&'src str>,
    imports: Vec<Import<'src>>,
    uses_memory: bool,
    types: TypeInterner,
}

impl<'src> Module<'src> {
    /// Collects every top-level declaration: imports first, claiming global
    /// indices from zero, then function definitions, then export directives
    /// in declaration order. A scan of the dense arena sets the memory flag
    /// if any load or store appears anywhere in the module.
    pub(crate) fn declare(ast: &Ast<'src>) -> Result<Self> {
        let mut module = Self {
            functions: HashMap::new(),
            definitions: Vec::new(),
            exports: Vec::new(),
            imports: Vec::new(),
            uses_memory: false,
            types: TypeInterner::default(),
        };
        let mut next_index = 0u32;

        for &top in &ast.top {
            let Node::Import {
                module: module_name,
                field,
                params,
                result,
            } = ast.arena.get(top)
            else {
                continue;
            };

            let signature = Signature {
                params: ast.arena.params(params).iter().map(|p| p.ty).collect(),
                result,
            };
            let type_index = module.types.intern(&signature)?;
            module.insert_function(
                field,
                FuncEntry {
                    index: next_index,
                    type_index,
                    signature,
                },
            )?;
            module.imports.push(Import {
                module: module_name,
                field,
                type_index,
            });
            next_index = next_index.checked_add(1).ok_or(Error::Overflow)?;
        }

        for &top in &ast.top {
            match ast.arena.get(top) {
                Node::Import { .. } => {}
                Node::Func {
                    name,
                    params,
                    result,
                    ..
                } => {
                    let signature = Signature {
                        params: ast.arena.params(params).iter().map(|p| p.ty).collect(),
                        result,
                    };
                    let type_index = module.types.intern(&signature)?;
                    module.insert_function(
                        name,
                        FuncEntry {
                            index: next_index,
                            type_index,
                            signature,
                        },
                    )?;
                    module.definitions.push(Definition { name, node: top });
                    next_index = next_index.checked_add(1).ok_or(Error::Overflow)?;
                }
                Node::Export(name) => {
                    // Duplicate export names would fail validation; a repeated
                    // directive is redundant rather than fatal.
                    if !module.exports.contains(&name) {
                        module.exports.push(name);
                    }
                }
                _ => unreachable!("parser only produces declarations at top level"),
            }
        }

        module.uses_memory = ast
            .arena
            .nodes()
            .any(|node| matches!(node, Node::Load { .. } | Node::Store { .. }));

        Ok(module)
    }

    fn insert_function(&mut self, name: &'src str, entry: FuncEntry) -> Result<()> {
        if self.functions.contains_key(name) {
            return Err(Error::DuplicateDefinition);
        }
        self.functions.insert(name, entry);
        Ok(())
    }

    /// Resolves a callee name to its function-table entry.
    pub(crate) fn function(&self, name: &str) -> Result<&FuncEntry> {
        self.functions.get(name).ok_or(Error::UndefinedFunction)
    }

    /// Concatenates the output file: magic header and version, then the
    /// sections in ascending id order with empty sections omitted entirely.
    pub(crate) fn assemble(&self, memory_pages: u32, bodies: &[Vec<u8>]) -> Result<Vec<u8>> {
        let mut out = Writer::new();
        out.bytes(&[0x00, 0x61, 0x73, 0x6D])?; // `\0asm`
        out.bytes(&[0x01, 0x00, 0x00, 0x00])?;

        let signatures = self.types.signatures();
        if !signatures.is_empty() {
            let mut section = Writer::new();
            section.uleb128(signatures.len() as u32)?;
            for signature in signatures {
                section.byte(0x60)?;
                section.uleb128(signature.params.len() as u32)?;
                for ty in &signature.params {
                    section.byte(ty.tag())?;
                }
                match signature.result {
                    Some(ty) => {
                        section.byte(0x01)?;
                        section.byte(ty.tag())?;
                    }
                    None => section.byte(0x00)?,
                }
            }
            out.section(1, &section)?;
        }

        if !self.imports.is_empty() {
            let mut section = Writer::new();
            section.uleb128(self.imports.len() as u32)?;
            for import in &self.imports {
                section.name(import.module)?;
                section.name(import.field)?;
                section.byte(0x00)?; // function import
                section.uleb128(import.type_index)?;
            }
            out.section(2, &section)?;
        }

        if !self.definitions.is_empty() {
            let mut section = Writer::new();
            section.uleb128(self.definitions.len() as u32)?;
            for definition in &self.definitions {
                section.uleb128(self.functions[definition.name].type_index)?;
            }
            out.section(3, &section)?;
        }

        if self.uses_memory {
            let mut section = Writer::new();
            section.uleb128(1)?;
            section.byte(0x00)?; // no maximum
            section.uleb128(memory_pages)?;
            out.section(5, &section)?;
        }

        if !self.exports.is_empty() || self.uses_memory {
            let mut resolved = Vec::with_capacity(self.exports.len());
            for &name in &self.exports {
                match self.functions.get(name) {
                    Some(entry) => resolved.push((name, entry.index)),
                    // `(export memory)` is satisfied by the automatic memory
                    // export whenever the module touches linear memory.
                    None if name == "memory" && self.uses_memory => {}
                    None => return Err(Error::UndefinedFunction),
                }
            }

            let mut section = Writer::new();
            section.uleb128(resolved.len() as u32 + u32::from(self.uses_memory))?;
            for (name, index) in resolved {
                section.name(name)?;
                section.byte(0x00)?; // function export
                section.uleb128(index)?;
            }
            if self.uses_memory {
                section.name("memory")?;
                section.byte(0x02)?; // memory export
                section.uleb128(0)?;
            }
            out.section(7, &section)?;
        }

        if !bodies.is_empty() {
            let mut section = Writer::new();
            section.uleb128(bodies.len() as u32)?;
            for body in bodies {
                section.bytes(body)?;
            }
            out.section(10, &section)?;
        }

        Ok(out.into_bytes())
    }
}
