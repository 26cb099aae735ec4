//! Contains the core code for compiling source text to a WebAssembly module.

mod func;
mod module;
mod types;
mod writer;

use crate::error::Result;

/// Provides options for compiling an S-expression source file into a
/// [WebAssembly binary module].
///
/// [WebAssembly binary module]: https://webassembly.github.io/spec/core/binary/index.html
#[derive(Clone, Copy, Debug)]
pub struct Compile {
    memory_pages: u32,
}

impl Default for Compile {
    fn default() -> Self {
        Self::new()
    }
}

impl Compile {
    /// Gets the default options.
    pub fn new() -> Self {
        Self { memory_pages: 1 }
    }

    /// Sets the initial page count of the memory section, emitted when the
    /// module uses linear memory. Defaults to 1. The section never carries a
    /// maximum, so hosts are free to grow the memory after instantiation.
    pub fn memory_pages(&mut self, pages: u32) -> &mut Self {
        self.memory_pages = pages;
        self
    }

    /// Compiles a source file to a standalone WebAssembly module, returning
    /// the output buffer by move.
    ///
    /// # Errors
    ///
    /// Compilation stops at the first failure; see [`Error`] for the kinds.
    /// No partial output is ever returned.
    ///
    /// [`Error`]: crate::Error
    pub fn compile(&self, source: &str) -> Result<Vec<u8>> {
        let ast = crate::parse::parse(source)?;
        let module = module::Module::declare(&ast)?;

        let mut bodies = Vec::with_capacity(module.definitions.len());
        for definition in &module.definitions {
            bodies.push(func::emit_function(&module, &ast.arena, definition.node)?);
        }

        module.assemble(self.memory_pages, &bodies)
    }
}

/// Compiles `source` with the default options.
pub fn compile(source: &str) -> Result<Vec<u8>> {
    Compile::new().compile(source)
}
