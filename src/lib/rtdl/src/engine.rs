//! Interfaces to the collaborators that do the format-specific and system-specific work.
//!
//! The linker never looks at file bytes or mapped memory. It asks a retrieval callback for a
//! module's file, hands that file to a [ModuleLoader] to decode and map, and later asks the same
//! loader to apply relocations, giving it a [SymbolResolver] for symbolic references. Running
//! initializers is the loader's job too; the linker only decides when, and in what order.

use std::fmt::Display;

use crate::{scope::SymbolResolver, soname::Soname, symbol::SymbolTable, DlError};

/// Format parser and loader for one kind of module.
pub trait ModuleLoader {
    /// What the retrieval callback hands back for a name.
    type File;
    /// The exported-symbol table of a decoded module.
    type Symbols: SymbolTable;
    /// Whatever the loader needs to keep between decoding and relocating a module.
    type Image;

    /// Decode the headers of `file` and map it into the address space.
    fn decode(
        &mut self,
        name: &Soname,
        file: Self::File,
    ) -> Result<DecodedModule<Self::Symbols, Self::Image>, DlError>;

    /// Apply all relocations of a decoded module, binding symbolic references through
    /// `resolver`. Any error from the resolver must abort relocation and be returned.
    fn relocate(
        &mut self,
        name: &Soname,
        image: Self::Image,
        resolver: &dyn SymbolResolver,
    ) -> Result<(), DlError>;

    /// Run the initializers of a loaded module. The linker calls this once per module, with
    /// dependencies before the modules that need them, before the first open that hands out a
    /// handle reaching the module returns.
    fn init(&mut self, _name: &Soname) {}
}

/// The result of decoding and mapping a module.
pub struct DecodedModule<S, I> {
    /// Names of direct dependencies, in the order the file declares them.
    pub deps: Vec<Soname>,
    pub symbols: S,
    /// Where the module was mapped, relative to its link-time addresses.
    pub load_bias: u64,
    pub image: I,
}

/// Why the retrieval callback could not produce a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrieveError {
    /// There is no file by that name.
    NotFound,
    /// There may be a file, but it could not be opened.
    Io(String),
}

impl Display for RetrieveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrieveError::NotFound => write!(f, "not found"),
            RetrieveError::Io(reason) => write!(f, "{}", reason),
        }
    }
}

/// A module that was already in the process image when the linker was created, as reported by
/// the startup ABI.
pub struct StartupModule<S> {
    pub name: Soname,
    pub load_bias: u64,
    pub symbols: S,
    pub is_global: bool,
}

impl<S> StartupModule<S> {
    pub fn new(name: impl Into<Soname>, load_bias: u64, symbols: S, is_global: bool) -> Self {
        Self {
            name: name.into(),
            load_bias,
            symbols,
            is_global,
        }
    }
}
