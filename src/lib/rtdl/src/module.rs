//! Management of individual loaded modules.

use std::fmt::{Debug, Display};

use petgraph::stable_graph::NodeIndex;

use crate::{soname::Soname, symbol::SymbolTable};

#[derive(PartialEq, PartialOrd, Ord, Eq, Debug, Clone, Copy)]
pub(crate) enum ModuleState {
    /// Decoded and registered, but dependencies or relocation are not finished.
    Loading,
    /// Relocated, but bound to a module that is still loading. Becomes loaded together with
    /// that module, or is discarded with it.
    Relocated,
    /// Fully loaded and present in the global list.
    Loaded,
}

/// The ID for a module: its index in the module arena.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
#[repr(transparent)]
pub struct ModuleId(pub(crate) NodeIndex);

impl Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.index())
    }
}

/// Identifies one [crate::linker::Linker] instance, so handles cannot cross between them.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
#[repr(transparent)]
pub struct LinkerId(pub(crate) u64);

/// An opaque handle to a loaded module, handed out by [crate::linker::Linker::open].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) linker: LinkerId,
    pub(crate) module: ModuleId,
}

impl Handle {
    pub(crate) fn new(linker: LinkerId, module: ModuleId) -> Self {
        Self { linker, module }
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.linker.0, self.module)
    }
}

/// A loaded module. Its dependency edges live in the module list, not here, since the module
/// list owns every module.
pub struct Module<S> {
    /// Name of this module.
    pub name: Soname,
    pub(crate) id: ModuleId,
    load_bias: u64,
    pub(crate) symbols: S,
    pub(crate) is_global: bool,
    is_startup: bool,
    pub(crate) initialized: bool,
    pub(crate) state: ModuleState,
}

impl<S: SymbolTable> Module<S> {
    /// Build a module record. Its ID is assigned when it is inserted into a module list.
    /// Startup modules were initialized before the linker existed.
    pub(crate) fn new(name: Soname, load_bias: u64, symbols: S, is_startup: bool) -> Self {
        Self {
            name,
            id: ModuleId(NodeIndex::end()),
            load_bias,
            symbols,
            is_global: false,
            is_startup,
            initialized: is_startup,
            state: ModuleState::Loading,
        }
    }

    /// Get the ID for this module.
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// The offset added to every symbol value of this module to get a runtime address.
    pub fn load_bias(&self) -> u64 {
        self.load_bias
    }

    pub fn symbols(&self) -> &S {
        &self.symbols
    }

    /// Does this module participate in the global scope?
    pub fn is_global(&self) -> bool {
        self.is_global
    }

    /// Was this module part of the process image before any open call?
    pub fn is_startup(&self) -> bool {
        self.is_startup
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ModuleState::Loaded
    }
}

impl<S> Debug for Module<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("load_bias", &format_args!("{:#x}", self.load_bias))
            .field("is_global", &self.is_global)
            .field("is_startup", &self.is_startup)
            .field("initialized", &self.initialized)
            .field("state", &self.state)
            .finish()
    }
}

impl<S> Display for Module<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A snapshot of one entry of the global module list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub handle: Handle,
    pub name: Soname,
    pub load_bias: u64,
    pub is_global: bool,
    pub is_startup: bool,
}
