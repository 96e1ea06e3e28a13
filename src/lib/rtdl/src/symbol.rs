//! Definitions for symbols in the runtime linker.
//!
//! Symbol tables belong to the format parser. The linker only ever asks them "do you export a
//! symbol with this name?", through the [SymbolTable] trait.

/// The type of an exported symbol, as far as the linker cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SymbolKind {
    #[default]
    NoType,
    Function,
    Object,
    /// A thread-local symbol. Its value is an offset into a TLS block, not an address, so the
    /// linker refuses to hand it out.
    Tls,
}

/// An exported symbol, unrelocated: `value` is relative to the owning module's load bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symbol {
    pub value: u64,
    pub size: u64,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn new(value: u64, size: u64, kind: SymbolKind) -> Self {
        Self { value, size, kind }
    }

    pub fn is_tls(&self) -> bool {
        self.kind == SymbolKind::Tls
    }
}

/// Query interface onto a module's exported-symbol table.
pub trait SymbolTable {
    /// Find the exported definition of `name`, if this module has one.
    fn lookup(&self, name: &str) -> Option<Symbol>;
}

impl<T: SymbolTable + ?Sized> SymbolTable for Box<T> {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        (**self).lookup(name)
    }
}

impl SymbolTable for std::collections::HashMap<String, Symbol> {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.get(name).copied()
    }
}
