//! Symbol resolution.
//!
//! A [Scope] is an ordered list of modules to search. [resolve] walks a scope and returns the
//! first module that defines the requested name, and is the only place that decides which
//! definition wins. Both relocation (through [ScopeResolver]) and public lookups go through it.

use itertools::Itertools;
use tracing::trace;

use crate::{
    modlist::ModuleList,
    module::{Module, ModuleId},
    symbol::{Symbol, SymbolTable},
    DlError, DlErrorKind,
};

/// An ordered, duplicate-free sequence of modules to search for symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope(Vec<ModuleId>);

impl Scope {
    /// The local scope of `root`, its module tree.
    pub fn local<S: SymbolTable>(list: &ModuleList<S>, root: ModuleId) -> Self {
        Self(list.module_tree(root))
    }

    /// The scope used when relocating `root`: the global scope, then `root`'s module tree, each
    /// module kept only at its first position.
    pub fn for_relocation<S: SymbolTable>(list: &ModuleList<S>, root: ModuleId) -> Self {
        Self(
            list.global_scope()
                .chain(list.module_tree(root))
                .unique()
                .collect(),
        )
    }

    pub fn ids(&self) -> &[ModuleId] {
        &self.0
    }
}

/// A symbol together with the module that defines it.
pub struct ResolvedSymbol<'a, S> {
    pub module: &'a Module<S>,
    pub symbol: Symbol,
}

impl<S: SymbolTable> ResolvedSymbol<'_, S> {
    /// The runtime address of this symbol, which was looked up as `name`. Thread-local symbols
    /// have no such address and are rejected.
    pub fn address(&self, name: &str) -> Result<u64, DlError> {
        if self.symbol.is_tls() {
            return Err(DlErrorKind::UnsupportedTls {
                module: self.module.name.clone(),
                symbol: name.to_string(),
            }
            .into());
        }
        Ok(self.symbol.value.wrapping_add(self.module.load_bias()))
    }
}

/// Find the first module in `scope` that defines `name`.
pub fn resolve<'a, S: SymbolTable>(
    list: &'a ModuleList<S>,
    scope: &Scope,
    name: &str,
) -> Option<ResolvedSymbol<'a, S>> {
    scope.ids().iter().find_map(|id| {
        let module = list.get(*id)?;
        let symbol = module.symbols.lookup(name)?;
        trace!("resolved '{}' in {}", name, module);
        Some(ResolvedSymbol { module, symbol })
    })
}

/// Resolves symbol references on behalf of the relocation collaborator.
pub trait SymbolResolver {
    /// Return the runtime address that a reference to `name` binds to.
    fn resolve(&self, name: &str) -> Result<u64, DlError>;
}

/// A [SymbolResolver] bound to the relocation scope of one module.
pub struct ScopeResolver<'a, S> {
    list: &'a ModuleList<S>,
    scope: Scope,
    root: &'a Module<S>,
}

impl<'a, S: SymbolTable> ScopeResolver<'a, S> {
    pub fn new(list: &'a ModuleList<S>, root: &'a Module<S>) -> Self {
        Self {
            list,
            scope: Scope::for_relocation(list, root.id()),
            root,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl<S: SymbolTable> SymbolResolver for ScopeResolver<'_, S> {
    fn resolve(&self, name: &str) -> Result<u64, DlError> {
        let found = resolve(self.list, &self.scope, name).ok_or_else(|| {
            DlErrorKind::MissingSymbol {
                module: self.root.name.clone(),
                symbol: name.to_string(),
            }
        })?;
        found.address(name)
    }
}
