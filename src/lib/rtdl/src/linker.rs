//! The runtime linker itself.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    engine::{ModuleLoader, StartupModule},
    modlist::ModuleList,
    module::{Handle, LinkerId, Module, ModuleId, ModuleInfo},
    soname::Soname,
    DlError, DlErrorKind,
};

mod open;
mod syms;

static NEXT_LINKER_ID: AtomicU64 = AtomicU64::new(1);

/// The dynamic linker. Owns the global module list and the loader collaborator, and serializes
/// every change to them behind one lock.
pub struct Linker<E: ModuleLoader> {
    id: LinkerId,
    state: RwLock<LinkerState<E>>,
}

pub(crate) struct LinkerState<E: ModuleLoader> {
    pub(crate) loader: E,
    pub(crate) modules: ModuleList<E::Symbols>,
    // Relocated modules waiting on a module that is still loading, in the order they finished.
    // Always empty between opens.
    pub(crate) pending: Vec<ModuleId>,
}

impl<E: ModuleLoader> Linker<E> {
    /// Create a linker whose global list is seeded with the modules that were already mapped at
    /// process start, in the order given.
    ///
    /// Growing the global list is the one allocation the linker checks: if it fails, here or in
    /// a later open, the operation fails with [DlErrorKind::AllocationFailure]. Other allocations
    /// (module records, name entries, scopes) abort on exhaustion like any other collection.
    pub fn new(
        loader: E,
        startup: impl IntoIterator<Item = StartupModule<E::Symbols>>,
    ) -> Result<Self, DlError> {
        let mut state = LinkerState {
            loader,
            modules: ModuleList::new(),
            pending: Vec::new(),
        };
        state.populate_startup(startup)?;
        let id = LinkerId(NEXT_LINKER_ID.fetch_add(1, Ordering::Relaxed));
        debug!(
            "linker {}: created with {} startup modules",
            id.0,
            state.modules.len()
        );
        Ok(Self {
            id,
            state: RwLock::new(state),
        })
    }

    fn handle(&self, id: ModuleId) -> Handle {
        Handle::new(self.id, id)
    }

    /// Check that a handle was issued by this linker and names a loaded module.
    pub(crate) fn validate(
        &self,
        modules: &ModuleList<E::Symbols>,
        handle: Handle,
    ) -> Result<ModuleId, DlError> {
        if handle.linker == self.id && modules.contains(handle.module) {
            Ok(handle.module)
        } else {
            Err(DlErrorKind::InvalidHandle { handle }.into())
        }
    }

    /// Release a handle. Modules are never unloaded, so this only checks that the handle is
    /// valid.
    pub fn close(&self, handle: Handle) -> Result<(), DlError> {
        let state = self.state.write();
        let id = self.validate(&state.modules, handle)?;
        debug!("{}: close", state.modules[id]);
        Ok(())
    }

    /// Snapshot of the global list, in order.
    pub fn loaded_modules(&self) -> Vec<ModuleInfo> {
        let state = self.state.read();
        state
            .modules
            .iter()
            .map(|m| ModuleInfo {
                handle: self.handle(m.id()),
                name: m.name.clone(),
                load_bias: m.load_bias(),
                is_global: m.is_global(),
                is_startup: m.is_startup(),
            })
            .collect()
    }

    /// Names of the modules in the local scope of `handle`, in search order.
    pub fn module_tree(&self, handle: Handle) -> Result<Vec<Soname>, DlError> {
        let state = self.state.read();
        let id = self.validate(&state.modules, handle)?;
        Ok(names(&state.modules, state.modules.module_tree(id)))
    }

    /// Names of the direct dependencies of `handle`, in declaration order.
    pub fn direct_deps(&self, handle: Handle) -> Result<Vec<Soname>, DlError> {
        let state = self.state.read();
        let id = self.validate(&state.modules, handle)?;
        Ok(names(&state.modules, state.modules.direct_deps(id)))
    }
}

fn names<S>(modules: &ModuleList<S>, ids: Vec<ModuleId>) -> Vec<Soname> {
    ids.into_iter().map(|id| modules[id].name.clone()).collect()
}

impl<E: ModuleLoader> LinkerState<E> {
    fn populate_startup(
        &mut self,
        startup: impl IntoIterator<Item = StartupModule<E::Symbols>>,
    ) -> Result<(), DlError> {
        for sm in startup {
            if self.modules.find_any(sm.name.as_str()).is_some() {
                return Err(DlErrorKind::NameAlreadyExists { name: sm.name }.into());
            }
            trace!(
                "{}: startup module at {:#x} (global: {})",
                sm.name,
                sm.load_bias,
                sm.is_global
            );
            let mut module = Module::new(sm.name, sm.load_bias, sm.symbols, true);
            module.is_global = sm.is_global;
            let id = self.modules.insert_loading(module);
            self.modules.append(id)?;
        }
        Ok(())
    }
}
