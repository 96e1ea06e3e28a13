use tracing::{debug, trace};

use super::{Linker, LinkerState};
use crate::{
    engine::{DecodedModule, ModuleLoader, RetrieveError},
    mode::OpenMode,
    module::{Handle, Module, ModuleId},
    scope::ScopeResolver,
    soname::Soname,
    DlError, DlErrorKind,
};

impl<E: ModuleLoader> Linker<E> {
    /// Open the module called `name`, loading it and its dependencies if it is not already
    /// loaded. The `retrieve` callback is asked for the file of every module that has to be
    /// loaded, and is never called for modules that are already present. Before returning, the
    /// initializers of every module in the tree that has not been initialized yet are run.
    pub fn open<N>(&self, name: &str, mode: i32, mut retrieve: N) -> Result<Handle, DlError>
    where
        N: FnMut(&Soname) -> Result<E::File, RetrieveError>,
    {
        let mode = OpenMode::from_raw(mode)?;
        let name = Soname::new(name);

        let mut state = self.state.write();
        let id = match state.modules.find(name.as_str()) {
            Some(id) => {
                trace!("{}: already loaded as module {}", name, id);
                id
            }
            None if mode.is_noload() => {
                debug!("{}: not loaded, and NOLOAD was requested", name);
                return Err(DlErrorKind::NotFound { name }.into());
            }
            None => state.load_module(&name, None, &mut retrieve)?,
        };

        if mode.is_global() {
            state.modules.promote_to_global(id);
        }
        state.run_initializers(id);
        Ok(self.handle(id))
    }
}

impl<E: ModuleLoader> LinkerState<E> {
    /// Load one module and, depth first, every dependency that is not already known. On failure
    /// the module is removed again, along with every module that was bound to it; dependencies
    /// that finished loading on their own stay.
    pub(crate) fn load_module<N>(
        &mut self,
        name: &Soname,
        needed_by: Option<&Soname>,
        retrieve: &mut N,
    ) -> Result<ModuleId, DlError>
    where
        N: FnMut(&Soname) -> Result<E::File, RetrieveError>,
    {
        debug!("{}: loading", name);
        let file = retrieve(name).map_err(|e| match (e, needed_by) {
            (RetrieveError::NotFound, None) => DlErrorKind::NotFound { name: name.clone() },
            (RetrieveError::NotFound, Some(parent)) => DlErrorKind::MissingDependency {
                name: name.clone(),
                needed_by: parent.clone(),
            },
            (RetrieveError::Io(reason), _) => DlErrorKind::RetrieveFailed {
                name: name.clone(),
                reason,
            },
        })?;

        let DecodedModule {
            deps,
            symbols,
            load_bias,
            image,
        } = self.loader.decode(name, file)?;
        debug!("{}: mapped at {:#x}", name, load_bias);

        let id = self
            .modules
            .insert_loading(Module::new(name.clone(), load_bias, symbols, false));

        match self.link_module(id, name, deps, image, retrieve) {
            Ok(()) => Ok(id),
            Err(e) => {
                self.discard_bound_to(id);
                Err(e)
            }
        }
    }

    fn link_module<N>(
        &mut self,
        id: ModuleId,
        name: &Soname,
        deps: Vec<Soname>,
        image: E::Image,
        retrieve: &mut N,
    ) -> Result<(), DlError>
    where
        N: FnMut(&Soname) -> Result<E::File, RetrieveError>,
    {
        if !deps.is_empty() {
            debug!("{}: dependencies: {:?}", name, deps);
        }
        for dep in deps {
            let dep_id = match self.modules.find_any(dep.as_str()) {
                Some(dep_id) => {
                    trace!("{}: dependency {} is already present", name, dep);
                    dep_id
                }
                None => self.load_module(&dep, Some(name), retrieve)?,
            };
            self.modules.add_dep(id, dep_id);
        }

        let module = &self.modules[id];
        let resolver = ScopeResolver::new(&self.modules, module);
        trace!(
            "{}: relocating against {} modules",
            name,
            resolver.scope().ids().len()
        );
        self.loader.relocate(name, image, &resolver)?;

        self.modules.mark_relocated(id);
        self.pending.try_reserve(1)?;
        self.pending.push(id);
        self.commit(id)
    }

    /// Append `id` and every pending module in its tree to the global list, unless the tree
    /// still reaches a module that is loading. In that case they all wait for it.
    fn commit(&mut self, id: ModuleId) -> Result<(), DlError> {
        if self.modules.reaches_loading(id) {
            trace!(
                "{}: waiting for a dependency cycle to finish",
                self.modules[id]
            );
            return Ok(());
        }

        let tree = self.modules.module_tree(id);
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.iter().copied().partition(|p| tree.contains(p));
        self.modules.reserve(ready.len())?;
        self.pending = waiting;
        for ready_id in ready {
            self.modules.append(ready_id)?;
            debug!("{}: loaded as module {}", self.modules[ready_id], ready_id);
        }
        Ok(())
    }

    /// Remove a module whose load failed, and every pending module whose tree reaches it.
    fn discard_bound_to(&mut self, id: ModuleId) {
        let (doomed, kept): (Vec<_>, Vec<_>) = self
            .pending
            .iter()
            .copied()
            .partition(|p| *p == id || self.modules.module_tree(*p).contains(&id));
        self.pending = kept;
        for doomed_id in doomed {
            self.modules.discard(doomed_id);
        }
        self.modules.discard(id);
    }

    /// Run initializers for every module in `root`'s tree that has not been initialized.
    pub(crate) fn run_initializers(&mut self, root: ModuleId) {
        for id in self.modules.init_order(root) {
            let Some(module) = self.modules.get_mut(id) else {
                continue;
            };
            if module.initialized {
                continue;
            }
            module.initialized = true;
            debug!("{}: running initializers", module);
            self.loader.init(&module.name);
        }
    }
}
