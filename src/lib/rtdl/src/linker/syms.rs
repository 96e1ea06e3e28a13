use tracing::trace;

use super::Linker;
use crate::{
    engine::ModuleLoader,
    module::Handle,
    scope::{resolve, Scope},
    DlError, DlErrorKind,
};

impl<E: ModuleLoader> Linker<E> {
    /// Find the runtime address of `name` in the local scope of `handle`: the module itself,
    /// then its dependencies in tree order. The global scope is not searched.
    pub fn lookup_symbol(&self, handle: Handle, name: &str) -> Result<u64, DlError> {
        let state = self.state.read();
        let root = self.validate(&state.modules, handle)?;
        let scope = Scope::local(&state.modules, root);

        let found = resolve(&state.modules, &scope, name).ok_or_else(|| {
            trace!("{}: no definition of '{}'", state.modules[root], name);
            DlErrorKind::UndefinedSymbol {
                root: state.modules[root].name.clone(),
                symbol: name.to_string(),
            }
        })?;
        found.address(name)
    }
}
