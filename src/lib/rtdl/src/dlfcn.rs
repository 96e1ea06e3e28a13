//! The `<dlfcn.h>` style interface: `dlopen`, `dlsym`, `dlclose`, `dlerror`.
//!
//! These wrap the corresponding [Linker] operations, turning errors into sentinel return values
//! and remembering the most recent error of the calling thread until [dlerror] collects it.

use std::cell::RefCell;

use tracing::trace;

use crate::{
    engine::{ModuleLoader, RetrieveError},
    linker::Linker,
    module::Handle,
    soname::Soname,
    DlError,
};

std::thread_local! {
    static LAST_ERROR: RefCell<Option<DlError>> = const { RefCell::new(None) };
}

fn set_error(err: DlError) {
    trace!("dlerror set: {}", err);
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
}

fn record<T>(result: Result<T, DlError>) -> Option<T> {
    result.map_err(set_error).ok()
}

/// Open a module. Returns None on failure; the reason is available from [dlerror].
pub fn dlopen<E, N>(linker: &Linker<E>, name: &str, mode: i32, retrieve: N) -> Option<Handle>
where
    E: ModuleLoader,
    N: FnMut(&Soname) -> Result<E::File, RetrieveError>,
{
    record(linker.open(name, mode, retrieve))
}

/// Look up a symbol in the local scope of `handle`. Returns None on failure.
pub fn dlsym<E: ModuleLoader>(linker: &Linker<E>, handle: Handle, name: &str) -> Option<u64> {
    record(linker.lookup_symbol(handle, name))
}

/// Close a handle. Returns 0 on success and -1 on failure.
pub fn dlclose<E: ModuleLoader>(linker: &Linker<E>, handle: Handle) -> i32 {
    match record(linker.close(handle)) {
        Some(()) => 0,
        None => -1,
    }
}

/// The message of the most recent failure on this thread, if any. Calling this clears the
/// error, so a second call returns None.
pub fn dlerror() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take().map(|err| err.to_string()))
}
