//! The core of a runtime dynamic linker.
//!
//! The job of this crate is:
//!   1. Load modules (shared objects) and their dependencies, at most one copy of each name.
//!   2. Apply relocations to each newly loaded module, binding its symbolic references.
//!   3. Decide when and in which order initializers run.
//!   4. Answer symbol lookups on behalf of callers of `dlsym`.
//!
//! It does not know what a module file looks like. Reading headers, mapping segments, and
//! writing relocated values are the job of a [engine::ModuleLoader] provided by the user of the
//! crate, and finding the file for a name is the job of a retrieval callback passed to each open.
//! What this crate owns is the bookkeeping: which modules exist, who depends on whom, and which
//! definition of a symbol wins.
//!
//! # Modules and the global list
//! Every module the linker knows about is kept in one arena (see [modlist::ModuleList]), a graph
//! whose edges are dependency relationships. Modules are named by [Soname], and a name is loaded
//! at most once: opening a name that is already loaded hands back the existing module, and a
//! dependency that is already loaded is linked to instead of loaded again. This is why the graph
//! can have cycles, and it is fine if it does.
//!
//! The arena also keeps the *global list*: every fully loaded module, in load order, starting
//! with the startup modules that were already mapped when the linker was created. Some of these
//! modules are *global*, meaning they take part in the global scope.
//!
//! # Scopes
//! A scope is the order in which modules are searched for a symbol, and the first module that
//! defines the name wins. There are two of them:
//!
//! - The *local scope* of a module is its module tree: the module itself, then its dependencies
//!   depth first in the order they were declared, where a module shared by several dependencies
//!   counts only where it is first reached. Lookups through a handle use the local scope.
//! - The *global scope* is the global list restricted to global modules. When a module is
//!   relocated, the global scope is searched first, then the module's own local scope.
//!
//! Opening a module with [OpenMode::GLOBAL] promotes it and its whole tree: every module in the
//! tree that was not yet global becomes global and moves to the back of the global list, in tree
//! order.
//!
//! # Loading
//! Loading a name goes like this:
//! 1. Ask the retrieval callback for the file.
//! 2. Have the loader decode and map it, which tells us the dependency names and load bias.
//! 3. Register the module so that a dependency cycle back to it can find it.
//! 4. For each dependency, in order, reuse it if it is known or load it with these same steps.
//! 5. Have the loader apply relocations, resolving names through the relocation scope.
//! 6. Append the module to the global list.
//!
//! A module in a dependency cycle was relocated against an ancestor that is still loading, so
//! it waits in step 6 until that ancestor is appended, and they join the global list together.
//! If any step fails the module that failed is dropped again, together with every waiting
//! module bound to it. Modules that had already been appended as part of the same open stay
//! loaded.
//!
//! Once the open has a module, the loader runs the initializers of every module in its tree that
//! has not been initialized yet. The order is the reverse of a breadth-first walk from the
//! root, so dependencies are initialized before the modules that need them.
//!
//! # Error Handling
//! Errors are reported with [DlError], which implements std::error::Error and miette's
//! Diagnostic. Its message is that of its [DlErrorKind], and callers match on these strings.

mod error;
pub use error::*;

pub mod dlfcn;
pub mod engine;
pub mod linker;
pub mod modlist;
pub mod mode;
pub mod module;
pub mod scope;
pub mod soname;
pub mod symbol;

pub use engine::{DecodedModule, ModuleLoader, RetrieveError, StartupModule};
pub use linker::Linker;
pub use mode::OpenMode;
pub use module::{Handle, ModuleId, ModuleInfo};
pub use soname::Soname;
pub use symbol::{Symbol, SymbolKind, SymbolTable};
