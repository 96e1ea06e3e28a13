//! The global module list.
//!
//! Every module the linker knows about lives in one arena, a stable graph whose edges are
//! dependency relationships. The graph owns the modules; edges are plain indices and never keep a
//! module alive on their own. On top of the arena we keep the *global list*: the ordered sequence
//! of fully loaded modules. Its order is significant, since the global scope is searched in it.

use std::{
    collections::{HashMap, HashSet},
    ops::Index,
};

use petgraph::{stable_graph::StableDiGraph, visit::EdgeRef};
use tracing::{debug, trace};

use crate::{
    module::{Module, ModuleId, ModuleState},
    soname::Soname,
    symbol::SymbolTable,
    DlError,
};

pub struct ModuleList<S> {
    // Edge weights record the position of the dependency in its parent's declaration order.
    graph: StableDiGraph<Module<S>, u32>,
    // All registered modules by name, loaded or still loading.
    names: HashMap<Soname, ModuleId>,
    // The global list. Only fully loaded modules appear here.
    order: Vec<ModuleId>,
}

impl<S> Default for ModuleList<S> {
    fn default() -> Self {
        Self {
            graph: StableDiGraph::default(),
            names: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<S: SymbolTable> ModuleList<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a module by ID. Returns None for IDs that were never handed out or were discarded.
    pub fn get(&self, id: ModuleId) -> Option<&Module<S>> {
        self.graph.node_weight(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: ModuleId) -> Option<&mut Module<S>> {
        self.graph.node_weight_mut(id.0)
    }

    /// Number of modules in the global list.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate over the global list, in order.
    pub fn iter(&self) -> impl Iterator<Item = &Module<S>> + '_ {
        self.order.iter().map(|id| &self.graph[id.0])
    }

    /// Iterate over the global scope: the global list filtered to global modules.
    pub fn global_scope(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|id| self.graph[id.0].is_global)
    }

    /// Find a fully loaded module by name.
    pub fn find(&self, name: &str) -> Option<ModuleId> {
        self.names
            .get(name)
            .copied()
            .filter(|id| self.graph[id.0].state == ModuleState::Loaded)
    }

    /// Find a module by name, including ones that are still being loaded.
    pub(crate) fn find_any(&self, name: &str) -> Option<ModuleId> {
        self.names.get(name).copied()
    }

    /// Is this ID a fully loaded module in this list?
    pub fn contains(&self, id: ModuleId) -> bool {
        self.get(id).is_some_and(|m| m.state == ModuleState::Loaded)
    }

    /// Register a module that is about to be loaded. It is searchable by name (for dependency
    /// cycles) and participates in scopes that reach it, but it is not in the global list until
    /// [Self::append] is called.
    pub(crate) fn insert_loading(&mut self, module: Module<S>) -> ModuleId {
        let name = module.name.clone();
        let idx = self.graph.add_node(module);
        let id = ModuleId(idx);
        self.graph[idx].id = id;
        self.names.insert(name, id);
        trace!("{}: registered as module {}", self.graph[idx], id);
        id
    }

    /// Remove a module whose load failed, along with any edges to or from it.
    pub(crate) fn discard(&mut self, id: ModuleId) {
        if let Some(module) = self.graph.remove_node(id.0) {
            debug!("{}: discarding partially loaded module", module);
            if self.names.get(&module.name) == Some(&id) {
                self.names.remove(&module.name);
            }
        }
    }

    /// Make room for `additional` entries in the global list, so that as many calls to
    /// [Self::append] cannot fail.
    pub(crate) fn reserve(&mut self, additional: usize) -> Result<(), DlError> {
        self.order.try_reserve(additional)?;
        Ok(())
    }

    /// Record that a module has been relocated but cannot be appended yet.
    pub(crate) fn mark_relocated(&mut self, id: ModuleId) {
        self.graph[id.0].state = ModuleState::Relocated;
    }

    /// Does `root`'s tree reach a module that is still loading?
    pub(crate) fn reaches_loading(&self, root: ModuleId) -> bool {
        self.module_tree(root)
            .into_iter()
            .any(|id| self.graph[id.0].state == ModuleState::Loading)
    }

    /// Put a module at the back of the global list. Called once, when the module and everything
    /// it is bound to have finished loading.
    pub fn append(&mut self, id: ModuleId) -> Result<(), DlError> {
        self.order.try_reserve(1)?;
        let module = &mut self.graph[id.0];
        module.state = ModuleState::Loaded;
        self.order.push(id);
        Ok(())
    }

    /// Record that `parent` depends on `dep`. Repeated edges to the same module are ignored.
    pub(crate) fn add_dep(&mut self, parent: ModuleId, dep: ModuleId) {
        if self.graph.contains_edge(parent.0, dep.0) {
            return;
        }
        let position = self.graph.edges(parent.0).count() as u32;
        self.graph.add_edge(parent.0, dep.0, position);
    }

    /// The direct dependencies of a module, in declaration order.
    pub fn direct_deps(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut deps: Vec<_> = self
            .graph
            .edges(id.0)
            .map(|e| (*e.weight(), ModuleId(e.target())))
            .collect();
        deps.sort_by_key(|(position, _)| *position);
        deps.into_iter().map(|(_, dep)| dep).collect()
    }

    /// The local scope of `root`: a preorder depth-first walk over `root` and its dependencies in
    /// declaration order, where each module appears only at its first discovery.
    pub fn module_tree(&self, root: ModuleId) -> Vec<ModuleId> {
        let mut seen = HashSet::new();
        let mut tree = vec![];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            tree.push(id);
            // Reversed so the first declared dependency is popped first.
            stack.extend(self.direct_deps(id).into_iter().rev());
        }
        tree
    }

    /// The order in which initializers run for `root`'s tree: the reverse of a breadth-first
    /// walk from `root` over dependencies in declaration order, each module at its first
    /// discovery. Dependencies come before the modules that need them, and `root` comes last.
    pub fn init_order(&self, root: ModuleId) -> Vec<ModuleId> {
        let mut seen = HashSet::from([root]);
        let mut order = vec![root];
        let mut next = 0;
        while let Some(&id) = order.get(next) {
            next += 1;
            for dep in self.direct_deps(id) {
                if seen.insert(dep) {
                    order.push(dep);
                }
            }
        }
        order.reverse();
        order
    }

    /// Mark every module in `root`'s tree as global. Modules that become global move to the back
    /// of the global list in tree order; modules that already were global stay where they are.
    pub fn promote_to_global(&mut self, root: ModuleId) {
        for id in self.module_tree(root) {
            let module = &mut self.graph[id.0];
            if module.is_global {
                continue;
            }
            module.is_global = true;
            debug!("{}: promoted to global scope", module);
            if let Some(pos) = self.order.iter().position(|m| *m == id) {
                self.order.remove(pos);
                self.order.push(id);
            }
        }
    }
}

impl<S> Index<ModuleId> for ModuleList<S> {
    type Output = Module<S>;

    fn index(&self, id: ModuleId) -> &Self::Output {
        &self.graph[id.0]
    }
}
