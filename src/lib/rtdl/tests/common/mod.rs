//! An in-memory module format for driving the linker in tests.
//!
//! A [FakeFile] lists the dependencies a module declares, the symbols it exports, and the symbols
//! its relocations reference. [FakeLoader] maps each module at a fresh load bias and records every
//! binding it makes while relocating, so tests can see which definition a reference bound to.

#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use rtdl::{
    scope::SymbolResolver, DecodedModule, DlError, DlErrorKind, Handle, Linker, ModuleLoader,
    OpenMode, RetrieveError, Soname, StartupModule, Symbol, SymbolKind,
};

pub type Syms = HashMap<String, Symbol>;
pub type Bindings = Arc<Mutex<HashMap<(String, String), u64>>>;
pub type InitLog = Arc<Mutex<Vec<String>>>;

pub const NOW: i32 = OpenMode::NOW.bits() as i32;
pub const LAZY: i32 = OpenMode::LAZY.bits() as i32;
pub const NOW_GLOBAL: i32 = OpenMode::NOW.union(OpenMode::GLOBAL).bits() as i32;
pub const NOW_NOLOAD: i32 = OpenMode::NOW.union(OpenMode::NOLOAD).bits() as i32;
pub const NOLOAD_GLOBAL: i32 = OpenMode::NOW
    .union(OpenMode::NOLOAD)
    .union(OpenMode::GLOBAL)
    .bits() as i32;

const FIRST_BIAS: u64 = 0x1000_0000;
const BIAS_STRIDE: u64 = 0x0100_0000;

#[derive(Clone, Default)]
pub struct FakeFile {
    deps: Vec<Soname>,
    defines: Syms,
    needs: Vec<String>,
    corrupt: bool,
}

impl FakeFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dep(mut self, name: &str) -> Self {
        self.deps.push(name.into());
        self
    }

    pub fn define(mut self, name: &str, value: u64) -> Self {
        self.defines.insert(
            name.to_string(),
            Symbol::new(value, 8, SymbolKind::Function),
        );
        self
    }

    pub fn define_tls(mut self, name: &str, value: u64) -> Self {
        self.defines
            .insert(name.to_string(), Symbol::new(value, 8, SymbolKind::Tls));
        self
    }

    pub fn need(mut self, name: &str) -> Self {
        self.needs.push(name.to_string());
        self
    }

    /// Make decoding this file fail.
    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }
}

/// The set of files the retrieval callback can find, plus a log of every name it was asked for.
#[derive(Default)]
pub struct Fs {
    files: HashMap<String, FakeFile>,
    io_errors: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl Fs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, file: FakeFile) -> Self {
        self.files.insert(name.to_string(), file);
        self
    }

    pub fn io_error(mut self, name: &str, reason: &str) -> Self {
        self.io_errors.insert(name.to_string(), reason.to_string());
        self
    }

    pub fn retrieve(&self, name: &Soname) -> Result<FakeFile, RetrieveError> {
        self.calls.lock().push(name.to_string());
        if let Some(reason) = self.io_errors.get(name.as_str()) {
            return Err(RetrieveError::Io(reason.clone()));
        }
        self.files
            .get(name.as_str())
            .cloned()
            .ok_or(RetrieveError::NotFound)
    }

    pub fn retriever(&self) -> impl FnMut(&Soname) -> Result<FakeFile, RetrieveError> + '_ {
        move |name: &Soname| self.retrieve(name)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

pub struct FakeLoader {
    next_bias: u64,
    bindings: Bindings,
    inits: InitLog,
}

impl FakeLoader {
    pub fn new() -> (Self, Bindings) {
        let bindings = Bindings::default();
        (
            Self {
                next_bias: FIRST_BIAS,
                bindings: bindings.clone(),
                inits: InitLog::default(),
            },
            bindings,
        )
    }

    /// Names of initialized modules, in the order their initializers ran.
    pub fn init_log(&self) -> InitLog {
        self.inits.clone()
    }
}

impl ModuleLoader for FakeLoader {
    type File = FakeFile;
    type Symbols = Syms;
    type Image = Vec<String>;

    fn decode(
        &mut self,
        name: &Soname,
        file: FakeFile,
    ) -> Result<DecodedModule<Syms, Vec<String>>, DlError> {
        if file.corrupt {
            return Err(DlErrorKind::DecodeFailed {
                module: name.clone(),
                reason: "not an ELF file".to_string(),
            }
            .into());
        }
        let load_bias = self.next_bias;
        self.next_bias += BIAS_STRIDE;
        Ok(DecodedModule {
            deps: file.deps,
            symbols: file.defines,
            load_bias,
            image: file.needs,
        })
    }

    fn relocate(
        &mut self,
        name: &Soname,
        needs: Vec<String>,
        resolver: &dyn SymbolResolver,
    ) -> Result<(), DlError> {
        for symbol in needs {
            let addr = resolver.resolve(&symbol)?;
            self.bindings
                .lock()
                .insert((name.to_string(), symbol), addr);
        }
        Ok(())
    }

    fn init(&mut self, name: &Soname) {
        self.inits.lock().push(name.to_string());
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn setup() -> (Linker<FakeLoader>, Bindings) {
    setup_with_startup(vec![])
}

pub fn setup_with_startup(startup: Vec<StartupModule<Syms>>) -> (Linker<FakeLoader>, Bindings) {
    init_tracing();
    let (loader, bindings) = FakeLoader::new();
    let linker = Linker::new(loader, startup).expect("failed to create linker");
    (linker, bindings)
}

pub fn setup_recording_inits(
    startup: Vec<StartupModule<Syms>>,
) -> (Linker<FakeLoader>, Bindings, InitLog) {
    init_tracing();
    let (loader, bindings) = FakeLoader::new();
    let inits = loader.init_log();
    let linker = Linker::new(loader, startup).expect("failed to create linker");
    (linker, bindings, inits)
}

pub fn startup(name: &str, bias: u64, defines: &[(&str, u64)], global: bool) -> StartupModule<Syms> {
    let symbols = defines
        .iter()
        .map(|(n, v)| (n.to_string(), Symbol::new(*v, 8, SymbolKind::Object)))
        .collect();
    StartupModule::new(name, bias, symbols, global)
}

/// The load bias of a loaded module, by name.
pub fn bias_of(linker: &Linker<FakeLoader>, name: &str) -> u64 {
    linker
        .loaded_modules()
        .into_iter()
        .find(|m| m.name == name)
        .map(|m| m.load_bias)
        .unwrap_or_else(|| panic!("{} is not loaded", name))
}

/// The address that `module`'s reference to `symbol` was bound to during relocation.
pub fn binding(bindings: &Bindings, module: &str, symbol: &str) -> Option<u64> {
    bindings
        .lock()
        .get(&(module.to_string(), symbol.to_string()))
        .copied()
}

pub fn global_order(linker: &Linker<FakeLoader>) -> Vec<String> {
    linker
        .loaded_modules()
        .into_iter()
        .map(|m| m.name.to_string())
        .collect()
}

pub fn tree(linker: &Linker<FakeLoader>, handle: Handle) -> Vec<String> {
    linker
        .module_tree(handle)
        .expect("invalid handle")
        .into_iter()
        .map(|n| n.to_string())
        .collect()
}

pub fn is_loaded(linker: &Linker<FakeLoader>, name: &str) -> bool {
    linker.loaded_modules().iter().any(|m| m.name == name)
}
