//! The mode argument to [crate::linker::Linker::open].

use crate::{DlError, DlErrorKind};

bitflags::bitflags! {
    /// Flags controlling how a module is opened. Bit values follow `<dlfcn.h>`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpenMode : u32 {
        /// Resolve lazily. Accepted, but all binding is done eagerly.
        const LAZY = 0x1;
        /// Resolve all references before returning.
        const NOW = 0x2;
        /// Fail unless the module is already loaded.
        const NOLOAD = 0x4;
        /// Make the module and its dependencies part of the global scope.
        const GLOBAL = 0x100;
        /// Never unload. Accepted; nothing is unloaded anyway.
        const NODELETE = 0x1000;
    }
}

impl OpenMode {
    /// Keep the module out of the global scope. This is the absence of [OpenMode::GLOBAL].
    pub const LOCAL: OpenMode = OpenMode::empty();

    /// Validate a raw mode value. Exactly one of LAZY and NOW must be set, and no unknown bits.
    pub fn from_raw(mode: i32) -> Result<Self, DlError> {
        let invalid = || DlError::from(DlErrorKind::InvalidMode { mode });
        let flags = OpenMode::from_bits(mode as u32).ok_or_else(invalid)?;
        let binding = flags & (OpenMode::LAZY | OpenMode::NOW);
        if binding != OpenMode::LAZY && binding != OpenMode::NOW {
            return Err(invalid());
        }
        Ok(flags)
    }

    pub fn is_global(&self) -> bool {
        self.contains(OpenMode::GLOBAL)
    }

    pub fn is_noload(&self) -> bool {
        self.contains(OpenMode::NOLOAD)
    }
}

impl TryFrom<i32> for OpenMode {
    type Error = DlError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_raw(value)
    }
}
