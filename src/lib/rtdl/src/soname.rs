//! Module names.

use std::{
    borrow::Borrow,
    fmt::{Debug, Display},
    sync::Arc,
};

/// The canonical name of a loadable module. Cloning is cheap; equality and hashing are by the
/// text of the name only.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Soname(Arc<str>);

impl Soname {
    /// Construct a new Soname.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Soname {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Soname {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl AsRef<str> for Soname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets a HashMap<Soname, _> be queried with a plain &str.
impl Borrow<str> for Soname {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Soname {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Soname {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Display for Soname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for Soname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Soname({:?})", &*self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn equality_is_by_text() {
        let a = Soname::new("libfoo.so");
        let b = Soname::from(String::from("libfoo.so"));
        assert_eq!(a, b);
        assert_ne!(a, Soname::new("libfoo.so.1"));
        assert_ne!(a, Soname::new("libfoo"));
        assert_eq!(a, "libfoo.so");
    }

    #[test]
    fn usable_as_map_key() {
        let mut map = HashMap::new();
        map.insert(Soname::new("liba.so"), 1);
        map.insert(Soname::new("libb.so"), 2);
        assert_eq!(map.get("liba.so"), Some(&1));
        assert_eq!(map.get(&Soname::new("libb.so")), Some(&2));
        assert_eq!(map.get("lib"), None);
    }
}
