//! Shader Preprocessor Defines
//!
//! A material's defines become a `#define NAME VALUE` block in front of both
//! shader stages, and that block is part of the program signature. Entries are
//! interned and kept sorted by key, so declaration order never splits a
//! program.
//!
//! ```rust,ignore
//! use myth_gl::resources::ShaderDefines;
//!
//! let mut defines = ShaderDefines::new();
//! defines.set("MAX_LIGHTS", "4");
//! defines.set_flag("USE_FOG", false); // kept, but not emitted
//!
//! assert_eq!(defines.to_prefix(), "#define MAX_LIGHTS 4\n");
//! ```

use std::fmt::Write as _;

use crate::utils::interner::{self, Symbol};

const FALSE_VALUE: &str = "false";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderDefines {
    entries: Vec<(Symbol, Symbol)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: Symbol) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&key, |&(k, _)| k)
    }

    /// Sets `key`, replacing any previous value.
    pub fn set(&mut self, key: &str, value: &str) {
        let key = interner::intern(key);
        let value = interner::intern(value);
        match self.position(key) {
            Ok(i) => self.entries[i].1 = value,
            Err(i) => self.entries.insert(i, (key, value)),
        }
    }

    /// Boolean define; `false` stays in the table but is not emitted.
    pub fn set_flag(&mut self, key: &str, enabled: bool) {
        self.set(key, if enabled { "true" } else { FALSE_VALUE });
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let Some(key) = interner::get(key) else {
            return false;
        };
        match self.position(key) {
            Ok(i) => {
                self.entries.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        interner::get(key).is_some_and(|key| self.position(key).is_ok())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'static str> {
        let key = interner::get(key)?;
        let i = self.position(key).ok()?;
        Some(interner::resolve(self.entries[i].1))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.entries
            .iter()
            .map(|&(k, v)| (interner::resolve(k), interner::resolve(v)))
    }

    /// The `#define` block for the shader sources.
    #[must_use]
    pub fn to_prefix(&self) -> String {
        let mut prefix = String::with_capacity(self.entries.len() * 24);
        for (name, value) in self.iter().filter(|&(_, v)| v != FALSE_VALUE) {
            let _ = writeln!(prefix, "#define {name} {value}");
        }
        prefix
    }

    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        use std::hash::BuildHasher;

        rustc_hash::FxBuildHasher.hash_one(self)
    }
}
