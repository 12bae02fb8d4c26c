//! Global String Interner
//!
//! Turns strings into compact integer [`Symbol`]s so define names and uniform
//! identifiers compare and hash as integers.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

/// Global interner instance
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Symbol type alias
///
/// A Symbol is a compact integer identifier that compares and hashes cheaply.
pub type Symbol = Spur;

/// Interns a string and returns its Symbol.
///
/// Returns the existing Symbol if the string is already interned.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up the Symbol of an already interned string.
///
/// Never allocates; returns `None` when the string was never interned.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a Symbol back to its string.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Pre-interns the uniform names the renderer sets on every draw, so the hot
/// path only performs lookups.
pub fn preload_builtin_uniforms() {
    let common = [
        "projectionMatrix",
        "viewMatrix",
        "cameraPosition",
        "modelViewMatrix",
        "normalMatrix",
        "modelMatrix",
        "position",
    ];

    for name in common {
        intern(name);
    }
}
