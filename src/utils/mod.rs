//! Small shared helpers.
//!
//! [`interner`] maps define names and uniform identifiers to [`Symbol`]s; the
//! uniform tree and [`ShaderDefines`](crate::resources::ShaderDefines) key on
//! them.

pub mod interner;

pub use interner::Symbol;
