//! Uniform name paths.
//!
//! GL reports every active uniform under a flattened name such as
//! `diffuse`, `weights[0]` or `lights[1].color`. A path decomposes into
//! identifier and index steps; the last step is the leaf.
//!
//! A trailing `[n]` makes the leaf a *pure array* keyed by the identifier in
//! front of it. Any subscript followed by more path (`lights[1].color`) is a
//! step into a structure whose child is keyed by the index.

use smallvec::SmallVec;

use crate::errors::{MythGlError, Result};
use crate::utils::interner::{self, Symbol};

/// Key of a node inside a uniform container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformId {
    Name(Symbol),
    Index(u32),
}

impl std::fmt::Display for UniformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(sym) => f.write_str(interner::resolve(*sym)),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Single,
    PureArray,
}

/// A decomposed uniform name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformPath {
    /// Structure steps from the program root down to the leaf's container.
    pub steps: SmallVec<[UniformId; 4]>,
    pub leaf: UniformId,
    pub kind: LeafKind,
}

fn malformed(path: &str, reason: &'static str) -> MythGlError {
    MythGlError::MalformedUniformPath {
        path: path.to_owned(),
        reason,
    }
}

/// Splits an active uniform name into structure steps and a leaf.
pub fn parse_uniform_path(path: &str) -> Result<UniformPath> {
    let bytes = path.as_bytes();
    let mut steps: SmallVec<[UniformId; 4]> = SmallVec::new();
    let mut pos = 0;

    loop {
        let start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        if pos == start {
            return Err(malformed(path, "expected an identifier or index"));
        }
        let token = &path[start..pos];

        let is_index = bytes.get(pos) == Some(&b']');
        if is_index {
            pos += 1;
        }
        let id = if is_index {
            let index = token
                .parse::<u32>()
                .map_err(|_| malformed(path, "array subscript is not a number"))?;
            UniformId::Index(index)
        } else if path[..start].ends_with('[') {
            return Err(malformed(path, "unterminated array subscript"));
        } else {
            UniformId::Name(interner::intern(token))
        };

        match bytes.get(pos) {
            None => {
                return Ok(UniformPath {
                    steps,
                    leaf: id,
                    kind: LeafKind::Single,
                });
            }
            Some(b'[') if is_terminal_subscript(&bytes[pos + 1..]) => {
                return Ok(UniformPath {
                    steps,
                    leaf: id,
                    kind: LeafKind::PureArray,
                });
            }
            Some(b'[' | b'.') => {
                steps.push(id);
                pos += 1;
            }
            Some(_) => return Err(malformed(path, "unexpected character")),
        }
    }
}

/// `true` for the remainder `digits]` with nothing after it.
fn is_terminal_subscript(rest: &[u8]) -> bool {
    match rest.split_last() {
        Some((b']', digits)) => !digits.is_empty() && digits.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}
