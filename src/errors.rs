//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`MythGlError`] covers the failure modes that are
//! reported to the caller:
//! - Scene-graph misuse (missing nodes, cyclic parenting)
//! - Uniform name paths the parser cannot decompose
//! - Rejected render-target read-backs
//! - Configuration parsing
//!
//! Frame rendering itself never fails: [`Renderer::render`](crate::Renderer::render)
//! degrades every problem to "skip this unit of work" and logs it instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_gl::errors::{MythGlError, Result};
//!
//! fn build_scene() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::scene::NodeHandle;

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum MythGlError {
    // ========================================================================
    // Scene Graph Errors
    // ========================================================================
    /// The node handle does not refer to a live node.
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeHandle),

    /// A node cannot be attached to itself.
    #[error("Node {0:?} cannot be attached to itself")]
    SelfAttachment(NodeHandle),

    /// Attaching would make a node its own ancestor.
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    CyclicAttachment {
        /// The node being attached
        child: NodeHandle,
        /// The requested parent, which is a descendant of `child`
        parent: NodeHandle,
    },

    /// The node exists but is not a camera.
    #[error("Node {0:?} is not a camera")]
    NotACamera(NodeHandle),

    // ========================================================================
    // Uniform Errors
    // ========================================================================
    /// A uniform name reported by the driver could not be decomposed.
    #[error("Malformed uniform path '{path}': {reason}")]
    MalformedUniformPath {
        /// The full name as reported by the driver
        path: String,
        /// What went wrong
        reason: &'static str,
    },

    // ========================================================================
    // Read-back Errors
    // ========================================================================
    /// The requested rectangle lies (partly) outside the render target.
    #[error("Read-back rectangle {x},{y} {width}x{height} exceeds target size {target_width}x{target_height}")]
    ReadOutOfRange {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    },

    /// The destination buffer cannot hold the requested pixels.
    #[error("Read-back buffer too small: need {needed} bytes, got {actual}")]
    ReadBufferTooSmall {
        /// Required size in bytes
        needed: usize,
        /// Provided size in bytes
        actual: usize,
    },

    /// The render target has never been bound, so it has no framebuffer yet.
    #[error("Render target has no framebuffer; bind it at least once before reading")]
    RenderTargetNotInitialized,

    /// The framebuffer is not complete and cannot be read.
    #[error("Framebuffer incomplete")]
    FramebufferIncomplete,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings JSON parsing error.
    #[error("Settings parse error: {0}")]
    SettingsError(#[from] serde_json::Error),
}

/// Alias for `Result<T, MythGlError>`.
pub type Result<T> = std::result::Result<T, MythGlError>;
