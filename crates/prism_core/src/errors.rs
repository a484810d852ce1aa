//! Error Types
//!
//! This module defines the error types used throughout the bridge.
//!
//! # Overview
//!
//! The main error type [`PrismError`] covers the failure modes that are
//! reported rather than asserted:
//! - Backend command failures (a native call returned a non-success status)
//! - Render loop failures (catastrophic pass errors, panics in native code)
//! - Configuration parsing errors
//!
//! Precondition violations (an instance group with mismatched material slot
//! counts, a second render session on the same renderer) are not represented
//! here: they are assertions.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, PrismError>`.
//!
//! ```rust,ignore
//! use prism::errors::{PrismError, Result};
//!
//! fn attach_all() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// A failed backend command.
///
/// Carries the name of the command and the native status code it returned so
/// the session manager can surface a readable reason to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("backend call `{op}` failed with status {code}")]
pub struct BackendError {
    /// Name of the backend command that failed.
    pub op: &'static str,
    /// Native status code.
    pub code: i32,
}

impl BackendError {
    #[inline]
    #[must_use]
    pub fn new(op: &'static str, code: i32) -> Self {
        Self { op, code }
    }
}

/// Why a render loop stopped abnormally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderFailure {
    /// The backend reported an error for a render-pass or buffer call.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Native code panicked while inside a backend call.
    #[error("render backend panicked: {0}")]
    Panicked(String),
}

/// The main error type for the bridge.
#[derive(Error, Debug)]
pub enum PrismError {
    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// A scene or render backend command failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The render loop terminated catastrophically.
    #[error("Render failed: {0}")]
    Render(#[from] RenderFailure),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// An operation needed an active render session but none is running.
    #[error("No active render session")]
    NoActiveSession,

    /// A worker thread could not be spawned or joined.
    #[error("Render thread error: {0}")]
    Thread(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Settings parsed but hold an unusable value.
    #[error("Invalid setting `{field}`: {reason}")]
    InvalidSetting {
        /// Name of the offending field.
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<std::io::Error> for PrismError {
    fn from(err: std::io::Error) -> Self {
        PrismError::Thread(err.to_string())
    }
}

/// Alias for `Result<T, PrismError>`.
pub type Result<T> = std::result::Result<T, PrismError>;
