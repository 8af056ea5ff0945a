//! Error types for the render orchestration core.
//!
//! This module defines the central `Error` enum shared by the queue, render,
//! cache and scheduler layers. The HTTP layer maps these onto status codes; the
//! worker only logs them.
//!
//! ## Error Cases
//! - `Io`: A filesystem operation on the staging or cache directories failed.
//! - `InvalidValue`: A value cannot be shown on the configured display.
//! - `InvalidConfig`: A configuration parameter is out of range.
//! - `MissingResource`: The render backend cannot initialize (fatal at
//!   startup).
//! - `Render`: A single frame failed to render.
//! - `Encode`: The external encoder failed or could not be started.
//! - `ChannelError`: Internal communication with the worker failed.
//! - `ServiceShutdown`: Work arrived while the service was shutting down.

use std::path::{Path, PathBuf};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the render orchestration core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Filesystem failure, with the path that was being touched.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The value does not fit on the display.
    #[error("Invalid value: {reason}")]
    InvalidValue { reason: String },

    /// A configuration parameter is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Backend resources (theme materials, scene) are unavailable.
    #[error("Missing render resource: {reason}")]
    MissingResource { reason: String },

    /// Rendering a single frame failed.
    #[error("Render error: {reason}")]
    Render { reason: String },

    /// The animation encoder failed.
    #[error("Encode error: {reason}")]
    Encode { reason: String },

    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn render(reason: impl Into<String>) -> Self {
        Self::Render {
            reason: reason.into(),
        }
    }

    pub(crate) fn encode(reason: impl Into<String>) -> Self {
        Self::Encode {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
