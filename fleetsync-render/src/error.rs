//! Error types for fleetsync-render.

use thiserror::Error;

/// All errors that can arise from rendering the status page.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),
}
