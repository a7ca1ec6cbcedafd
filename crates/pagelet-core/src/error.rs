//! Failure taxonomy for script evaluation and hook invocation.

use thiserror::Error;

/// A required hook is missing or bound to something that cannot be called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("loader is not a function")]
    LoaderNotCallable,
    #[error("render function not found")]
    RenderMissing,
    #[error("render is not a function")]
    RenderNotCallable,
}

/// Errors raised while evaluating a page script or running its hooks.
///
/// The display strings are what the HTTP layer sends back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// Syntax or runtime error while evaluating the page source.
    #[error("JavaScript error: {0}")]
    Evaluation(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    /// `loader` threw, or its result could not be exported.
    #[error("Loader error: {0}")]
    Loader(String),
    /// `render` threw, or its result could not be converted to text.
    #[error("Render error: {0}")]
    Render(String),
}

pub type ScriptResult<T> = Result<T, ScriptError>;
