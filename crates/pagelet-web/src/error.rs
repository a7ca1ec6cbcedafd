use crate::template::TemplateError;
use pagelet_core::ScriptError;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a page request can fail. Only `NotFound` maps to 404.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("page not found: {path}")]
    NotFound { path: String },
    #[error("Error reading file: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl PageError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn status(&self) -> u16 {
        if self.is_not_found() { 404 } else { 500 }
    }
}

pub type PageResult<T> = Result<T, PageError>;
