//! Pagelet web crate: turns a request path into a finished HTML document.
//!
//! Pipeline per request: [`PageletCore::match_route`] finds the page script,
//! [`PageletCore::execute_page`] evaluates it in a fresh context and runs its
//! hooks, [`PageletCore::list_pages`] builds the navigation listing, and
//! [`PageletCore::compose`] merges both into the shared template.

#[cfg(feature = "axum")]
pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod nav;
pub mod template;

#[cfg(feature = "axum")]
pub use adapters::axum::{AxumPageletAdapter, SOURCE_HEADER, page_request_from_parts};
pub use config::{CONFIG_FILE, ConfigError, SiteConfig, load_site_config};
pub use engine::{PageRoute, PageletCore, PageletEngine, RenderOutput, decode_url_path};
pub use error::{PageError, PageResult};
pub use nav::list_pages;
pub use pagelet_core::{PageOutput, PageRequest, ProtocolViolation, ScriptError, ScriptLimits};
pub use template::{Template, TemplateError, TemplateModel, compose};
