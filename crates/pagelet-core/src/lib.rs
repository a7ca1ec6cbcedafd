//! Pagelet core crate.
//!
//! Everything that touches the JavaScript engine lives here:
//!
//! - `runtime`: [`ScriptContext`], a single-use Boa context that evaluates one
//!   page script and exposes its top-level bindings as [`HookBinding`]s.
//! - `hooks`: the two-phase `loader` → `render` protocol driven against a
//!   freshly evaluated context.
//! - `request`: the immutable [`PageRequest`] snapshot handed to `loader`.
//!
//! A context is created, used and dropped inside one call. Nothing evaluated
//! for one request is visible to another.

pub mod error;
pub mod hooks;
pub mod request;
pub mod runtime;

pub use error::{ProtocolViolation, ScriptError, ScriptResult};
pub use hooks::{PageOutput, invoke_hooks, run_page};
pub use request::PageRequest;
pub use runtime::{Hook, HookBinding, PageCapabilities, ScriptContext, ScriptLimits};
