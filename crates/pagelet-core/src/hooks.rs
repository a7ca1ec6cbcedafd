//! Two-phase hook protocol.
//!
//! 1. `loader`, when bound, must be callable and runs once with the request.
//! 2. `render` is mandatory, must be callable, and runs once with the
//!    exported loader data, or with no argument when there is none.
//!
//! The first failing step ends the protocol.

use crate::error::{ProtocolViolation, ScriptError, ScriptResult};
use crate::request::PageRequest;
use crate::runtime::{Hook, HookBinding, PageCapabilities, ScriptContext, ScriptLimits};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct PageOutput {
    /// Render return value coerced to text.
    pub html: String,
    pub loader_ran: bool,
    /// Data exported from `loader`, as passed to `render`.
    pub loader_data: Option<Value>,
}

/// Evaluates `source` in a brand-new context and runs its hooks.
///
/// The context is dropped before this returns.
pub fn run_page(
    source: &str,
    request: &PageRequest,
    limits: ScriptLimits,
) -> ScriptResult<PageOutput> {
    let mut ctx = ScriptContext::new(limits);
    ctx.evaluate(source)?;
    invoke_hooks(&mut ctx, request)
}

/// Runs the loader/render protocol against an already evaluated context.
pub fn invoke_hooks(ctx: &mut ScriptContext, request: &PageRequest) -> ScriptResult<PageOutput> {
    let loader = ctx
        .binding(Hook::Loader)
        .map_err(|e| ScriptError::Loader(ctx.describe(&e)))?;

    let (loader_ran, loader_data) = match &loader {
        HookBinding::Absent => (false, None),
        HookBinding::NotCallable => return Err(ProtocolViolation::LoaderNotCallable.into()),
        HookBinding::Callable(function) => {
            debug!(path = %request.path, "invoking loader");
            let data = call_loader(ctx, function, request)?;
            (true, data)
        }
    };

    let render = ctx
        .binding(Hook::Render)
        .map_err(|e| ScriptError::Render(ctx.describe(&e)))?;
    let hooks = PageCapabilities::of(&loader, &render);
    debug!(
        path = %request.path,
        has_loader = hooks.has_loader,
        has_render = hooks.has_render,
        "hooks resolved"
    );
    let render = match render {
        HookBinding::Absent => return Err(ProtocolViolation::RenderMissing.into()),
        HookBinding::NotCallable => return Err(ProtocolViolation::RenderNotCallable.into()),
        HookBinding::Callable(function) => function,
    };

    let args = match &loader_data {
        Some(data) => vec![
            ctx.import_json(data)
                .map_err(|e| ScriptError::Render(ctx.describe(&e)))?,
        ],
        None => Vec::new(),
    };

    debug!(path = %request.path, args = args.len(), "invoking render");
    let result = ctx
        .call(&render, &args)
        .map_err(|e| ScriptError::Render(ctx.describe(&e)))?;
    let html = ctx
        .to_text(&result)
        .map_err(|e| ScriptError::Render(ctx.describe(&e)))?;

    Ok(PageOutput {
        html,
        loader_ran,
        loader_data,
    })
}

fn call_loader(
    ctx: &mut ScriptContext,
    loader: &boa_engine::JsObject,
    request: &PageRequest,
) -> ScriptResult<Option<Value>> {
    let request = serde_json::to_value(request).map_err(|e| ScriptError::Loader(e.to_string()))?;
    let arg = ctx
        .import_json(&request)
        .map_err(|e| ScriptError::Loader(ctx.describe(&e)))?;
    let result = ctx
        .call(loader, &[arg])
        .map_err(|e| ScriptError::Loader(ctx.describe(&e)))?;
    ctx.export_json(&result)
        .map_err(|e| ScriptError::Loader(ctx.describe(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(source: &str) -> ScriptResult<PageOutput> {
        run_page(
            source,
            &PageRequest::new("GET", "/page"),
            ScriptLimits::default(),
        )
    }

    #[test]
    fn test_render_without_loader_gets_no_argument() {
        let out = run(
            "function render(data) { return arguments.length === 0 ? 'no-data' : 'got-data'; }",
        )
        .expect("page should render");
        assert_eq!(out.html, "no-data");
        assert!(!out.loader_ran);
        assert_eq!(out.loader_data, None);
    }

    #[test]
    fn test_loader_data_flows_into_render() {
        let out = run(
            r#"
            function loader(req) { return { greeting: "hello", path: req.path }; }
            function render(data) { return JSON.stringify(data); }
            "#,
        )
        .expect("page should render");
        assert!(out.loader_ran);
        assert_eq!(
            out.loader_data,
            Some(json!({"greeting": "hello", "path": "/page"}))
        );
        let echoed: Value = serde_json::from_str(&out.html).expect("render echoes json");
        assert_eq!(echoed, json!({"greeting": "hello", "path": "/page"}));
    }

    #[test]
    fn test_render_receives_a_copy_not_the_loader_object() {
        let out = run(
            r#"
            var kept;
            function loader() { kept = { n: 1 }; return kept; }
            function render(data) { data.n = 2; return String(kept.n) + ":" + (data === kept); }
            "#,
        )
        .expect("page should render");
        assert_eq!(out.html, "1:false");
    }

    #[test]
    fn test_loader_sees_request_fields() {
        let request = PageRequest::new("POST", "/submit")
            .with_header("x-token", "one")
            .with_header("x-token", "two")
            .with_body("payload");
        let out = run_page(
            r#"
            function loader(req) {
              return [req.method, req.path, req.headers["x-token"].join(","), req.body].join("|");
            }
            function render(data) { return data; }
            "#,
            &request,
            ScriptLimits::default(),
        )
        .expect("page should render");
        assert_eq!(out.html, "POST|/submit|one,two|payload");
    }

    #[test]
    fn test_loader_returning_null_calls_render_without_argument() {
        let out = run(
            "function loader() { return null; } function render() { return String(arguments.length); }",
        )
        .expect("page should render");
        assert!(out.loader_ran);
        assert_eq!(out.html, "0");
    }

    #[test]
    fn test_loader_is_invoked_once_before_render() {
        let out = run(
            r#"
            var calls = [];
            function loader() { calls.push("loader"); return { ok: true }; }
            function render() { calls.push("render"); return calls.join(","); }
            "#,
        )
        .expect("page should render");
        assert_eq!(out.html, "loader,render");
    }

    #[test]
    fn test_missing_render_is_protocol_error() {
        let err = run("function loader() { return {}; }").unwrap_err();
        assert_eq!(err, ScriptError::Protocol(ProtocolViolation::RenderMissing));
        assert_eq!(err.to_string(), "render function not found");
    }

    #[test]
    fn test_non_callable_hooks_are_protocol_errors() {
        let err = run("var loader = 'nope'; function render() { return ''; }").unwrap_err();
        assert_eq!(err.to_string(), "loader is not a function");

        let err = run("var render = { html: '' };").unwrap_err();
        assert_eq!(err.to_string(), "render is not a function");
    }

    #[test]
    fn test_loader_throw_becomes_loader_error() {
        let err = run(
            "function loader() { throw new Error('db down'); } function render() { return ''; }",
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::Loader(_)));
        assert!(err.to_string().starts_with("Loader error: "));
        assert!(err.to_string().contains("db down"));
    }

    #[test]
    fn test_unexportable_loader_result_is_loader_error() {
        let err = run(
            r#"
            function loader() {
              var v = [];
              for (var i = 0; i < 200; i++) { v = [v]; }
              return v;
            }
            function render() { return 'args=' + arguments.length; }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::Loader(_)), "{err}");
        assert!(err.to_string().starts_with("Loader error: "));
    }

    #[test]
    fn test_render_throw_becomes_render_error() {
        let err = run("function render() { throw 'bad markup'; }").unwrap_err();
        assert_eq!(err, ScriptError::Render("bad markup".to_string()));
        assert_eq!(err.to_string(), "Render error: bad markup");
    }

    #[test]
    fn test_render_result_is_coerced_to_text() {
        let out = run("function render() { return 42; }").expect("page should render");
        assert_eq!(out.html, "42");
    }
}
