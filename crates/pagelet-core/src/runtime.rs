use crate::error::{ScriptError, ScriptResult};
use boa_engine::vm::RuntimeLimits;
use boa_engine::{
    Context, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue, Source, js_string,
};
use serde_json::Value;

const DEFAULT_MAX_LOOP_ITERATIONS: u64 = 10_000_000;
const DEFAULT_MAX_RECURSION_DEPTH: usize = 512;

/// Upper bounds installed on every fresh context.
///
/// A page script that loops forever hits the loop limit and fails the request
/// instead of pinning its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub max_loop_iterations: u64,
    pub max_recursion_depth: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

/// The named hooks a page script may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Loader,
    Render,
}

impl Hook {
    pub fn name(self) -> &'static str {
        match self {
            Self::Loader => "loader",
            Self::Render => "render",
        }
    }

    fn global_key(self) -> JsString {
        match self {
            Self::Loader => js_string!("loader"),
            Self::Render => js_string!("render"),
        }
    }

    /// Resolves a lexical (`let`/`const`) binding, which never lands on the
    /// global object.
    fn lexical_probe(self) -> &'static str {
        match self {
            Self::Loader => "typeof loader === 'undefined' ? undefined : loader",
            Self::Render => "typeof render === 'undefined' ? undefined : render",
        }
    }
}

/// Result of looking a hook up by name.
#[derive(Debug, Clone)]
pub enum HookBinding {
    Callable(JsObject),
    /// Bound, but to a value that cannot be called (including `null`).
    NotCallable,
    /// Not bound, or bound to `undefined`.
    Absent,
}

impl HookBinding {
    fn classify(value: &JsValue) -> Self {
        if value.is_undefined() {
            return Self::Absent;
        }
        match value.as_callable() {
            Some(function) => Self::Callable(function.clone()),
            None => Self::NotCallable,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }
}

/// Which hooks an evaluated page script exposes as callables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageCapabilities {
    pub has_loader: bool,
    pub has_render: bool,
}

impl PageCapabilities {
    pub fn of(loader: &HookBinding, render: &HookBinding) -> Self {
        Self {
            has_loader: loader.is_callable(),
            has_render: render.is_callable(),
        }
    }
}

/// Single-use evaluation context for exactly one page script.
///
/// Boa contexts are neither `Send` nor `Sync`; callers create one inside the
/// worker that handles the request and drop it before returning.
pub struct ScriptContext {
    context: Context,
}

impl ScriptContext {
    pub fn new(limits: ScriptLimits) -> Self {
        let mut context = Context::default();
        let mut runtime_limits = RuntimeLimits::default();
        runtime_limits.set_loop_iteration_limit(limits.max_loop_iterations);
        runtime_limits.set_recursion_limit(limits.max_recursion_depth);
        context.set_runtime_limits(runtime_limits);
        Self { context }
    }

    /// Evaluates page source into this context. Top-level bindings become
    /// visible to [`ScriptContext::binding`].
    pub fn evaluate(&mut self, source: &str) -> ScriptResult<()> {
        match self.context.eval(Source::from_bytes(source)) {
            Ok(_) => Ok(()),
            Err(err) => Err(ScriptError::Evaluation(self.describe(&err))),
        }
    }

    pub fn binding(&mut self, hook: Hook) -> JsResult<HookBinding> {
        let global = self.context.global_object();
        let value = global.get(hook.global_key(), &mut self.context)?;
        if !value.is_undefined() {
            return Ok(HookBinding::classify(&value));
        }
        let value = self
            .context
            .eval(Source::from_bytes(hook.lexical_probe()))?;
        Ok(HookBinding::classify(&value))
    }

    pub fn call(&mut self, function: &JsObject, args: &[JsValue]) -> JsResult<JsValue> {
        function.call(&JsValue::undefined(), args, &mut self.context)
    }

    pub fn import_json(&mut self, value: &Value) -> JsResult<JsValue> {
        JsValue::from_json(value, &mut self.context)
    }

    /// Copies a script value out of the context with `JSON.stringify`
    /// semantics. `undefined`, `null`, functions and symbols export as `None`.
    /// Text the host cannot parse back (nesting deeper than serde_json allows)
    /// is a `TypeError`.
    pub fn export_json(&mut self, value: &JsValue) -> JsResult<Option<Value>> {
        if value.is_null_or_undefined() {
            return Ok(None);
        }
        let global = self.context.global_object();
        let json = global.get(js_string!("JSON"), &mut self.context)?;
        let Some(json) = json.as_object().cloned() else {
            return Ok(None);
        };
        let stringify = json.get(js_string!("stringify"), &mut self.context)?;
        let Some(stringify) = stringify.as_callable().cloned() else {
            return Ok(None);
        };
        let text = stringify.call(&JsValue::from(json), &[value.clone()], &mut self.context)?;
        if text.is_undefined() {
            return Ok(None);
        }
        let text = self.to_text(&text)?;
        let value = serde_json::from_str::<Value>(&text).map_err(|e| {
            JsNativeError::typ().with_message(format!("value cannot be exported: {e}"))
        })?;
        Ok(Some(value).filter(|v| !v.is_null()))
    }

    pub fn to_text(&mut self, value: &JsValue) -> JsResult<String> {
        Ok(value.to_string(&mut self.context)?.to_std_string_escaped())
    }

    /// Human-readable diagnostic for a thrown value. Thrown `Error` objects
    /// read as `Name: message`, thrown primitives as their string form.
    pub fn describe(&mut self, err: &JsError) -> String {
        match err.as_opaque() {
            Some(thrown) => self.to_text(thrown).unwrap_or_else(|_| err.to_string()),
            None => err.to_string(),
        }
    }
}
