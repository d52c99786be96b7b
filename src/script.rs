//! Rhai script loading and invocation.
//!
//! A script is a Rhai source file defining `fn execute(conn)`. Loading
//! compiles it; [`ScriptHost::initialize`] runs its top-level statements
//! once; [`ScriptHost::execute`] calls the entry point with a
//! [`Connection`].

use std::path::Path;
use std::rc::Rc;

use rhai::module_resolvers::FileModuleResolver;
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Scope, AST};

use crate::connection::{Connection, Method};
use crate::errors::{RequestError, Result, ScriptExecError};
use crate::models::ScriptOutcome;
use crate::runner::OutputSink;

/// Name of the function every script must define.
pub const ENTRY_POINT: &str = "execute";

type FnResult<T> = std::result::Result<T, Box<EvalAltResult>>;

/// A compiled script plus the scope its top level ran in.
pub struct LoadedScript {
    ast: AST,
    scope: Scope<'static>,
}

impl LoadedScript {
    /// Returns `true` if the script defines `execute` with exactly one parameter.
    #[must_use]
    pub fn has_entry_point(&self) -> bool {
        self.ast
            .iter_functions()
            .any(|f| f.name == ENTRY_POINT && f.params.len() == 1)
    }
}

/// Rhai engine configured with the connection API.
pub struct ScriptHost {
    engine: Engine,
}

impl ScriptHost {
    /// `import` statements resolve relative to `script_dir`; `print` output
    /// goes to `sink`.
    pub fn new(script_dir: &Path, sink: Rc<dyn OutputSink>) -> Self {
        let mut engine = Engine::new();
        engine.set_module_resolver(FileModuleResolver::new_with_path(script_dir));
        engine.on_print(move |text| sink.log(text));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(target: "script", source = source.unwrap_or(""), %pos, "{text}");
        });
        register_connection_api(&mut engine);
        Self { engine }
    }

    /// Compile the script at `absolute`. `script_file` is the caller's
    /// spelling of the path, used in errors.
    pub fn load(&self, script_file: &str, absolute: &Path) -> Result<LoadedScript> {
        tracing::debug!(path = %absolute.display(), "compiling script");
        let ast = self
            .engine
            .compile_file(absolute.to_path_buf())
            .map_err(|e| load_error(script_file, &e))?;
        Ok(LoadedScript {
            ast,
            scope: Scope::new(),
        })
    }

    /// Run the script's top-level statements.
    pub fn initialize(&self, script_file: &str, script: &mut LoadedScript) -> Result<()> {
        self.engine
            .run_ast_with_scope(&mut script.scope, &script.ast)
            .map_err(|e| load_error(script_file, &e))
    }

    /// Call `execute(conn)`.
    ///
    /// `Err` carries the display text of whatever the script raised.
    pub fn execute(
        &self,
        script: &mut LoadedScript,
        conn: Connection,
    ) -> std::result::Result<ScriptOutcome, String> {
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let value: Dynamic = self
            .engine
            .call_fn_with_options(
                options,
                &mut script.scope,
                &script.ast,
                ENTRY_POINT,
                (conn,),
            )
            .map_err(|e| error_text(&e))?;
        outcome_from(value)
    }
}

fn load_error(script_file: &str, err: &EvalAltResult) -> ScriptExecError {
    ScriptExecError::ScriptLoad {
        path: script_file.to_string(),
        message: err.to_string(),
    }
}

/// Display text for an error raised while running `execute`.
///
/// Thrown object maps with a string `message` field yield that field;
/// other thrown values yield their string form. Errors surfacing through
/// nested function calls are unwrapped to the original cause.
#[must_use]
pub fn error_text(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => error_text(inner),
        EvalAltResult::ErrorRuntime(value, _) => thrown_text(value),
        other => other.to_string(),
    }
}

fn thrown_text(value: &Dynamic) -> String {
    if let Some(map) = value.read_lock::<Map>() {
        if let Some(message) = map.get("message").filter(|m| m.is_string()) {
            return message.to_string();
        }
    }
    value.to_string()
}

/// Normalize the value returned by `execute`.
pub(crate) fn outcome_from(value: Dynamic) -> std::result::Result<ScriptOutcome, String> {
    let type_name = value.type_name();
    let Some(map) = value.try_cast::<Map>() else {
        return Err(format!(
            "{ENTRY_POINT} must return an object map, got {type_name}"
        ));
    };
    let success = map
        .get("success")
        .and_then(|v| v.as_bool().ok())
        .unwrap_or(false);
    let message = map.get("message").and_then(truthy_text);
    Ok(ScriptOutcome { success, message })
}

/// Text of a truthy value; `None` for `()`, `false`, `0`, and `""`.
fn truthy_text(value: &Dynamic) -> Option<String> {
    if value.is_unit() {
        return None;
    }
    if let Ok(b) = value.as_bool() {
        return b.then(|| "true".to_string());
    }
    if let Ok(i) = value.as_int() {
        return (i != 0).then(|| i.to_string());
    }
    if let Ok(f) = value.as_float() {
        return (f != 0.0 && !f.is_nan()).then(|| f.to_string());
    }
    let text = value.to_string();
    (!text.is_empty()).then_some(text)
}

fn to_script(result: std::result::Result<serde_json::Value, RequestError>) -> FnResult<Dynamic> {
    let value = result.map_err(|e| -> Box<EvalAltResult> { e.to_string().into() })?;
    rhai::serde::to_dynamic(value)
}

fn call(
    conn: &Connection,
    method: &str,
    path: &str,
    body: Option<Dynamic>,
) -> FnResult<Dynamic> {
    let method: Method = method
        .parse()
        .map_err(|e: RequestError| -> Box<EvalAltResult> { e.to_string().into() })?;
    let body = body
        .map(|b| rhai::serde::from_dynamic::<serde_json::Value>(&b))
        .transpose()?;
    to_script(conn.request(method, path, body))
}

/// Expose [`Connection`] to scripts.
fn register_connection_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<Connection>("Connection")
        .register_get("org_id", |c: &mut Connection| c.org_id().to_string())
        .register_get("username", |c: &mut Connection| c.username().to_string())
        .register_get("instance_url", |c: &mut Connection| {
            c.instance_url().to_string()
        })
        .register_get("api_version", |c: &mut Connection| {
            c.api_version().to_string()
        })
        .register_fn("to_string", |c: &mut Connection| {
            format!("Connection({})", c.username())
        })
        .register_fn("query", |c: &mut Connection, soql: &str| {
            to_script(c.query(soql))
        })
        .register_fn("query_all", |c: &mut Connection, soql: &str| {
            to_script(c.query_all(soql))
        })
        .register_fn("get", |c: &mut Connection, path: &str| {
            call(c, "GET", path, None)
        })
        .register_fn("delete", |c: &mut Connection, path: &str| {
            call(c, "DELETE", path, None)
        })
        .register_fn("post", |c: &mut Connection, path: &str, body: Dynamic| {
            call(c, "POST", path, Some(body))
        })
        .register_fn("patch", |c: &mut Connection, path: &str, body: Dynamic| {
            call(c, "PATCH", path, Some(body))
        })
        .register_fn("put", |c: &mut Connection, path: &str, body: Dynamic| {
            call(c, "PUT", path, Some(body))
        })
        .register_fn("request", |c: &mut Connection, method: &str, path: &str| {
            call(c, method, path, None)
        })
        .register_fn(
            "request",
            |c: &mut Connection, method: &str, path: &str, body: Dynamic| {
                call(c, method, path, Some(body))
            },
        );
}
