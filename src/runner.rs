//! The script run pipeline: connect, load, validate, invoke, report.

use std::path::Path;
use std::rc::Rc;

use crate::errors::{Result, ScriptExecError};
use crate::fs_util;
use crate::models::{ExecFlags, ScriptExecResult, ScriptOutcome};
use crate::org::OrgResolver;
use crate::script::ScriptHost;

/// Human-facing output channel.
pub trait OutputSink {
    fn log(&self, line: &str);
}

/// Writes log lines to stdout, or drops them when JSON output is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    pub quiet: bool,
}

impl OutputSink for ConsoleSink {
    fn log(&self, line: &str) {
        if !self.quiet {
            println!("{line}");
        }
    }
}

/// Summary line for a script that returned normally.
#[must_use]
pub fn completed_summary(script_file: &str, org_id: &str, success: bool) -> String {
    if success {
        format!("Successfully executed script '{script_file}' against org '{org_id}'.")
    } else {
        format!("Script execution failed for '{script_file}' against org '{org_id}'.")
    }
}

/// Summary line for a script whose `execute` raised an error.
#[must_use]
pub fn failure_summary(script_file: &str, org_id: &str, error: &str) -> String {
    format!("Failed to execute script '{script_file}' against org '{org_id}'. Error: {error}")
}

/// Runs one script against one org.
pub struct ScriptRunner<'a> {
    resolver: &'a dyn OrgResolver,
    sink: Rc<dyn OutputSink>,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(resolver: &'a dyn OrgResolver, sink: Rc<dyn OutputSink>) -> Self {
        Self { resolver, sink }
    }

    /// Run the script named by `flags`.
    ///
    /// Returns `Err` only when the org cannot be connected, the script
    /// cannot be loaded, or it has no `execute(conn)`. Anything the script
    /// raises from `execute` is reported in the result with
    /// `success: false`.
    pub fn run(&self, flags: &ExecFlags) -> Result<ScriptExecResult> {
        let conn = self
            .resolver
            .connect(&flags.target_org, flags.api_version.as_deref())?;

        let absolute = fs_util::resolve_absolute(Path::new(&flags.script_file))?;
        let script_dir = absolute.parent().unwrap_or(Path::new("/"));
        let host = ScriptHost::new(script_dir, Rc::clone(&self.sink));

        let mut script = host.load(&flags.script_file, &absolute)?;
        if !script.has_entry_point() {
            return Err(ScriptExecError::ScriptMissingExecute {
                path: flags.script_file.clone(),
            });
        }
        host.initialize(&flags.script_file, &mut script)?;

        let org_id = conn.org_id().to_string();
        tracing::info!(script = %absolute.display(), %org_id, "executing script");

        let result = match host.execute(&mut script, conn) {
            Ok(outcome) => self.report_outcome(flags, org_id, outcome),
            Err(error) => self.report_failure(flags, org_id, &error),
        };
        Ok(result)
    }

    fn report_outcome(
        &self,
        flags: &ExecFlags,
        org_id: String,
        outcome: ScriptOutcome,
    ) -> ScriptExecResult {
        let summary = completed_summary(&flags.script_file, &org_id, outcome.success);
        self.sink.log(&summary);
        if let Some(message) = &outcome.message {
            self.sink.log(&format!("Script message: {message}"));
        }
        ScriptExecResult {
            executed_script: flags.script_file.clone(),
            target_org: org_id,
            success: outcome.success,
            message: summary,
            script_message: outcome.message,
        }
    }

    fn report_failure(&self, flags: &ExecFlags, org_id: String, error: &str) -> ScriptExecResult {
        tracing::debug!(%error, "script raised an error");
        let summary = failure_summary(&flags.script_file, &org_id, error);
        self.sink.log(&summary);
        ScriptExecResult {
            executed_script: flags.script_file.clone(),
            target_org: org_id,
            success: false,
            message: summary,
            script_message: None,
        }
    }
}
