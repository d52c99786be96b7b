use std::rc::Rc;

use script_exec::models::{ExecFlags, SuccessEnvelope};
use script_exec::{AuthFileStore, Config, ConsoleSink, ScriptRunner};

pub(crate) fn run(flags: &ExecFlags, config: &Config, json: bool) {
    let store = AuthFileStore::from_config(config);
    let runner = ScriptRunner::new(&store, Rc::new(ConsoleSink { quiet: json }));

    let result = match runner.run(flags) {
        Ok(result) => result,
        Err(e) => super::fail(&e, json),
    };

    // A script that reports failure still exits 0.
    if json {
        let envelope = SuccessEnvelope {
            status: 0,
            result: &result,
            warnings: Vec::new(),
        };
        match serde_json::to_string_pretty(&envelope) {
            Ok(text) => println!("{text}"),
            Err(e) => super::fail(&e.into(), json),
        }
    }
}
