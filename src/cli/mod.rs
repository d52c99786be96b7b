use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use script_exec::config::{self, Config};
use script_exec::models::{ErrorEnvelope, ExecFlags};
use script_exec::ScriptExecError;

mod exec;

const EXAMPLES: &str = "\
Examples:
  Run a script against the org with alias 'dev':
    script-exec --target-org dev --script-file scripts/cleanup.rhai

  Run it with a specific API version and print the result as JSON:
    script-exec -o dev -f scripts/cleanup.rhai -a 61.0 --json";

#[derive(Parser)]
#[command(
    name = "script-exec",
    version,
    about = "Execute a Rhai script against a Salesforce org",
    long_about = "Execute a Rhai script against a Salesforce org.\n\n\
        The script must define `fn execute(conn)` returning \
        `#{ success: bool, message: string }`. It receives an authenticated \
        connection to the target org.",
    after_help = EXAMPLES
)]
pub struct Cli {
    /// Username or alias of the target org
    #[arg(
        short = 'o',
        long = "target-org",
        visible_alias = "targetusername",
        env = "SF_TARGET_ORG",
        required_unless_present = "about"
    )]
    target_org: Option<String>,

    /// Path to the script file to execute
    #[arg(
        short = 'f',
        long = "script-file",
        value_parser = parse_script_file,
        required_unless_present = "about"
    )]
    script_file: Option<String>,

    /// Override the API version used for the org connection (e.g. 62.0)
    #[arg(short = 'a', long = "api-version", value_parser = parse_api_version)]
    api_version: Option<String>,

    /// Format output as JSON
    #[arg(long)]
    json: bool,

    /// Show project information
    #[arg(long)]
    about: bool,
}

fn parse_script_file(value: &str) -> Result<String, String> {
    if script_exec::fs_util::is_existing_file(Path::new(value)) {
        Ok(value.to_string())
    } else {
        Err(format!("no file found at {value}"))
    }
}

fn parse_api_version(value: &str) -> Result<String, String> {
    if config::is_valid_api_version(value) {
        Ok(value.to_string())
    } else {
        Err(format!("'{value}' is not a valid API version (expected e.g. 62.0)"))
    }
}

pub fn run(cli: Cli) {
    if cli.about {
        print_about();
        return;
    }

    let (Some(target_org), Some(script_file)) = (cli.target_org, cli.script_file) else {
        eprintln!("Usage: script-exec --target-org <ORG> --script-file <FILE>");
        eprintln!("Run `script-exec --help` for details.");
        std::process::exit(2);
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => fail(&e, cli.json),
    };
    init_logging(&config.log_filter);

    let flags = ExecFlags {
        target_org,
        script_file,
        api_version: cli.api_version,
    };
    exec::run(&flags, &config, cli.json);
}

/// Diagnostic logging to stderr, filtered by `SCRIPT_EXEC_LOG`.
fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Report a fatal error and exit non-zero.
fn fail(err: &ScriptExecError, json: bool) -> ! {
    if json {
        let envelope = ErrorEnvelope {
            status: 1,
            name: err.name().to_string(),
            message: err.to_string(),
            exit_code: 1,
        };
        match serde_json::to_string_pretty(&envelope) {
            Ok(text) => println!("{text}"),
            Err(_) => eprintln!("script-exec: {err}"),
        }
    } else {
        eprintln!("script-exec: {err}");
    }
    std::process::exit(1);
}

fn print_about() {
    println!(
        "script-exec: Rhai script runner for Salesforce orgs\n\
         ├─ version:    {}\n\
         ├─ author:     {}\n\
         ├─ source:     {}\n\
         └─ licence:    {} https://www.apache.org/licenses/LICENSE-2.0",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_AUTHORS"),
        env!("CARGO_PKG_REPOSITORY"),
        env!("CARGO_PKG_LICENSE"),
    );
}
