use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod matches;
pub mod schemas;
pub mod validate;
pub mod version;

/// Environment variable consulted when `--dir` is not given.
pub const SCHEMA_DIR_ENV: &str = "SCHEMAGATE_SCHEMA_DIR";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether a subject matches a pattern.
    Match(MatchArgs),
    /// List the schema files in a directory.
    Schemas(SchemasArgs),
    /// Validate one payload against a schema directory.
    Validate(ValidateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Match(args) => matches::run(args, format),
        Command::Schemas(args) => schemas::run(args, format),
        Command::Validate(args) => validate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct MatchArgs {
    /// Literal subject.
    pub subject: String,
    /// Subject pattern; may contain `*` and `>`.
    pub pattern: String,
}

#[derive(Args, Debug)]
pub struct SchemasArgs {
    /// Directory of `<name>.schema.json` files.
    #[arg(long, value_name = "DIR", env = SCHEMA_DIR_ENV)]
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["json", "data", "file"])))]
pub struct ValidateArgs {
    /// Directory of `<name>.schema.json` files.
    #[arg(long, value_name = "DIR", env = SCHEMA_DIR_ENV)]
    pub dir: PathBuf,
    /// Governed subject to validate for.
    pub subject: String,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Maximum time to wait for the gateway (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
