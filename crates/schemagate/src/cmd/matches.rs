use schemagate::subject;

use crate::cmd::MatchArgs;
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_match, OutputFormat};

pub fn run(args: MatchArgs, format: OutputFormat) -> CliResult<i32> {
    subject::validate_literal(&args.subject)
        .map_err(|err| CliError::new(USAGE, format!("invalid subject: {err}")))?;
    subject::validate(&args.pattern)
        .map_err(|err| CliError::new(USAGE, format!("invalid pattern: {err}")))?;

    let matched = subject::matches(&args.subject, &args.pattern);
    print_match(&args.subject, &args.pattern, matched, format);
    Ok(if matched { SUCCESS } else { FAILURE })
}
