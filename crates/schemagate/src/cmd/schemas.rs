use schemagate::loader;
use schemagate::schema::Dialects;

use crate::cmd::SchemasArgs;
use crate::exit::{load_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_schemas, OutputFormat};

pub fn run(args: SchemasArgs, format: OutputFormat) -> CliResult<i32> {
    let schemas = loader::load_dir(&args.dir).map_err(load_error)?;

    let dialects = Dialects::default();
    for schema in &schemas {
        dialects.check(schema).map_err(|err| {
            CliError::new(DATA_INVALID, format!("schema {}: {err}", schema.name))
        })?;
    }

    print_schemas(&schemas, format);
    Ok(SUCCESS)
}
