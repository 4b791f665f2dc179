use std::collections::BTreeMap;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use schemagate::registry::message::{
    SCHEMA_NAME, SCHEMA_REVISION, SCHEMA_SUBJECT, SCHEMA_TYPE, SCHEMA_VALIDATED,
};
use schemagate::registry::Message;
use schemagate::store::Schema;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

const AUDIT_HEADERS: [&str; 5] = [
    SCHEMA_NAME,
    SCHEMA_REVISION,
    SCHEMA_SUBJECT,
    SCHEMA_TYPE,
    SCHEMA_VALIDATED,
];

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

#[derive(Serialize)]
struct MatchOutput<'a> {
    subject: &'a str,
    pattern: &'a str,
    matched: bool,
}

pub fn print_match(subject: &str, pattern: &str, matched: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&MatchOutput {
            subject,
            pattern,
            matched,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["SUBJECT", "PATTERN", "MATCH"]);
            table.add_row(vec![subject, pattern, if matched { "yes" } else { "no" }]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let verdict = if matched { "matches" } else { "does not match" };
            println!("{subject} {verdict} {pattern}");
        }
    }
}

#[derive(Serialize)]
struct SchemaRow<'a> {
    name: &'a str,
    subject: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    body_size: usize,
}

pub fn print_schemas(schemas: &[Schema], format: OutputFormat) {
    let rows: Vec<SchemaRow<'_>> = schemas
        .iter()
        .map(|schema| SchemaRow {
            name: &schema.name,
            subject: &schema.subject_pattern,
            kind: schema.dialect(),
            body_size: schema.body.len(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = new_table(vec!["NAME", "SUBJECT", "TYPE", "BODY SIZE"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.subject.to_string(),
                    row.kind.to_string(),
                    row.body_size.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!("{} subject={} type={}", row.name, row.subject, row.kind);
            }
        }
    }
}

#[derive(Serialize)]
struct ValidationOutput<'a> {
    subject: &'a str,
    valid: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Print the audit headers of a forwarded message.
pub fn print_forwarded(forwarded: &Message, format: OutputFormat) {
    let headers: Vec<(&str, &str)> = AUDIT_HEADERS
        .iter()
        .filter_map(|name| forwarded.headers.get(name).map(|value| (*name, value)))
        .collect();

    match format {
        OutputFormat::Json => print_json(&ValidationOutput {
            subject: &forwarded.subject,
            valid: true,
            headers: headers.iter().copied().collect(),
            error: None,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["HEADER", "VALUE"]);
            for (name, value) in headers {
                table.add_row(vec![name, value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let pairs: Vec<String> = headers
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{} valid {}", forwarded.subject, pairs.join(" "));
        }
    }
}

/// Print the failure text returned for a rejected payload.
pub fn print_rejected(subject: &str, error: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ValidationOutput {
            subject,
            valid: false,
            headers: BTreeMap::new(),
            error: Some(error),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["SUBJECT", "ERROR"]);
            table.add_row(vec![subject, error]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{subject} rejected: {error}"),
    }
}
