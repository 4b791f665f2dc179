use std::fs;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use schemagate::loader;
use schemagate::registry::bus::INBOX_PREFIX;
use schemagate::registry::{
    Gateway, GatewayConfig, GatewayHandle, Headers, MemoryBus, Message, Transport,
};
use schemagate::store::{MemoryKv, Schema};
use schemagate::subject::{self, Endpoint, Operation};
use tokio_util::sync::CancellationToken;

use crate::cmd::ValidateArgs;
use crate::exit::{
    io_error, load_error, registry_error, transport_error, CliError, CliResult, DATA_INVALID,
    FAILURE, INTERNAL, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_forwarded, print_rejected, OutputFormat};

enum Outcome {
    Forwarded(Message),
    Rejected(Message),
    Closed,
}

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    subject::validate_literal(&args.subject)
        .map_err(|err| CliError::new(USAGE, format!("invalid subject: {err}")))?;
    let payload = resolve_payload(&args)?;
    let schemas = loader::load_dir(&args.dir).map_err(load_error)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;
    runtime.block_on(validate(&args.subject, payload, &schemas, timeout, format))
}

async fn validate(
    subject: &str,
    payload: Bytes,
    schemas: &[Schema],
    timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let config = GatewayConfig::default();
    let bus = Arc::new(MemoryBus::new());
    let gateway = Gateway::start(
        Arc::new(MemoryKv::new()),
        bus.clone(),
        config.clone(),
        CancellationToken::new(),
    )
    .await
    .map_err(|err| registry_error("failed to start gateway", err))?;

    let result = async {
        register_all(&bus, &config, schemas, timeout).await?;
        wait_for_cache(&gateway, schemas, timeout).await?;
        let outcome = send(&bus, &config, subject, payload, timeout).await?;
        report(&gateway, subject, outcome, format)
    }
    .await;

    gateway
        .shutdown()
        .await
        .map_err(|err| CliError::new(INTERNAL, format!("gateway shutdown failed: {err}")))?;
    bus.close();
    result
}

async fn register_all(
    bus: &MemoryBus,
    config: &GatewayConfig,
    schemas: &[Schema],
    timeout: Duration,
) -> CliResult<()> {
    for schema in schemas {
        let body = serde_json::to_vec(schema)
            .map_err(|err| CliError::new(INTERNAL, format!("schema {}: {err}", schema.name)))?;
        let address = Endpoint::address(&config.api_prefix, Operation::Register, &schema.name);
        let reply = bus
            .request(&address, body, Headers::new(), timeout)
            .await
            .map_err(|err| transport_error("register failed", err))?;

        if let Some(code) = reply.error_code() {
            let description = reply.error_description().unwrap_or("unknown error");
            let exit = if code == 400 { DATA_INVALID } else { FAILURE };
            return Err(CliError::new(
                exit,
                format!("schema {}: {description}", schema.name),
            ));
        }
        tracing::debug!(schema = %schema.name, "registered");
    }
    Ok(())
}

async fn wait_for_cache(
    gateway: &GatewayHandle,
    schemas: &[Schema],
    timeout: Duration,
) -> CliResult<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !schemas.iter().all(|s| gateway.cache().get(&s.name).is_some()) {
        if tokio::time::Instant::now() >= deadline {
            return Err(CliError::new(TIMEOUT, "timed out waiting for schema cache"));
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}

async fn send(
    bus: &MemoryBus,
    config: &GatewayConfig,
    subject: &str,
    payload: Bytes,
    timeout: Duration,
) -> CliResult<Outcome> {
    let subscribe_error = |err| transport_error("subscribe failed", err);
    let mut governed = bus.subscribe(subject, None).await.map_err(subscribe_error)?;
    let inbox = format!("{INBOX_PREFIX}.validate");
    let mut replies = bus.subscribe(&inbox, None).await.map_err(subscribe_error)?;

    let address = Endpoint::address(&config.api_prefix, Operation::Validate, subject);
    bus.publish(Message::new(address, payload).with_reply(inbox))
        .await
        .map_err(|err| transport_error("publish failed", err))?;

    let outcome = tokio::time::timeout(timeout, async {
        tokio::select! {
            Some(forwarded) = governed.next() => Outcome::Forwarded(forwarded),
            Some(reply) = replies.next() => Outcome::Rejected(reply),
            else => Outcome::Closed,
        }
    })
    .await
    .map_err(|_| CliError::new(TIMEOUT, format!("no answer within {timeout:?}")))?;
    Ok(outcome)
}

fn report(
    gateway: &GatewayHandle,
    subject: &str,
    outcome: Outcome,
    format: OutputFormat,
) -> CliResult<i32> {
    match outcome {
        Outcome::Forwarded(forwarded) => {
            print_forwarded(&forwarded, format);
            Ok(SUCCESS)
        }
        Outcome::Rejected(reply) => {
            let text = String::from_utf8_lossy(&reply.payload);
            print_rejected(subject, &text, format);
            // A matching schema means the payload itself was refused.
            if gateway.cache().find_match(subject).is_some() {
                Ok(DATA_INVALID)
            } else {
                Ok(FAILURE)
            }
        }
        Outcome::Closed => Err(CliError::new(INTERNAL, "bus closed before an answer")),
    }
}

fn resolve_payload(args: &ValidateArgs) -> CliResult<Bytes> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(Bytes::from(json.clone()));
    }
    if let Some(data) = &args.data {
        return Ok(Bytes::from(data.clone()));
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map(Bytes::from)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Bytes::new())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
