//! ilert-zabbix - send events from Zabbix to iLert
//!
//! Configured as a Zabbix alert script. Every invocation in `save` mode
//! persists one event to the local queue and then sends everything queued;
//! `send` mode only sends. Events that cannot be delivered yet stay queued
//! and are retried by the next invocation.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/ilert-zabbix/config.toml (~/.config/ilert-zabbix/config.toml)
//! - Logs: $XDG_STATE_HOME/ilert-zabbix/ (~/.local/state/ilert-zabbix/)
//! - Queue: /tmp/ilert_zabbix unless `queue.dir` is set in the config

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use ilert_zabbix_core::{Config, Event, EventType, Relay, PLUGIN_VERSION};

#[derive(Parser)]
#[command(name = "ilert-zabbix")]
#[command(about = "Send events from Zabbix to iLert")]
struct Args {
    /// Print the plugin version and exit
    #[arg(long)]
    version: bool,

    /// Execution mode: "save" persists an event to disk and "send" submits
    /// all saved events to iLert. Every "save" is followed by a "send".
    #[arg(short, long, value_enum, default_value_t = Mode::Save)]
    mode: Mode,

    /// API key for the alert source in iLert
    api_key: Option<String>,

    /// Event type
    #[arg(value_enum)]
    event_type: Option<EventTypeArg>,

    /// Zabbix message body (a JSON object)
    payload: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Save,
    Send,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EventTypeArg {
    Alert,
    Ack,
    Resolve,
}

impl From<EventTypeArg> for EventType {
    fn from(arg: EventTypeArg) -> Self {
        match arg {
            EventTypeArg::Alert => EventType::Alert,
            EventTypeArg::Ack => EventType::Ack,
            EventTypeArg::Resolve => EventType::Resolve,
        }
    }
}

/// Why an invocation did not complete
enum Failure {
    /// Bad arguments; reported through clap with usage, exit code 2
    Usage(clap::Error),
    /// Local failure (queue, lock, config), exit code 1
    Fatal(anyhow::Error),
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::Fatal(err)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("{PLUGIN_VERSION}");
        return Ok(());
    }

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging; without a log file events are still queued and sent
    let log_guard = match ilert_zabbix_core::logging::init(&config.logging) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("ilert-zabbix: logging disabled: {err}");
            None
        }
    };

    let outcome = {
        let _span = tracing::info_span!("ilert_zabbix", pid = std::process::id()).entered();
        let outcome = run(&args, &config);
        if let Err(Failure::Fatal(err)) = &outcome {
            tracing::error!(error = %format!("{err:#}"), "ilert-zabbix failed");
        }
        outcome
    };

    // Flush the log before exiting; clap's exit skips destructors
    drop(log_guard);

    match outcome {
        Ok(()) => Ok(()),
        Err(Failure::Usage(err)) => err.exit(),
        Err(Failure::Fatal(err)) => Err(err),
    }
}

fn run(args: &Args, config: &Config) -> std::result::Result<(), Failure> {
    tracing::debug!(
        mode = ?args.mode,
        queue = %config.queue.dir.display(),
        "ilert-zabbix starting"
    );

    // Opening the relay creates the queue directory
    let relay = Relay::from_config(config).context("failed to open event queue")?;

    let report = match args.mode {
        Mode::Save => {
            let event = event_from_args(args).map_err(Failure::Usage)?;
            relay.enqueue(&event).context("failed to save and send event")?
        }
        Mode::Send => relay.flush().context("failed to send queued events")?,
    };
    tracing::debug!(
        delivered = report.delivered,
        discarded = report.discarded,
        retained = report.retained,
        "ilert-zabbix finished"
    );

    Ok(())
}

/// Validate the positional arguments of save mode
fn event_from_args(args: &Args) -> std::result::Result<Event, clap::Error> {
    let api_key = args
        .api_key
        .as_deref()
        .ok_or_else(|| missing_argument("api_key"))?;
    let event_type = args.event_type.ok_or_else(|| missing_argument("event_type"))?;
    let payload = args
        .payload
        .as_deref()
        .ok_or_else(|| missing_argument("payload"))?;

    let payload = match serde_json::from_str::<serde_json::Value>(payload.trim()) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            return Err(usage_error(
                ErrorKind::ValueValidation,
                format!(
                    "payload must be a JSON object (see https://docs.ilert.com/integrations/zabbix), got {}",
                    json_kind(&other)
                ),
            ))
        }
        Err(e) => {
            return Err(usage_error(
                ErrorKind::ValueValidation,
                format!(
                    "payload must be valid json (see https://docs.ilert.com/integrations/zabbix). Error: {e}"
                ),
            ))
        }
    };

    Ok(Event::new(api_key, event_type.into(), payload))
}

fn missing_argument(name: &str) -> clap::Error {
    usage_error(
        ErrorKind::MissingRequiredArgument,
        format!("positional argument {name} is required in save mode"),
    )
}

fn usage_error(kind: ErrorKind, message: String) -> clap::Error {
    tracing::error!("{}", message);
    Args::command().error(kind, message)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
