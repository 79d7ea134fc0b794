// crates/invoice-signer-cli/src/main.rs
// ============================================================================
// Module: Invoice Signer CLI Entry Point
// Description: Command dispatcher for signing runs, sweeps, and profiles.
// Purpose: Drive the signing engine against the configured SQLite store.
// Dependencies: clap, invoice-signer-broker, invoice-signer-config, tokio
// ============================================================================

//! ## Overview
//! The invoice signer CLI loads `invoice-signer.toml`, opens the `SQLite`
//! store, and runs one command: a signing run, a claim sweep, a customer
//! profile lookup, a stdin-fed trigger listener, or config validation.
//! Machine-readable results are written to stdout as canonical JSON.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use invoice_signer_broker::ChannelQueue;
use invoice_signer_broker::SigningTrigger;
use invoice_signer_broker::TriggerConsumer;
use invoice_signer_config::InvoiceSignerConfig;
use invoice_signer_core::ActorId;
use invoice_signer_core::DateRange;
use invoice_signer_core::Ed25519DocumentSigner;
use invoice_signer_core::RecordId;
use invoice_signer_core::RecordSelector;
use invoice_signer_core::SigningCertificate;
use invoice_signer_core::SigningEngine;
use invoice_signer_core::SigningRequest;
use invoice_signer_store_sqlite::SqliteSigningStore;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::watch;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Queue name used by the listener.
const LISTEN_QUEUE_NAME: &str = "invoice_signing_queue";
/// Pending trigger capacity for the listener queue.
const LISTEN_QUEUE_CAPACITY: usize = 64;
/// Maximum accepted length of one trigger line.
const MAX_TRIGGER_LINE_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "invoice-signer", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (overrides `INVOICE_SIGNER_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Claim and sign unsigned invoices for an actor.
    Sign(SignCommand),
    /// Reset lingering claims for one actor, or for every actor.
    Clear(ClearCommand),
    /// Show the customer signing profile of an actor.
    Profile(ProfileCommand),
    /// Read JSON-lines signing triggers from stdin and run them.
    Listen(ListenCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate an invoice signer configuration file.
    Validate,
}

/// Arguments for `sign`.
#[derive(Args, Debug)]
struct SignCommand {
    /// Actor to sign for (defaults to the certificate subject).
    #[arg(long)]
    actor: Option<String>,
    /// Comma-separated record ids.
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["from", "till"])]
    ids: Option<Vec<String>>,
    /// Inclusive range start (RFC 3339).
    #[arg(long, requires = "till")]
    from: Option<String>,
    /// Inclusive range end (RFC 3339).
    #[arg(long, requires = "from")]
    till: Option<String>,
    /// Maximum number of rows to claim.
    #[arg(long)]
    quantity: Option<usize>,
}

/// Arguments for `clear`.
#[derive(Args, Debug)]
struct ClearCommand {
    /// Actor whose claims are reset; omit to reset every claim.
    #[arg(long)]
    actor: Option<String>,
}

/// Arguments for `profile`.
#[derive(Args, Debug)]
struct ProfileCommand {
    /// Customer id.
    #[arg(long)]
    actor: String,
}

/// Arguments for `listen`.
#[derive(Args, Debug)]
struct ListenCommand {
    /// Shutdown poll interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a display message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Engine type used by every command.
type Engine = SigningEngine<SqliteSigningStore, Ed25519DocumentSigner>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = InvoiceSignerConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    match cli.command {
        Commands::Sign(command) => command_sign(&config, command).await,
        Commands::Clear(command) => command_clear(&config, &command),
        Commands::Profile(command) => command_profile(&config, &command),
        Commands::Listen(command) => command_listen(&config, &command).await,
        Commands::Config {
            command: ConfigCommand::Validate,
        } => {
            write_stdout_line("config ok")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs one signing request and prints its report.
async fn command_sign(config: &InvoiceSignerConfig, command: SignCommand) -> CliResult<ExitCode> {
    let certificate = load_certificate(config)?;
    let actor = command.actor.map_or_else(|| certificate.subject_id.clone(), ActorId::new);
    if actor != certificate.subject_id {
        return Err(CliError::new(format!("certificate subject does not match actor {actor}")));
    }
    let selector = build_selector(command.ids, command.from.as_deref(), command.till.as_deref())?;
    let engine = open_engine(config)?;
    let request = SigningRequest {
        actor_id: actor,
        certificate,
        selector,
        quantity: command.quantity,
    };
    let report = tokio::task::spawn_blocking(move || engine.request_signing(request).and_then(|run| run.wait()))
        .await
        .map_err(|err| CliError::new(format!("signing task failed: {err}")))?
        .map_err(|err| CliError::new(format!("signing failed: {err}")))?;
    write_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Resets claims and prints the number of rows reset.
fn command_clear(config: &InvoiceSignerConfig, command: &ClearCommand) -> CliResult<ExitCode> {
    let engine = open_engine(config)?;
    let cleared = match command.actor.as_deref() {
        Some(actor) => engine.clear_claim(&ActorId::new(actor)),
        None => engine.clear_all_claims(),
    }
    .map_err(|err| CliError::new(format!("clear failed: {err}")))?;
    write_stdout_line(&cleared.to_string())?;
    Ok(ExitCode::SUCCESS)
}

/// Prints a customer signing profile.
fn command_profile(config: &InvoiceSignerConfig, command: &ProfileCommand) -> CliResult<ExitCode> {
    let engine = open_engine(config)?;
    let profile = engine
        .customer_profile(&ActorId::new(command.actor.as_str()))
        .map_err(|err| CliError::new(format!("profile lookup failed: {err}")))?;
    write_json(&profile)?;
    Ok(ExitCode::SUCCESS)
}

/// Feeds stdin triggers through the queue into the engine until EOF.
async fn command_listen(config: &InvoiceSignerConfig, command: &ListenCommand) -> CliResult<ExitCode> {
    let certificate = load_certificate(config)?;
    let consumer = Arc::new(TriggerConsumer::new(open_engine(config)?, certificate));
    let queue = Arc::new(ChannelQueue::new(LISTEN_QUEUE_NAME, LISTEN_QUEUE_CAPACITY));
    let handled = Arc::new(AtomicUsize::new(0));
    let (stop, shutdown) = watch::channel(false);

    let receiver = Arc::clone(&queue);
    let counter = Arc::clone(&handled);
    let poll_interval = Duration::from_millis(command.poll_ms.max(1));
    let consumer_task = tokio::spawn(async move {
        receiver
            .receive(
                move |trigger: SigningTrigger| {
                    let consumer = Arc::clone(&consumer);
                    let counter = Arc::clone(&counter);
                    async move {
                        let outcome = consumer.run(trigger).await;
                        counter.fetch_add(1, Ordering::SeqCst);
                        match outcome {
                            Ok(report) => write_json(&report).is_ok(),
                            Err(err) => {
                                let _ = write_stderr_line(&err.to_string());
                                false
                            }
                        }
                    }
                },
                poll_interval,
                shutdown,
            )
            .await
    });

    let sender = queue.sender();
    let mut malformed = false;
    let mut sent = 0usize;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) =
        lines.next_line().await.map_err(|err| CliError::new(format!("failed to read stdin: {err}")))?
    {
        match parse_trigger(&line) {
            Ok(None) => {}
            Ok(Some(trigger)) => {
                sender.send_wait(&trigger).await.map_err(|err| CliError::new(err.to_string()))?;
                sent += 1;
            }
            Err(err) => {
                malformed = true;
                write_stderr_line(&err.to_string()).map_err(|err| CliError::new(err.to_string()))?;
            }
        }
    }
    while handled.load(Ordering::SeqCst) < sent && !consumer_task.is_finished() {
        tokio::time::sleep(poll_interval).await;
    }
    let _ = stop.send(true);

    let all_succeeded = consumer_task
        .await
        .map_err(|err| CliError::new(format!("listener task failed: {err}")))?
        .map_err(|err| CliError::new(err.to_string()))?;
    if all_succeeded && !malformed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the configured store and builds the engine.
fn open_engine(config: &InvoiceSignerConfig) -> CliResult<Engine> {
    let store = SqliteSigningStore::new(&config.store)
        .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
    let audit = config.audit.build_sink().map_err(|err| CliError::new(err.to_string()))?;
    SigningEngine::new(Arc::new(store), Arc::new(Ed25519DocumentSigner::new()), audit, config.engine)
        .map_err(|err| CliError::new(err.to_string()))
}

/// Loads the configured signing certificate.
fn load_certificate(config: &InvoiceSignerConfig) -> CliResult<Arc<SigningCertificate>> {
    config
        .certificate
        .load_certificate()
        .map(Arc::new)
        .map_err(|err| CliError::new(format!("failed to load certificate: {err}")))
}

/// Builds a record selector from `sign` arguments.
fn build_selector(ids: Option<Vec<String>>, from: Option<&str>, till: Option<&str>) -> CliResult<RecordSelector> {
    if let Some(ids) = ids {
        let ids = ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()).map(RecordId::new).collect();
        return Ok(RecordSelector::Ids(ids));
    }
    match (from, till) {
        (Some(from), Some(till)) => {
            let range = DateRange::new(parse_instant("--from", from)?, parse_instant("--till", till)?)
                .map_err(|err| CliError::new(err.to_string()))?;
            Ok(RecordSelector::DateRange(range))
        }
        (None, None) => Ok(RecordSelector::Unrestricted),
        _ => Err(CliError::new("--from and --till must be given together")),
    }
}

/// Parses an RFC 3339 argument.
fn parse_instant(flag: &str, value: &str) -> CliResult<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .map_err(|err| CliError::new(format!("{flag} must be RFC 3339: {err}")))
}

/// Parses one stdin line; blank lines yield `None`.
fn parse_trigger(line: &str) -> CliResult<Option<SigningTrigger>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_TRIGGER_LINE_BYTES {
        return Err(CliError::new("trigger line exceeds size limit"));
    }
    serde_json::from_str(trimmed).map(Some).map_err(|err| CliError::new(format!("invalid trigger: {err}")))
}

/// Writes canonical JSON followed by a newline to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes =
        serde_jcs::to_vec(value).map_err(|err| CliError::new(format!("failed to encode output: {err}")))?;
    bytes.push(b'\n');
    std::io::stdout()
        .write_all(&bytes)
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
