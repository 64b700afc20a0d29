//! locket: passphrase-protected local data CLI
//!
//! Commands:
//!   encrypt [TEXT]            - print the envelope for TEXT (stdin if omitted)
//!   decrypt [ENVELOPE]        - print the plaintext of ENVELOPE (stdin if omitted)
//!   inspect ENVELOPE          - show envelope segments without decrypting
//!   ids add|has|remove|reset|purge|list
//!                             - manage the encrypted identifier list
//!   memo put|get|delete       - manage encrypted memos
//!   config show               - display current configuration
//!
//! The passphrase is read from LOCKET_PASSPHRASE or prompted on the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use locket_core::config::{expand_tilde, LocketConfig};
use locket_core::LocketError;
use locket_crypto::{EncryptionSession, EnvelopeCodec};
use locket_store::{JsonFileStore, SecureIdentifierStore, SecureMemoStore};

const PASSPHRASE_ENV: &str = "LOCKET_PASSPHRASE";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "locket",
    version,
    about = "Passphrase-protected local data",
    long_about = "locket: encrypt strings, identifier lists, and memos under a passphrase-derived AES-GCM key"
)]
struct Cli {
    /// Path to locket.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "LOCKET_CONFIG",
        default_value = "~/.config/locket/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log].level
    #[arg(long, env = "LOCKET_LOG")]
    log: Option<String>,

    /// Log format; overrides [log].format
    #[arg(long, env = "LOCKET_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt text into an envelope
    Encrypt {
        /// Plaintext (read from stdin if omitted)
        text: Option<String>,
    },

    /// Decrypt an envelope
    Decrypt {
        /// Envelope (read from stdin if omitted)
        envelope: Option<String>,
    },

    /// Show the segment layout of an envelope without decrypting it
    Inspect {
        envelope: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encrypted identifier list
    Ids {
        #[command(subcommand)]
        action: IdsAction,
    },

    /// Encrypted memos
    Memo {
        #[command(subcommand)]
        action: MemoAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum IdsAction {
    /// Add an identifier (no-op if present)
    Add { id: String },
    /// Check whether an identifier is present
    Has { id: String },
    /// Remove every occurrence of an identifier
    Remove { id: String },
    /// Clear the list (requires the stored list to decrypt)
    Reset,
    /// Overwrite the stored list with an empty one without reading it
    ///
    /// Use this to recover after "cannot unlock local data"; the old list is lost.
    Purge,
    /// Print every identifier, one per line
    List,
}

#[derive(Subcommand, Debug)]
enum MemoAction {
    /// Store a memo (content read from stdin if omitted)
    Put { id: String, content: Option<String> },
    /// Print a memo
    Get { id: String },
    /// Delete a memo
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        if is_unlock_failure(&e) {
            tracing::debug!(error = %e, "unlock failure");
            eprintln!("error: cannot unlock local data");
        } else {
            eprintln!("error: {e:#}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = expand_tilde(&cli.config);
    let config = LocketConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Encrypt { text } => cmd_encrypt(&config, text).await,
        Commands::Decrypt { envelope } => cmd_decrypt(&config, envelope).await,
        Commands::Inspect { envelope, json } => cmd_inspect(&config, &envelope, json),
        Commands::Ids { action } => cmd_ids(&config, action).await,
        Commands::Memo { action } => cmd_memo(&config, action).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn is_unlock_failure(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<LocketError>())
        .any(LocketError::is_unlock_failure)
}

// ── Session + store helpers ───────────────────────────────────────────────────

fn read_passphrase() -> Result<SecretString> {
    if let Ok(passphrase) = std::env::var(PASSPHRASE_ENV) {
        return Ok(SecretString::from(passphrase));
    }
    let passphrase = rpassword::prompt_password("locket passphrase: ")
        .context("reading passphrase from terminal")?;
    Ok(SecretString::from(passphrase))
}

async fn open_session(config: &LocketConfig) -> Result<Arc<EncryptionSession>> {
    let passphrase = read_passphrase()?;
    let session = EncryptionSession::new();
    session
        .initialize_async(config.crypto.encryption_options(passphrase))
        .await
        .context("initializing encryption session")?;
    Ok(Arc::new(session))
}

fn open_backend(config: &LocketConfig) -> Result<Arc<JsonFileStore>> {
    let path = expand_tilde(&config.store.path);
    let store =
        JsonFileStore::open(&path).with_context(|| format!("opening store: {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Argument value, or all of stdin minus one trailing newline.
fn arg_or_stdin(value: Option<String>) -> Result<String> {
    if let Some(v) = value {
        return Ok(v);
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading stdin")?;
    Ok(strip_trailing_newline(buf))
}

fn strip_trailing_newline(mut s: String) -> String {
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
    s
}

// ── `locket encrypt` / `locket decrypt` ───────────────────────────────────────

async fn cmd_encrypt(config: &LocketConfig, text: Option<String>) -> Result<()> {
    let text = arg_or_stdin(text)?;
    let session = open_session(config).await?;
    let envelope = session.encrypt_data(&text).context("encrypting")?;
    println!("{envelope}");
    Ok(())
}

async fn cmd_decrypt(config: &LocketConfig, envelope: Option<String>) -> Result<()> {
    let envelope = arg_or_stdin(envelope)?;
    let session = open_session(config).await?;
    let plaintext = session.decrypt_data(envelope.trim()).context("decrypting")?;
    println!("{plaintext}");
    Ok(())
}

// ── `locket inspect` ──────────────────────────────────────────────────────────

fn cmd_inspect(config: &LocketConfig, envelope: &str, json: bool) -> Result<()> {
    let codec = EnvelopeCodec::new(config.crypto.salt_length, config.crypto.insert_positions)
        .context("invalid [crypto] settings")?;
    let parts = codec.decode(envelope.trim()).context("decoding envelope")?;

    if json {
        let report = serde_json::json!({
            "length": envelope.trim().len(),
            "positions": [codec.positions().salt, codec.positions().iv],
            "salt_bytes": parts.salt.len(),
            "iv_bytes": parts.iv.len(),
            "ciphertext_bytes": parts.ciphertext().len(),
            "tag_bytes": parts.tag().len(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("envelope:    {} chars", envelope.trim().len());
    println!(
        "positions:   salt@{} iv@{}",
        codec.positions().salt,
        codec.positions().iv
    );
    println!(
        "salt:        {} bytes ({} chars)",
        parts.salt.len(),
        codec.salt_b64_len()
    );
    println!("iv:          {} bytes", parts.iv.len());
    println!("ciphertext:  {} bytes", parts.ciphertext().len());
    println!("tag:         {} bytes", parts.tag().len());
    Ok(())
}

// ── `locket ids` ──────────────────────────────────────────────────────────────

async fn cmd_ids(config: &LocketConfig, action: IdsAction) -> Result<()> {
    let backend = open_backend(config)?;
    let session = open_session(config).await?;
    let ids = SecureIdentifierStore::with_storage_key(
        backend,
        session,
        config.store.identifier_key.clone(),
    );

    match action {
        IdsAction::Add { id } => ids.add_id(&id).context("adding identifier")?,
        IdsAction::Has { id } => {
            let present = ids.has_id(&id).context("reading identifiers")?;
            println!("{present}");
        }
        IdsAction::Remove { id } => ids.remove_id(&id).context("removing identifier")?,
        IdsAction::Reset => ids.reset().context("resetting identifiers")?,
        IdsAction::Purge => {
            ids.purge().context("purging identifiers")?;
            eprintln!("identifier list purged");
        }
        IdsAction::List => {
            for id in ids.list_ids().context("reading identifiers")? {
                println!("{id}");
            }
        }
    }
    Ok(())
}

// ── `locket memo` ─────────────────────────────────────────────────────────────

async fn cmd_memo(config: &LocketConfig, action: MemoAction) -> Result<()> {
    let backend = open_backend(config)?;
    let session = open_session(config).await?;
    let memos = SecureMemoStore::with_prefix(backend, session, config.store.memo_prefix.clone());

    match action {
        MemoAction::Put { id, content } => {
            let content = arg_or_stdin(content)?;
            memos.put_memo(&id, &content).context("storing memo")?;
        }
        MemoAction::Get { id } => match memos.get_memo(&id).context("reading memo")? {
            Some(content) => println!("{content}"),
            None => anyhow::bail!("no memo named '{id}'"),
        },
        MemoAction::Delete { id } => memos.delete_memo(&id).context("deleting memo")?,
    }
    Ok(())
}

// ── `locket config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &LocketConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
