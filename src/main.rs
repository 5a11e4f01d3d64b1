//! botster-push - VAPID key management and Web Push delivery from the command line.

// Rust guideline compliant 2026-02

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use botster_push::{
    persistence, BatchDispatcher, BatchEntry, CancelFlag, Dispatcher, KeyPair, PushConfig,
    PushMessage, ReqwestTransport, SubscriptionInfo, Urgency,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "botster-push")]
#[command(version = VERSION)]
#[command(about = "Send VAPID-authenticated, encrypted Web Push notifications")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a VAPID key pair and save it at the configured key path
    Keygen {
        /// Overwrite an existing key file (invalidates existing subscriptions)
        #[arg(long)]
        force: bool,
    },
    /// Print the application server key for `PushManager.subscribe()`
    PublicKey,
    /// Print the private key as a SEC1 PEM block
    ExportPem,
    /// Send a notification to one or more subscriptions
    Send {
        /// JSON file holding one subscription object or an array of them
        #[arg(long)]
        subscription: PathBuf,
        /// Payload text
        #[arg(long, conflicts_with = "payload_file")]
        payload: Option<String>,
        /// Read the payload from a file
        #[arg(long)]
        payload_file: Option<PathBuf>,
        /// Message TTL in seconds (defaults to the configured value)
        #[arg(long)]
        ttl: Option<u64>,
        /// very-low, low, normal or high
        #[arg(long)]
        urgency: Option<Urgency>,
        /// Replace any undelivered message with the same topic
        #[arg(long)]
        topic: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubscriptionFile {
    Many(Vec<SubscriptionInfo>),
    One(SubscriptionInfo),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = PushConfig::load()?;

    match cli.command {
        Commands::Keygen { force } => keygen(&config, force),
        Commands::PublicKey => {
            let keys = load_keys(&config)?;
            println!("{}", keys.application_server_key());
            Ok(())
        }
        Commands::ExportPem => {
            let keys = load_keys(&config)?;
            print!("{}", keys.export_pem()?.as_str());
            Ok(())
        }
        Commands::Send {
            subscription,
            payload,
            payload_file,
            ttl,
            urgency,
            topic,
        } => {
            let payload = match (payload, payload_file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => fs::read(&path)
                    .with_context(|| format!("Failed to read payload file {}", path.display()))?,
                (None, None) => Vec::new(),
            };

            let mut message = PushMessage::new(payload).with_ttl(
                ttl.map_or_else(|| config.message_ttl(), std::time::Duration::from_secs),
            );
            if let Some(urgency) = urgency {
                message = message.with_urgency(urgency);
            }
            if let Some(topic) = topic {
                message = message.with_topic(topic);
            }

            send(&config, &subscription, &message)
        }
    }
}

fn keygen(config: &PushConfig, force: bool) -> Result<()> {
    let path = config.key_path()?;
    if path.exists() && !force {
        anyhow::bail!(
            "Key file {} already exists (use --force to replace it; existing subscriptions will stop working)",
            path.display()
        );
    }
    if config.subject.trim().is_empty() {
        anyhow::bail!("No VAPID subject configured (set BOTSTER_PUSH_SUBJECT or `subject` in push.json)");
    }

    let keys = KeyPair::generate(config.subject.clone());
    persistence::save(&path, &keys)?;
    println!("{}", keys.application_server_key());
    Ok(())
}

fn load_keys(config: &PushConfig) -> Result<KeyPair> {
    let path = config.key_path()?;
    persistence::load(&path, &config.subject)?.with_context(|| {
        format!(
            "No VAPID keys at {} (run `botster-push keygen` first)",
            path.display()
        )
    })
}

fn send(config: &PushConfig, subscription_path: &Path, message: &PushMessage) -> Result<()> {
    let content = fs::read_to_string(subscription_path).with_context(|| {
        format!("Failed to read subscription file {}", subscription_path.display())
    })?;
    let parsed: SubscriptionFile = serde_json::from_str(&content)
        .context("Subscription file must hold a subscription object or an array")?;
    let subscriptions = match parsed {
        SubscriptionFile::Many(subs) => subs,
        SubscriptionFile::One(sub) => vec![sub],
    };

    let transport = ReqwestTransport::new(config.request_timeout())?;
    let dispatcher =
        Dispatcher::new(load_keys(config)?, transport)?.with_token_ttl(config.token_ttl())?;
    let batch = BatchDispatcher::new(dispatcher, config.concurrency);

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.cancel()).context("Failed to install Ctrl-C handler")?;

    let report = batch.send_all_with_cancel(&subscriptions, message, &cancel);
    for entry in report.entries() {
        println!("{}", describe(entry));
    }

    if report.cancelled() {
        anyhow::bail!(
            "Cancelled after {} of {} subscriptions",
            report.len(),
            report.requested()
        );
    }
    let failed = report.failed().count();
    if failed > 0 {
        anyhow::bail!("{} of {} deliveries failed", failed, report.requested());
    }
    Ok(())
}

/// One output line per entry; endpoints are shown as their origin only.
fn describe(entry: &BatchEntry) -> String {
    let origin = url::Url::parse(&entry.endpoint)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| "<invalid endpoint>".to_string());

    match &entry.result {
        Ok(outcome) => {
            let status = outcome
                .status_code
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            let mut line = format!(
                "#{} {} {} {:?}",
                entry.index, origin, status, outcome.classification
            );
            if let Some(retry_after) = outcome.retry_after {
                line.push_str(&format!(" retry-after={}s", retry_after.as_secs()));
            }
            line
        }
        Err(e) => format!("#{} {} error: {}", entry.index, origin, e),
    }
}
