//! # MailSift: periodic tag-based mailbox digests
//!
//! Usage:
//!   mailsift                              # Serve with ~/.mailsift/config.toml
//!   mailsift --config ./mailsift.toml     # Explicit config file
//!   mailsift --port 9090 --verbose        # Override port, debug logging

use anyhow::Result;
use clap::Parser;
use mailsift_channels::{ImapMailboxClient, SmtpNotifier};
use mailsift_core::config::{MailSiftConfig, expand_path};
use mailsift_core::traits::UserStore;
use mailsift_db::UserDb;
use mailsift_digest::{SvgWordCloud, TextDigest};
use mailsift_gateway::AppState;
use mailsift_scheduler::{SchedulerService, SyncPipeline, TickDispatcher};
use mailsift_security::AesCredentialCipher;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailsift", version, about = "📬 MailSift: scheduled mailbox digests")]
struct Cli {
    /// Config file (default: ~/.mailsift/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP port, overrides gateway.port
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path, overrides database_path
    #[arg(long)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        return;
    }
    tracing::info!("🛑 Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "mailsift=debug,tower_http=debug"
    } else {
        "mailsift=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => MailSiftConfig::load_from(&expand_path(path))?,
        None => MailSiftConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(db_path) = cli.db_path {
        config.database_path = db_path;
    }
    config.validate()?;

    let store: Arc<dyn UserStore> = Arc::new(UserDb::open(&config.database_path())?);
    let cipher = Arc::new(AesCredentialCipher::new(&config.security.encryption_key)?);

    let pipeline = Arc::new(SyncPipeline::new(
        store.clone(),
        Arc::new(ImapMailboxClient::new()),
        cipher.clone(),
        Arc::new(TextDigest::new(config.digest.max_keywords)),
        Arc::new(SvgWordCloud::new(
            &expand_path(&config.digest.output_dir),
            config.digest.width,
            config.digest.height,
        )),
    ));
    let notifier = Arc::new(SmtpNotifier::new(config.smtp.clone())?);
    let dispatcher = TickDispatcher::new(
        store.clone(),
        pipeline.clone(),
        notifier,
        config.scheduler.max_concurrent_syncs,
    );
    let scheduler = Arc::new(SchedulerService::new(
        store.clone(),
        Arc::new(dispatcher),
        Duration::from_secs(config.scheduler.tick_unit_secs),
    ));
    scheduler.bootstrap().await?;

    let state = AppState {
        gateway_config: config.gateway.clone(),
        start_time: std::time::Instant::now(),
        store,
        cipher,
        scheduler: scheduler.clone(),
        pipeline,
    };
    let served = mailsift_gateway::start(state, shutdown_signal()).await;

    scheduler.shutdown();
    served
}
