//! `mua` - send one message through an SMTP submission server
//!
//! Connects, upgrades with STARTTLS, logs in with AUTH LOGIN and submits a
//! plain-text message.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::Parser;
use secrecy::SecretString;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mua_smtp::{Address, Config, Mailbox, MessageBuilder, Session};

/// Send a message over authenticated SMTP submission
#[derive(Parser, Debug)]
#[command(name = "mua")]
#[command(about = "Send a plain-text message over SMTP with STARTTLS and AUTH LOGIN")]
#[command(version)]
struct Args {
    /// Server address as host[:port]; the port defaults to 587
    #[arg(short, long)]
    server: String,

    /// Sender address, also used as the login name
    #[arg(short, long)]
    from: String,

    /// Display name for the From header
    #[arg(short, long)]
    name: Option<String>,

    /// Recipient address
    #[arg(short, long)]
    to: String,

    /// Subject line
    #[arg(long, default_value = "")]
    subject: String,

    /// Message body
    #[arg(short, long, default_value = "")]
    body: String,

    /// Password or app password
    #[arg(short, long, env = "MUA_PASSWORD", hide_env_values = true)]
    password: String,

    /// Name announced in EHLO
    #[arg(long, default_value = "localhost")]
    client_hostname: String,

    /// Enable debug logging (shows the protocol transcript)
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.debug {
        "mua=debug,mua_smtp=debug"
    } else {
        "mua=info,mua_smtp=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let sender = Address::new(&args.from).context("invalid sender address")?;
    let recipient = Address::new(&args.to).context("invalid recipient address")?;
    let from = match &args.name {
        Some(name) => Mailbox::with_name(name.as_str(), args.from.as_str())?,
        None => Mailbox::from(sender.clone()),
    };

    let mut config = Config::from_address(&args.server).context("invalid server address")?;
    config.client_hostname = args.client_hostname;

    let message = MessageBuilder::new(from, recipient)
        .subject(args.subject)
        .body(args.body);

    let mut session = Session::new(sender, SecretString::new(args.password), config);

    info!(server = %session.config().address(), "Opening session");
    let authenticated = session
        .establish()
        .await
        .context("failed to open SMTP session")?;
    if !authenticated {
        if let Err(e) = session.quit().await {
            tracing::debug!(error = %e, "QUIT after rejected login failed");
        }
        bail!("server rejected the credentials for {}", args.from);
    }

    let accepted = session
        .send_mail(&message.envelope())
        .await
        .context("message was not accepted")?;
    info!(response = %accepted, "Message sent");

    session.quit().await.context("failed to close session")?;
    Ok(())
}
