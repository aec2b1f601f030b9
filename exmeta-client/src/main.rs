//! exmeta - ExeMeta desktop client (command-line shell)
//!
//! Queues executables, logs in through the browser when needed, and
//! uploads their metadata to the ExeMeta service.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use exmeta_client::auth::{AuthSettings, LoginStart};
use exmeta_client::{
    default_services, load_config, AppController, ControllerHandle, SendReadiness,
};
use exmeta_common::events::{ClientEvent, EventBus};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for exmeta
#[derive(Parser, Debug)]
#[command(name = "exmeta")]
#[command(about = "Extract executable metadata and upload it to ExeMeta")]
#[command(version)]
struct Args {
    /// ExeMeta service base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Configuration file (default: <config dir>/exmeta/config.toml)
    #[arg(short, long, env = "EXMETA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show the session and send status
    Status,
    /// Log in through the browser
    Login,
    /// Forget the stored session
    Logout,
    /// Queue executables and upload their metadata
    Send {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.base_url.as_deref(), args.config.as_deref())
        .context("Failed to load configuration")?;

    let level = config.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("exmeta_client={level},exmeta_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting exmeta v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.routes.base_url()
    );

    let services = default_services(&config).context("Failed to initialize client services")?;
    let event_bus = EventBus::new(100);
    let (handle, controller) =
        AppController::spawn(AuthSettings::from(&config), services, event_bus);

    let outcome = tokio::select! {
        result = run_command(&handle, args.command) => result,
        _ = signal::ctrl_c() => {
            warn!("Interrupted");
            Ok(())
        }
    };

    handle.shutdown().await;
    if let Err(e) = controller.await {
        warn!(error = %e, "Controller task did not stop cleanly");
    }

    outcome
}

async fn run_command(handle: &ControllerHandle, command: Cmd) -> Result<()> {
    match command {
        Cmd::Status => {
            let snapshot = handle.snapshot().await?;
            println!("{}", snapshot.status_line);
        }
        Cmd::Login => login(handle).await?,
        Cmd::Logout => {
            handle.logout().await?;
            println!("Not authenticated");
        }
        Cmd::Send { files } => send(handle, files).await?,
    }
    Ok(())
}

async fn login(handle: &ControllerHandle) -> Result<()> {
    let mut events = handle.subscribe();

    if handle.login().await? == LoginStart::AlreadyAuthenticated {
        println!("{}", handle.snapshot().await?.status_line);
        return Ok(());
    }
    println!("Complete the login in your browser...");

    loop {
        match events.recv().await.context("Event stream closed")? {
            ClientEvent::SessionChanged {
                display_name: Some(name),
                ..
            } => {
                println!("Authenticated as: {}", name);
                return Ok(());
            }
            ClientEvent::LoginFailed { reason, .. } => bail!("{}", reason),
            _ => {}
        }
    }
}

async fn send(handle: &ControllerHandle, files: Vec<PathBuf>) -> Result<()> {
    for file in files {
        match handle.add_file(&file).await {
            Ok(count) => println!("Queued {} ({} pending)", file.display(), count),
            Err(e) => eprintln!("{}: {}", file.display(), e),
        }
    }

    let snapshot = handle.snapshot().await?;
    if snapshot.pending.is_empty() {
        bail!("No file metadata to send. Please select a file first.");
    }
    if snapshot.readiness == SendReadiness::NeedsLogin {
        println!("You need to login before sending. Opening login window...");
    }

    let sent = handle.send_all().await?;
    println!(
        "Metadata sent successfully! It is added to your drafts. ({} item{})",
        sent,
        if sent == 1 { "" } else { "s" }
    );
    Ok(())
}
