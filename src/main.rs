//! Headless driver for the Yume client core
//!
//! Opens sessions against a running backend and prints what the desktop
//! shell would render.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use yume_lib::channel::{EventKind, HttpTransport, LivenessStatus, ServerEvent, Subscription};
use yume_lib::compaction::MonitorView;
use yume_lib::projects::RecentProjects;
use yume_lib::session::{Message, MessageKind};
use yume_lib::{Client, ClientConfig};

#[derive(Parser)]
#[command(name = "yume", version, about = "Yume session client")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List recently opened projects
    Recent,
    /// Probe the backend once
    Ping,
    /// Open a session in a folder
    Open {
        path: PathBuf,
        /// Message to send once the session is ready
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Load a stored session and print its transcript
    Resume { session_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend_url = backend;
        config.backend_endpoint()?;
    }
    let data_dir = config.data_dir()?;

    match cli.command {
        Command::Recent => {
            let projects = RecentProjects::load(&data_dir);
            if projects.entries().is_empty() {
                println!("No recent projects");
            }
            for project in projects.entries() {
                println!(
                    "{}  {}  ({})",
                    project.last_opened.format("%Y-%m-%d %H:%M"),
                    project.name,
                    project.path.display()
                );
            }
        }
        Command::Ping => {
            let (_, client) = connect(&config, &data_dir)?;
            let liveness = client.liveness().check().await;
            match liveness.status {
                LivenessStatus::Healthy => {
                    println!("backend ok ({}ms)", liveness.latency_ms.unwrap_or_default())
                }
                _ => println!(
                    "backend unreachable: {}",
                    liveness.last_error.unwrap_or_default()
                ),
            }
        }
        Command::Resume { session_id } => {
            let (_, client) = connect(&config, &data_dir)?;
            client
                .switch_to(&session_id)
                .await
                .with_context(|| format!("could not resume {}", session_id))?;
            if let Some(session) = client.registry().current() {
                println!("# {}", session.title());
                for message in &session.messages {
                    print_message(message);
                }
            }
        }
        Command::Open { path, prompt } => {
            let (transport, client) = connect(&config, &data_dir)?;
            let (tx, rx) = mpsc::unbounded_channel();
            let stream_transport = transport.clone();
            let stream = tokio::spawn(async move {
                if let Err(e) = stream_transport.stream_events(tx).await {
                    warn!("Backend event stream: {}", e);
                }
            });
            let pump = client.spawn_event_pump(rx);
            let _liveness = client.start_liveness();

            let path = path.canonicalize().unwrap_or(path);
            let session_id = client.open_folder(&path).await?;
            println!("session {} open in {}", session_id, path.display());

            let done = Arc::new(Notify::new());
            let _subscriptions = watch_session(&client, &session_id, done.clone());

            match prompt {
                Some(prompt) => {
                    client.send(&prompt).await?;
                    tokio::select! {
                        _ = done.notified() => {}
                        _ = tokio::signal::ctrl_c() => {
                            if let Err(e) = client.stop().await {
                                eprintln!("stop failed: {}", e);
                            }
                        }
                    }
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }

            if let MonitorView::Visible(status) = client.compaction_view() {
                if let Some(token) = status.token {
                    println!("context {} ({})", token.usage_label(), token.percentage_label());
                }
            }

            client.reset().await;
            stream.abort();
            pump.abort();
        }
    }

    Ok(())
}

fn connect(config: &ClientConfig, data_dir: &Path) -> Result<(Arc<HttpTransport>, Arc<Client>)> {
    let transport = Arc::new(
        HttpTransport::new(&config.backend_url, config.request_timeout_ms)
            .context("invalid backend endpoint")?,
    );
    let client = Client::new(config, transport.clone(), RecentProjects::load(data_dir));
    Ok((transport, Arc::new(client)))
}

/// Print transcript and compaction events for one session as they arrive
fn watch_session(client: &Client, session_id: &str, done: Arc<Notify>) -> Vec<Subscription> {
    let bus = client.bus();

    let mut subscriptions = vec![
        bus.subscribe(EventKind::Message, session_id, |event| {
            if let ServerEvent::Message { message, .. } = event {
                if !message.streaming {
                    print_message(message);
                }
            }
        }),
        bus.subscribe(EventKind::Error, session_id, {
            let done = done.clone();
            move |event: &ServerEvent| {
                if let ServerEvent::Error { message, .. } = event {
                    eprintln!("[error] {}", message);
                }
                done.notify_one();
            }
        }),
        bus.subscribe(EventKind::CompactStart, session_id, |_| {
            println!("[compacting context...]");
        }),
        bus.subscribe(EventKind::CompactComplete, session_id, |event| {
            if let ServerEvent::CompactComplete { summary, .. } = event {
                println!("[context compacted] {}", summary.as_deref().unwrap_or(""));
            }
        }),
    ];

    for kind in [EventKind::StreamEnd, EventKind::Result] {
        let done = done.clone();
        subscriptions.push(bus.subscribe(kind, session_id, move |_| done.notify_one()));
    }
    subscriptions
}

fn print_message(message: &Message) {
    let label = match message.kind {
        MessageKind::User => "you",
        MessageKind::Assistant => "assistant",
        MessageKind::ToolUse => "tool",
        MessageKind::ToolResult => "tool result",
        MessageKind::System => "system",
        MessageKind::Error => "error",
    };
    println!("[{}] {}", label, message.content);
}
