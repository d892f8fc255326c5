//! klai - Terminal Surface
//!
//! A line-oriented surface for the Conductor. Each input line is sent to the
//! assistant; lines starting with `/` are commands.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local backend
//! klai --backend-url http://localhost:8080
//!
//! # Pipe a single question
//! echo "What's on my calendar today?" | klai
//!
//! # With verbose logging
//! RUST_LOG=debug klai
//! ```
//!
//! # Commands
//!
//! - `/attach <path>`: pick an image for the next message
//! - `/detach`: drop the picked image
//! - `/signin`, `/signout`: manage the session
//! - `/status`: show availability, session, and attachment
//! - `/quit`: exit
//!
//! # Environment Variables
//!
//! - `KLAI_BACKEND_URL` and the other `KLAI_*` settings (see `klai_core::config`)
//! - `KLAI_ACCESS_TOKEN`, `KLAI_DISPLAY_NAME`, `KLAI_EMAIL`, `KLAI_AVATAR_URL`: identity
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use klai_core::{
    config, default_config_path, load_config_from_path, session::ENV_ACCESS_TOKEN, AssistantBackend,
    AvailabilityMonitor, AvailabilitySignal, Conductor, ConductorMessage, ConfigOverrides,
    DesktopBridge, EnvIdentityProvider, HttpBackend, SurfaceEvent, TurnRole,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "klai", version, about = "Terminal client for the klai assistant")]
struct Args {
    /// Backend base URL (overrides config file and environment)
    #[arg(long)]
    backend_url: Option<String>,

    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not poll backend availability
    #[arg(long)]
    no_monitor: bool,

    /// Bearer token for the backend
    #[arg(long, env = ENV_ACCESS_TOKEN, hide_env_values = true)]
    access_token: Option<String>,
}

/// A parsed input line
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Event(SurfaceEvent),
    Status,
    Help,
    Unknown(String),
}

fn parse_line(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Event(SurfaceEvent::Submit {
            text: line.to_string(),
        });
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "attach" if !arg.is_empty() => Command::Event(SurfaceEvent::AttachImage {
            path: PathBuf::from(arg),
        }),
        "detach" => Command::Event(SurfaceEvent::ClearAttachment),
        "signin" => Command::Event(SurfaceEvent::SignIn),
        "signout" => Command::Event(SurfaceEvent::SignOut),
        "status" => Command::Status,
        "help" => Command::Help,
        "quit" | "exit" => Command::Event(SurfaceEvent::Quit),
        _ => Command::Unknown(name.to_string()),
    }
}

/// Print Conductor messages until the channel closes or a quit arrives
async fn render(mut rx: mpsc::Receiver<ConductorMessage>) {
    let mut last_available = None;

    while let Some(msg) = rx.recv().await {
        match msg {
            ConductorMessage::TurnAppended { turn } => {
                // The user's own line is already on screen
                if turn.role == TurnRole::User {
                    continue;
                }
                let marker = if turn.is_error { "!" } else { "" };
                println!("{marker}{}: {}", turn.role.label(), turn.text);
            }
            ConductorMessage::BusyChanged { busy: true } => println!("..."),
            ConductorMessage::AttachmentChanged { name: Some(name) } => {
                println!("[attached {name}]");
            }
            ConductorMessage::Availability { signal } => {
                if last_available != Some(signal.available) {
                    last_available = Some(signal.available);
                    println!("[{}]", availability_label(Some(signal)));
                }
            }
            ConductorMessage::SessionChanged {
                signed_in: true,
                display_name,
            } => {
                println!(
                    "[signed in as {}]",
                    display_name.as_deref().unwrap_or("user")
                );
            }
            ConductorMessage::Notify { level, message } => {
                println!("[{}] {message}", level.prefix());
            }
            ConductorMessage::Quit { message } => {
                if let Some(message) = message {
                    println!("{message}");
                }
                break;
            }
            ConductorMessage::BusyChanged { busy: false }
            | ConductorMessage::AttachmentChanged { name: None }
            | ConductorMessage::SessionChanged { .. }
            | ConductorMessage::InputCleared => {}
        }
    }
}

fn availability_label(signal: Option<AvailabilitySignal>) -> &'static str {
    klai_core::Availability::from_signal(signal.as_ref()).label()
}

const HELP: &str = "Commands: /attach <path>, /detach, /signin, /signout, /status, /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("klai=info".parse()?)
                .add_directive("klai_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut config =
        load_config_from_path(args.config.clone().or_else(default_config_path)).await?;
    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.backend_url.clone() {
        overrides = overrides.with_backend_url(url);
    }
    if args.no_monitor {
        overrides = overrides.with_monitor_enabled(false);
    }
    overrides.apply(&mut config);
    config.validate()?;

    info!(
        backend = %config.backend.base_url,
        source = %config.source_of(config::keys::BACKEND_URL),
        "Configuration loaded"
    );

    let backend = Arc::new(HttpBackend::new(config.backend.clone())?);

    // Fail open: an unreachable backend only degrades the session
    match backend.probe_service().await {
        Ok(status) if status.is_ok() => info!("Backend reachable"),
        Ok(status) => warn!(status = %status.status, "Backend reports a problem"),
        Err(e) => warn!(error = %e, "Backend not reachable; replies may fail"),
    }

    let identity = match args.access_token {
        Some(token) => EnvIdentityProvider::with_lookup(move |key| {
            if key == ENV_ACCESS_TOKEN {
                Some(token.clone())
            } else {
                std::env::var(key).ok()
            }
        }),
        None => EnvIdentityProvider::new(),
    };

    let (msg_tx, msg_rx) = mpsc::channel::<ConductorMessage>(100);
    let renderer = tokio::spawn(render(msg_rx));

    let mut conductor = Conductor::new(
        Arc::clone(&backend),
        Arc::new(DesktopBridge::new()),
        Arc::new(identity),
        config.conductor_config(),
        msg_tx,
    );
    conductor.start().await;

    let monitor = AvailabilityMonitor::new(Arc::clone(&backend), config.monitor_config());
    let monitor_handle = config.monitor_enabled.then(|| monitor.start());
    let mut availability: Option<watch::Receiver<Option<AvailabilitySignal>>> =
        monitor_handle.as_ref().map(klai_core::MonitorHandle::subscribe);

    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match parse_line(&line) {
                        Command::Event(event) => conductor.handle_event(event).await,
                        Command::Status => {
                            println!(
                                "[{}] session: {} | busy: {} | attachment: {}",
                                conductor.availability().label(),
                                conductor.session().display_name().unwrap_or("signed out"),
                                conductor.is_busy(),
                                conductor
                                    .pending_attachment()
                                    .map_or("none", |a| a.name.as_str()),
                            );
                        }
                        Command::Help => println!("{HELP}"),
                        Command::Unknown(name) => println!("Unknown command: /{name}. {HELP}"),
                    },
                    Ok(None) => {
                        // End of input: let a pending reply land before exiting
                        conductor.wait_completion().await;
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }

            () = conductor.completion_ready(), if conductor.is_busy() => {
                conductor.poll_completion().await;
            }

            changed = async {
                match availability.as_mut() {
                    Some(rx) => rx.changed().await,
                    None => std::future::pending().await,
                }
            } => {
                match changed {
                    Ok(()) => {
                        let signal = availability.as_mut().and_then(|rx| *rx.borrow_and_update());
                        conductor.observe_availability(signal).await;
                    }
                    Err(_) => availability = None,
                }
            }
        }

        if conductor.quit_requested() {
            break;
        }
    }

    if let Some(handle) = monitor_handle {
        handle.stop().await;
    }

    // Closing the channel lets the renderer drain and exit
    drop(conductor);
    if let Err(e) = renderer.await {
        warn!(error = %e, "Renderer task failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_submit() {
        assert_eq!(
            parse_line("  Hello there \n"),
            Command::Event(SurfaceEvent::Submit {
                text: "Hello there".to_string()
            })
        );
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(
            parse_line("/attach /tmp/cat.png"),
            Command::Event(SurfaceEvent::AttachImage {
                path: PathBuf::from("/tmp/cat.png")
            })
        );
        assert_eq!(
            parse_line("/detach"),
            Command::Event(SurfaceEvent::ClearAttachment)
        );
        assert_eq!(parse_line("/signin"), Command::Event(SurfaceEvent::SignIn));
        assert_eq!(parse_line("/signout"), Command::Event(SurfaceEvent::SignOut));
        assert_eq!(parse_line("/quit"), Command::Event(SurfaceEvent::Quit));
        assert_eq!(parse_line("/status"), Command::Status);
    }

    #[test]
    fn test_attach_without_path_is_unknown() {
        assert_eq!(parse_line("/attach"), Command::Unknown("attach".to_string()));
        assert_eq!(parse_line("/dance"), Command::Unknown("dance".to_string()));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["klai", "--backend-url", "http://x:1", "--no-monitor"]);
        assert_eq!(args.backend_url.as_deref(), Some("http://x:1"));
        assert!(args.no_monitor);
    }
}
