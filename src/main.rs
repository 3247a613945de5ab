//! Inbox Relay CLI - chat channel and inbox client for the listings
//! marketplace.
//!
//! This is the main binary entry point. See the `inbox_relay` library for
//! the core functionality.

use anyhow::{Context, Result};
use inbox_relay::channel::ChannelSettings;
use inbox_relay::inbox::{self, group_by_day, summarize_room};
use inbox_relay::notifications::{Notification, NotificationId, NotificationSink};
use inbox_relay::server::ContactOutcome;
use inbox_relay::{
    constants, ApiClient, ChatChannel, ChatFrame, Config, HeadlessNavigator, Route, Session,
};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Global flag for signal-triggered shutdown (as Arc for signal-hook compatibility)
static SHUTDOWN_FLAG: std::sync::LazyLock<Arc<AtomicBool>> =
    std::sync::LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Prints notifications to stdout.
#[derive(Debug)]
struct TerminalNotifier;

impl NotificationSink for TerminalNotifier {
    fn show(&self, notification: &Notification) {
        let from = notification.sender_name.as_deref().unwrap_or("New message");
        println!(
            "{} {}: {}  [{} -> {}]",
            notification.icon,
            from,
            notification.text,
            notification.id,
            notification.target()
        );
    }

    fn dismiss(&self, id: NotificationId) {
        log::debug!("[Notifications] {} dismissed", id);
    }
}

fn resolve_user(config: &Config, user_id: Option<String>) -> Result<Session> {
    user_id
        .or_else(|| config.user_id.clone())
        .map(Session::new)
        .context("No user id: pass --user-id or set INBOX_USER_ID")
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Stay connected and print messages until a shutdown signal arrives.
fn run_listen(config: &Config, session: Session, route: Route) -> Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;
    flag::register(SIGINT, Arc::clone(&SHUTDOWN_FLAG))?;
    flag::register(SIGTERM, Arc::clone(&SHUTDOWN_FLAG))?;
    flag::register(SIGHUP, Arc::clone(&SHUTDOWN_FLAG))?;

    println!("Listening as {} on {} (viewing {})", session.user_id, config.ws_url, route);
    log::info!("inbox-relay v{} listening", env!("CARGO_PKG_VERSION"));

    runtime()?.block_on(async {
        let channel = ChatChannel::spawn(
            ChannelSettings::from(config),
            Arc::new(HeadlessNavigator::new(route)),
            Arc::new(TerminalNotifier),
        );

        let me = session.user_id.clone();
        channel.subscribe(move |message| {
            let from = message
                .sender_name
                .as_deref()
                .or(message.sender_id.as_deref())
                .unwrap_or("?");
            let marker = if message.sender_id.as_deref() == Some(me.as_str()) {
                "(me) "
            } else {
                ""
            };
            println!(
                "[{}] {}{}: {}",
                message.room_id.as_deref().unwrap_or("-"),
                marker,
                from,
                message.text
            );
        });

        let mut status = channel.status_receiver();
        let status_task = tokio::spawn(async move {
            let mut was_connected = false;
            while status.changed().await.is_ok() {
                let current = *status.borrow_and_update();
                if current.is_connected() != was_connected {
                    was_connected = current.is_connected();
                    if was_connected {
                        eprintln!("Connected.");
                    } else {
                        eprintln!("Connection lost, reconnecting...");
                    }
                }
            }
        });

        channel.login(session);

        while !SHUTDOWN_FLAG.load(Ordering::Relaxed) {
            tokio::time::sleep(constants::SIGNAL_POLL_INTERVAL).await;
        }

        println!("Shutting down...");
        channel.shutdown().await;
        status_task.abort();
    });

    Ok(())
}

/// Connect, send one message, disconnect.
fn run_send(
    config: &Config,
    session: Session,
    room: String,
    to: String,
    text: String,
) -> Result<()> {
    runtime()?.block_on(async {
        let channel = ChatChannel::spawn(
            ChannelSettings::from(config),
            Arc::new(HeadlessNavigator::new(Route::Conversation {
                room_id: room.clone(),
            })),
            Arc::new(TerminalNotifier),
        );
        let frame = ChatFrame::new(&session, room, to, text);
        channel.login(session);

        let result = if !channel.wait_until_connected(constants::READY_WAIT_TIMEOUT).await {
            Err(anyhow::anyhow!(
                "Chat server did not acknowledge the session within {}s",
                constants::READY_WAIT_TIMEOUT.as_secs()
            ))
        } else if channel.send(&frame).await {
            println!("Sent.");
            Ok(())
        } else {
            Err(anyhow::anyhow!("Connection dropped before the message was sent"))
        };

        channel.shutdown().await;
        result
    })
}

fn run_rooms(config: &Config, session: &Session) -> Result<()> {
    let api = ApiClient::from_config(config)?;
    let rooms = api.list_rooms()?;
    if rooms.is_empty() {
        println!("{}", inbox::NO_MESSAGES);
        return Ok(());
    }

    for room in rooms {
        let messages = api.room_messages(&room.room_id).unwrap_or_else(|e| {
            log::warn!("[Api] Error fetching room messages: {:#}", e);
            Vec::new()
        });
        let summary = summarize_room(room, &messages, &session.user_id);
        println!(
            "{:<8} {:<24} {:<20} {}",
            summary.room.room_id,
            summary.room.title.as_deref().unwrap_or("-"),
            summary.other_party,
            summary.latest_message
        );
    }
    Ok(())
}

fn run_messages(config: &Config, session: &Session, room_id: &str) -> Result<()> {
    let api = ApiClient::from_config(config)?;
    let messages = api.room_messages(room_id)?;
    if messages.is_empty() {
        println!("{}", inbox::NO_MESSAGES);
        return Ok(());
    }

    for group in group_by_day(messages) {
        println!("--- {} ---", group.label);
        for message in &group.messages {
            let who = if message.sender_id == session.user_id {
                "me"
            } else {
                message.sender_name.as_deref().unwrap_or(inbox::UNKNOWN_USER)
            };
            let time = inbox::time_label(message).unwrap_or_else(|| "--:--".to_string());
            println!("{} {}: {}", time, who, message.message);
        }
    }
    Ok(())
}

// CLI
#[derive(Parser)]
#[command(name = "inbox-relay")]
#[command(version)]
#[command(about = "Real-time chat channel and inbox client for the listings marketplace")]
struct Cli {
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stay connected and print incoming messages and notifications
    Listen {
        /// User to log in as (defaults to config / INBOX_USER_ID)
        #[arg(long)]
        user_id: Option<String>,
        /// Route the user is viewing: /inbox, /inbox/<room>, or any path
        #[arg(long, default_value = "/listings")]
        route: Route,
    },
    /// Send one chat message
    Send {
        /// Chat room
        #[arg(long)]
        room: String,
        /// Recipient user id
        #[arg(long)]
        to: String,
        /// Message text
        #[arg(long)]
        text: String,
        /// User to send as (defaults to config / INBOX_USER_ID)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// List chat rooms with the other party and latest message
    Rooms {
        /// Viewing user (defaults to config / INBOX_USER_ID)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Show a room's history grouped by day
    Messages {
        /// Chat room
        room_id: String,
        /// Viewing user (defaults to config / INBOX_USER_ID)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Open (or reuse) a chat room with a listing's owner
    Contact {
        /// Listing id
        #[arg(long)]
        listing: String,
        /// Owner's user id
        #[arg(long)]
        owner: String,
    },
    /// Print the effective configuration
    Config {
        /// Write the current settings to the config file
        #[arg(long)]
        save: bool,
    },
}

fn init_logging(verbose: bool) -> Result<()> {
    // Log to a file so output printed to the terminal stays readable.
    // Use INBOX_LOG_FILE or <config dir>/inbox-relay.log
    let log_path = if let Ok(path) = std::env::var("INBOX_LOG_FILE") {
        std::path::PathBuf::from(path)
    } else {
        Config::config_dir()?.join("inbox-relay.log")
    };
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("Failed to create log file at {}", log_path.display()))?;
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format_timestamp_secs()
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {:?}", panic_info);
        default_hook(panic_info);
    }));

    let config = Config::load()?;
    log::debug!("Environment: {}", inbox_relay::env::Environment::current());

    match cli.command {
        Commands::Listen { user_id, route } => {
            let session = resolve_user(&config, user_id)?;
            run_listen(&config, session, route)?;
        }
        Commands::Send {
            room,
            to,
            text,
            user_id,
        } => {
            let session = resolve_user(&config, user_id)?;
            run_send(&config, session, room, to, text)?;
        }
        Commands::Rooms { user_id } => {
            let session = resolve_user(&config, user_id)?;
            run_rooms(&config, &session)?;
        }
        Commands::Messages { room_id, user_id } => {
            let session = resolve_user(&config, user_id)?;
            run_messages(&config, &session, &room_id)?;
        }
        Commands::Contact { listing, owner } => {
            let api = ApiClient::from_config(&config)?;
            match api.contact_owner(&listing, &owner)? {
                ContactOutcome::Existing(room) => {
                    println!("Chat room {} already exists for listing {}", room.room_id, listing);
                }
                ContactOutcome::Created => println!("Chat room created for listing {}", listing),
            }
        }
        Commands::Config { save } => {
            if save {
                let path = config.save()?;
                println!("Saved to {}", path.display());
            }
            println!("{}", config.to_redacted_json()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_listen_route() {
        let cli = Cli::try_parse_from(["inbox-relay", "listen", "--route", "/inbox/r1"])
            .expect("parse");
        let Commands::Listen { route, user_id } = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(
            route,
            Route::Conversation {
                room_id: "r1".to_string()
            }
        );
        assert_eq!(user_id, None);
    }

    #[test]
    fn test_cli_send_requires_text() {
        assert!(Cli::try_parse_from(["inbox-relay", "send", "--room", "r1", "--to", "u2"]).is_err());
    }

    #[test]
    fn test_resolve_user_prefers_flag() {
        let config = Config {
            user_id: Some("from-config".to_string()),
            ..Config::default()
        };
        let session = resolve_user(&config, Some("from-flag".to_string())).expect("session");
        assert_eq!(session.user_id, "from-flag");
        let session = resolve_user(&config, None).expect("session");
        assert_eq!(session.user_id, "from-config");
        assert!(resolve_user(&Config::default(), None).is_err());
    }
}
