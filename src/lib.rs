//! Inbox Relay - real-time chat channel for the listings marketplace.
//!
//! This crate keeps a logged-in user connected to the marketplace chat
//! server, fans inbound messages out to any number of subscribers, and
//! raises short-lived notifications for messages in conversations the user
//! is not looking at.
//!
//! # Architecture
//!
//! - **ChatChannel** - Handle onto a background task owning the WebSocket
//! - **ConnectionManager** - Sans-IO reconnect and handshake state machine
//! - **SubscriberRegistry** - Callbacks for inbound messages
//! - **MessageRouter** - Frame classification and notification decisions
//! - **ApiClient** - REST client for rooms and message history
//!
//! # Modules
//!
//! - [`channel`] - Chat channel, frames and connection state
//! - [`notifications`] - Notification board and sink trait
//! - [`navigation`] - Routes and the navigator trait
//! - [`server`] - REST client and payload types
//! - [`inbox`] - Inbox summaries and day grouping
//! - [`config`] - Configuration loading/saving

pub mod channel;
pub mod config;
pub mod constants;
pub mod env;
pub mod inbox;
pub mod navigation;
pub mod notifications;
pub mod server;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use channel::{
    ChannelSettings, ChatChannel, ChatFrame, ChatMessage, ConnectionState, ConnectionStatus,
    SubscriptionId,
};
pub use config::Config;
pub use navigation::{HeadlessNavigator, Navigator, Route};
pub use notifications::{Notification, NotificationId, NotificationSink};
pub use server::ApiClient;
pub use session::Session;
