//! REST communication with the marketplace backend.
//!
//! - [`client`] - HTTP client for the inbox endpoints
//! - [`types`] - Request/response data types

pub mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{ContactOutcome, Room, RoomMessage};
