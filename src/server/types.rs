//! REST payloads exchanged with the marketplace backend.
//!
//! Identifiers arrive as strings or integers depending on the backing table;
//! both are normalized to `String`.

use serde::{Deserialize, Serialize};

use crate::channel::frames::id_format;

/// A chat room between a listing's owner and an interested user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier.
    #[serde(deserialize_with = "id_format::required")]
    pub room_id: String,
    /// Listing the conversation is about.
    #[serde(deserialize_with = "id_format::required")]
    pub property_id: String,
    /// Listing owner's user id.
    #[serde(
        default,
        deserialize_with = "id_format::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_id: Option<String>,
    /// Listing title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Listing image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A stored message in a room's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessage {
    /// Message identifier.
    #[serde(
        default,
        deserialize_with = "id_format::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Author's user id.
    #[serde(deserialize_with = "id_format::required")]
    pub sender_id: String,
    /// Author's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Message body.
    #[serde(default)]
    pub message: String,
    /// Creation timestamp, as stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Body of `POST /room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRoomRequest {
    /// Listing to open a conversation about.
    pub property_id: String,
    /// Listing owner's user id.
    pub owner_id: String,
}

/// Result of contacting a listing's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactOutcome {
    /// A room for the listing already existed.
    Existing(Room),
    /// A new room was created.
    Created,
}
