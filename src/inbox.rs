//! Inbox presentation helpers.
//!
//! Turns raw room and message lists from the backend into what an inbox
//! view shows: one summary line per room, and a room's history split into
//! calendar days.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::server::{Room, RoomMessage};

/// Shown when no message from the other party names them.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Shown for a room without history.
pub const NO_MESSAGES: &str = "No messages yet";

/// Heading of the group holding messages without a usable timestamp.
pub const UNKNOWN_DATE: &str = "Unknown date";

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and the SQL-style `YYYY-MM-DD HH:MM:SS[.fff]` form
/// (with a space or `T` separator), the latter read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// One line of the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    /// The room.
    pub room: Room,
    /// Name of the person on the other side.
    pub other_party: String,
    /// Text of the most recent message.
    pub latest_message: String,
}

/// Summarize `room` from its history as seen by user `me`.
pub fn summarize_room(room: Room, messages: &[RoomMessage], me: &str) -> RoomSummary {
    let other_party = messages
        .iter()
        .find(|m| m.sender_id != me)
        .and_then(|m| m.sender_name.as_deref())
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_USER)
        .to_string();

    let latest_message = messages
        .last()
        .map(|m| m.message.as_str())
        .filter(|text| !text.is_empty())
        .unwrap_or(NO_MESSAGES)
        .to_string();

    RoomSummary {
        room,
        other_party,
        latest_message,
    }
}

/// Messages sent on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    /// The day, or `None` for messages without a usable timestamp.
    pub day: Option<NaiveDate>,
    /// Heading such as `Tuesday, March 4, 2025`.
    pub label: String,
    /// Messages in their original order.
    pub messages: Vec<RoomMessage>,
}

/// Group messages by UTC calendar day.
///
/// Groups are ordered by first appearance; messages keep their input order
/// within a group.
pub fn group_by_day(messages: impl IntoIterator<Item = RoomMessage>) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();

    for message in messages {
        let day = message
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|t| t.date_naive());

        match groups.iter_mut().find(|g| g.day == day) {
            Some(group) => group.messages.push(message),
            None => groups.push(DayGroup {
                day,
                label: day.map_or_else(|| UNKNOWN_DATE.to_string(), day_label),
                messages: vec![message],
            }),
        }
    }

    groups
}

fn day_label(day: NaiveDate) -> String {
    day.format("%A, %B %-d, %Y").to_string()
}

/// `HH:MM` of a message, if its timestamp parses.
pub fn time_label(message: &RoomMessage) -> Option<String> {
    message
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|t| t.format("%H:%M").to_string())
}
