//! Navigation contract consumed by the chat channel.
//!
//! The channel never owns the application's routing. It only asks which
//! surface the user is looking at (to decide whether an inbound message
//! deserves a notification) and requests navigation when a notification is
//! activated.

use std::sync::Mutex;

/// A surface of the application the user can be looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The inbox room list.
    Inbox,
    /// A single conversation.
    Conversation {
        /// Chat room identifier.
        room_id: String,
    },
    /// Any other page, identified by its path.
    Other(String),
}

impl Route {
    /// Returns `true` if a message for `room_id` is already visible on this
    /// route.
    ///
    /// The inbox list counts as viewing every conversation; a conversation
    /// route only covers its own room.
    #[must_use]
    pub fn shows_room(&self, room_id: Option<&str>) -> bool {
        match self {
            Self::Inbox => true,
            Self::Conversation { room_id: current } => room_id == Some(current.as_str()),
            Self::Other(_) => false,
        }
    }

    /// Route a notification for `room_id` should lead to.
    #[must_use]
    pub fn for_room(room_id: Option<&str>) -> Self {
        match room_id {
            Some(id) => Self::Conversation {
                room_id: id.to_string(),
            },
            None => Self::Inbox,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbox => write!(f, "/inbox"),
            Self::Conversation { room_id } => write!(f, "/inbox/{room_id}"),
            Self::Other(path) => write!(f, "{path}"),
        }
    }
}

impl std::str::FromStr for Route {
    type Err = std::convert::Infallible;

    /// Inverse of `Display`: `/inbox`, `/inbox/{room_id}`, anything else.
    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = path.trim_end_matches('/');
        if trimmed == "/inbox" {
            return Ok(Self::Inbox);
        }
        match trimmed.strip_prefix("/inbox/") {
            Some(room_id) if !room_id.is_empty() && !room_id.contains('/') => {
                Ok(Self::Conversation {
                    room_id: room_id.to_string(),
                })
            }
            _ => Ok(Self::Other(path.to_string())),
        }
    }
}

/// Routing facility of the host application.
pub trait Navigator: Send + Sync {
    /// The surface currently on screen.
    fn current_route(&self) -> Route;

    /// Switch to `route`.
    fn navigate(&self, route: Route);
}

/// Navigator for headless hosts (CLI, tests) that just records the route.
#[derive(Debug)]
pub struct HeadlessNavigator {
    route: Mutex<Route>,
}

impl HeadlessNavigator {
    /// Creates a navigator that starts on `route`.
    pub fn new(route: Route) -> Self {
        Self {
            route: Mutex::new(route),
        }
    }
}

impl Navigator for HeadlessNavigator {
    fn current_route(&self) -> Route {
        self.route
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn navigate(&self, route: Route) {
        log::info!("[Navigator] Navigating to {}", route);
        *self
            .route
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = route;
    }
}
