//! API client for the marketplace backend.
//!
//! Blocking `reqwest` client for the inbox endpoints. Run it off the async
//! runtime (`spawn_blocking`) when calling from async code.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};

use super::types::{ContactOutcome, CreateRoomRequest, Room, RoomMessage};
use crate::config::Config;
use crate::constants;

/// API client for the inbox endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    backend_url: String,
    api_token: Option<String>,
}

impl ApiClient {
    /// Creates a new API client.
    ///
    /// # Arguments
    ///
    /// * `backend_url` - Base URL of the backend, without trailing slash
    /// * `api_token` - Bearer token, if the backend requires one
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(backend_url: String, api_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(constants::HTTP_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self::with_client(client, backend_url, api_token))
    }

    /// Creates an API client with a pre-configured HTTP client.
    pub fn with_client(client: Client, backend_url: String, api_token: Option<String>) -> Self {
        Self {
            client,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    /// Creates a client for the configured backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.backend_url.clone(), config.api_token.clone())
    }

    /// Returns the backend URL.
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Rooms the current user takes part in.
    pub fn list_rooms(&self) -> Result<Vec<Room>> {
        let url = format!("{}/room", self.backend_url);
        let response = self.authorize(self.client.get(&url)).send()?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch chat rooms: {}", response.status());
        }

        let rooms: Vec<Room> = response.json().context("Invalid room list")?;
        log::debug!("[Api] Fetched {} room(s)", rooms.len());
        Ok(rooms)
    }

    /// Message history of `room_id`, oldest first.
    pub fn room_messages(&self, room_id: &str) -> Result<Vec<RoomMessage>> {
        let url = format!("{}/room/messages/{}", self.backend_url, room_id);
        let response = self.authorize(self.client.get(&url)).send()?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to fetch messages for room {}: {}",
                room_id,
                response.status()
            );
        }

        response
            .json()
            .with_context(|| format!("Invalid message list for room {room_id}"))
    }

    /// Open a room about `property_id` with its owner.
    pub fn create_room(&self, property_id: &str, owner_id: &str) -> Result<()> {
        let url = format!("{}/room", self.backend_url);
        let body = CreateRoomRequest {
            property_id: property_id.to_string(),
            owner_id: owner_id.to_string(),
        };

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()?;

        if response.status().is_success() {
            log::info!("[Api] Created chat room for listing {}", property_id);
            Ok(())
        } else {
            anyhow::bail!("Failed to create chat room: {}", response.status())
        }
    }

    /// Find the room for `property_id`, creating it if there is none.
    ///
    /// A failed room lookup falls through to creation.
    pub fn contact_owner(&self, property_id: &str, owner_id: &str) -> Result<ContactOutcome> {
        match self.list_rooms() {
            Ok(rooms) => {
                if let Some(room) = rooms.into_iter().find(|r| r.property_id == property_id) {
                    log::debug!("[Api] Reusing room {} for listing {}", room.room_id, property_id);
                    return Ok(ContactOutcome::Existing(room));
                }
            }
            Err(e) => log::warn!("[Api] Room lookup failed, creating anyway: {:#}", e),
        }

        self.create_room(property_id, owner_id)?;
        Ok(ContactOutcome::Created)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
