//! Background task that owns the chat transport.
//!
//! A single task holds the [`ConnectionManager`], the current transport's
//! write half, the reconnect timer and the notification board. Everything
//! that mutates connection state funnels through this task's `select!` loop,
//! so lifecycle events can never interleave.
//!
//! ```text
//!   ChatChannel ──ChannelCommand──►┐
//!                                  │
//!   transport task ─TransportEvent─┼──► run() ──► ConnectionManager ──► Vec<Action>
//!                                  │                                        │
//!   retry timer ─────────elapsed──►┤               ◄──────── apply() ◄──────┘
//!   notification expiry ──────────►┘
//! ```
//!
//! Reading happens in a per-transport task spawned for each
//! [`Action::OpenTransport`]. That task forwards what it reads, tagged with
//! its [`TransportId`], and exits when the socket ends or it is aborted.

// Rust guideline compliant 2026-02

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;

use super::router::{MessageRouter, Routed};
use super::state::{Action, ConnectionManager, ConnectionStatus, TransportId};
use crate::constants;
use crate::navigation::Navigator;
use crate::notifications::{NotificationBoard, NotificationId};
use crate::session::Session;
use crate::transport::{self, Inbound, TransportWriter};

/// Request from a [`super::ChatChannel`] handle.
#[derive(Debug)]
pub(crate) enum ChannelCommand {
    Login(Session),
    Logout,
    /// Write one frame; the reply is `true` once it reached the socket.
    Send {
        text: String,
        reply: oneshot::Sender<bool>,
    },
    Teardown,
    ActivateNotification(NotificationId),
    Shutdown,
}

/// Report from a transport task.
#[derive(Debug)]
enum TransportEvent {
    /// Handshake complete; the loop takes the write half.
    Opened { id: TransportId, writer: TransportWriter },
    /// Text frame read.
    Frame { id: TransportId, text: String },
    /// Ping that needs answering.
    Ping { id: TransportId, data: Vec<u8> },
    /// Connect failed. No `Closed` follows.
    Failed { id: TransportId, error: String },
    /// Read error. `Closed` follows.
    Errored { id: TransportId, error: String },
    /// Socket ended.
    Closed { id: TransportId },
}

#[derive(Debug)]
struct ActiveTransport {
    id: TransportId,
    writer: Option<TransportWriter>,
    task: JoinHandle<()>,
}

/// State owned by the channel task.
pub(crate) struct EventLoop {
    url: String,
    manager: ConnectionManager,
    router: MessageRouter,
    board: NotificationBoard,
    navigator: Arc<dyn Navigator>,
    status_tx: watch::Sender<ConnectionStatus>,
    command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: mpsc::Receiver<TransportEvent>,
    transport: Option<ActiveTransport>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("url", &self.url)
            .field("manager", &self.manager)
            .field("transport", &self.transport.as_ref().map(|t| t.id))
            .finish_non_exhaustive()
    }
}

impl EventLoop {
    pub(crate) fn new(
        url: String,
        manager: ConnectionManager,
        router: MessageRouter,
        board: NotificationBoard,
        navigator: Arc<dyn Navigator>,
        status_tx: watch::Sender<ConnectionStatus>,
        command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(constants::TRANSPORT_EVENT_BUFFER);
        Self {
            url,
            manager,
            router,
            board,
            navigator,
            status_tx,
            command_rx,
            events_tx,
            events_rx,
            transport: None,
            retry: None,
        }
    }

    /// Run until [`ChannelCommand::Shutdown`] or until every handle is gone.
    pub(crate) async fn run(mut self) {
        log::debug!("[ChatChannel] Event loop started for {}", self.url);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(ChannelCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },

                Some(event) = self.events_rx.recv() => self.handle_event(event).await,

                () = retry_elapsed(&mut self.retry) => {
                    self.retry = None;
                    let actions = self.manager.on_retry_elapsed();
                    self.apply(actions).await;
                }

                Some(expired) = self.board.next_expired(), if !self.board.is_empty() => {
                    self.board.expire(expired);
                }
            }
            self.publish();
        }

        let actions = self.manager.teardown();
        self.apply(actions).await;
        self.board.clear();
        if let Some(active) = self.transport.take() {
            active.task.abort();
        }
        self.publish();
        log::info!("[ChatChannel] Event loop stopped");
    }

    async fn handle_command(&mut self, command: ChannelCommand) {
        match command {
            ChannelCommand::Login(session) => {
                log::info!("[ChatChannel] Login as {}", session.user_id);
                let actions = self.manager.login(session);
                self.apply(actions).await;
            }
            ChannelCommand::Logout => {
                log::info!("[ChatChannel] Logout");
                let actions = self.manager.logout();
                self.apply(actions).await;
                self.board.clear();
            }
            ChannelCommand::Send { text, reply } => {
                let sent = match self.manager.send(text) {
                    Some(Action::SendText(text)) => match self.write(text).await {
                        Ok(()) => true,
                        Err(follow_up) => {
                            self.apply(follow_up).await;
                            false
                        }
                    },
                    _ => false,
                };
                let _ = reply.send(sent);
            }
            ChannelCommand::Teardown => {
                let actions = self.manager.teardown();
                self.apply(actions).await;
            }
            ChannelCommand::ActivateNotification(id) => match self.board.activate(id) {
                Some(route) => self.navigator.navigate(route),
                None => log::debug!("[Notifications] {} no longer live", id),
            },
            // Handled by run().
            ChannelCommand::Shutdown => {}
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened { id, writer } => {
                let Some(active) = self.transport.as_mut().filter(|t| t.id == id) else {
                    log::debug!("[ChatChannel] Dropping writer of stale transport {}", id);
                    return;
                };
                active.writer = Some(writer);
                let actions = self.manager.on_open(id);
                self.apply(actions).await;
            }
            TransportEvent::Frame { id, text } => {
                if !self.is_current(id) {
                    return;
                }
                if self.router.route(&text, &mut self.board) == Routed::AuthSuccess
                    && self.manager.on_auth_success()
                {
                    log::info!("[ChatChannel] Connected");
                }
            }
            TransportEvent::Ping { id, data } => {
                let Some(writer) = self.current_writer(id) else {
                    return;
                };
                if let Err(e) = writer.send_pong(data).await {
                    log::debug!("[ChatChannel] Pong on {} failed: {}", id, e);
                }
            }
            TransportEvent::Failed { id, error } => {
                self.manager.on_error(id, &error);
                self.forget_transport(id);
                let actions = self.manager.on_close(id);
                self.apply(actions).await;
            }
            TransportEvent::Errored { id, error } => {
                self.manager.on_error(id, &error);
            }
            TransportEvent::Closed { id } => {
                self.forget_transport(id);
                let actions = self.manager.on_close(id);
                self.apply(actions).await;
            }
        }
    }

    /// Carry out `actions`, plus any they cause, in order.
    async fn apply(&mut self, actions: Vec<Action>) {
        let mut pending = VecDeque::from(actions);
        while let Some(action) = pending.pop_front() {
            match action {
                Action::OpenTransport(id) => self.open_transport(id),
                Action::SendText(text) => {
                    if let Err(follow_up) = self.write(text).await {
                        pending.extend(follow_up);
                    }
                }
                Action::CloseTransport(id) => pending.extend(self.close_transport(id).await),
                Action::ScheduleRetry(delay) => {
                    self.retry = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Action::CancelRetry => self.retry = None,
            }
        }
    }

    fn open_transport(&mut self, id: TransportId) {
        if let Some(previous) = self.transport.take() {
            log::debug!("[ChatChannel] Replacing transport {}", previous.id);
            previous.task.abort();
        }
        log::info!("[ChatChannel] Connecting to {} ({})", self.url, id);
        let task = tokio::spawn(run_transport(
            id,
            self.url.clone(),
            self.events_tx.clone(),
        ));
        self.transport = Some(ActiveTransport {
            id,
            writer: None,
            task,
        });
    }

    /// Write on the current transport. A failed write closes it, and the
    /// error carries whatever that close requires next.
    async fn write(&mut self, text: String) -> Result<(), Vec<Action>> {
        let Some(active) = self.transport.as_mut() else {
            log::debug!("[ChatChannel] No transport, dropping outbound frame");
            return Err(Vec::new());
        };
        let id = active.id;
        let Some(writer) = active.writer.as_mut() else {
            log::debug!("[ChatChannel] Transport {} not open, dropping outbound frame", id);
            return Err(Vec::new());
        };

        match writer.send_text(text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.manager.on_error(id, &format!("{e:#}"));
                Err(self.close_transport(id).await)
            }
        }
    }

    /// Close transport `id` and report the close to the manager.
    async fn close_transport(&mut self, id: TransportId) -> Vec<Action> {
        match self.transport.take() {
            Some(mut active) if active.id == id => {
                if let Some(mut writer) = active.writer.take() {
                    match tokio::time::timeout(constants::TRANSPORT_CLOSE_TIMEOUT, writer.close())
                        .await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => log::debug!("[ChatChannel] Close of {} failed: {}", id, e),
                        Err(_) => log::warn!("[ChatChannel] Close of {} timed out", id),
                    }
                }
                active.task.abort();
                log::debug!("[ChatChannel] Transport {} closed", id);
            }
            other => self.transport = other,
        }
        self.manager.on_close(id)
    }

    fn forget_transport(&mut self, id: TransportId) {
        if self.is_current(id) {
            self.transport = None;
        }
    }

    fn is_current(&self, id: TransportId) -> bool {
        self.transport.as_ref().is_some_and(|t| t.id == id)
    }

    fn current_writer(&mut self, id: TransportId) -> Option<&mut TransportWriter> {
        self.transport
            .as_mut()
            .filter(|t| t.id == id)
            .and_then(|t| t.writer.as_mut())
    }

    fn publish(&self) {
        let status = self.manager.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// Resolves when the armed retry timer fires; never resolves when disarmed.
async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Connect, then forward everything read until the socket ends.
async fn run_transport(id: TransportId, url: String, events: mpsc::Sender<TransportEvent>) {
    let (writer, mut reader) = match transport::connect(&url).await {
        Ok(pair) => pair,
        Err(e) => {
            let _ = events
                .send(TransportEvent::Failed {
                    id,
                    error: format!("{e:#}"),
                })
                .await;
            return;
        }
    };
    if events
        .send(TransportEvent::Opened { id, writer })
        .await
        .is_err()
    {
        return;
    }

    while let Some(item) = reader.recv().await {
        let event = match item {
            Ok(Inbound::Text(text)) => TransportEvent::Frame { id, text },
            Ok(Inbound::Ping(data)) => TransportEvent::Ping { id, data },
            Ok(Inbound::Binary(len)) => {
                log::debug!("[ChatChannel] Ignoring {}-byte binary frame on {}", len, id);
                continue;
            }
            Ok(Inbound::Close { code, reason }) => {
                log::info!(
                    "[ChatChannel] Transport {} closed by server (code {}, reason {:?})",
                    id,
                    code,
                    reason
                );
                break;
            }
            Err(e) => {
                let _ = events
                    .send(TransportEvent::Errored {
                        id,
                        error: format!("{e:#}"),
                    })
                    .await;
                break;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }

    let _ = events.send(TransportEvent::Closed { id }).await;
}
