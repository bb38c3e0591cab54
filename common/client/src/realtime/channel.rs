use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, info, warn};
use url::Url;

use super::analytics::{ChannelAnalytics, ChannelEvent, NoopAnalytics};
use super::transport::{ChannelConnection, ChannelTransport, WebSocketTransport};
use crate::backoff::Backoff;
use crate::cancel::CancelToken;
use crate::config::RealtimeConfig;
use crate::error::ChannelError;

const INBOUND_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Default)]
struct ChannelState {
    outbound: VecDeque<String>,
    reconnect_attempt: u32,
}

struct Shared {
    room: String,
    state: Mutex<ChannelState>,
    outbound_ready: Notify,
    status: watch::Sender<ChannelStatus>,
    history: Mutex<VecDeque<Value>>,
    history_limit: usize,
    inbound: broadcast::Sender<Value>,
    analytics: Arc<dyn ChannelAnalytics>,
}

enum Exit {
    Cancelled,
    Lost(ChannelError),
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<Value>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ChannelStatus) {
        self.status.send_replace(status);
    }

    fn remember(&self, message: Value) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history();
        if history.len() == self.history_limit {
            history.pop_front();
        }
        history.push_back(message);
    }

    fn accept_inbound(&self, frame: &str) {
        match serde_json::from_str::<Value>(frame) {
            Ok(message) => {
                self.remember(message.clone());
                let _ = self.inbound.send(message);
            }
            Err(err) => debug!(room = %self.room, error = %err, "dropping malformed frame"),
        }
    }

    /// Flushes the outbound queue oldest-first, then serves traffic until the
    /// connection drops or the channel is torn down.
    async fn pump(&self, conn: &mut dyn ChannelConnection, cancel: &CancelToken) -> Exit {
        let mut drained = false;
        loop {
            loop {
                let next = self.state().outbound.pop_front();
                let Some(frame) = next else { break };
                if let Err(err) = conn.send(frame.clone()).await {
                    self.state().outbound.push_front(frame);
                    return Exit::Lost(err);
                }
                self.analytics.record(ChannelEvent::Sent {
                    room: self.room.clone(),
                });
            }
            if !drained {
                self.state().reconnect_attempt = 0;
                drained = true;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Exit::Cancelled,
                _ = self.outbound_ready.notified() => {}
                frame = conn.recv() => match frame {
                    Some(Ok(text)) => self.accept_inbound(&text),
                    Some(Err(ChannelError::Protocol(reason))) => {
                        debug!(room = %self.room, %reason, "dropping undecodable frame");
                    }
                    Some(Err(err)) => return Exit::Lost(err),
                    None => return Exit::Lost(ChannelError::Closed),
                },
            }
        }
    }
}

/// A realtime channel bound to one room.
///
/// Sends are always queued and flushed by a background driver in FIFO order,
/// so nothing sent while the connection is down is lost or reordered. The
/// driver reconnects with capped exponential backoff until [`close`] is
/// called or the handle is dropped.
///
/// [`close`]: RealtimeChannel::close
pub struct RealtimeChannel {
    shared: Arc<Shared>,
    cancel: CancelToken,
}

impl RealtimeChannel {
    /// Opens a websocket-backed channel. Must be called inside a tokio runtime.
    pub fn open(config: &RealtimeConfig, room: &str) -> Result<Self, ChannelError> {
        Self::with_transport(
            config,
            room,
            Arc::new(WebSocketTransport::default()),
            Arc::new(NoopAnalytics),
        )
    }

    pub fn with_transport(
        config: &RealtimeConfig,
        room: &str,
        transport: Arc<dyn ChannelTransport>,
        analytics: Arc<dyn ChannelAnalytics>,
    ) -> Result<Self, ChannelError> {
        let url = channel_url(config, room)?;
        let (status, _) = watch::channel(ChannelStatus::Connecting);
        let (inbound, _) = broadcast::channel(INBOUND_BROADCAST_CAPACITY);
        let shared = Arc::new(Shared {
            room: room.to_string(),
            state: Mutex::new(ChannelState::default()),
            outbound_ready: Notify::new(),
            status,
            history: Mutex::new(VecDeque::new()),
            history_limit: config.history_limit,
            inbound,
            analytics,
        });
        let cancel = CancelToken::new();

        tokio::spawn(drive(
            shared.clone(),
            transport,
            url,
            config.backoff(),
            cancel.clone(),
        ));

        Ok(Self { shared, cancel })
    }

    pub fn room(&self) -> &str {
        &self.shared.room
    }

    /// Serializes and enqueues a message. Fails only once the channel is closed.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ChannelError> {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::Closed);
        }
        let frame = serde_json::to_string(message)?;
        self.shared.state().outbound.push_back(frame);
        self.shared.outbound_ready.notify_one();
        Ok(())
    }

    pub fn status(&self) -> ChannelStatus {
        *self.shared.status.borrow()
    }

    pub fn status_changes(&self) -> watch::Receiver<ChannelStatus> {
        self.shared.status.subscribe()
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.state().reconnect_attempt
    }

    pub fn queued(&self) -> usize {
        self.shared.state().outbound.len()
    }

    /// The most recent well-formed inbound messages, oldest first, up to the
    /// configured history limit. Use [`subscribe`](Self::subscribe) to see every one.
    pub fn messages(&self) -> Vec<Value> {
        self.shared.history().iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.shared.inbound.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tears the channel down. Any pending reconnect is abandoned.
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.shared.set_status(ChannelStatus::Closed);
        info!(room = %self.shared.room, "realtime channel closed");
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("room", &self.shared.room)
            .field("status", &self.status())
            .field("queued", &self.queued())
            .finish()
    }
}

fn channel_url(config: &RealtimeConfig, room: &str) -> Result<Url, ChannelError> {
    let mut url = Url::parse(&config.endpoint)
        .map_err(|err| ChannelError::Endpoint(format!("{}: {err}", config.endpoint)))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("room", room);
        if let Some(role) = &config.role {
            query.append_pair("role", role);
        }
    }
    Ok(url)
}

async fn drive(
    shared: Arc<Shared>,
    transport: Arc<dyn ChannelTransport>,
    url: Url,
    backoff: Backoff,
    cancel: CancelToken,
) {
    let room = shared.room.clone();
    loop {
        if cancel.is_cancelled() {
            break;
        }
        shared.set_status(ChannelStatus::Connecting);
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = transport.connect(&url) => result,
        };

        match connected {
            Ok(mut conn) => {
                shared.set_status(ChannelStatus::Open);
                shared.analytics.record(ChannelEvent::Connected { room: room.clone() });
                info!(%room, "realtime channel open");

                match shared.pump(conn.as_mut(), &cancel).await {
                    Exit::Cancelled => {
                        conn.close().await;
                        shared.analytics.record(ChannelEvent::Disconnected {
                            room: room.clone(),
                            planned: true,
                        });
                        break;
                    }
                    Exit::Lost(err) => {
                        warn!(%room, error = %err, "realtime connection lost");
                        shared.analytics.record(ChannelEvent::Disconnected {
                            room: room.clone(),
                            planned: false,
                        });
                    }
                }
            }
            Err(err) => warn!(%room, error = %err, "realtime connect failed"),
        }

        if cancel.is_cancelled() {
            break;
        }
        shared.set_status(ChannelStatus::Closed);

        let delay = {
            let mut state = shared.state();
            let delay = backoff.delay(state.reconnect_attempt);
            state.reconnect_attempt = state.reconnect_attempt.saturating_add(1);
            delay
        };
        debug!(%room, delay_ms = delay.as_millis() as u64, "scheduling reconnect");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    shared.set_status(ChannelStatus::Closed);
    debug!(%room, "realtime driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_room_and_role() {
        let config = RealtimeConfig::new("wss://rt.example.com/socket").with_role("creator");
        let url = channel_url(&config, "room 7").unwrap();
        assert_eq!(url.as_str(), "wss://rt.example.com/socket?room=room+7&role=creator");
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let config = RealtimeConfig::new("not a url");
        assert!(matches!(channel_url(&config, "lobby"), Err(ChannelError::Endpoint(_))));
    }
}
