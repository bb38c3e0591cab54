use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::analytics::{ChannelAnalytics, NoopAnalytics};
use super::channel::RealtimeChannel;
use super::transport::{ChannelTransport, WebSocketTransport};
use crate::config::RealtimeConfig;
use crate::error::ChannelError;

/// Owns at most one live channel per room.
pub struct ChannelRegistry {
    config: RealtimeConfig,
    transport: Arc<dyn ChannelTransport>,
    analytics: Arc<dyn ChannelAnalytics>,
    channels: Mutex<HashMap<String, Arc<RealtimeChannel>>>,
}

impl ChannelRegistry {
    pub fn new(config: RealtimeConfig) -> Self {
        Self::with_transport(
            config,
            Arc::new(WebSocketTransport::default()),
            Arc::new(NoopAnalytics),
        )
    }

    pub fn with_transport(
        config: RealtimeConfig,
        transport: Arc<dyn ChannelTransport>,
        analytics: Arc<dyn ChannelAnalytics>,
    ) -> Self {
        Self {
            config,
            transport,
            analytics,
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, Arc<RealtimeChannel>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the room's channel, opening one if there is none or the previous one was closed.
    pub fn open(&self, room: &str) -> Result<Arc<RealtimeChannel>, ChannelError> {
        let mut channels = self.channels();
        if let Some(existing) = channels.get(room).filter(|channel| !channel.is_closed()) {
            return Ok(existing.clone());
        }
        let channel = Arc::new(RealtimeChannel::with_transport(
            &self.config,
            room,
            self.transport.clone(),
            self.analytics.clone(),
        )?);
        channels.insert(room.to_string(), channel.clone());
        debug!(%room, "registered realtime channel");
        Ok(channel)
    }

    pub fn get(&self, room: &str) -> Option<Arc<RealtimeChannel>> {
        self.channels().get(room).cloned()
    }

    pub fn close(&self, room: &str) -> bool {
        match self.channels().remove(room) {
            Some(channel) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    pub fn close_all(&self) {
        let drained: Vec<_> = self.channels().drain().map(|(_, channel)| channel).collect();
        for channel in drained {
            channel.close();
        }
    }

    pub fn len(&self) -> usize {
        self.channels().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels().is_empty()
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}
