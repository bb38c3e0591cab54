use serde::Serialize;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelEvent {
    Connected { room: String },
    Disconnected { room: String, planned: bool },
    Sent { room: String },
}

/// Fire-and-forget sink. Implementations must not block and must not panic.
pub trait ChannelAnalytics: Send + Sync {
    fn record(&self, event: ChannelEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl ChannelAnalytics for NoopAnalytics {
    fn record(&self, _event: ChannelEvent) {}
}

/// Posts each event as JSON on a detached task; delivery failures are only logged.
#[derive(Debug, Clone)]
pub struct HttpAnalytics {
    client: reqwest::Client,
    url: Url,
}

impl HttpAnalytics {
    pub fn new(url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

impl ChannelAnalytics for HttpAnalytics {
    fn record(&self, event: ChannelEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(?event, "no runtime; analytics event dropped");
            return;
        };
        let request = self.client.post(self.url.as_str()).json(&event);
        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    debug!(status = %response.status(), "analytics sink rejected event");
                }
                Ok(_) => {}
                Err(err) => debug!(error = %err, "analytics delivery failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn events_serialize_with_tag() {
        let value = serde_json::to_value(ChannelEvent::Disconnected {
            room: "lobby".into(),
            planned: false,
        })
        .unwrap();
        assert_eq!(value, json!({"event": "disconnected", "room": "lobby", "planned": false}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn http_sink_posts_event() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/events")
                    .json_body(json!({"event": "connected", "room": "lobby"}));
                then.status(204);
            })
            .await;

        let url = Url::parse(&server.url("/events")).unwrap();
        HttpAnalytics::new(url).record(ChannelEvent::Connected { room: "lobby".into() });

        for _ in 0..50 {
            if mock.hits_async().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        mock.assert_async().await;
    }

    #[test]
    fn http_sink_without_runtime_is_silent() {
        let url = Url::parse("http://127.0.0.1:9/events").unwrap();
        HttpAnalytics::new(url).record(ChannelEvent::Sent { room: "lobby".into() });
    }
}
