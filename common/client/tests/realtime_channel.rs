use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common_client::{
    ChannelAnalytics, ChannelConnection, ChannelError, ChannelEvent, ChannelRegistry,
    ChannelStatus, ChannelTransport, RealtimeChannel, RealtimeConfig,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use url::Url;

enum Step {
    Refuse,
    Accept {
        inbound: mpsc::UnboundedReceiver<Option<String>>,
        fail_sends: bool,
    },
}

/// Server side of an accepted fake connection.
struct Peer {
    tx: mpsc::UnboundedSender<Option<String>>,
}

impl Peer {
    fn push(&self, frame: &str) {
        self.tx.send(Some(frame.to_string())).unwrap();
    }

    fn hang_up(&self) {
        self.tx.send(None).unwrap();
    }
}

struct FakeTransport {
    gate: Semaphore,
    steps: Mutex<VecDeque<Step>>,
    connects: mpsc::UnboundedSender<Instant>,
    delivered: Arc<Mutex<Vec<Value>>>,
}

impl FakeTransport {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Instant>) {
        let (connects, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            gate: Semaphore::new(0),
            steps: Mutex::new(VecDeque::new()),
            connects,
            delivered: Arc::new(Mutex::new(Vec::new())),
        });
        (transport, rx)
    }

    fn allow(&self, connects: usize) {
        self.gate.add_permits(connects);
    }

    fn refuse(&self, times: usize) {
        let mut steps = self.steps.lock().unwrap();
        for _ in 0..times {
            steps.push_back(Step::Refuse);
        }
    }

    fn accept(&self) -> Peer {
        self.accept_with(false)
    }

    fn accept_with(&self, fail_sends: bool) -> Peer {
        let (tx, inbound) = mpsc::unbounded_channel();
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Accept { inbound, fail_sends });
        Peer { tx }
    }

    fn delivered(&self) -> Vec<Value> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelTransport for FakeTransport {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn ChannelConnection>, ChannelError> {
        self.gate
            .acquire()
            .await
            .map_err(|_| ChannelError::Transport("gate closed".into()))?
            .forget();
        let _ = self.connects.send(Instant::now());

        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Refuse);
        match step {
            Step::Refuse => Err(ChannelError::Transport("connection refused".into())),
            Step::Accept { inbound, fail_sends } => Ok(Box::new(FakeConnection {
                inbound,
                fail_sends,
                delivered: self.delivered.clone(),
            })),
        }
    }
}

struct FakeConnection {
    inbound: mpsc::UnboundedReceiver<Option<String>>,
    fail_sends: bool,
    delivered: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl ChannelConnection for FakeConnection {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError> {
        if self.fail_sends {
            return Err(ChannelError::Transport("broken pipe".into()));
        }
        let value = serde_json::from_str(&frame).unwrap();
        self.delivered.lock().unwrap().push(value);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
        match self.inbound.recv().await {
            Some(Some(frame)) => Some(Ok(frame)),
            _ => None,
        }
    }

    async fn close(&mut self) {}
}

#[derive(Default)]
struct RecordingAnalytics {
    events: Mutex<Vec<ChannelEvent>>,
}

impl ChannelAnalytics for RecordingAnalytics {
    fn record(&self, event: ChannelEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn config() -> RealtimeConfig {
    RealtimeConfig::new("ws://realtime.test/socket")
}

fn open(transport: &Arc<FakeTransport>) -> RealtimeChannel {
    RealtimeChannel::with_transport(
        &config(),
        "lobby",
        transport.clone(),
        Arc::new(common_client::NoopAnalytics),
    )
    .unwrap()
}

async fn wait_for_status(channel: &RealtimeChannel, status: ChannelStatus) {
    let mut changes = channel.status_changes();
    changes.wait_for(|current| *current == status).await.unwrap();
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn queued_messages_flush_in_order_before_later_sends() {
    let (transport, mut connects) = FakeTransport::new();
    let _peer = transport.accept();
    let channel = open(&transport);

    for n in 1..=3 {
        channel.send(&json!({ "n": n })).unwrap();
    }
    assert_eq!(channel.status(), ChannelStatus::Connecting);
    assert_eq!(channel.queued(), 3);

    transport.allow(1);
    connects.recv().await.unwrap();
    wait_for_status(&channel, ChannelStatus::Open).await;
    channel.send(&json!({ "n": 4 })).unwrap();

    wait_until(|| transport.delivered().len() == 4).await;
    let expected: Vec<Value> = (1..=4).map(|n| json!({ "n": n })).collect();
    assert_eq!(transport.delivered(), expected);
    assert_eq!(channel.queued(), 0);
}

#[tokio::test(start_paused = true)]
async fn reconnect_delays_double_per_consecutive_failure() {
    let (transport, mut connects) = FakeTransport::new();
    transport.refuse(4);
    let _peer = transport.accept();
    transport.allow(100);
    let channel = open(&transport);

    let mut times = Vec::new();
    for _ in 0..5 {
        times.push(connects.recv().await.unwrap());
    }
    let gaps: Vec<Duration> = times.windows(2).map(|pair| pair[1] - pair[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ]
    );

    wait_for_status(&channel, ChannelStatus::Open).await;
    assert_eq!(channel.reconnect_attempt(), 0);
}

#[tokio::test(start_paused = true)]
async fn backoff_caps_at_configured_maximum() {
    let (transport, mut connects) = FakeTransport::new();
    transport.refuse(7);
    transport.allow(100);
    let _channel = open(&transport);

    let mut times = Vec::new();
    for _ in 0..7 {
        times.push(connects.recv().await.unwrap());
    }
    assert_eq!(times[6] - times[5], Duration::from_secs(15));
    assert_eq!(times[5] - times[4], Duration::from_secs(15));
    assert_eq!(times[4] - times[3], Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_backoff() {
    let (transport, mut connects) = FakeTransport::new();
    transport.refuse(2);
    let first = transport.accept();
    let _second = transport.accept();
    transport.allow(100);
    let channel = open(&transport);

    for _ in 0..3 {
        connects.recv().await.unwrap();
    }
    wait_for_status(&channel, ChannelStatus::Open).await;
    assert_eq!(channel.reconnect_attempt(), 0);

    let dropped_at = Instant::now();
    first.hang_up();
    let reconnected_at = connects.recv().await.unwrap();
    assert_eq!(reconnected_at - dropped_at, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn close_cancels_pending_reconnect() {
    let (transport, mut connects) = FakeTransport::new();
    transport.allow(100);
    let channel = open(&transport);

    connects.recv().await.unwrap();
    channel.close();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(connects.try_recv().is_err());
    assert_eq!(channel.status(), ChannelStatus::Closed);
    assert!(matches!(channel.send(&json!({})), Err(ChannelError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_reconnecting() {
    let (transport, mut connects) = FakeTransport::new();
    transport.allow(100);
    let channel = open(&transport);

    connects.recv().await.unwrap();
    drop(channel);
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(connects.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn malformed_inbound_frames_are_dropped() {
    let (transport, mut connects) = FakeTransport::new();
    let peer = transport.accept();
    transport.allow(1);
    let channel = open(&transport);
    let mut inbound = channel.subscribe();

    connects.recv().await.unwrap();
    wait_for_status(&channel, ChannelStatus::Open).await;
    peer.push("not json");
    peer.push(r#"{"kind":"chat","text":"hi"}"#);
    peer.push(r#"{"kind":"chat","text":"again"}"#);

    assert_eq!(inbound.recv().await.unwrap(), json!({"kind": "chat", "text": "hi"}));
    assert_eq!(inbound.recv().await.unwrap(), json!({"kind": "chat", "text": "again"}));
    assert_eq!(
        channel.messages(),
        vec![
            json!({"kind": "chat", "text": "hi"}),
            json!({"kind": "chat", "text": "again"}),
        ]
    );
    assert_eq!(channel.status(), ChannelStatus::Open);
    assert!(connects.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn history_keeps_only_the_latest_messages() {
    let (transport, mut connects) = FakeTransport::new();
    let peer = transport.accept();
    transport.allow(1);
    let channel = RealtimeChannel::with_transport(
        &config().with_history_limit(2),
        "lobby",
        transport.clone(),
        Arc::new(common_client::NoopAnalytics),
    )
    .unwrap();
    let mut inbound = channel.subscribe();

    connects.recv().await.unwrap();
    wait_for_status(&channel, ChannelStatus::Open).await;
    for seq in 1..=3 {
        peer.push(&json!({"seq": seq}).to_string());
    }
    for seq in 1..=3 {
        assert_eq!(inbound.recv().await.unwrap(), json!({"seq": seq}));
    }

    assert_eq!(channel.messages(), vec![json!({"seq": 2}), json!({"seq": 3})]);
}

#[tokio::test(start_paused = true)]
async fn failed_send_requeues_at_front() {
    let (transport, mut connects) = FakeTransport::new();
    let _broken = transport.accept_with(true);
    let _healthy = transport.accept();
    let channel = open(&transport);

    channel.send(&json!("first")).unwrap();
    channel.send(&json!("second")).unwrap();
    transport.allow(100);

    wait_until(|| transport.delivered().len() == 2).await;
    assert_eq!(transport.delivered(), vec![json!("first"), json!("second")]);
    connects.recv().await.unwrap();
    connects.recv().await.unwrap();
    assert!(connects.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn analytics_sees_lifecycle_and_sends() {
    let (transport, _connects) = FakeTransport::new();
    let _peer = transport.accept();
    transport.allow(1);
    let analytics = Arc::new(RecordingAnalytics::default());
    let channel =
        RealtimeChannel::with_transport(&config(), "lobby", transport.clone(), analytics.clone())
            .unwrap();

    channel.send(&json!({"hello": true})).unwrap();
    wait_until(|| transport.delivered().len() == 1).await;
    channel.close();
    wait_until(|| analytics.events.lock().unwrap().len() == 3).await;

    let room = "lobby".to_string();
    assert_eq!(
        *analytics.events.lock().unwrap(),
        vec![
            ChannelEvent::Connected { room: room.clone() },
            ChannelEvent::Sent { room: room.clone() },
            ChannelEvent::Disconnected { room, planned: true },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn registry_keeps_one_channel_per_room() {
    let (transport, _connects) = FakeTransport::new();
    let registry = ChannelRegistry::with_transport(
        config(),
        transport.clone(),
        Arc::new(common_client::NoopAnalytics),
    );

    let lobby = registry.open("lobby").unwrap();
    let again = registry.open("lobby").unwrap();
    assert!(Arc::ptr_eq(&lobby, &again));
    let studio = registry.open("studio").unwrap();
    assert_eq!(registry.len(), 2);

    assert!(registry.close("lobby"));
    assert!(lobby.is_closed());
    assert!(!registry.close("lobby"));

    let reopened = registry.open("lobby").unwrap();
    assert!(!Arc::ptr_eq(&lobby, &reopened));

    registry.close_all();
    assert!(registry.is_empty());
    assert!(studio.is_closed());
    assert!(reopened.is_closed());
}
