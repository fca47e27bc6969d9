//! The broadcast hub: the live set of subscriber connections and the
//! fan-out path. The hub is the sole mutator of its registry; fan-out never
//! awaits a subscriber, and a saturated queue costs that subscriber its
//! membership rather than stalling the rest.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use wabridge_core::errors::BridgeError;
use wabridge_core::ids::SubscriberId;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const SUBSCRIBER_TIMEOUT: Duration = Duration::from_secs(90);

/// One live observer: its outbound queue plus liveness tracking.
struct Subscriber {
    tx: mpsc::Sender<Bytes>,
    connected: AtomicBool,
    last_pong: AtomicU64,
}

impl Subscriber {
    fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < SUBSCRIBER_TIMEOUT.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all live subscriber connections.
pub struct Hub {
    subscribers: DashMap<SubscriberId, Subscriber>,
    max_send_queue: usize,
    closed: AtomicBool,
}

impl Hub {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            max_send_queue,
            closed: AtomicBool::new(false),
        }
    }

    /// Add a new subscriber and return its ID plus the receiving end of its
    /// outbound queue.
    pub fn register(&self) -> Result<(SubscriberId, mpsc::Receiver<Bytes>), BridgeError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BridgeError::HubClosed);
        }
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.subscribers.insert(id.clone(), Subscriber::new(tx));
        // A registration must not survive a close() that raced the insert.
        if self.closed.load(Ordering::Acquire) {
            self.subscribers.remove(&id);
            return Err(BridgeError::HubClosed);
        }
        Ok((id, rx))
    }

    /// Remove a subscriber and release its queue. No-op when already absent.
    pub fn unregister(&self, id: &SubscriberId) {
        if let Some((_, sub)) = self.subscribers.remove(id) {
            sub.connected.store(false, Ordering::Release);
        }
    }

    /// Deliver `payload` to every registered subscriber.
    ///
    /// Never awaits: delivery is `try_send` into each bounded queue. A full
    /// or closed queue disconnects that subscriber (drop-and-disconnect)
    /// instead of stalling the fan-out.
    pub fn broadcast(&self, payload: Bytes) {
        let mut dropped: Vec<SubscriberId> = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().tx.try_send(payload.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber_id = %entry.key(),
                        error_kind = BridgeError::DeliveryBackpressure.error_kind(),
                        "Outbound queue saturated, disconnecting subscriber"
                    );
                    dropped.push(entry.key().clone());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dropped.push(entry.key().clone());
                }
            }
        }
        // Removal happens outside the iteration; removing under an iter
        // guard can deadlock a DashMap shard.
        for id in dropped {
            self.unregister(&id);
        }
    }

    /// Tear down the hub: subsequent `register` calls fail with `HubClosed`
    /// and every outbound queue is released.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of live subscribers.
    pub fn count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_registered(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    fn record_pong(&self, id: &SubscriberId) {
        if let Some(sub) = self.subscribers.get(id) {
            sub.last_pong.store(now_secs(), Ordering::Relaxed);
        }
    }

    /// Remove subscribers whose pongs have lapsed. Returns how many went.
    pub fn sweep_lapsed(&self) -> usize {
        let lapsed: Vec<SubscriberId> = self
            .subscribers
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| entry.key().clone())
            .collect();

        let removed = lapsed.len();
        for id in lapsed {
            self.unregister(&id);
            tracing::info!(subscriber_id = %id, "Swept lapsed subscriber");
        }
        removed
    }
}

/// Drive one WebSocket subscriber: writer drains the outbound queue and
/// pings on an interval, reader tracks pongs and close frames. Either side
/// ending unregisters the subscriber.
pub async fn handle_ws_connection(
    socket: WebSocket,
    subscriber_id: SubscriberId,
    mut rx: mpsc::Receiver<Bytes>,
    hub: Arc<Hub>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_id = subscriber_id.clone();
    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                payload = rx.recv() => {
                    match payload {
                        Some(bytes) => {
                            if ws_tx.send(WsMessage::Binary(bytes)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                    tracing::trace!(subscriber_id = %writer_id, "Sent ping");
                }
            }
        }
    });

    let reader_id = subscriber_id.clone();
    let reader_hub = Arc::clone(&hub);
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Pong(_) => reader_hub.record_pong(&reader_id),
                WsMessage::Close(_) => break,
                // Subscribers are push-only; inbound frames carry nothing.
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    hub.unregister(&subscriber_id);
    tracing::info!(subscriber_id = %subscriber_id, "Subscriber disconnected");
}

/// Periodically sweep subscribers whose heartbeat lapsed.
pub fn start_sweep_task(hub: Arc<Hub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = hub.sweep_lapsed();
            if removed > 0 {
                tracing::info!(removed = removed, "Lapsed subscriber sweep");
            }
        }
    })
}
