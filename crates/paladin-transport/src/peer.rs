//! Peer lifecycle and the per-peer sender loop, per §4.4.

use std::sync::Arc;
use std::time::Duration;

use paladin_types::{PeerInfo, RegistryPlugin, TransportMessage, TransportPlugin};
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::TransportError;
use crate::reliable::{DrainWatermarks, ReliableStore};

pub const RESEND_INTERVAL: Duration = Duration::from_secs(30);
pub const PEER_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);
pub const QUIESCE_WINDOW: Duration = Duration::from_millis(250);
const SEND_PAGE_SIZE: usize = 32;
const SHORT_RETRY_ATTEMPTS: u32 = 3;
const SHORT_RETRY_DELAY: Duration = Duration::from_millis(100);

enum ActivationState {
    Inactive,
    Active { transport_name: String, info: PeerInfo },
}

struct Shared {
    node_id: String,
    registry: Arc<dyn RegistryPlugin>,
    transports: Vec<Arc<dyn TransportPlugin>>,
    reliable: ReliableStore,
    state: RwLock<ActivationState>,
    last_receive: Mutex<Instant>,
    new_persistent: Notify,
    ff_tx: mpsc::Sender<TransportMessage>,
    ff_rx: Mutex<mpsc::Receiver<TransportMessage>>,
    cancel: CancellationToken,
}

/// Handle to one peer's connection state and outbound queues. The
/// sender loop (`run`) owns the one-goroutine-per-peer behaviour from
/// §4.4; callers interact only through [`Peer::send_fire_and_forget`]
/// and the shared [`ReliableStore`].
pub struct Peer {
    shared: Arc<Shared>,
}

impl Peer {
    pub fn new(
        node_id: String,
        registry: Arc<dyn RegistryPlugin>,
        transports: Vec<Arc<dyn TransportPlugin>>,
        reliable: ReliableStore,
        cancel: CancellationToken,
    ) -> Self {
        let (ff_tx, ff_rx) = mpsc::channel(256);
        Self {
            shared: Arc::new(Shared {
                node_id,
                registry,
                transports,
                reliable,
                state: RwLock::new(ActivationState::Inactive),
                last_receive: Mutex::new(Instant::now()),
                new_persistent: Notify::new(),
                ff_tx,
                ff_rx: Mutex::new(ff_rx),
                cancel,
            }),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.shared.node_id
    }

    /// Lazily activates on first outbound send: resolves transport
    /// details from the registry, picks the first mutually supported
    /// transport, and calls its `ActivateNode`.
    async fn activate(&self) -> Result<(), TransportError> {
        {
            let state = self.shared.state.read().await;
            if matches!(&*state, ActivationState::Active(_)) {
                return Ok(());
            }
        }
        let details = self
            .shared
            .registry
            .lookup_node_transports(&self.shared.node_id)
            .map_err(TransportError::Plugin)?;
        let mut activated = None;
        for transport in &self.shared.transports {
            if let Some(detail) = details.iter().find(|d| d.transport_name == transport.name()) {
                let info = transport
                    .activate(&self.shared.node_id, &detail.details)
                    .map_err(TransportError::Plugin)?;
                activated = Some((transport.name().to_string(), info));
                break;
            }
        }
        let (transport_name, info) = activated
            .ok_or_else(|| TransportError::NoMutualTransport(self.shared.node_id.clone()))?;
        let mut state = self.shared.state.write().await;
        *state = ActivationState::Active { transport_name, info };
        info!(node_id = %self.shared.node_id, "peer activated");
        Ok(())
    }

    /// Deactivates under the caller's peers write-lock, so no new
    /// activation can race (caller holds the peer-registry write lock
    /// while calling this).
    async fn deactivate(&self) {
        let mut state = self.shared.state.write().await;
        *state = ActivationState::Inactive;
        debug!(node_id = %self.shared.node_id, "peer deactivated");
    }

    pub async fn note_receive_activity(&self) {
        *self.shared.last_receive.lock().await = Instant::now();
    }

    pub async fn send_fire_and_forget(&self, message: TransportMessage) -> Result<(), TransportError> {
        self.shared
            .ff_tx
            .try_send(message)
            .map_err(|_| TransportError::PeerQuiesced(self.shared.node_id.clone()))
    }

    pub fn signal_new_persistent(&self) {
        self.shared.new_persistent.notify_one();
    }

    async fn send_with_short_retry(&self, message: &TransportMessage) -> Result<(), TransportError> {
        self.activate().await?;
        let mut attempt = 0;
        loop {
            let result = {
                let state = self.shared.state.read().await;
                match &*state {
                    ActivationState::Active { transport_name, .. } => self
                        .shared
                        .transports
                        .iter()
                        .find(|t| t.name() == transport_name)
                        .map(|t| t.send(&self.shared.node_id, message))
                        .unwrap_or_else(|| Err("no active transport".into())),
                    ActivationState::Inactive => Err("peer inactive".into()),
                }
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 >= SHORT_RETRY_ATTEMPTS => {
                    return Err(TransportError::Plugin(e));
                }
                Err(_) => {
                    attempt += 1;
                    tokio::time::sleep(SHORT_RETRY_DELAY).await;
                }
            }
        }
    }

    /// The per-peer sender loop described in §4.4. Runs until the
    /// cancellation token fires or the peer quiesces and stays quiet
    /// through the quiesce window.
    pub async fn run(self: Arc<Self>) {
        let mut watermarks = DrainWatermarks::default();
        let mut full_scan_due = true;
        let mut resend_timer = tokio::time::interval(RESEND_INTERVAL);

        loop {
            if self.shared.cancel.is_cancelled() {
                break;
            }

            let pending = if full_scan_due {
                full_scan_due = false;
                self.shared.reliable.full_scan(&self.shared.node_id).await
            } else {
                let hwm = watermarks.get(&self.shared.node_id);
                self.shared.reliable.incremental_scan(&self.shared.node_id, hwm).await
            };

            let mut sent_any = false;
            if let Ok(messages) = pending {
                for page in messages.chunks(SEND_PAGE_SIZE) {
                    let mut page_ok = true;
                    for msg in page {
                        let wire = TransportMessage {
                            message_id: msg.id,
                            correlation_id: Some(msg.id),
                            component: paladin_types::Component::ReliableMessageHandler,
                            message_type: msg.kind.clone(),
                            payload: serde_json::to_vec(&msg.metadata).unwrap_or_default(),
                        };
                        match self.send_with_short_retry(&wire).await {
                            Ok(()) => {
                                // Acked once the receiver's ack reply comes back
                                // through `TransportManager::receive`, not here:
                                // a successful local send only means handed to
                                // the local transport plugin, not received.
                                watermarks.advance(&self.shared.node_id, msg.sequence);
                                sent_any = true;
                            }
                            Err(e) => {
                                warn!(node_id = %self.shared.node_id, error = %e, "reliable send failed, page aborted");
                                page_ok = false;
                                break;
                            }
                        }
                    }
                    if !page_ok {
                        break;
                    }
                }
            }

            let mut ff_rx = self.shared.ff_rx.lock().await;
            tokio::select! {
                _ = self.shared.new_persistent.notified() => {}
                maybe_msg = ff_rx.recv() => {
                    if let Some(message) = maybe_msg {
                        drop(ff_rx);
                        let _ = self.send_with_short_retry(&message).await;
                        sent_any = true;
                    }
                }
                _ = self.shared.cancel.cancelled() => break,
                _ = resend_timer.tick() => { full_scan_due = true; }
            }

            if !sent_any {
                let idle_for = self.shared.last_receive.lock().await.elapsed();
                if idle_for > PEER_INACTIVITY_TIMEOUT {
                    self.deactivate().await;
                    tokio::select! {
                        _ = self.shared.new_persistent.notified() => { continue; }
                        _ = tokio::time::sleep(QUIESCE_WINDOW) => { break; }
                        _ = self.shared.cancel.cancelled() => break,
                    }
                }
            }
        }
    }
}
