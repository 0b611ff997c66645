use super::encoding;
use super::messages::{MessageEnvelope, ProtocolMessage};
use super::traits::{GossipTransport, TransportSubscription};
use crate::foundation::util::time::now_millis;
use crate::foundation::{CustodyError, GroupId, Hash32, PeerPubkey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// In-process gossip fabric for tests: one broadcast channel per topic.
pub struct MockHub {
    topics: Mutex<HashMap<Hash32, broadcast::Sender<MessageEnvelope>>>,
}

impl MockHub {
    pub fn new() -> Self {
        Self { topics: Mutex::new(HashMap::new()) }
    }

    async fn topic(&self, topic: Hash32) -> broadcast::Sender<MessageEnvelope> {
        let mut guard = self.topics.lock().await;
        guard.entry(topic).or_insert_with(|| broadcast::channel(1024).0).clone()
    }
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockTransport {
    hub: Arc<MockHub>,
    local_peer: PeerPubkey,
    group_id: GroupId,
    network_id: u8,
    seq: AtomicU64,
}

impl MockTransport {
    pub fn new(hub: Arc<MockHub>, local_peer: PeerPubkey, group_id: impl Into<GroupId>, network_id: u8) -> Self {
        Self { hub, local_peer, group_id: group_id.into(), network_id, seq: AtomicU64::new(1) }
    }

    fn topic_id(&self) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"warden/v1");
        hasher.update(&[self.network_id]);
        hasher.update(self.group_id.as_hash());
        *hasher.finalize().as_bytes()
    }
}

#[async_trait]
impl GossipTransport for MockTransport {
    fn local_peer(&self) -> &PeerPubkey {
        &self.local_peer
    }

    async fn publish(&self, message: ProtocolMessage) -> Result<(), CustodyError> {
        let payload_hash = encoding::payload_hash(&message)?;
        let envelope = MessageEnvelope {
            sender: self.local_peer.clone(),
            seq_no: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp_millis: now_millis(),
            payload: message,
            payload_hash,
        };
        let sender = self.hub.topic(self.topic_id()).await;
        // `broadcast::Sender::send` errors when there are no active receivers.
        // Publishing to a topic with no peers is not an error here.
        let _ = sender.send(envelope);
        Ok(())
    }

    async fn subscribe(&self) -> Result<TransportSubscription, CustodyError> {
        let sender = self.hub.topic(self.topic_id()).await;
        let mut receiver = sender.subscribe();
        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => yield Ok(envelope),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        yield Err(CustodyError::Message("mock transport lagged".to_string()));
                    }
                }
            }
        };
        Ok(TransportSubscription::new(Box::pin(stream)))
    }
}
