use super::messages::{MessageEnvelope, ProtocolMessage};
use crate::foundation::{CustodyError, PeerPubkey};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

pub type Result<T> = std::result::Result<T, CustodyError>;

pub struct TransportSubscription {
    inner: BoxStream<'static, Result<MessageEnvelope>>,
    _keepalive: Option<Box<dyn std::any::Any + Send>>,
}

impl TransportSubscription {
    pub fn new(inner: BoxStream<'static, Result<MessageEnvelope>>) -> Self {
        Self { inner, _keepalive: None }
    }

    pub fn new_with_keepalive(inner: BoxStream<'static, Result<MessageEnvelope>>, keepalive: Box<dyn std::any::Any + Send>) -> Self {
        Self { inner, _keepalive: Some(keepalive) }
    }

    pub async fn next(&mut self) -> Option<Result<MessageEnvelope>> {
        self.inner.next().await
    }
}

/// Best-effort pub/sub over a single coordination topic. Loss manifests as a
/// round timeout; there is no acknowledgment or retry at this layer.
#[async_trait]
pub trait GossipTransport: Send + Sync {
    /// The local node's peer public key as it appears in signer sets.
    fn local_peer(&self) -> &PeerPubkey;

    /// Fire-and-forget publish to the coordination topic.
    async fn publish(&self, message: ProtocolMessage) -> Result<()>;

    async fn subscribe(&self) -> Result<TransportSubscription>;
}
