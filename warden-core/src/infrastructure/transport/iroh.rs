use super::encoding;
use super::messages::{MessageEnvelope, ProtocolMessage};
use super::traits::{GossipTransport, TransportSubscription};
use crate::foundation::util::time::now_millis;
use crate::foundation::{
    CustodyError, GroupId, Hash32, PeerPubkey, GOSSIP_PUBLISH_RETRIES, GOSSIP_RETRY_DELAY_MS, MAX_MESSAGE_SIZE_BYTES,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use iroh::EndpointId;
use iroh_gossip::api::Event as GossipEvent;
use iroh_gossip::net::Gossip;
use iroh_gossip::proto::TopicId;
use log::{debug, info, warn};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

const PUBLISH_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(GOSSIP_RETRY_DELAY_MS);

/// Gossip transport over iroh. All coordination traffic flows on one topic
/// derived from `(network_id, group_id)`.
pub struct IrohTransport {
    gossip: Gossip,
    local_peer: PeerPubkey,
    group_id: GroupId,
    network_id: u8,
    bootstrap: Vec<EndpointId>,
    seq: AtomicU64,
}

impl IrohTransport {
    pub fn new(
        gossip: Gossip,
        local_peer: PeerPubkey,
        group_id: impl Into<GroupId>,
        network_id: u8,
        bootstrap_nodes: &[String],
    ) -> Result<Self, CustodyError> {
        let group_id = group_id.into();
        info!(
            "creating iroh transport network_id={} group_id={} bootstrap_nodes={}",
            network_id,
            group_id,
            bootstrap_nodes.len()
        );
        let bootstrap = bootstrap_nodes
            .iter()
            .filter_map(|node_id| match EndpointId::from_str(node_id) {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!("invalid bootstrap node, skipping node_id={} error={}", node_id, err);
                    None
                }
            })
            .collect::<Vec<_>>();

        if !bootstrap_nodes.is_empty() && bootstrap.is_empty() {
            return Err(CustodyError::ConfigError("no valid gossip.bootstrap nodes".to_string()));
        }

        Ok(Self { gossip, local_peer, group_id, network_id, bootstrap, seq: AtomicU64::new(1) })
    }

    fn topic_id(group_id: &GroupId, network_id: u8) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"warden/v1");
        hasher.update(&[network_id]);
        hasher.update(group_id.as_hash());
        *hasher.finalize().as_bytes()
    }

    async fn publish_bytes(&self, topic: Hash32, bytes: Vec<u8>) -> Result<(), CustodyError> {
        if bytes.len() > MAX_MESSAGE_SIZE_BYTES {
            return Err(CustodyError::MessageTooLarge { size: bytes.len(), max: MAX_MESSAGE_SIZE_BYTES });
        }

        let topic_id = TopicId::from(topic);
        let mut last_err: Option<String> = None;
        debug!(
            "publishing gossip message topic={} byte_len={} bootstrap_peers={}",
            hex::encode(topic_id.as_bytes()),
            bytes.len(),
            self.bootstrap.len()
        );
        for attempt in 0..GOSSIP_PUBLISH_RETRIES {
            let mut joined = match self.gossip.subscribe(topic_id, self.bootstrap.clone()).await {
                Ok(joined) => joined,
                Err(err) => {
                    let err_str = err.to_string();
                    last_err = Some(err_str.clone());
                    warn!(
                        "failed to subscribe for publish attempt={} topic={} error={}",
                        attempt + 1,
                        hex::encode(topic_id.as_bytes()),
                        err_str
                    );
                    if attempt + 1 < GOSSIP_PUBLISH_RETRIES {
                        tokio::time::sleep(PUBLISH_RETRY_DELAY).await;
                    }
                    continue;
                }
            };
            match joined.broadcast(bytes.clone().into()).await {
                Ok(()) => {
                    debug!(
                        "published gossip message attempt={} topic={} byte_len={}",
                        attempt + 1,
                        hex::encode(topic_id.as_bytes()),
                        bytes.len()
                    );
                    return Ok(());
                }
                Err(err) => {
                    let err_str = err.to_string();
                    last_err = Some(err_str.clone());
                    warn!(
                        "failed to broadcast gossip message attempt={} topic={} error={}",
                        attempt + 1,
                        hex::encode(topic_id.as_bytes()),
                        err_str
                    );
                    if attempt + 1 < GOSSIP_PUBLISH_RETRIES {
                        tokio::time::sleep(PUBLISH_RETRY_DELAY).await;
                    }
                }
            }
        }
        Err(CustodyError::TransportError {
            operation: "gossip_publish".to_string(),
            details: last_err.unwrap_or_else(|| "failed to publish gossip message".to_string()),
        })
    }
}

#[async_trait]
impl GossipTransport for IrohTransport {
    fn local_peer(&self) -> &PeerPubkey {
        &self.local_peer
    }

    async fn publish(&self, message: ProtocolMessage) -> Result<(), CustodyError> {
        let payload_hash = encoding::payload_hash(&message)?;
        let envelope = MessageEnvelope {
            sender: self.local_peer.clone(),
            seq_no: self.seq.fetch_add(1, Ordering::AcqRel),
            timestamp_millis: now_millis(),
            payload: message,
            payload_hash,
        };
        let bytes = encoding::encode_envelope(&envelope)?;
        let topic = Self::topic_id(&self.group_id, self.network_id);
        self.publish_bytes(topic, bytes).await
    }

    async fn subscribe(&self) -> Result<TransportSubscription, CustodyError> {
        let topic = Self::topic_id(&self.group_id, self.network_id);
        let topic_id = TopicId::from(topic);
        info!("subscribing to gossip topic={} bootstrap_peers={}", hex::encode(topic), self.bootstrap.len());
        let joined = self
            .gossip
            .subscribe(topic_id, self.bootstrap.clone())
            .await
            .map_err(|err| CustodyError::TransportError { operation: "gossip_subscribe".to_string(), details: err.to_string() })?;
        let (sender, mut receiver) = joined.split();
        let keepalive: Box<dyn std::any::Any + Send> = Box::new(sender);

        let stream = async_stream::stream! {
            loop {
                let Some(item) = receiver.next().await else {
                    break;
                };
                let event = match item {
                    Ok(event) => event,
                    Err(err) => {
                        warn!("iroh gossip stream error error={}", err);
                        yield Err(CustodyError::TransportError {
                            operation: "gossip_stream".to_string(),
                            details: err.to_string(),
                        });
                        continue;
                    }
                };
                match event {
                    GossipEvent::Received(message) => {
                        if message.content.len() > MAX_MESSAGE_SIZE_BYTES {
                            warn!(
                                "iroh gossip oversized message size={} max={}",
                                message.content.len(),
                                MAX_MESSAGE_SIZE_BYTES
                            );
                            yield Err(CustodyError::MessageTooLarge {
                                size: message.content.len(),
                                max: MAX_MESSAGE_SIZE_BYTES,
                            });
                            continue;
                        }
                        match encoding::decode_envelope(message.content.as_ref()) {
                            Ok(envelope) => yield Ok(envelope),
                            Err(err) => {
                                warn!("iroh gossip decode error error={} size={}", err, message.content.len());
                                yield Err(err);
                            }
                        }
                    }
                    GossipEvent::Lagged => {
                        warn!("iroh gossip stream lagged");
                        yield Err(CustodyError::TransportError {
                            operation: "gossip_stream_lagged".to_string(),
                            details: "iroh gossip stream lagged".to_string(),
                        });
                    }
                    _ => {}
                }
            }
        };
        Ok(TransportSubscription::new_with_keepalive(Box::pin(stream), keepalive))
    }
}
