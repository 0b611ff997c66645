//! Drives distributed keygen and signing rounds over the gossip topic.
//!
//! One coordinator per node. `run` owns the subscription loop and routes
//! inbound traffic; `start_keygen` / `start_signing` run the local side of a
//! round to completion. Start announcements let any signer kick off a round:
//! every other member starts its own local session when the announcement
//! arrives, and round traffic that beats the announcement sits in the
//! registry's buffered inbox until then.

use super::registry::PartyRegistry;
use crate::domain::encoding::{derive_address, encode_ecdsa_signature, encode_signature};
use crate::domain::signer_set::SignerSet;
use crate::domain::{ChainFamily, Curve, KeyShareRecord, RoundKey, SignedPayload};
use crate::foundation::constants::PRECOMPUTE_BUDGET_SECS;
use crate::foundation::util::hex_fmt::hx;
use crate::foundation::{ChainId, CustodyError, Identity, PayloadHash, Result};
use crate::infrastructure::mpc::ecdsa::{EcdsaKeygenSession, EcdsaSignSession};
use crate::infrastructure::mpc::eddsa::{EddsaKeygenSession, EddsaSignSession};
use crate::infrastructure::mpc::{ecdsa_message_scalar, eddsa_message_bytes, RoundAction, RoundOutcome, RoundSession};
use crate::infrastructure::storage::KeyShareStore;
use crate::infrastructure::transport::{GossipTransport, MessageEnvelope, MessageKind, ProtocolMessage};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Round lifecycle notifications, for observers like the request broker and
/// the metrics layer.
#[derive(Clone, Debug)]
pub enum RoundEvent {
    KeygenCompleted { round_key: RoundKey, public_key: Vec<u8> },
    KeygenFailed { round_key: RoundKey, reason: String },
    SignatureReady { round_key: RoundKey, message_hash: PayloadHash, signature: String, address: String },
    SignFailed { round_key: RoundKey, message_hash: PayloadHash, reason: String },
}

pub struct PartyCoordinator {
    transport: Arc<dyn GossipTransport>,
    store: Arc<dyn KeyShareStore>,
    registry: PartyRegistry,
    events: broadcast::Sender<RoundEvent>,
    round_timeout: Duration,
}

impl PartyCoordinator {
    pub fn new(
        transport: Arc<dyn GossipTransport>,
        store: Arc<dyn KeyShareStore>,
        round_timeout: Duration,
        join_window: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { transport, store, registry: PartyRegistry::new(join_window), events, round_timeout }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn KeyShareStore> {
        &self.store
    }

    /// Runs the local side of a distributed keygen round and returns the
    /// group public key. Idempotent: when the store already holds a share for
    /// the triple, its public key is returned without starting a round.
    ///
    /// `announce` is set by the node where the request originated; joiners
    /// reacting to a start announcement pass `false` so announcements do not
    /// loop.
    pub async fn start_keygen(
        &self,
        identity: Identity,
        identity_curve: Curve,
        key_curve: Curve,
        signers: Vec<String>,
        announce: bool,
    ) -> Result<Vec<u8>> {
        let round_key = RoundKey { identity: identity.clone(), identity_curve, key_curve };
        if let Some(existing) = self.store.get_share(&round_key)? {
            debug!("keygen already satisfied key={}", round_key);
            return Ok(existing.public_key);
        }

        let signer_set = SignerSet::new(signers)?;
        let local_peer = self.transport.local_peer().as_str().to_string();
        let me = signer_set
            .index_of(&local_peer)
            .ok_or_else(|| CustodyError::NotInSignerSet { peer: local_peer.clone() })?;
        let n = signer_set.len();
        if n < 2 {
            return Err(CustodyError::ConfigError("keygen requires at least 2 signers".to_string()));
        }
        let threshold = signer_set.threshold();

        let session: Box<dyn RoundSession> = match key_curve {
            Curve::Ecdsa => Box::new(EcdsaKeygenSession::new(n, me, threshold)?),
            Curve::Eddsa => Box::new(EddsaKeygenSession::new(n, me, threshold)?),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.insert(&round_key, tx)?;
        info!("starting keygen round key={} n={} t={} me={}", round_key, n, threshold, me);

        let template = ProtocolMessage {
            kind: MessageKind::KeygenRound,
            from: me,
            to: -1,
            is_broadcast: true,
            payload: Vec::new(),
            identity: identity.clone(),
            identity_curve,
            key_curve,
            blockchain_id: None,
            hash: None,
            address: None,
            signer_set: signer_set.members().to_vec(),
        };

        let announced = if announce {
            let mut start = template.clone();
            start.kind = MessageKind::KeygenStart;
            start.from = 0;
            self.transport.publish(start).await
        } else {
            Ok(())
        };
        // The registry handle must be released on every exit path, including
        // a failed start announcement.
        let outcome = match announced {
            Ok(()) => self.run_round(&round_key, session, rx, template, self.round_timeout).await,
            Err(err) => Err(err),
        };
        self.registry.remove(&round_key);

        match outcome {
            Ok(RoundOutcome::KeyShare { share, public_key }) => {
                let record = KeyShareRecord {
                    identity,
                    identity_curve,
                    key_curve,
                    share,
                    public_key: public_key.clone(),
                    signer_set: signer_set.members().to_vec(),
                };
                if !self.store.put_share(record)? {
                    debug!("keygen share already stored key={}", round_key);
                }
                self.store.put_signers(&round_key, signer_set.members())?;
                info!("keygen round completed key={} public_key={}", round_key, hx(&public_key));
                let _ = self.events.send(RoundEvent::KeygenCompleted { round_key, public_key: public_key.clone() });
                Ok(public_key)
            }
            Ok(RoundOutcome::Signature { .. }) => {
                let err = CustodyError::RoundFailed("keygen round produced a signature outcome".to_string());
                let _ = self.events.send(RoundEvent::KeygenFailed { round_key, reason: err.to_string() });
                Err(err)
            }
            Err(err) => {
                warn!("keygen round failed key={} err={}", round_key, err);
                let _ = self.events.send(RoundEvent::KeygenFailed { round_key, reason: err.to_string() });
                Err(err)
            }
        }
    }

    /// Runs the local side of a distributed signing round and returns the
    /// chain-encoded signature together with the signer address derived from
    /// the stored public key.
    ///
    /// `payload` is the hex-encoded hash to sign. The curve asymmetry is
    /// deliberate and load-bearing across implementations: EdDSA signs the
    /// decoded hash bytes, ECDSA signs the base-16 integer value of the hex
    /// string reduced into the scalar field.
    pub async fn start_signing(
        &self,
        identity: Identity,
        blockchain_id: ChainId,
        identity_curve: Curve,
        key_curve: Curve,
        payload: &str,
        announce: bool,
    ) -> Result<SignedPayload> {
        let round_key = RoundKey { identity: identity.clone(), identity_curve, key_curve };
        let record = self.store.get_share(&round_key)?.ok_or_else(|| CustodyError::KeyShareNotFound {
            identity: identity.to_string(),
            identity_curve: identity_curve.to_string(),
            key_curve: key_curve.to_string(),
        })?;
        let signers = match self.store.get_signers(&round_key)? {
            Some(signers) if !signers.is_empty() => signers,
            _ => record.signer_set.clone(),
        };

        let signer_set = SignerSet::new(signers)?;
        let local_peer = self.transport.local_peer().as_str().to_string();
        let me = signer_set
            .index_of(&local_peer)
            .ok_or_else(|| CustodyError::NotInSignerSet { peer: local_peer.clone() })?;
        let n = signer_set.len();
        if n < 2 {
            return Err(CustodyError::ConfigError("signing requires at least 2 signers".to_string()));
        }
        let threshold = signer_set.threshold();
        let message_hash = PayloadHash::new(*blake3::hash(payload.as_bytes()).as_bytes());

        let (session, timeout, ecdsa_prehash): (Box<dyn RoundSession>, Duration, Option<Vec<u8>>) = match key_curve {
            Curve::Ecdsa => {
                let scalar = ecdsa_message_scalar(payload)?;
                let session = EcdsaSignSession::new(n, me, threshold, &record.share, scalar)?;
                // Triple generation and presigning run inside the same round,
                // so the budget for them extends the round deadline.
                (
                    Box::new(session),
                    self.round_timeout + Duration::from_secs(PRECOMPUTE_BUDGET_SECS),
                    Some(scalar.to_bytes().to_vec()),
                )
            }
            Curve::Eddsa => {
                let message = eddsa_message_bytes(payload)?;
                (Box::new(EddsaSignSession::new(n, me, &record.share, message)?), self.round_timeout, None)
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.insert(&round_key, tx)?;
        info!("starting signing round key={} chain={} hash={} n={} t={}", round_key, blockchain_id, message_hash, n, threshold);

        let template = ProtocolMessage {
            kind: MessageKind::SignRound,
            from: me,
            to: -1,
            is_broadcast: true,
            payload: Vec::new(),
            identity: identity.clone(),
            identity_curve,
            key_curve,
            blockchain_id: Some(blockchain_id.clone()),
            hash: Some(message_hash),
            address: None,
            signer_set: signer_set.members().to_vec(),
        };

        let announced = if announce {
            let mut start = template.clone();
            start.kind = MessageKind::SignStart;
            start.from = 0;
            start.payload = payload.as_bytes().to_vec();
            self.transport.publish(start).await
        } else {
            Ok(())
        };
        let outcome = match announced {
            Ok(()) => self.run_round(&round_key, session, rx, template.clone(), timeout).await,
            Err(err) => Err(err),
        };
        self.registry.remove(&round_key);

        match outcome {
            Ok(RoundOutcome::Signature { signature, public_key }) => {
                let family = ChainFamily::of(&blockchain_id);
                // ECDSA output is checked via public-key recovery against the
                // stored group key before it leaves the node.
                let encoded = match &ecdsa_prehash {
                    Some(prehash) => encode_ecdsa_signature(family, &signature, &record.public_key, prehash)?,
                    None => encode_signature(family, &signature, &public_key)?,
                };
                // The address always comes from stored key material, not from
                // round output.
                let address = derive_address(family, key_curve, &record.public_key)?;

                let mut result = template;
                result.kind = MessageKind::SignatureResult;
                result.from = 0;
                result.payload = encoded.clone().into_bytes();
                result.address = Some(address.clone());
                if let Err(err) = self.transport.publish(result).await {
                    warn!("signature result publish failed key={} err={}", round_key, err);
                }

                info!("signing round completed key={} chain={} address={}", round_key, blockchain_id, address);
                let _ = self.events.send(RoundEvent::SignatureReady {
                    round_key,
                    message_hash,
                    signature: encoded.clone(),
                    address: address.clone(),
                });
                Ok(SignedPayload { signature: encoded, address, message_hash })
            }
            Ok(RoundOutcome::KeyShare { .. }) => {
                let err = CustodyError::SigningFailed("signing round produced a key-share outcome".to_string());
                let _ = self.events.send(RoundEvent::SignFailed { round_key, message_hash, reason: err.to_string() });
                Err(err)
            }
            Err(err) => {
                warn!("signing round failed key={} err={}", round_key, err);
                let _ = self.events.send(RoundEvent::SignFailed { round_key, message_hash, reason: err.to_string() });
                Err(err)
            }
        }
    }

    /// Poke-until-wait loop: drains the session's outbound actions onto the
    /// gossip topic, then blocks for the next inbound message. The whole
    /// round runs under one deadline.
    async fn run_round(
        &self,
        round_key: &RoundKey,
        mut session: Box<dyn RoundSession>,
        mut inbound: mpsc::UnboundedReceiver<(u32, Vec<u8>)>,
        template: ProtocolMessage,
        timeout: Duration,
    ) -> Result<RoundOutcome> {
        let drive = async {
            loop {
                loop {
                    match session.poke()? {
                        RoundAction::Wait => break,
                        RoundAction::SendMany(data) => {
                            let mut msg = template.clone();
                            msg.to = -1;
                            msg.is_broadcast = true;
                            msg.payload = data;
                            self.transport.publish(msg).await?;
                        }
                        RoundAction::SendPrivate(to, data) => {
                            let mut msg = template.clone();
                            msg.to = to as i32;
                            msg.is_broadcast = false;
                            msg.payload = data;
                            self.transport.publish(msg).await?;
                        }
                        RoundAction::Complete(outcome) => return Ok(outcome),
                    }
                }
                match inbound.recv().await {
                    Some((from, data)) => session.message(from, data)?,
                    None => return Err(CustodyError::RoundFailed(format!("round channel closed key={round_key}"))),
                }
            }
        };
        match tokio::time::timeout(timeout, drive).await {
            Ok(result) => result,
            Err(_) => Err(CustodyError::RoundTimeout { elapsed_secs: timeout.as_secs() }),
        }
    }

    /// Subscription loop: routes every inbound envelope until the transport
    /// closes. Each envelope is handled on its own task so a slow round start
    /// cannot stall routing.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut subscription = self.transport.subscribe().await?;
        info!("coordinator listening peer={}", self.transport.local_peer());
        while let Some(item) = subscription.next().await {
            match item {
                Ok(envelope) => {
                    if &envelope.sender == self.transport.local_peer() {
                        continue;
                    }
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = this.handle_envelope(envelope).await {
                            warn!("inbound message handling failed err={}", err);
                        }
                    });
                }
                Err(err) => warn!("gossip subscription error err={}", err),
            }
        }
        Ok(())
    }

    async fn handle_envelope(&self, envelope: MessageEnvelope) -> Result<()> {
        let msg = envelope.payload;
        let round_key = msg.round_key();
        match msg.kind {
            MessageKind::KeygenStart => {
                let local_peer = self.transport.local_peer().as_str();
                if !msg.signer_set.iter().any(|m| m == local_peer) {
                    return Ok(());
                }
                if self.registry.is_active(&round_key) {
                    return Ok(());
                }
                debug!("joining announced keygen round key={} from={}", round_key, envelope.sender);
                self.start_keygen(msg.identity, msg.identity_curve, msg.key_curve, msg.signer_set, false)
                    .await
                    .map(|_| ())
            }
            MessageKind::SignStart => {
                if self.registry.is_active(&round_key) {
                    return Ok(());
                }
                let payload = String::from_utf8(msg.payload)
                    .map_err(|_| CustodyError::InvalidOperation("sign start payload is not utf-8".to_string()))?;
                let blockchain_id = msg
                    .blockchain_id
                    .ok_or_else(|| CustodyError::InvalidOperation("sign start without blockchain id".to_string()))?;
                debug!("joining announced signing round key={} from={}", round_key, envelope.sender);
                self.start_signing(msg.identity, blockchain_id, msg.identity_curve, msg.key_curve, &payload, false)
                    .await
                    .map(|_| ())
            }
            MessageKind::KeygenRound | MessageKind::SignRound => {
                if let Some(local_index) = self.local_index(&msg, &round_key)? {
                    if msg.is_addressed_to(local_index) {
                        self.registry.deliver(&round_key, msg.from, msg.payload)?;
                    }
                }
                Ok(())
            }
            MessageKind::SignatureResult => {
                let (Some(hash), Some(address)) = (msg.hash, msg.address) else {
                    return Ok(());
                };
                let signature = String::from_utf8(msg.payload)
                    .map_err(|_| CustodyError::InvalidOperation("signature result payload is not utf-8".to_string()))?;
                let _ = self.events.send(RoundEvent::SignatureReady {
                    round_key,
                    message_hash: hash,
                    signature,
                    address,
                });
                Ok(())
            }
        }
    }

    /// Local party index for an inbound round message: from the message's
    /// signer set when present, otherwise from the stored one.
    fn local_index(&self, msg: &ProtocolMessage, round_key: &RoundKey) -> Result<Option<u32>> {
        let local_peer = self.transport.local_peer().as_str().to_string();
        let members = if !msg.signer_set.is_empty() {
            msg.signer_set.clone()
        } else {
            match self.store.get_signers(round_key)? {
                Some(signers) => signers,
                None => return Ok(None),
            }
        };
        let set = SignerSet::new(members)?;
        Ok(set.index_of(&local_peer))
    }
}
