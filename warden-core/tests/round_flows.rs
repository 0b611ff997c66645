//! Full keygen and signing rounds across multiple coordinators wired over
//! the in-process gossip hub.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use warden_core::application::PartyCoordinator;
use warden_core::domain::{Curve, RoundKey};
use warden_core::foundation::{CustodyError, PeerPubkey};
use warden_core::infrastructure::storage::{KeyShareStore, MemoryKeyShareStore};
use warden_core::infrastructure::transport::{GossipTransport, MockHub, MockTransport, ProtocolMessage, TransportSubscription};

fn node(hub: &Arc<MockHub>, peer: &str) -> Arc<PartyCoordinator> {
    let transport = Arc::new(MockTransport::new(Arc::clone(hub), peer.into(), [9u8; 32], 1));
    let store: Arc<dyn KeyShareStore> = Arc::new(MemoryKeyShareStore::new());
    Arc::new(PartyCoordinator::new(transport, store, Duration::from_secs(120), Duration::from_secs(30)))
}

fn spawn_all(nodes: &[Arc<PartyCoordinator>]) {
    for coordinator in nodes {
        let coordinator = Arc::clone(coordinator);
        tokio::spawn(async move {
            let _ = coordinator.run().await;
        });
    }
}

async fn wait_for_share(coordinator: &PartyCoordinator, key: &RoundKey) -> Vec<u8> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    loop {
        if let Ok(Some(record)) = coordinator.store().get_share(key) {
            return record.public_key;
        }
        assert!(tokio::time::Instant::now() < deadline, "share not stored before deadline key={key}");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn three_node_eddsa_keygen_then_sign() {
    let hub = Arc::new(MockHub::new());
    let peers = ["pkA", "pkB", "pkC"];
    let nodes: Vec<_> = peers.iter().map(|peer| node(&hub, peer)).collect();
    spawn_all(&nodes);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let signer_set: Vec<String> = peers.iter().map(|p| p.to_string()).collect();
    let public_key = nodes[0]
        .start_keygen("alice".into(), Curve::Ecdsa, Curve::Eddsa, signer_set, true)
        .await
        .expect("keygen");
    assert_eq!(public_key.len(), 32);

    let key = RoundKey::new("alice", Curve::Ecdsa, Curve::Eddsa);
    for coordinator in &nodes[1..] {
        let joined = wait_for_share(coordinator, &key).await;
        assert_eq!(joined, public_key, "group key must agree across nodes");
    }

    let payload = hex::encode(blake3::hash(b"transfer 5 to bob").as_bytes());
    let signed = nodes[0]
        .start_signing("alice".into(), "solana".into(), Curve::Ecdsa, Curve::Eddsa, &payload, true)
        .await
        .expect("sign");

    // Solana encoding: base58 signature, base58 address from the group key.
    assert_eq!(signed.address, bs58::encode(&public_key).into_string());
    let signature_bytes = bs58::decode(&signed.signature).into_vec().expect("base58");
    let signature_array: [u8; 64] = signature_bytes.as_slice().try_into().expect("64-byte signature");
    let pk_array: [u8; 32] = public_key.as_slice().try_into().expect("32-byte key");

    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    let verifying_key = VerifyingKey::from_bytes(&pk_array).expect("group key");
    let message = hex::decode(&payload).expect("payload hex");
    verifying_key
        .verify(&message, &Signature::from_bytes(&signature_array))
        .expect("group signature must verify over the decoded hash bytes");
}

#[tokio::test(flavor = "multi_thread")]
async fn keygen_is_idempotent_per_round_key() {
    let hub = Arc::new(MockHub::new());
    let nodes: Vec<_> = ["pkA", "pkB"].iter().map(|peer| node(&hub, peer)).collect();
    spawn_all(&nodes);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let signer_set = vec!["pkA".to_string(), "pkB".to_string()];
    let first = nodes[0]
        .start_keygen("carol".into(), Curve::Eddsa, Curve::Eddsa, signer_set.clone(), true)
        .await
        .expect("keygen");
    let second = nodes[0]
        .start_keygen("carol".into(), Curve::Eddsa, Curve::Eddsa, signer_set, true)
        .await
        .expect("repeat keygen");
    assert_eq!(first, second, "second keygen must return the stored key");
}

#[tokio::test(flavor = "multi_thread")]
async fn two_node_ecdsa_keygen_then_sign_recovers_to_group_key() {
    let hub = Arc::new(MockHub::new());
    let nodes: Vec<_> = ["pkA", "pkB"].iter().map(|peer| node(&hub, peer)).collect();
    spawn_all(&nodes);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let signer_set = vec!["pkA".to_string(), "pkB".to_string()];
    let public_key = nodes[0]
        .start_keygen("alice".into(), Curve::Ecdsa, Curve::Ecdsa, signer_set, true)
        .await
        .expect("keygen");
    assert_eq!(public_key.len(), 33, "compressed secp256k1 group key");

    let key = RoundKey::new("alice", Curve::Ecdsa, Curve::Ecdsa);
    assert_eq!(wait_for_share(&nodes[1], &key).await, public_key);

    let payload = hex::encode(blake3::hash(b"evm withdraw").as_bytes());
    let signed = nodes[0]
        .start_signing("alice".into(), "ethereum".into(), Curve::Ecdsa, Curve::Ecdsa, &payload, true)
        .await
        .expect("sign");

    let derived = warden_core::domain::encoding::evm_address_from_pubkey(&public_key).expect("address");
    assert_eq!(signed.address, derived);

    // EVM signatures leave as r||s||v; the v byte recovers the group key.
    let signature_bytes = hex::decode(&signed.signature).expect("hex signature");
    assert_eq!(signature_bytes.len(), 65);
    let (rs, v) = signature_bytes.split_at(64);
    let prehash = hex::decode(&payload).expect("payload hex");
    let recovered = warden_core::domain::encoding::recover_evm_address(&prehash, rs, v[0]).expect("recover");
    assert_eq!(recovered, derived);
}

struct DeadPublishTransport {
    peer: PeerPubkey,
}

#[async_trait]
impl GossipTransport for DeadPublishTransport {
    fn local_peer(&self) -> &PeerPubkey {
        &self.peer
    }

    async fn publish(&self, _message: ProtocolMessage) -> Result<(), CustodyError> {
        Err(CustodyError::TransportError { operation: "gossip_publish".to_string(), details: "topic unreachable".to_string() })
    }

    async fn subscribe(&self) -> Result<TransportSubscription, CustodyError> {
        Ok(TransportSubscription::new(Box::pin(futures_util::stream::pending())))
    }
}

#[tokio::test]
async fn failed_start_announcement_releases_the_round() {
    let transport = Arc::new(DeadPublishTransport { peer: "pkA".into() });
    let store: Arc<dyn KeyShareStore> = Arc::new(MemoryKeyShareStore::new());
    let coordinator = PartyCoordinator::new(transport, store, Duration::from_secs(5), Duration::from_secs(5));

    let signer_set = vec!["pkA".to_string(), "pkB".to_string()];
    let first = coordinator.start_keygen("alice".into(), Curve::Ecdsa, Curve::Eddsa, signer_set.clone(), true).await;
    assert!(matches!(first, Err(CustodyError::TransportError { .. })), "got {first:?}");

    // A second attempt must reach the transport again instead of tripping
    // over a stale round handle.
    let second = coordinator.start_keygen("alice".into(), Curve::Ecdsa, Curve::Eddsa, signer_set, true).await;
    assert!(matches!(second, Err(CustodyError::TransportError { .. })), "got {second:?}");
}

#[tokio::test]
async fn signing_without_a_share_fails_fast() {
    let hub = Arc::new(MockHub::new());
    let coordinator = node(&hub, "pkA");
    let result = coordinator
        .start_signing("nobody".into(), "solana".into(), Curve::Ecdsa, Curve::Eddsa, "deadbeef", true)
        .await;
    assert!(matches!(result, Err(CustodyError::KeyShareNotFound { .. })));
}
