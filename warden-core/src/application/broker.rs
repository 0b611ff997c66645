//! Pending-signature bookkeeping between the API surface and the
//! coordinator.
//!
//! Each request gets a fresh `RequestId` (hash of payload plus a monotonic
//! nonce, so identical concurrent payloads never collide) and a bounded wait.
//! Cancellation stops the wait only; the MPC round keeps running so the other
//! signers still converge.

use super::coordinator::PartyCoordinator;
use crate::domain::{Curve, SignedPayload};
use crate::foundation::{ChainId, CustodyError, Identity, RequestId, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub struct SignatureRequestBroker {
    coordinator: Arc<PartyCoordinator>,
    waiters: Mutex<HashMap<RequestId, oneshot::Sender<()>>>,
    nonce: AtomicU64,
    wait_timeout: Duration,
}

impl SignatureRequestBroker {
    pub fn new(coordinator: Arc<PartyCoordinator>, wait_timeout: Duration) -> Self {
        Self { coordinator, waiters: Mutex::new(HashMap::new()), nonce: AtomicU64::new(0), wait_timeout }
    }

    /// Runs a signing round and waits for its result, up to the configured
    /// deadline. The waiter entry is removed on every exit path.
    pub async fn request_signature(
        &self,
        identity: Identity,
        blockchain_id: ChainId,
        identity_curve: Curve,
        key_curve: Curve,
        payload: &str,
    ) -> Result<SignedPayload> {
        let request_id = self.next_request_id(payload);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut waiters = self.waiters.lock().map_err(|e| crate::storage_err!("broker_register", e))?;
            waiters.insert(request_id, cancel_tx);
        }
        info!("signature request registered request_id={} chain={} identity={}", request_id, blockchain_id, identity);

        // The round is driven on its own task: abandoning the wait must not
        // abort the round for the rest of the group.
        let coordinator = Arc::clone(&self.coordinator);
        let payload = payload.to_string();
        let round = tokio::spawn(async move {
            coordinator.start_signing(identity, blockchain_id, identity_curve, key_curve, &payload, true).await
        });

        let result = tokio::select! {
            joined = round => match joined {
                Ok(result) => result,
                Err(err) => Err(CustodyError::SigningFailed(format!("signing task aborted: {err}"))),
            },
            _ = cancel_rx => Err(CustodyError::Cancelled),
            _ = tokio::time::sleep(self.wait_timeout) => {
                Err(CustodyError::DeadlineExceeded { waited_secs: self.wait_timeout.as_secs() })
            }
        };

        if let Ok(mut waiters) = self.waiters.lock() {
            waiters.remove(&request_id);
        }
        match &result {
            Ok(signed) => debug!("signature request completed request_id={} address={}", request_id, signed.address),
            Err(err) => warn!("signature request finished without signature request_id={} err={}", request_id, err),
        }
        result
    }

    /// Stops the wait for one pending request. Returns false when the id is
    /// unknown or already settled.
    pub fn cancel(&self, request_id: &RequestId) -> bool {
        let Ok(mut waiters) = self.waiters.lock() else {
            return false;
        };
        match waiters.remove(request_id) {
            Some(cancel) => cancel.send(()).is_ok(),
            None => false,
        }
    }

    pub fn pending(&self) -> Vec<RequestId> {
        self.waiters.lock().map(|waiters| waiters.keys().copied().collect()).unwrap_or_default()
    }

    fn next_request_id(&self, payload: &str) -> RequestId {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let mut hasher = blake3::Hasher::new();
        hasher.update(payload.as_bytes());
        hasher.update(&nonce.to_le_bytes());
        RequestId::new(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KeyShareRecord;
    use crate::infrastructure::mpc::eddsa::EddsaShareBundle;
    use crate::infrastructure::storage::{KeyShareStore, MemoryKeyShareStore};
    use crate::infrastructure::transport::{MockHub, MockTransport};
    use frost_ed25519 as frost;

    fn transport(hub: &Arc<MockHub>, peer: &str) -> Arc<MockTransport> {
        Arc::new(MockTransport::new(Arc::clone(hub), peer.into(), [7u8; 32], 1))
    }

    fn unique_ids_broker() -> SignatureRequestBroker {
        let hub = Arc::new(MockHub::new());
        let transport = transport(&hub, "pkA");
        let store: Arc<dyn KeyShareStore> = Arc::new(MemoryKeyShareStore::new());
        let coordinator =
            Arc::new(PartyCoordinator::new(transport, store, Duration::from_secs(60), Duration::from_secs(60)));
        SignatureRequestBroker::new(coordinator, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn identical_payloads_get_distinct_request_ids() {
        let broker = unique_ids_broker();
        let a = broker.next_request_id("deadbeef");
        let b = broker.next_request_id("deadbeef");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn cancel_of_unknown_request_is_false() {
        let broker = unique_ids_broker();
        let id = broker.next_request_id("deadbeef");
        assert!(!broker.cancel(&id));
    }

    /// Trusted-dealer shares let a signing round start without running DKG.
    fn seeded_store(local_peer: &str, other_peer: &str) -> Arc<dyn KeyShareStore> {
        let (shares, pubkey_package) = frost::keys::generate_with_dealer(
            2,
            2,
            frost::keys::IdentifierList::Default,
            rand::rngs::OsRng,
        )
        .expect("dealer");
        let me = frost::Identifier::try_from(if local_peer < other_peer { 1u16 } else { 2u16 }).expect("identifier");
        let secret_share = shares.get(&me).expect("share").clone();
        let key_package = frost::keys::KeyPackage::try_from(secret_share).expect("key package");

        let bundle = EddsaShareBundle {
            key_package: key_package.serialize().expect("serialize"),
            public_key_package: pubkey_package.serialize().expect("serialize"),
        };
        let record = KeyShareRecord {
            identity: "alice".into(),
            identity_curve: Curve::Ecdsa,
            key_curve: Curve::Eddsa,
            share: serde_json::to_vec(&bundle).expect("bundle"),
            public_key: pubkey_package.verifying_key().serialize().expect("group key"),
            signer_set: vec![local_peer.to_string(), other_peer.to_string()],
        };
        let key = record.round_key();
        let store = MemoryKeyShareStore::new();
        store.put_share(record).expect("put");
        store.put_signers(&key, &[local_peer.to_string(), other_peer.to_string()]).expect("signers");
        Arc::new(store)
    }

    fn stalled_broker(wait_timeout: Duration) -> SignatureRequestBroker {
        // The other signer never joins, so the round cannot complete and the
        // broker's own deadline decides.
        let hub = Arc::new(MockHub::new());
        let transport = transport(&hub, "pkA");
        let store = seeded_store("pkA", "pkB");
        let coordinator =
            Arc::new(PartyCoordinator::new(transport, store, Duration::from_secs(600), Duration::from_secs(60)));
        SignatureRequestBroker::new(coordinator, wait_timeout)
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let broker = stalled_broker(Duration::from_millis(100));
        let result = broker
            .request_signature("alice".into(), "solana".into(), Curve::Ecdsa, Curve::Eddsa, "deadbeef")
            .await;
        assert!(matches!(result, Err(CustodyError::DeadlineExceeded { .. })));
        assert!(broker.pending().is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_the_wait() {
        let broker = Arc::new(stalled_broker(Duration::from_secs(600)));
        let waiter = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                broker
                    .request_signature("alice".into(), "solana".into(), Curve::Ecdsa, Curve::Eddsa, "deadbeef")
                    .await
            })
        };

        let pending = loop {
            let pending = broker.pending();
            if !pending.is_empty() {
                break pending;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert!(broker.cancel(&pending[0]));

        let result = waiter.await.expect("join");
        assert!(matches!(result, Err(CustodyError::Cancelled)));
        assert!(broker.pending().is_empty());
    }
}
