//! End-to-end RPC flows across two in-process nodes sharing a mock gossip
//! hub: keygen through the API, address derivation, and intent signing.

use ed25519_dalek::{Signer, SigningKey};
use std::sync::Arc;
use std::time::Duration;
use warden_core::application::{PartyCoordinator, SignatureRequestBroker};
use warden_core::domain::{Curve, EngineDeps, Intent, Operation, OperationKind, OperationMetadata, OperationStatus};
use warden_core::infrastructure::config::ChainConfig;
use warden_core::infrastructure::storage::{KeyShareStore, MemoryKeyShareStore};
use warden_core::infrastructure::transport::{MockHub, MockTransport};
use warden_service::api::handlers::intent::{handle_intent_cancel, handle_intent_sign};
use warden_service::api::handlers::keys::{handle_key_address, handle_keygen_start};
use warden_service::api::RpcState;
use warden_service::service::chains::{ConfigBridgeRegistry, ConfigChainRegistry, PassthroughSolver};
use warden_service::service::metrics::Metrics;

fn chain_configs() -> Vec<ChainConfig> {
    vec![
        ChainConfig { chain_id: "solana".to_string(), curve: Curve::Eddsa, decimals: 9, rpc_url: String::new() },
        ChainConfig { chain_id: "algorand".to_string(), curve: Curve::Eddsa, decimals: 6, rpc_url: String::new() },
    ]
}

fn build_state(hub: &Arc<MockHub>, peer: &str, signer_set: &[&str]) -> Arc<RpcState> {
    let transport = Arc::new(MockTransport::new(Arc::clone(hub), peer.into(), [3u8; 32], 1));
    let store: Arc<dyn KeyShareStore> = Arc::new(MemoryKeyShareStore::new());
    let coordinator = Arc::new(PartyCoordinator::new(transport, store, Duration::from_secs(120), Duration::from_secs(30)));
    {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let _ = coordinator.run().await;
        });
    }
    let broker = Arc::new(SignatureRequestBroker::new(Arc::clone(&coordinator), Duration::from_secs(120)));
    let chains = Arc::new(ConfigChainRegistry::from_config(&chain_configs()));
    let engine = EngineDeps {
        chains: chains.clone(),
        bridge: Arc::new(ConfigBridgeRegistry::from_config(&Default::default())),
        solver: Arc::new(PassthroughSolver),
    };
    Arc::new(RpcState {
        coordinator,
        broker,
        chains,
        engine,
        metrics: Arc::new(Metrics::new().expect("metrics")),
        rpc_token: None,
        local_peer: peer.to_string(),
        signer_set: signer_set.iter().map(|p| p.to_string()).collect(),
    })
}

fn signed_intent(identity_key: &SigningKey, chain: &str, payload_hex: &str) -> Intent {
    let mut intent = Intent {
        id: "intent-rpc-1".to_string(),
        identity: hex::encode(identity_key.verifying_key().as_bytes()).into(),
        identity_curve: Curve::Eddsa,
        blockchain_id: chain.into(),
        network_type: "mainnet".to_string(),
        signature: String::new(),
        expiry: 0,
        operations: vec![Operation {
            id: "op-0".to_string(),
            kind: OperationKind::Transaction,
            blockchain_id: chain.into(),
            network_type: "mainnet".to_string(),
            data_to_sign: Some(payload_hex.to_string()),
            serialized_txn: None,
            solver: None,
            solver_metadata: OperationMetadata::default(),
            solver_data_to_sign: None,
            status: OperationStatus::Pending,
            result: None,
        }],
    };
    let sig = identity_key.sign(&intent.canonical_bytes().expect("canonical"));
    intent.signature = hex::encode(sig.to_bytes());
    intent
}

#[tokio::test(flavor = "multi_thread")]
async fn keygen_address_and_intent_sign_across_two_nodes() {
    let hub = Arc::new(MockHub::new());
    let peers = ["pkA", "pkB"];
    let state_a = build_state(&hub, "pkA", &peers);
    let _state_b = build_state(&hub, "pkB", &peers);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let identity_key = SigningKey::from_bytes(&[21u8; 32]);
    let identity_hex = hex::encode(identity_key.verifying_key().as_bytes());

    let params = serde_json::json!({ "identity": identity_hex, "identity_curve": "eddsa" });
    let keygen = handle_keygen_start(&state_a, serde_json::json!(1), Some(params)).await;
    assert!(keygen["error"].is_null(), "keygen must succeed: {keygen}");
    let eddsa_key = keygen["result"]["eddsa_public_key"].as_str().expect("eddsa key");
    assert_eq!(eddsa_key.len(), 64);
    let ecdsa_key = keygen["result"]["ecdsa_public_key"].as_str().expect("ecdsa key");
    assert_eq!(ecdsa_key.len(), 66);

    let params = serde_json::json!({ "identity": identity_hex, "identity_curve": "eddsa", "blockchain_id": "solana" });
    let address = handle_key_address(&state_a, serde_json::json!(2), Some(params)).await;
    assert!(address["error"].is_null(), "address must resolve: {address}");
    let solana_address = address["result"]["address"].as_str().expect("address").to_string();
    let pk_bytes = hex::decode(eddsa_key).expect("hex");
    assert_eq!(solana_address, bs58::encode(&pk_bytes).into_string());

    let payload_hex = hex::encode(blake3::hash(b"pay 7 lamports").as_bytes());
    let intent = signed_intent(&identity_key, "solana", &payload_hex);
    let params = serde_json::json!({ "intent": intent, "operation_index": 0 });
    let signed = handle_intent_sign(&state_a, serde_json::json!(3), Some(params)).await;
    assert!(signed["error"].is_null(), "intent.sign must succeed: {signed}");
    assert_eq!(signed["result"]["address"].as_str().expect("address"), solana_address);
    assert_eq!(signed["result"]["payload"].as_str().expect("payload"), payload_hex);
    assert!(!signed["result"]["signature"].as_str().expect("signature").is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn algorand_real_transactions_are_domain_tagged_before_signing() {
    use base64::Engine;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    use warden_core::domain::encoding::derive_address;
    use warden_core::domain::ChainFamily;

    let hub = Arc::new(MockHub::new());
    let peers = ["pkA", "pkB"];
    let state_a = build_state(&hub, "pkA", &peers);
    let _state_b = build_state(&hub, "pkB", &peers);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let identity_key = SigningKey::from_bytes(&[22u8; 32]);
    let identity_hex = hex::encode(identity_key.verifying_key().as_bytes());
    let params = serde_json::json!({ "identity": identity_hex, "identity_curve": "eddsa" });
    let keygen = handle_keygen_start(&state_a, serde_json::json!(1), Some(params)).await;
    assert!(keygen["error"].is_null(), "keygen must succeed: {keygen}");
    let group_key = hex::decode(keygen["result"]["eddsa_public_key"].as_str().expect("eddsa key")).expect("hex");

    let payload_hex = hex::encode(blake3::hash(b"algorand transfer").as_bytes());
    let intent = signed_intent(&identity_key, "algorand", &payload_hex);
    let params = serde_json::json!({ "intent": intent, "operation_index": 0, "is_real_transaction": true });
    let signed = handle_intent_sign(&state_a, serde_json::json!(2), Some(params)).await;
    assert!(signed["error"].is_null(), "intent.sign must succeed: {signed}");

    // Real transaction bytes are signed under the "TX" domain tag, and the
    // flag travels back with the signature.
    assert_eq!(signed["result"]["payload"].as_str().expect("payload"), format!("5458{payload_hex}"));
    assert_eq!(signed["result"]["is_real_transaction"], true);

    let address = signed["result"]["address"].as_str().expect("address");
    assert_eq!(address, derive_address(ChainFamily::Algorand, Curve::Eddsa, &group_key).expect("derive"));

    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(signed["result"]["signature"].as_str().expect("signature"))
        .expect("base64");
    let sig_array: [u8; 64] = sig_bytes.as_slice().try_into().expect("64-byte signature");
    let pk_array: [u8; 32] = group_key.as_slice().try_into().expect("32-byte key");
    let verifying_key = VerifyingKey::from_bytes(&pk_array).expect("group key");
    let mut message = b"TX".to_vec();
    message.extend_from_slice(blake3::hash(b"algorand transfer").as_bytes());
    verifying_key
        .verify(&message, &Signature::from_bytes(&sig_array))
        .expect("group signature must verify over the tagged bytes");
}

#[tokio::test]
async fn intent_sign_rejects_missing_and_malformed_params() {
    let hub = Arc::new(MockHub::new());
    let state = build_state(&hub, "pkA", &["pkA", "pkB"]);

    let missing = handle_intent_sign(&state, serde_json::json!(1), None).await;
    assert_eq!(missing["error"]["code"], -32602);

    let malformed = handle_intent_sign(&state, serde_json::json!(2), Some(serde_json::json!({ "intent": 5 }))).await;
    assert_eq!(malformed["error"]["code"], -32602);
}

#[tokio::test]
async fn cancel_of_unknown_request_reports_false() {
    let hub = Arc::new(MockHub::new());
    let state = build_state(&hub, "pkA", &["pkA", "pkB"]);

    let params = serde_json::json!({ "request_id": hex::encode([7u8; 32]) });
    let value = handle_intent_cancel(&state, serde_json::json!(1), Some(params)).await;
    assert_eq!(value["result"]["cancelled"], false);

    let params = serde_json::json!({ "request_id": "not-hex" });
    let value = handle_intent_cancel(&state, serde_json::json!(2), Some(params)).await;
    assert_eq!(value["error"]["code"], -32602);
}
