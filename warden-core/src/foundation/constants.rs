//! System-wide constants for warden threshold coordination.

/// Maximum number of peers in a signer set.
pub const MAX_SIGNERS: usize = 30;

/// Overall budget for a keygen or signing round (5 minutes).
pub const ROUND_TIMEOUT_SECS: u64 = 5 * 60;

/// How long inbound round messages are buffered while the local party
/// has not joined the round yet (60 seconds).
pub const ROUND_JOIN_WINDOW_SECS: u64 = 60;

/// Budget for the ECDSA triple/presignature precomputation phase (2 minutes).
pub const PRECOMPUTE_BUDGET_SECS: u64 = 2 * 60;

/// Default wait for a brokered signature request (5 minutes).
pub const SIGNATURE_WAIT_SECS: u64 = 5 * 60;

/// Maximum message size for gossip transport (10 MB).
pub const MAX_MESSAGE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Blake3 hash size in bytes.
pub const HASH_SIZE: usize = 32;

/// Ed25519 signature size in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Ed25519 public key size in bytes.
pub const ED25519_PUBKEY_SIZE: usize = 32;

/// ECDSA signature size in compact format (64 bytes, r || s).
pub const ECDSA_SIGNATURE_SIZE: usize = 64;

/// ECDSA recovery ID size (1 byte).
pub const ECDSA_RECOVERY_ID_SIZE: usize = 1;

/// Compressed secp256k1 public key size in bytes.
pub const SECP256K1_COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Maximum number of bootstrap peers for gossip.
pub const MAX_BOOTSTRAP_PEERS: usize = 10;

/// Gossip publish retry attempts.
pub const GOSSIP_PUBLISH_RETRIES: usize = 3;

/// Delay between gossip publish retries in milliseconds.
pub const GOSSIP_RETRY_DELAY_MS: u64 = 200;
