pub mod chain;
pub mod curve;
pub mod encoding;
pub mod engine;
pub mod intent;
pub mod model;
pub mod signer_set;

pub use chain::{Blockchain, BridgeRegistry, ChainFamily, ChainRegistry, Solver, Transfer};
pub use curve::Curve;
pub use engine::{payload_for_operation, EngineDeps};
pub use intent::{Intent, Operation, OperationKind, OperationMetadata, OperationStatus};
pub use model::{KeyShareRecord, RoundKey, SignedPayload};
pub use signer_set::SignerSet;
