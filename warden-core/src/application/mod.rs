pub mod broker;
pub mod coordinator;
pub mod registry;

pub use broker::SignatureRequestBroker;
pub use coordinator::{PartyCoordinator, RoundEvent};
pub use registry::{PartyRegistry, RoundHandle};
