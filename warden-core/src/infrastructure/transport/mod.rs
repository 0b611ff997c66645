pub mod encoding;
pub mod iroh;
pub mod messages;
pub mod mock;
pub mod traits;

pub use iroh::IrohTransport;
pub use messages::{MessageEnvelope, MessageKind, ProtocolMessage};
pub use mock::{MockHub, MockTransport};
pub use traits::{GossipTransport, TransportSubscription};
