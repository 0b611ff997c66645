use crate::foundation::Result;

/// What a round session wants the coordinator to do next.
#[derive(Debug)]
pub enum RoundAction {
    /// Nothing to do until more peer messages arrive.
    Wait,
    /// Broadcast these bytes to every other party.
    SendMany(Vec<u8>),
    /// Send these bytes to one party (1-based index).
    SendPrivate(u32, Vec<u8>),
    /// The round finished locally.
    Complete(RoundOutcome),
}

#[derive(Debug)]
pub enum RoundOutcome {
    KeyShare { share: Vec<u8>, public_key: Vec<u8> },
    Signature { signature: Vec<u8>, public_key: Vec<u8> },
}

/// Message-driven MPC round state machine, one per in-flight round.
///
/// The coordinator feeds inbound peer messages through `message` and drains
/// outbound work with `poke` until it yields `Complete`. Sessions are driven
/// from a single task; they do not need internal synchronization.
pub trait RoundSession: Send {
    /// Feed one inbound message from the party at `from` (1-based).
    fn message(&mut self, from: u32, data: Vec<u8>) -> Result<()>;

    /// Advance the state machine and return the next action.
    fn poke(&mut self) -> Result<RoundAction>;
}
