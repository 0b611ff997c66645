//! Single-flight bookkeeping for in-flight MPC rounds.
//!
//! At most one round per round key may be live on a node. Round messages that
//! arrive before the local round has started (gossip delivers starts and
//! first-round traffic in any order) are buffered per key and drained into
//! the round's channel the moment its handle is registered.

use crate::domain::RoundKey;
use crate::foundation::{CustodyError, Result};
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Inbound half of a live round: party index and raw round payload.
pub type RoundHandle = mpsc::UnboundedSender<(u32, Vec<u8>)>;

struct BufferedInbox {
    deadline: Instant,
    messages: Vec<(u32, Vec<u8>)>,
}

pub struct PartyRegistry {
    rounds: Mutex<HashMap<RoundKey, RoundHandle>>,
    inbox: Mutex<HashMap<RoundKey, BufferedInbox>>,
    join_window: Duration,
}

impl PartyRegistry {
    pub fn new(join_window: Duration) -> Self {
        Self { rounds: Mutex::new(HashMap::new()), inbox: Mutex::new(HashMap::new()), join_window }
    }

    /// Registers the handle for a new round. Fails when a round for the same
    /// key is already live, and drains any messages buffered for the key.
    pub fn insert(&self, key: &RoundKey, handle: RoundHandle) -> Result<()> {
        {
            let mut rounds = self.rounds.lock().map_err(|e| crate::storage_err!("registry_insert", e))?;
            if rounds.contains_key(key) {
                return Err(CustodyError::RoundInProgress { round_key: key.to_string() });
            }
            rounds.insert(key.clone(), handle.clone());
        }

        let buffered = {
            let mut inbox = self.inbox.lock().map_err(|e| crate::storage_err!("registry_insert", e))?;
            inbox.remove(key)
        };
        if let Some(buffered) = buffered {
            if buffered.deadline >= Instant::now() {
                debug!("draining buffered round messages key={} count={}", key, buffered.messages.len());
                for (from, data) in buffered.messages {
                    let _ = handle.send((from, data));
                }
            }
        }
        Ok(())
    }

    pub fn remove(&self, key: &RoundKey) {
        if let Ok(mut rounds) = self.rounds.lock() {
            rounds.remove(key);
        }
    }

    pub fn is_active(&self, key: &RoundKey) -> bool {
        self.rounds.lock().map(|rounds| rounds.contains_key(key)).unwrap_or(false)
    }

    /// Routes one inbound round message: straight into the live round's
    /// channel, or into the per-key buffer while the local round has not
    /// started yet. Buffered messages expire after the join window.
    pub fn deliver(&self, key: &RoundKey, from: u32, data: Vec<u8>) -> Result<()> {
        {
            let rounds = self.rounds.lock().map_err(|e| crate::storage_err!("registry_deliver", e))?;
            if let Some(handle) = rounds.get(key) {
                // A closed receiver means the round just finished; drop.
                let _ = handle.send((from, data));
                return Ok(());
            }
        }

        let now = Instant::now();
        let mut inbox = self.inbox.lock().map_err(|e| crate::storage_err!("registry_deliver", e))?;
        inbox.retain(|_, entry| entry.deadline >= now);
        let entry = inbox
            .entry(key.clone())
            .or_insert_with(|| BufferedInbox { deadline: now + self.join_window, messages: Vec::new() });
        trace!("buffering round message key={} from={}", key, from);
        entry.messages.push((from, data));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Curve;

    fn key(identity: &str) -> RoundKey {
        RoundKey::new(identity, Curve::Ecdsa, Curve::Ecdsa)
    }

    #[test]
    fn insert_is_single_flight() {
        let registry = PartyRegistry::new(Duration::from_secs(60));
        let (tx1, _rx1) = mpsc::unbounded_channel();
        registry.insert(&key("alice"), tx1).expect("first insert");

        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(matches!(registry.insert(&key("alice"), tx2), Err(CustodyError::RoundInProgress { .. })));

        registry.remove(&key("alice"));
        let (tx3, _rx3) = mpsc::unbounded_channel();
        registry.insert(&key("alice"), tx3).expect("insert after remove");
    }

    #[tokio::test]
    async fn buffered_messages_drain_on_insert() {
        let registry = PartyRegistry::new(Duration::from_secs(60));
        registry.deliver(&key("alice"), 2, vec![1]).expect("buffer");
        registry.deliver(&key("alice"), 3, vec![2]).expect("buffer");

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.insert(&key("alice"), tx).expect("insert");

        assert_eq!(rx.recv().await, Some((2, vec![1])));
        assert_eq!(rx.recv().await, Some((3, vec![2])));
    }

    #[tokio::test]
    async fn expired_buffer_is_dropped() {
        let registry = PartyRegistry::new(Duration::from_millis(0));
        registry.deliver(&key("alice"), 2, vec![1]).expect("buffer");
        // Zero join window: the entry is already past its deadline.
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.deliver(&key("bob"), 2, vec![9]).expect("prune pass");

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.insert(&key("alice"), tx).expect("insert");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn live_round_receives_directly() {
        let registry = PartyRegistry::new(Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.insert(&key("alice"), tx).expect("insert");
        registry.deliver(&key("alice"), 4, vec![7]).expect("deliver");
        assert_eq!(rx.recv().await, Some((4, vec![7])));
        assert!(registry.is_active(&key("alice")));
    }
}
