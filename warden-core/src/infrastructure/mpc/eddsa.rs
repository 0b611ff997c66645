//! EdDSA rounds via FROST ed25519: a two-round DKG for keygen and the
//! commit/sign/aggregate flow for signing, adapted to the message-driven
//! session shape. Payloads carry a one-byte round tag so the two DKG rounds
//! (and the two signing rounds) stay distinguishable on the wire.

use super::traits::{RoundAction, RoundOutcome, RoundSession};
use crate::foundation::{CustodyError, Result};
use frost_ed25519 as frost;
use frost_ed25519::keys::dkg;
use frost_ed25519::Identifier;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

const TAG_ROUND1: u8 = 1;
const TAG_ROUND2: u8 = 2;

/// Stored share material: the local key package plus the group public key
/// package needed to aggregate signatures.
#[derive(Deserialize, Serialize)]
pub struct EddsaShareBundle {
    #[serde(with = "hex_vec")]
    pub key_package: Vec<u8>,
    #[serde(with = "hex_vec")]
    pub public_key_package: Vec<u8>,
}

mod hex_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

fn identifier(index: u32) -> Result<Identifier> {
    u16::try_from(index)
        .ok()
        .and_then(|i| Identifier::try_from(i).ok())
        .ok_or_else(|| CustodyError::InvalidOperation(format!("invalid party index {}", index)))
}

fn identifiers(n: u16) -> Result<Vec<Identifier>> {
    (1..=n as u32).map(identifier).collect()
}

/// FROST requires at least two signers; the derived threshold can be 1 for
/// two-party sets, so clamp into the backend's accepted range.
fn min_signers(n: u16, threshold: usize) -> u16 {
    (threshold as u16).clamp(2, n)
}

fn split_tagged(from: u32, data: &[u8]) -> Result<(u8, &[u8])> {
    data.split_first()
        .map(|(tag, rest)| (*tag, rest))
        .ok_or_else(|| CustodyError::ProtocolViolation { from, details: "empty round payload".to_string() })
}

pub struct EddsaKeygenSession {
    n: u16,
    me: Identifier,
    ids: Vec<Identifier>,
    r1_secret: Option<dkg::round1::SecretPackage>,
    r2_secret: Option<dkg::round2::SecretPackage>,
    r1_packages: BTreeMap<Identifier, dkg::round1::Package>,
    r2_packages: BTreeMap<Identifier, dkg::round2::Package>,
    outbox: VecDeque<RoundAction>,
    done: Option<RoundOutcome>,
}

impl EddsaKeygenSession {
    pub fn new(n: usize, me: u32, threshold: usize) -> Result<Self> {
        let n = u16::try_from(n)
            .map_err(|_| CustodyError::InvalidOperation(format!("signer set too large: {}", n)))?;
        if n < 2 {
            return Err(CustodyError::ConfigError("eddsa keygen requires at least 2 signers".to_string()));
        }
        let ids = identifiers(n)?;
        let me_id = identifier(me)?;
        let (r1_secret, r1_package) = dkg::part1(me_id, n, min_signers(n, threshold), OsRng)?;
        let mut outbox = VecDeque::new();
        let mut payload = vec![TAG_ROUND1];
        payload.extend_from_slice(&r1_package.serialize()?);
        outbox.push_back(RoundAction::SendMany(payload));
        Ok(Self {
            n,
            me: me_id,
            ids,
            r1_secret: Some(r1_secret),
            r2_secret: None,
            r1_packages: BTreeMap::new(),
            r2_packages: BTreeMap::new(),
            outbox,
            done: None,
        })
    }

    fn index_of(&self, id: &Identifier) -> Result<u32> {
        self.ids
            .iter()
            .position(|known| known == id)
            .map(|p| p as u32 + 1)
            .ok_or_else(|| CustodyError::SigningFailed("unknown dkg recipient identifier".to_string()))
    }

    fn try_advance(&mut self) -> Result<()> {
        if self.r1_packages.len() + 1 == self.n as usize {
            if let Some(secret) = self.r1_secret.take() {
                let (r2_secret, outgoing) = dkg::part2(secret, &self.r1_packages)?;
                self.r2_secret = Some(r2_secret);
                for (id, package) in outgoing {
                    let to = self.index_of(&id)?;
                    let mut payload = vec![TAG_ROUND2];
                    payload.extend_from_slice(&package.serialize()?);
                    self.outbox.push_back(RoundAction::SendPrivate(to, payload));
                }
            }
        }
        if self.done.is_none() && self.r2_packages.len() + 1 == self.n as usize {
            if let Some(secret) = self.r2_secret.as_ref() {
                let (key_package, pubkey_package) = dkg::part3(secret, &self.r1_packages, &self.r2_packages)?;
                let bundle = EddsaShareBundle {
                    key_package: key_package.serialize()?,
                    public_key_package: pubkey_package.serialize()?,
                };
                let public_key = pubkey_package.verifying_key().serialize()?;
                self.done = Some(RoundOutcome::KeyShare { share: serde_json::to_vec(&bundle)?, public_key });
            }
        }
        Ok(())
    }
}

impl RoundSession for EddsaKeygenSession {
    fn message(&mut self, from: u32, data: Vec<u8>) -> Result<()> {
        let (tag, rest) = split_tagged(from, &data)?;
        let from_id = identifier(from)?;
        if from_id == self.me {
            return Ok(());
        }
        match tag {
            TAG_ROUND1 => {
                let package = dkg::round1::Package::deserialize(rest)?;
                self.r1_packages.entry(from_id).or_insert(package);
            }
            TAG_ROUND2 => {
                let package = dkg::round2::Package::deserialize(rest)?;
                self.r2_packages.entry(from_id).or_insert(package);
            }
            other => {
                return Err(CustodyError::ProtocolViolation { from, details: format!("unknown dkg round tag {}", other) });
            }
        }
        self.try_advance()
    }

    fn poke(&mut self) -> Result<RoundAction> {
        if let Some(action) = self.outbox.pop_front() {
            return Ok(action);
        }
        if let Some(outcome) = self.done.take() {
            return Ok(RoundAction::Complete(outcome));
        }
        Ok(RoundAction::Wait)
    }
}

pub struct EddsaSignSession {
    n: u16,
    me: Identifier,
    key_package: frost::keys::KeyPackage,
    pubkey_package: frost::keys::PublicKeyPackage,
    message: Vec<u8>,
    nonces: Option<frost::round1::SigningNonces>,
    commitments: BTreeMap<Identifier, frost::round1::SigningCommitments>,
    shares: BTreeMap<Identifier, frost::round2::SignatureShare>,
    signing_package: Option<frost::SigningPackage>,
    outbox: VecDeque<RoundAction>,
    done: Option<RoundOutcome>,
}

impl EddsaSignSession {
    pub fn new(n: usize, me: u32, share: &[u8], message: Vec<u8>) -> Result<Self> {
        let n = u16::try_from(n)
            .map_err(|_| CustodyError::InvalidOperation(format!("signer set too large: {}", n)))?;
        if n < 2 {
            return Err(CustodyError::ConfigError("eddsa signing requires at least 2 signers".to_string()));
        }
        let bundle: EddsaShareBundle = serde_json::from_slice(share)?;
        let key_package = frost::keys::KeyPackage::deserialize(&bundle.key_package)?;
        let pubkey_package = frost::keys::PublicKeyPackage::deserialize(&bundle.public_key_package)?;
        let me_id = identifier(me)?;

        let (nonces, commitments) = frost::round1::commit(key_package.signing_share(), &mut OsRng);
        let mut payload = vec![TAG_ROUND1];
        payload.extend_from_slice(&commitments.serialize()?);
        let mut outbox = VecDeque::new();
        outbox.push_back(RoundAction::SendMany(payload));

        let mut commitment_map = BTreeMap::new();
        commitment_map.insert(me_id, commitments);

        Ok(Self {
            n,
            me: me_id,
            key_package,
            pubkey_package,
            message,
            nonces: Some(nonces),
            commitments: commitment_map,
            shares: BTreeMap::new(),
            signing_package: None,
            outbox,
            done: None,
        })
    }

    fn try_advance(&mut self) -> Result<()> {
        if self.signing_package.is_none() && self.commitments.len() == self.n as usize {
            let signing_package = frost::SigningPackage::new(self.commitments.clone(), &self.message);
            if let Some(nonces) = self.nonces.take() {
                let share = frost::round2::sign(&signing_package, &nonces, &self.key_package)?;
                self.shares.insert(self.me, share);
                let mut payload = vec![TAG_ROUND2];
                payload.extend_from_slice(&share.serialize());
                self.outbox.push_back(RoundAction::SendMany(payload));
            }
            self.signing_package = Some(signing_package);
        }
        if self.done.is_none() && self.shares.len() == self.n as usize {
            if let Some(signing_package) = self.signing_package.as_ref() {
                let signature = frost::aggregate(signing_package, &self.shares, &self.pubkey_package)?;
                self.done = Some(RoundOutcome::Signature {
                    signature: signature.serialize()?,
                    public_key: self.pubkey_package.verifying_key().serialize()?,
                });
            }
        }
        Ok(())
    }
}

impl RoundSession for EddsaSignSession {
    fn message(&mut self, from: u32, data: Vec<u8>) -> Result<()> {
        let (tag, rest) = split_tagged(from, &data)?;
        let from_id = identifier(from)?;
        if from_id == self.me {
            return Ok(());
        }
        match tag {
            TAG_ROUND1 => {
                let commitments = frost::round1::SigningCommitments::deserialize(rest)?;
                self.commitments.entry(from_id).or_insert(commitments);
            }
            TAG_ROUND2 => {
                let share = frost::round2::SignatureShare::deserialize(rest)?;
                self.shares.entry(from_id).or_insert(share);
            }
            other => {
                return Err(CustodyError::ProtocolViolation { from, details: format!("unknown sign round tag {}", other) });
            }
        }
        self.try_advance()
    }

    fn poke(&mut self) -> Result<RoundAction> {
        if let Some(action) = self.outbox.pop_front() {
            return Ok(action);
        }
        if let Some(outcome) = self.done.take() {
            return Ok(RoundAction::Complete(outcome));
        }
        Ok(RoundAction::Wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(sessions: &mut [Box<dyn RoundSession>]) -> Vec<RoundOutcome> {
        let n = sessions.len();
        let mut outcomes: Vec<Option<RoundOutcome>> = (0..n).map(|_| None).collect();
        // Drive sessions round-robin, routing outbound actions in-memory,
        // until every session completes.
        for _ in 0..10_000 {
            if outcomes.iter().all(|o| o.is_some()) {
                break;
            }
            for i in 0..n {
                if outcomes[i].is_some() {
                    continue;
                }
                loop {
                    match sessions[i].poke().expect("poke") {
                        RoundAction::Wait => break,
                        RoundAction::SendMany(data) => {
                            for j in 0..n {
                                if j != i && outcomes[j].is_none() {
                                    sessions[j].message(i as u32 + 1, data.clone()).expect("message");
                                }
                            }
                        }
                        RoundAction::SendPrivate(to, data) => {
                            let j = to as usize - 1;
                            if outcomes[j].is_none() {
                                sessions[j].message(i as u32 + 1, data).expect("message");
                            }
                        }
                        RoundAction::Complete(outcome) => {
                            outcomes[i] = Some(outcome);
                            break;
                        }
                    }
                }
            }
        }
        outcomes.into_iter().map(|o| o.expect("completed")).collect()
    }

    #[test]
    fn three_party_dkg_then_sign_verifies() {
        let mut keygens: Vec<Box<dyn RoundSession>> = (1..=3)
            .map(|i| Box::new(EddsaKeygenSession::new(3, i, 2).expect("keygen session")) as Box<dyn RoundSession>)
            .collect();
        let outcomes = route(&mut keygens);

        let mut shares = Vec::new();
        let mut group_key = None;
        for outcome in outcomes {
            match outcome {
                RoundOutcome::KeyShare { share, public_key } => {
                    if let Some(existing) = &group_key {
                        assert_eq!(existing, &public_key, "all parties derive the same group key");
                    } else {
                        group_key = Some(public_key);
                    }
                    shares.push(share);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        let group_key = group_key.expect("group key");
        assert_eq!(group_key.len(), 32);

        let message = b"deadbeef-payload".to_vec();
        let mut signers: Vec<Box<dyn RoundSession>> = shares
            .iter()
            .enumerate()
            .map(|(i, share)| {
                Box::new(EddsaSignSession::new(3, i as u32 + 1, share, message.clone()).expect("sign session"))
                    as Box<dyn RoundSession>
            })
            .collect();
        let outcomes = route(&mut signers);

        for outcome in outcomes {
            match outcome {
                RoundOutcome::Signature { signature, public_key } => {
                    assert_eq!(public_key, group_key);
                    let key = frost::VerifyingKey::deserialize(&group_key).expect("group key");
                    let sig = frost::Signature::deserialize(&signature).expect("signature");
                    key.verify(&message, &sig).expect("verify");
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }
}
