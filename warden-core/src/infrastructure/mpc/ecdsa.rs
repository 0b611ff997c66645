//! ECDSA rounds over secp256k1 via cait-sith. Signing chains four protocol
//! phases behind one session: two Beaver-triple generations, a presignature,
//! and the final signature. Wire payloads carry a phase byte so peers at
//! different phases stay routable; messages for a future phase are buffered
//! until the local session reaches it.

use super::traits::{RoundAction, RoundOutcome, RoundSession};
use crate::foundation::{CustodyError, Result};
use cait_sith::protocol::{Action, Participant, Protocol};
use cait_sith::triples::{self, TripleGenerationOutput};
use cait_sith::{keygen, presign, sign, FullSignature, KeygenOutput, PresignArguments, PresignOutput};
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, Scalar, Secp256k1};
use std::collections::BTreeMap;

const PHASE_TRIPLE0: u8 = 1;
const PHASE_TRIPLE1: u8 = 2;
const PHASE_PRESIGN: u8 = 3;
const PHASE_SIGN: u8 = 4;

fn participants(n: usize) -> Vec<Participant> {
    (1..=n as u32).map(Participant::from).collect()
}

pub fn compressed_pubkey(point: &AffinePoint) -> Vec<u8> {
    point.to_encoded_point(true).as_bytes().to_vec()
}

const SHARE_SCALAR_LEN: usize = 32;

/// Key shares persist as `scalar ‖ SEC1-compressed group key`; the backend's
/// output type carries no serde support of its own.
fn encode_keygen_output(out: &KeygenOutput<Secp256k1>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(SHARE_SCALAR_LEN + 33);
    bytes.extend_from_slice(&out.private_share.to_bytes());
    bytes.extend_from_slice(&compressed_pubkey(&out.public_key));
    bytes
}

fn decode_keygen_output(share: &[u8]) -> Result<KeygenOutput<Secp256k1>> {
    if share.len() <= SHARE_SCALAR_LEN {
        return Err(share_err("key share is truncated"));
    }
    let (scalar_bytes, point_bytes) = share.split_at(SHARE_SCALAR_LEN);
    let private_share = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(scalar_bytes)))
        .ok_or_else(|| share_err("share scalar is out of field range"))?;
    let point = EncodedPoint::from_bytes(point_bytes).map_err(|err| share_err(&err.to_string()))?;
    let public_key = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&point))
        .ok_or_else(|| share_err("group key is not a curve point"))?;
    Ok(KeygenOutput { private_share, public_key })
}

fn share_err(details: &str) -> CustodyError {
    CustodyError::CryptoError { operation: "ecdsa key share decode".to_string(), details: details.to_string() }
}

pub struct EcdsaKeygenSession {
    protocol: Box<dyn Protocol<Output = KeygenOutput<Secp256k1>> + Send>,
}

impl EcdsaKeygenSession {
    /// `me` is the local party's 1-based index; `threshold` the number of
    /// shares a signing round must combine.
    pub fn new(n: usize, me: u32, threshold: usize) -> Result<Self> {
        let parties = participants(n);
        let protocol = keygen::<Secp256k1>(&parties, Participant::from(me), threshold)?;
        Ok(Self { protocol: Box::new(protocol) })
    }
}

impl RoundSession for EcdsaKeygenSession {
    fn message(&mut self, from: u32, data: Vec<u8>) -> Result<()> {
        self.protocol.message(Participant::from(from), data);
        Ok(())
    }

    fn poke(&mut self) -> Result<RoundAction> {
        match self.protocol.poke()? {
            Action::Wait => Ok(RoundAction::Wait),
            Action::SendMany(data) => Ok(RoundAction::SendMany(data)),
            Action::SendPrivate(to, data) => Ok(RoundAction::SendPrivate(u32::from(to), data)),
            Action::Return(out) => {
                let public_key = compressed_pubkey(&out.public_key);
                let share = encode_keygen_output(&out);
                Ok(RoundAction::Complete(RoundOutcome::KeyShare { share, public_key }))
            }
        }
    }
}

enum ActivePhase {
    Triple(Box<dyn Protocol<Output = TripleGenerationOutput<Secp256k1>> + Send>),
    Presign(Box<dyn Protocol<Output = PresignOutput<Secp256k1>> + Send>),
    Sign(Box<dyn Protocol<Output = FullSignature<Secp256k1>> + Send>),
}

pub struct EcdsaSignSession {
    parties: Vec<Participant>,
    me: Participant,
    threshold: usize,
    keygen_out: Option<KeygenOutput<Secp256k1>>,
    public_key: k256::AffinePoint,
    msg_hash: k256::Scalar,
    phase: u8,
    active: ActivePhase,
    triple0: Option<TripleGenerationOutput<Secp256k1>>,
    /// Messages for phases the local session has not reached yet.
    pending: BTreeMap<u8, Vec<(u32, Vec<u8>)>>,
}

impl EcdsaSignSession {
    pub fn new(n: usize, me: u32, threshold: usize, share: &[u8], msg_hash: Scalar) -> Result<Self> {
        let keygen_out = decode_keygen_output(share)?;
        let parties = participants(n);
        let me = Participant::from(me);
        let protocol = triples::generate_triple::<Secp256k1>(&parties, me, threshold)?;
        Ok(Self {
            parties,
            me,
            threshold,
            public_key: keygen_out.public_key,
            keygen_out: Some(keygen_out),
            msg_hash,
            phase: PHASE_TRIPLE0,
            active: ActivePhase::Triple(Box::new(protocol)),
            triple0: None,
            pending: BTreeMap::new(),
        })
    }

    /// r || s, with s already normalized to the lower range by the backend.
    fn encode_signature(signature: &FullSignature<Secp256k1>) -> Result<Vec<u8>> {
        let point = signature.big_r.to_encoded_point(true);
        let r = point
            .x()
            .ok_or_else(|| CustodyError::SigningFailed("signature nonce point at infinity".to_string()))?;
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(r);
        out.extend_from_slice(&signature.s.to_bytes());
        Ok(out)
    }

    fn enter_phase(&mut self, phase: u8, active: ActivePhase) -> Result<()> {
        self.phase = phase;
        self.active = active;
        if let Some(buffered) = self.pending.remove(&phase) {
            for (from, data) in buffered {
                self.feed(from, data);
            }
        }
        Ok(())
    }

    fn feed(&mut self, from: u32, data: Vec<u8>) {
        let from = Participant::from(from);
        match &mut self.active {
            ActivePhase::Triple(p) => p.message(from, data),
            ActivePhase::Presign(p) => p.message(from, data),
            ActivePhase::Sign(p) => p.message(from, data),
        }
    }
}

enum Step {
    Wait,
    SendMany(Vec<u8>),
    SendPrivate(u32, Vec<u8>),
    TripleDone(TripleGenerationOutput<Secp256k1>),
    PresignDone(PresignOutput<Secp256k1>),
    SignDone(FullSignature<Secp256k1>),
}

impl RoundSession for EcdsaSignSession {
    fn message(&mut self, from: u32, data: Vec<u8>) -> Result<()> {
        let Some((&tag, rest)) = data.split_first() else {
            return Err(CustodyError::ProtocolViolation { from, details: "empty sign-round payload".to_string() });
        };
        if tag < PHASE_TRIPLE0 || tag > PHASE_SIGN {
            return Err(CustodyError::ProtocolViolation { from, details: format!("unknown sign phase {}", tag) });
        }
        if tag == self.phase {
            self.feed(from, rest.to_vec());
        } else if tag > self.phase {
            self.pending.entry(tag).or_default().push((from, rest.to_vec()));
        }
        // Messages for completed phases need nothing further.
        Ok(())
    }

    fn poke(&mut self) -> Result<RoundAction> {
        loop {
            let step = match &mut self.active {
                ActivePhase::Triple(p) => match p.poke()? {
                    Action::Wait => Step::Wait,
                    Action::SendMany(data) => Step::SendMany(data),
                    Action::SendPrivate(to, data) => Step::SendPrivate(u32::from(to), data),
                    Action::Return(out) => Step::TripleDone(out),
                },
                ActivePhase::Presign(p) => match p.poke()? {
                    Action::Wait => Step::Wait,
                    Action::SendMany(data) => Step::SendMany(data),
                    Action::SendPrivate(to, data) => Step::SendPrivate(u32::from(to), data),
                    Action::Return(out) => Step::PresignDone(out),
                },
                ActivePhase::Sign(p) => match p.poke()? {
                    Action::Wait => Step::Wait,
                    Action::SendMany(data) => Step::SendMany(data),
                    Action::SendPrivate(to, data) => Step::SendPrivate(u32::from(to), data),
                    Action::Return(out) => Step::SignDone(out),
                },
            };

            match step {
                Step::Wait => return Ok(RoundAction::Wait),
                Step::SendMany(data) => {
                    let mut tagged = Vec::with_capacity(data.len() + 1);
                    tagged.push(self.phase);
                    tagged.extend_from_slice(&data);
                    return Ok(RoundAction::SendMany(tagged));
                }
                Step::SendPrivate(to, data) => {
                    let mut tagged = Vec::with_capacity(data.len() + 1);
                    tagged.push(self.phase);
                    tagged.extend_from_slice(&data);
                    return Ok(RoundAction::SendPrivate(to, tagged));
                }
                Step::TripleDone(out) => {
                    if self.phase == PHASE_TRIPLE0 {
                        self.triple0 = Some(out);
                        let protocol = triples::generate_triple::<Secp256k1>(&self.parties, self.me, self.threshold)?;
                        self.enter_phase(PHASE_TRIPLE1, ActivePhase::Triple(Box::new(protocol)))?;
                    } else {
                        let triple0 = self
                            .triple0
                            .take()
                            .ok_or_else(|| CustodyError::SigningFailed("first triple missing".to_string()))?;
                        let keygen_out = self
                            .keygen_out
                            .take()
                            .ok_or_else(|| CustodyError::SigningFailed("key share already consumed".to_string()))?;
                        let args = PresignArguments { triple0, triple1: out, keygen_out, threshold: self.threshold };
                        let protocol = presign::<Secp256k1>(&self.parties, self.me, args)?;
                        self.enter_phase(PHASE_PRESIGN, ActivePhase::Presign(Box::new(protocol)))?;
                    }
                }
                Step::PresignDone(out) => {
                    let protocol = sign::<Secp256k1>(&self.parties, self.me, self.public_key, out, self.msg_hash)?;
                    self.enter_phase(PHASE_SIGN, ActivePhase::Sign(Box::new(protocol)))?;
                }
                Step::SignDone(signature) => {
                    let encoded = Self::encode_signature(&signature)?;
                    let public_key = compressed_pubkey(&self.public_key);
                    return Ok(RoundAction::Complete(RoundOutcome::Signature { signature: encoded, public_key }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ProjectivePoint;

    #[test]
    fn key_share_codec_round_trips() {
        let private_share = Scalar::from(424_242u64);
        let public_key = (ProjectivePoint::GENERATOR * Scalar::from(7u64)).to_affine();
        let out = KeygenOutput { private_share, public_key };

        let bytes = encode_keygen_output(&out);
        assert_eq!(bytes.len(), 65);
        let decoded = decode_keygen_output(&bytes).expect("decode");
        assert_eq!(decoded.private_share, out.private_share);
        assert_eq!(decoded.public_key, out.public_key);
    }

    #[test]
    fn key_share_decode_rejects_corrupt_input() {
        let out = KeygenOutput {
            private_share: Scalar::from(9u64),
            public_key: (ProjectivePoint::GENERATOR * Scalar::from(9u64)).to_affine(),
        };
        let bytes = encode_keygen_output(&out);

        assert!(decode_keygen_output(&bytes[..SHARE_SCALAR_LEN]).is_err());
        let mut bad_point = bytes.clone();
        bad_point[SHARE_SCALAR_LEN] = 0x09;
        assert!(decode_keygen_output(&bad_point).is_err());
    }
}
