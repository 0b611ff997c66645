use crate::foundation::{CustodyError, Result, MAX_SIGNERS};

/// Ordered signer set for one round. Party indices are 1-based positions in
/// the lexicographically sorted list of peer public keys, so every peer
/// derives the same ordering from the same membership.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignerSet {
    members: Vec<String>,
}

impl SignerSet {
    pub fn new(mut members: Vec<String>) -> Result<Self> {
        if members.is_empty() {
            return Err(CustodyError::SignerSetEmpty);
        }
        if members.len() > MAX_SIGNERS {
            return Err(CustodyError::TooManySigners { count: members.len(), max: MAX_SIGNERS });
        }
        members.sort();
        members.dedup();
        Ok(Self { members })
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.members.iter().any(|m| m == peer)
    }

    /// 1-based party index for a peer, `None` when the peer is not a member.
    pub fn index_of(&self, peer: &str) -> Option<u32> {
        self.members.iter().position(|m| m == peer).map(|p| p as u32 + 1)
    }

    /// Number of signature shares the round must combine.
    pub fn threshold(&self) -> usize {
        threshold(self.members.len())
    }
}

/// `t(n) = 1` for n <= 2, else `floor(n/2) + 1`.
pub fn threshold(n: usize) -> usize {
    if n <= 2 {
        1
    } else {
        n / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic_and_one_based() {
        let set = SignerSet::new(vec!["pkC".into(), "pkA".into(), "pkB".into()]).expect("signer set");
        assert_eq!(set.members(), &["pkA", "pkB", "pkC"]);
        assert_eq!(set.index_of("pkA"), Some(1));
        assert_eq!(set.index_of("pkC"), Some(3));
        assert_eq!(set.index_of("pkZ"), None);
    }

    #[test]
    fn threshold_is_one_for_pairs_and_majority_above() {
        assert_eq!(threshold(1), 1);
        assert_eq!(threshold(2), 1);
        assert_eq!(threshold(3), 2);
        assert_eq!(threshold(4), 3);
        for n in 3..=MAX_SIGNERS {
            let t = threshold(n);
            assert!(2 * t > n, "threshold must be a majority for n={n}");
            assert!(t <= n);
        }
    }

    #[test]
    fn empty_and_oversized_sets_rejected() {
        assert!(matches!(SignerSet::new(vec![]), Err(CustodyError::SignerSetEmpty)));
        let too_many: Vec<String> = (0..MAX_SIGNERS + 1).map(|i| format!("pk{i:03}")).collect();
        assert!(matches!(SignerSet::new(too_many), Err(CustodyError::TooManySigners { .. })));
    }
}
