use super::traits::KeyShareStore;
use crate::domain::{KeyShareRecord, RoundKey};
use crate::foundation::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory store for tests and single-process deployments. The production
/// deployment puts Postgres behind the same trait.
#[derive(Default)]
pub struct MemoryKeyShareStore {
    shares: RwLock<HashMap<RoundKey, KeyShareRecord>>,
    signers: RwLock<HashMap<RoundKey, Vec<String>>>,
}

impl MemoryKeyShareStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyShareStore for MemoryKeyShareStore {
    fn put_share(&self, record: KeyShareRecord) -> Result<bool> {
        let mut guard = self.shares.write().map_err(|e| crate::storage_err!("put_share", e))?;
        let key = record.round_key();
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, record);
        Ok(true)
    }

    fn get_share(&self, key: &RoundKey) -> Result<Option<KeyShareRecord>> {
        let guard = self.shares.read().map_err(|e| crate::storage_err!("get_share", e))?;
        Ok(guard.get(key).cloned())
    }

    fn put_signers(&self, key: &RoundKey, signers: &[String]) -> Result<()> {
        let mut guard = self.signers.write().map_err(|e| crate::storage_err!("put_signers", e))?;
        guard.insert(key.clone(), signers.to_vec());
        Ok(())
    }

    fn get_signers(&self, key: &RoundKey) -> Result<Option<Vec<String>>> {
        let guard = self.signers.read().map_err(|e| crate::storage_err!("get_signers", e))?;
        Ok(guard.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Curve;

    fn record() -> KeyShareRecord {
        KeyShareRecord {
            identity: "alice".into(),
            identity_curve: Curve::Ecdsa,
            key_curve: Curve::Eddsa,
            share: vec![1, 2, 3],
            public_key: vec![4, 5, 6],
            signer_set: vec!["pkA".to_string(), "pkB".to_string()],
        }
    }

    #[test]
    fn put_share_is_insert_if_absent() {
        let store = MemoryKeyShareStore::new();
        let first = record();
        assert!(store.put_share(first.clone()).expect("put"));

        let mut second = record();
        second.share = vec![9, 9, 9];
        assert!(!store.put_share(second).expect("put"));

        let stored = store.get_share(&first.round_key()).expect("get").expect("present");
        assert_eq!(stored.share, vec![1, 2, 3]);
    }

    #[test]
    fn signers_round_trip() {
        let store = MemoryKeyShareStore::new();
        let key = record().round_key();
        assert_eq!(store.get_signers(&key).expect("get"), None);
        store.put_signers(&key, &["pkB".to_string(), "pkA".to_string()]).expect("put");
        assert_eq!(store.get_signers(&key).expect("get"), Some(vec!["pkB".to_string(), "pkA".to_string()]));
    }
}
