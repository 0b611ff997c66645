use crate::domain::{KeyShareRecord, RoundKey};
use crate::foundation::Result;

/// Durable key-share storage, append-only from this engine's perspective:
/// no updates, no deletes. `put_share` is an atomic insert-if-absent.
pub trait KeyShareStore: Send + Sync {
    /// Inserts a record unless one already exists for the same round key.
    /// Returns `false` when the key was already present (the stored record
    /// is left untouched).
    fn put_share(&self, record: KeyShareRecord) -> Result<bool>;

    fn get_share(&self, key: &RoundKey) -> Result<Option<KeyShareRecord>>;

    fn put_signers(&self, key: &RoundKey, signers: &[String]) -> Result<()>;

    fn get_signers(&self, key: &RoundKey) -> Result<Option<Vec<String>>>;
}
