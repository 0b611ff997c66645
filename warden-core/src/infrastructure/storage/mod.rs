pub mod memory;
pub mod traits;

pub use memory::MemoryKeyShareStore;
pub use traits::KeyShareStore;
