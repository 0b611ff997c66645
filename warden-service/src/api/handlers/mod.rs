pub mod health;
pub mod intent;
pub mod keys;
pub mod rpc;
pub mod types;
