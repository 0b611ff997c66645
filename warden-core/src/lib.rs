//! Threshold-signature coordination engine for the warden custody validator.
//!
//! Layering:
//! - `foundation` — errors, id types, constants, small utilities
//! - `domain` — intents, signer sets, per-chain encoding, operation engine
//! - `infrastructure` — gossip transport, key-share storage, MPC backends,
//!   config, logging
//! - `application` — round coordination, single-flight registry, signature
//!   request broker

pub mod application;
pub mod domain;
pub mod foundation;
pub mod infrastructure;

pub use foundation::{CustodyError, ErrorCode, Result};
