pub mod config;
pub mod logging;
pub mod mpc;
pub mod storage;
pub mod transport;
