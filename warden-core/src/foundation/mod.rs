pub mod constants;
pub mod error;
pub mod types;
pub mod util;

pub use constants::*;
pub use error::{CustodyError, ErrorCode, ErrorContext, Result};
pub use types::*;
