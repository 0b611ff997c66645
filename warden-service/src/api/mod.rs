pub mod auth;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::{build_router, run_json_rpc_server};
pub use state::RpcState;
