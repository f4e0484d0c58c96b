//! Cross-crate integration scenarios for the RPC relay.

pub mod rpc_flows;
pub mod worker_pool;
