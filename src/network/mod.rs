//! Network providers, contract ABIs and the chain boundary

pub mod chain;
pub mod contracts;
pub mod providers;
pub mod retry;
pub mod rpc;

pub use chain::*;
pub use providers::*;
pub use retry::*;
pub use rpc::*;
