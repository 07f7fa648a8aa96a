//! Swap execution and its slippage/gas policy

pub mod engine;
pub mod slippage;

pub use engine::*;
pub use slippage::*;
