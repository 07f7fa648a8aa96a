//! Error taxonomy and failure-streak tracking

pub mod bot_error;
pub mod circuit_breaker;

pub use bot_error::*;
pub use circuit_breaker::*;
