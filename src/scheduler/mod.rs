//! Run control and timing of the trading loop

pub mod controller;
pub mod timer;

pub use controller::*;
pub use timer::*;
