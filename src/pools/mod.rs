//! Exchange registry and liquidity discovery

pub mod detector;
pub mod registry;

pub use detector::*;
pub use registry::*;
