//! Core data types and structures

pub mod addresses;
pub mod exchange;
pub mod status;
pub mod token;
pub mod transaction;
pub mod wallet;

pub use addresses::*;
pub use exchange::*;
pub use status::*;
pub use token::*;
pub use transaction::*;
pub use wallet::*;
