//! Data persistence and file operations

pub mod transactions;

pub use transactions::*;
