//! Optional helpers that sit outside the client core.

#[cfg(feature = "config")]
pub mod config;
