//! Testing utilities and mock implementations
//!
//! Mocks for the Wyze API and the MQTT bus so the bridge can be tested
//! without a broker or network access.

pub mod mocks;

pub use mocks::*;
