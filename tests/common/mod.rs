//! Shared doubles and fixtures for the integration tests.
#![allow(dead_code)]

pub mod fixtures;
pub mod models;
pub mod transports;

pub use fixtures::*;
pub use models::*;
pub use transports::*;
