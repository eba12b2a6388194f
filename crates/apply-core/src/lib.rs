//! # Apply Core
//!
//! The domain layer of the Apply request gateway.
//! This crate contains the action vocabulary, rate-limit bookkeeping types,
//! the model fallback policy and the two provider-backed services. It has
//! zero infrastructure dependencies: storage and HTTP live behind the ports.

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::GatewayError;
