//! # Apply Shared
//!
//! Wire types of the gateway's single endpoint, shared with any Rust client.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorEnvelope};
