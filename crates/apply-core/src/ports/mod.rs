//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod clock;
mod provider;
mod window_store;

pub use clock::{Clock, SystemClock};
pub use provider::{ProviderBody, ProviderCallResult, ProviderClient, ProviderErrorKind};
pub use window_store::{WindowStore, WindowStoreError};
