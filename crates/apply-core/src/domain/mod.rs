//! Domain types - the gateway's vocabulary and pure policies.

mod draft;
mod envelope;
mod fallback;
mod language;
mod rate;
mod scout;

pub use draft::{DraftInput, DraftPair};
pub use envelope::{Action, ActionEnvelope, route};
pub use fallback::{FailureClass, INVALID_MODEL_ERROR_TYPE, ModelFallbackChain, classify};
pub use language::{language_name, normalize_code, same_language};
pub use rate::{RateDecision, RateTier, StoreOutcome, WindowRecord, window_delta};
pub use scout::ScoutInput;
