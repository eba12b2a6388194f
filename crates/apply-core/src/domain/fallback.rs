//! Model fallback policy.
//!
//! The retry loop in the scout service only consumes [`FailureClass`]; all
//! knowledge of how a provider reports a rejected model lives in
//! [`classify`].

use crate::ports::{ProviderCallResult, ProviderErrorKind};

/// `error.type` a provider reports when the requested model does not exist.
pub const INVALID_MODEL_ERROR_TYPE: &str = "invalid_model";

/// How a failed provider call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The model identifier was rejected; another model may succeed.
    RetryableInvalidModel,
    /// Network trouble, throttling or a provider-side error.
    Transient,
    /// Anything else; retrying with another model will not help.
    Fatal,
}

/// Classify a provider call. Returns `None` for successful calls.
pub fn classify(result: &ProviderCallResult) -> Option<FailureClass> {
    if result.ok {
        return None;
    }

    let class = match result.error_kind {
        Some(ProviderErrorKind::Network) => FailureClass::Transient,
        _ if result.status == 400 && result.error_type() == Some(INVALID_MODEL_ERROR_TYPE) => {
            FailureClass::RetryableInvalidModel
        }
        _ if result.status == 408 || result.status == 429 || result.status >= 500 => {
            FailureClass::Transient
        }
        _ => FailureClass::Fatal,
    };

    Some(class)
}

/// Primary model plus an ordered list of alternates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFallbackChain {
    primary: String,
    alternates: Vec<String>,
}

impl ModelFallbackChain {
    /// Build a chain. Empty entries, duplicates and the primary itself are
    /// dropped from the alternates; order is otherwise preserved.
    pub fn new<I, S>(primary: impl Into<String>, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let primary = primary.into().trim().to_string();
        let mut alternates: Vec<String> = Vec::new();

        for model in fallbacks {
            let model = model.as_ref().trim();
            if model.is_empty() || model == primary || alternates.iter().any(|m| m == model) {
                continue;
            }
            alternates.push(model.to_string());
        }

        Self {
            primary,
            alternates,
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn alternates(&self) -> &[String] {
        &self.alternates
    }
}
