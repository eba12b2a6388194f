//! Inbound action envelope and the action vocabulary.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::GatewayError;

/// Flat key/value request body with a required `action` field.
///
/// Parsing is lenient: a body that is not a JSON object yields an empty
/// envelope, which the router then rejects as `missing_action`.
#[derive(Debug, Clone, Default)]
pub struct ActionEnvelope {
    fields: Map<String, Value>,
}

impl ActionEnvelope {
    pub fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Self { fields },
            _ => Self::default(),
        }
    }

    /// The requested action as given, trimmed; empty when absent.
    pub fn raw_action(&self) -> &str {
        self.fields
            .get("action")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
    }

    /// A scalar field rendered as trimmed text. Missing, null and nested
    /// values read as empty.
    pub fn text(&self, name: &str) -> String {
        match self.fields.get(name) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }
}

/// Recognized actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Config,
    PerplexityScout,
    GenerateApplication,
}

impl Action {
    pub const ALL: [Action; 3] = [
        Action::Config,
        Action::PerplexityScout,
        Action::GenerateApplication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Config => "config",
            Action::PerplexityScout => "perplexity_scout",
            Action::GenerateApplication => "generate_application",
        }
    }

    /// Whether the action reaches an external provider.
    pub fn calls_provider(&self) -> bool {
        !matches!(self, Action::Config)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| GatewayError::UnknownAction(s.to_string()))
    }
}

/// Resolve the envelope's action.
pub fn route(envelope: &ActionEnvelope) -> Result<Action, GatewayError> {
    match envelope.raw_action() {
        "" => Err(GatewayError::MissingAction),
        action => action.parse(),
    }
}
