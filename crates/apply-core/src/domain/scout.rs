use serde_json::{Map, Value};

use super::envelope::ActionEnvelope;

/// Partial job/company description sent by `perplexity_scout`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoutInput {
    pub job_title: String,
    pub job_url: String,
    pub ad_url: String,
    pub role: String,
    /// Requested summary language; empty when not given.
    pub lang: String,
}

impl ScoutInput {
    pub fn from_envelope(envelope: &ActionEnvelope) -> Self {
        Self {
            job_title: envelope.text("jobTitle"),
            job_url: envelope.text("jobUrl"),
            ad_url: envelope.text("adUrl"),
            role: envelope.text("role"),
            lang: envelope.text("lang"),
        }
    }

    fn identifying_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("jobTitle", self.job_title.as_str()),
            ("jobUrl", self.job_url.as_str()),
            ("adUrl", self.ad_url.as_str()),
            ("role", self.role.as_str()),
        ]
    }

    pub fn has_identifying_field(&self) -> bool {
        self.identifying_fields()
            .iter()
            .any(|(_, value)| !value.is_empty())
    }

    /// Compact JSON object holding only the non-empty identifying fields.
    pub fn to_prompt_fragment(&self) -> String {
        let fields: Map<String, Value> = self
            .identifying_fields()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();

        Value::Object(fields).to_string()
    }
}
