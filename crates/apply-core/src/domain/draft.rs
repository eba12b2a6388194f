use serde_json::Value;

use super::envelope::ActionEnvelope;
use super::language::{normalize_code, same_language};

/// Applicant input for `generate_application`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftInput {
    pub about: String,
    pub why: String,
    pub proof: String,
    /// Scout summary; the only source of facts about the employer.
    pub summary: String,
    pub native_lang: String,
    pub target_lang: String,
}

impl DraftInput {
    /// Read the draft fields; absent language codes become `fallback_lang`.
    pub fn from_envelope(envelope: &ActionEnvelope, fallback_lang: &str) -> Self {
        Self {
            about: envelope.text("about"),
            why: envelope.text("why"),
            proof: envelope.text("proof"),
            summary: envelope.text("summary"),
            native_lang: normalize_code(&envelope.text("nativeLang"), fallback_lang),
            target_lang: normalize_code(&envelope.text("targetLang"), fallback_lang),
        }
    }

    pub fn is_same_language(&self) -> bool {
        same_language(&self.native_lang, &self.target_lang)
    }
}

/// The two drafts returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftPair {
    pub native: String,
    pub target: String,
}

impl DraftPair {
    /// Interpret model output. A JSON object yields its `native` and `target`
    /// strings; anything unparsable becomes the native draft verbatim.
    pub fn from_model_content(content: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(content.trim())
            .ok()
            .or_else(|| strip_code_fence(content).and_then(|inner| serde_json::from_str(inner).ok()));

        match parsed {
            Some(Value::Object(fields)) => {
                let field = |name: &str| {
                    fields
                        .get(name)
                        .and_then(Value::as_str)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default()
                };
                Self {
                    native: field("native"),
                    target: field("target"),
                }
            }
            _ => Self {
                native: content.trim().to_string(),
                target: String::new(),
            },
        }
    }

    /// Make both drafts identical when the languages match. Drafts in
    /// different languages are left untouched.
    pub fn collapse(mut self, same_language: bool) -> Self {
        if !same_language {
            return self;
        }
        if self.native.is_empty() {
            self.native = self.target.clone();
        } else {
            self.target = self.native.clone();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.native.is_empty() && self.target.is_empty()
    }
}

/// Inner text of a Markdown code fence such as ```` ```json ... ``` ````.
fn strip_code_fence(content: &str) -> Option<&str> {
    let inner = content.trim().strip_prefix("```")?.strip_suffix("```")?;
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    Some(inner.trim())
}
