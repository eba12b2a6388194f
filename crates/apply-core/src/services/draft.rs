//! `generate_application`: write a bilingual application draft.

use std::sync::Arc;

use serde_json::{Value, json};

use super::ProviderSettings;
use crate::domain::{DraftInput, DraftPair, language_name};
use crate::error::GatewayError;
use crate::ports::ProviderClient;

/// Draft configuration.
#[derive(Debug, Clone)]
pub struct DraftSettings {
    pub provider: ProviderSettings,
    pub model: String,
    /// Language used for absent `nativeLang` / `targetLang`.
    pub default_lang: String,
    pub min_words: u32,
    pub max_words: u32,
}

pub struct DraftService {
    client: Arc<dyn ProviderClient>,
    settings: DraftSettings,
}

impl DraftService {
    pub fn new(client: Arc<dyn ProviderClient>, settings: DraftSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &DraftSettings {
        &self.settings
    }

    /// Generate the native and target drafts with a single provider call.
    pub async fn generate(&self, input: &DraftInput) -> Result<DraftPair, GatewayError> {
        let api_key = self.settings.provider.require_key()?;

        let payload = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": self.system_instruction(input) },
                { "role": "user", "content": user_message(input) },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.6,
        });

        let result = self
            .client
            .post_json(
                &self.settings.provider.endpoint,
                api_key,
                &payload,
                self.settings.provider.timeout,
            )
            .await;

        if !result.ok {
            tracing::warn!(
                status = result.status,
                kind = ?result.error_kind,
                "Draft provider call failed"
            );
            return Err(GatewayError::upstream(self.settings.provider.name, &result));
        }

        let content = result.first_choice_content().unwrap_or("");
        let drafts = DraftPair::from_model_content(content).collapse(input.is_same_language());

        if drafts.is_empty() {
            return Err(GatewayError::EmptyDraft);
        }
        if drafts.target.is_empty() {
            tracing::debug!(
                native_lang = %input.native_lang,
                target_lang = %input.target_lang,
                "Draft produced without a target-language version"
            );
        }
        Ok(drafts)
    }

    fn system_instruction(&self, input: &DraftInput) -> String {
        let native = language_name(&input.native_lang);
        let target = language_name(&input.target_lang);
        let min = self.settings.min_words;
        let max = self.settings.max_words;

        format!(
            "You write job application letters for the applicant. Use facts only from the \
             company summary and the applicant's own input in the user message; never invent \
             employers, dates, qualifications or skills. Each letter must be between {min} and \
             {max} words. Write the letter in {native}, then a faithful version of the same \
             letter in {target}. Return strictly a JSON object with exactly two string fields, \
             \"native\" ({native}) and \"target\" ({target}), and nothing else."
        )
    }
}

fn user_message(input: &DraftInput) -> String {
    let message: Value = json!({
        "companySummary": input.summary,
        "aboutMe": input.about,
        "whyThisJob": input.why,
        "proofOfSkills": input.proof,
        "nativeLanguage": language_name(&input.native_lang),
        "targetLanguage": language_name(&input.target_lang),
    });
    message.to_string()
}
