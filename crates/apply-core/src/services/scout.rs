//! `perplexity_scout`: summarize an employer and job from partial fields.

use std::sync::Arc;

use serde_json::{Value, json};

use super::ProviderSettings;
use crate::domain::{FailureClass, ModelFallbackChain, ScoutInput, classify, language_name, normalize_code};
use crate::error::GatewayError;
use crate::ports::{ProviderCallResult, ProviderClient};

/// Scout configuration.
#[derive(Debug, Clone)]
pub struct ScoutSettings {
    pub provider: ProviderSettings,
    pub models: ModelFallbackChain,
    /// Summary language when the request names none.
    pub default_lang: String,
}

/// Builds the scout prompt and runs the model fallback policy.
pub struct ScoutService {
    client: Arc<dyn ProviderClient>,
    settings: ScoutSettings,
}

impl ScoutService {
    pub fn new(client: Arc<dyn ProviderClient>, settings: ScoutSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ScoutSettings {
        &self.settings
    }

    /// Produce a non-empty summary for `input`.
    pub async fn scout(&self, input: &ScoutInput) -> Result<String, GatewayError> {
        if !input.has_identifying_field() {
            return Err(GatewayError::MissingInputs);
        }
        let api_key = self.settings.provider.require_key()?;

        let lang = normalize_code(&input.lang, &self.settings.default_lang);
        let system = system_instruction(&language_name(&lang));
        let user = input.to_prompt_fragment();

        let models = &self.settings.models;
        let first = self.call(api_key, models.primary(), &system, &user).await;

        let result = match classify(&first) {
            None => first,
            Some(FailureClass::RetryableInvalidModel) => {
                tracing::warn!(
                    model = %models.primary(),
                    "Scout model rejected as invalid, trying fallbacks"
                );
                self.try_alternates(api_key, &system, &user)
                    .await
                    .ok_or_else(|| self.upstream(&first))?
            }
            Some(class) => {
                tracing::warn!(status = first.status, ?class, "Scout provider call failed");
                return Err(self.upstream(&first));
            }
        };

        let summary = result.first_choice_content().map(str::trim).unwrap_or("");
        if summary.is_empty() {
            return Err(GatewayError::EmptySummary);
        }
        Ok(summary.to_string())
    }

    /// Walk the fallback chain in order, returning the first success.
    async fn try_alternates(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
    ) -> Option<ProviderCallResult> {
        for model in self.settings.models.alternates() {
            tracing::info!(model = %model, "Retrying scout with fallback model");
            let result = self.call(api_key, model, system, user).await;
            if result.ok {
                return Some(result);
            }
            tracing::debug!(model = %model, status = result.status, "Fallback model failed");
        }
        None
    }

    async fn call(&self, api_key: &str, model: &str, system: &str, user: &str) -> ProviderCallResult {
        let payload = request_payload(model, system, user);
        self.client
            .post_json(
                &self.settings.provider.endpoint,
                api_key,
                &payload,
                self.settings.provider.timeout,
            )
            .await
    }

    fn upstream(&self, result: &ProviderCallResult) -> GatewayError {
        GatewayError::upstream(self.settings.provider.name, result)
    }
}

fn system_instruction(language: &str) -> String {
    format!(
        "You are a research assistant helping a job applicant. The user message is a JSON \
         object with whatever is known about a job: jobTitle, jobUrl, adUrl and role. \
         Using reliable public information, summarize the employer and the position: what \
         the organization does, the main duties and requirements of the role, and what an \
         applicant should highlight. Write 4 to 6 short sentences in {language}. Do not \
         invent facts; if nothing reliable is found, say so briefly."
    )
}

fn request_payload(model: &str, system: &str, user: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ],
        "temperature": 0.2,
        "max_tokens": 600,
    })
}
