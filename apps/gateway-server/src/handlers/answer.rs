//! The answer endpoint - one POST route dispatching on `action`.

use std::net::SocketAddr;
use std::str::FromStr;

use actix_web::error::PayloadError;
use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use apply_core::GatewayError;
use apply_core::domain::{Action, ActionEnvelope, DraftInput, ScoutInput, route};
use apply_infra::identity::UNKNOWN_ADDRESS;
use apply_shared::ApiResponse;
use apply_shared::dto::{ConfigPayload, DraftPayload, ScoutPayload};

use super::MAX_BODY_BYTES;
use crate::config::UserKeyConfig;
use crate::middleware::error::AppError;
use crate::middleware::rate_limit::apply_rate_headers;
use crate::observability::RequestId;
use crate::state::AppState;

/// End-user key header.
pub const USER_KEY_HEADER: &str = "x-app-api-key";

/// POST /api/answer
pub async fn answer(
    req: HttpRequest,
    body: Result<web::Bytes, actix_web::Error>,
    state: web::Data<AppState>,
    request_id: RequestId,
) -> HttpResponse {
    let body = match body {
        Ok(body) => body,
        Err(err) if matches!(err.as_error::<PayloadError>(), Some(PayloadError::Overflow)) => {
            tracing::warn!(limit = MAX_BODY_BYTES, "Request body too large");
            return AppError::from(GatewayError::PayloadTooLarge {
                limit: MAX_BODY_BYTES,
            })
            .with_request_id(request_id.as_str())
            .error_response();
        }
        Err(err) => {
            // An unreadable body parses like an empty one.
            tracing::debug!(error = %err, "Request body could not be read");
            web::Bytes::new()
        }
    };
    let envelope = ActionEnvelope::parse(&body);
    let client_address = client_address(&req, state.trust_proxy_headers);

    // Malformed and unknown actions are counted too.
    let check = state
        .limiter
        .check(&client_address, envelope.raw_action())
        .await;

    let result = match check.rejection() {
        Some(rejection) => {
            tracing::warn!(
                kind = rejection.kind(),
                action = action_label(envelope.raw_action()),
                "Rate limit exceeded"
            );
            Err(rejection)
        }
        None => dispatch(&state, &req, &envelope).await,
    };

    let mut response = match result {
        Ok(response) => response,
        Err(error) => AppError::from(error)
            .with_request_id(request_id.as_str())
            .error_response(),
    };
    apply_rate_headers(&mut response, &check);
    response
}

/// Any other method on /api/answer.
pub async fn method_not_allowed(request_id: RequestId) -> HttpResponse {
    AppError::from(GatewayError::MethodNotAllowed)
        .with_request_id(request_id.as_str())
        .error_response()
}

async fn dispatch(
    state: &AppState,
    req: &HttpRequest,
    envelope: &ActionEnvelope,
) -> Result<HttpResponse, GatewayError> {
    let action = route(envelope)?;
    let user_key = user_key(req);

    if action.calls_provider() {
        check_user_key(&state.user_keys, user_key.as_deref())?;
    }
    tracing::debug!(action = %action, "Dispatching action");

    let response = match action {
        Action::Config => HttpResponse::Ok().json(ApiResponse::ok(ConfigPayload {
            require_user_key: state.user_keys.require,
            has_user_key: user_key.is_some(),
        })),
        Action::PerplexityScout => {
            let input = ScoutInput::from_envelope(envelope);
            let summary = state.scout.scout(&input).await?;
            HttpResponse::Ok().json(ApiResponse::ok(ScoutPayload { summary }))
        }
        Action::GenerateApplication => {
            let input = DraftInput::from_envelope(envelope, &state.draft.settings().default_lang);
            let drafts = state.draft.generate(&input).await?;
            HttpResponse::Ok().json(ApiResponse::ok(DraftPayload {
                draft_native: drafts.native,
                draft_target: drafts.target,
            }))
        }
    };

    Ok(response)
}

/// Non-blank `X-App-API-Key` value.
fn user_key(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(USER_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(String::from)
}

fn check_user_key(config: &UserKeyConfig, key: Option<&str>) -> Result<(), GatewayError> {
    if !config.require {
        return Ok(());
    }
    let key = key.ok_or(GatewayError::MissingApiKey)?;
    if !config.allowed.is_empty() && !config.allowed.iter().any(|allowed| allowed == key) {
        return Err(GatewayError::ForbiddenOrNoQuota);
    }
    Ok(())
}

/// Caller address used for rate limiting.
///
/// Forwarding headers are only honoured when the deployment says a trusted
/// proxy sets them.
fn client_address(req: &HttpRequest, trust_proxy_headers: bool) -> String {
    let address = if trust_proxy_headers {
        req.connection_info().realip_remote_addr().map(strip_port)
    } else {
        req.peer_addr().map(|addr| addr.ip().to_string())
    };

    address
        .filter(|address| !address.is_empty())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

fn strip_port(address: &str) -> String {
    SocketAddr::from_str(address)
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| address.trim().to_string())
}

/// Known action name for logs; caller-supplied strings are not logged.
fn action_label(raw: &str) -> &'static str {
    match Action::from_str(raw) {
        Ok(action) => action.as_str(),
        Err(_) if raw.is_empty() => "none",
        Err(_) => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use actix_web::{App, test};
    use apply_core::ports::{
        ProviderBody, ProviderCallResult, ProviderClient, ProviderErrorKind, SystemClock,
    };
    use apply_infra::InMemoryWindowStore;
    use serde_json::{Value, json};

    use super::*;
    use crate::config::AppConfig;
    use crate::handlers::configure_routes;
    use crate::observability::RequestIdMiddleware;

    /// Provider that replays canned results and counts calls.
    #[derive(Default)]
    struct StubProvider {
        responses: Mutex<VecDeque<ProviderCallResult>>,
        payloads: Mutex<Vec<Value>>,
    }

    impl StubProvider {
        fn with(responses: Vec<ProviderCallResult>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                payloads: Mutex::default(),
            })
        }

        fn call_count(&self) -> usize {
            self.payloads.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl ProviderClient for StubProvider {
        async fn post_json(
            &self,
            _url: &str,
            _bearer_token: &str,
            payload: &Value,
            _timeout: Duration,
        ) -> ProviderCallResult {
            self.payloads.lock().unwrap().push(payload.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ProviderCallResult {
                    ok: false,
                    status: 0,
                    body: ProviderBody::Raw("no scripted response".into()),
                    error_kind: Some(ProviderErrorKind::Network),
                })
        }
    }

    fn completion(content: &str) -> ProviderCallResult {
        ProviderCallResult {
            ok: true,
            status: 200,
            body: ProviderBody::Json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })),
            error_kind: None,
        }
    }

    fn state(vars: &[(&str, &str)], provider: Arc<StubProvider>) -> AppState {
        let mut env: HashMap<String, String> = [
            ("PERPLEXITY_API_KEY", "pplx-test"),
            ("OPENAI_API_KEY", "sk-test"),
            ("RATE_LIMIT_PEPPER", "test-pepper"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        env.extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let config = AppConfig::from_lookup(|name| env.get(name).cloned());
        let clock = Arc::new(SystemClock);
        AppState::from_parts(
            &config,
            provider,
            Arc::new(InMemoryWindowStore::new(clock.clone())),
            clock,
        )
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .wrap(RequestIdMiddleware)
                    .configure(configure_routes),
            )
            .await
        };
    }

    fn post(body: Value) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/answer")
            .peer_addr("203.0.113.7:40000".parse().unwrap())
            .set_payload(body.to_string())
    }

    #[actix_web::test]
    async fn test_non_post_is_method_not_allowed() {
        let app = app!(state(&[], StubProvider::with(vec![])));

        let res = test::call_service(&app, test::TestRequest::get().uri("/api/answer").to_request()).await;
        assert_eq!(res.status(), 405);
        assert_eq!(res.headers().get("allow").unwrap(), "POST");
        assert!(res.headers().get("x-ratelimit-limit").is_none());

        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["error"], json!("method_not_allowed"));
    }

    #[actix_web::test]
    async fn test_missing_and_unknown_action() {
        let app = app!(state(&[], StubProvider::with(vec![])));

        let req = test::TestRequest::post()
            .uri("/api/answer")
            .set_payload("not json")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 400);
        assert!(res.headers().get("x-ratelimit-remaining").is_some());
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("missing_action"));

        let res = test::call_service(&app, post(json!({"action": "dance"})).to_request()).await;
        assert_eq!(res.status(), 400);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("unknown_action"));
        assert_eq!(body["action"], json!("dance"));
    }

    #[actix_web::test]
    async fn test_config_reports_user_key_flags() {
        let app = app!(state(&[("REQUIRE_USER_KEY", "true")], StubProvider::with(vec![])));

        let req = post(json!({"action": "config"}))
            .insert_header(("X-App-API-Key", "user-1"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(
            body,
            json!({"ok": true, "requireUserKey": true, "hasUserKey": true})
        );

        // config itself never needs the key
        let res = test::call_service(&app, post(json!({"action": "config"})).to_request()).await;
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["hasUserKey"], json!(false));
    }

    #[actix_web::test]
    async fn test_action_tier_rejects_with_headers() {
        let app = app!(state(&[("RATE_LIMIT_ACTION_MAX", "2")], StubProvider::with(vec![])));

        for remaining in ["1", "0"] {
            let res = test::call_service(&app, post(json!({"action": "config"})).to_request()).await;
            assert_eq!(res.status(), 200);
            assert_eq!(res.headers().get("x-ratelimit-action-remaining").unwrap(), remaining);
        }

        let res = test::call_service(&app, post(json!({"action": "config"})).to_request()).await;
        assert_eq!(res.status(), 429);
        let retry_after: u64 = res
            .headers()
            .get("retry-after")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
        assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "60");
        assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "57");

        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("rate_limited_action"));
        assert_eq!(body["retryAfter"], json!(retry_after));
    }

    #[actix_web::test]
    async fn test_address_tier_counts_every_action() {
        let app = app!(state(&[("RATE_LIMIT_IP_MAX", "2")], StubProvider::with(vec![])));

        test::call_service(&app, post(json!({"action": "config"})).to_request()).await;
        test::call_service(&app, post(json!({"action": "dance"})).to_request()).await;

        let res = test::call_service(&app, post(json!({})).to_request()).await;
        assert_eq!(res.status(), 429);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("rate_limited"));
    }

    #[actix_web::test]
    async fn test_trusted_forwarded_addresses_are_counted_separately() {
        let app = app!(state(
            &[("RATE_LIMIT_IP_MAX", "1"), ("TRUST_PROXY_HEADERS", "true")],
            StubProvider::with(vec![]),
        ));

        for forwarded in ["198.51.100.1", "198.51.100.2"] {
            let req = post(json!({"action": "config"}))
                .insert_header(("X-Forwarded-For", forwarded))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), 200);
        }

        let req = post(json!({"action": "config"}))
            .insert_header(("X-Forwarded-For", "198.51.100.1"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 429);
    }

    #[actix_web::test]
    async fn test_scout_missing_inputs_skips_provider() {
        let provider = StubProvider::with(vec![completion("unused")]);
        let app = app!(state(&[], provider.clone()));

        let req = post(json!({"action": "perplexity_scout", "jobTitle": "  "})).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 400);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("missing_inputs"));
        assert_eq!(provider.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_scout_returns_summary() {
        let provider = StubProvider::with(vec![completion("  Acme builds rockets.  ")]);
        let app = app!(state(&[], provider.clone()));

        let req = post(json!({"action": "perplexity_scout", "jobTitle": "Welder", "lang": "en"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body, json!({"ok": true, "summary": "Acme builds rockets."}));
        assert_eq!(provider.call_count(), 1);
    }

    #[actix_web::test]
    async fn test_scout_without_provider_key() {
        let provider = StubProvider::with(vec![]);
        let app = app!(state(&[("PERPLEXITY_API_KEY", "")], provider.clone()));

        let req = post(json!({"action": "perplexity_scout", "role": "Nurse"})).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 500);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("missing_provider_key"));
        assert_eq!(provider.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let provider = StubProvider::with(vec![]);
        let app = app!(state(&[], provider));

        let req = post(json!({"action": "perplexity_scout", "role": "Nurse"})).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 502);
        assert!(res.headers().get("x-request-id").is_some());
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("network"));
        assert!(body["requestId"].is_string());
    }

    #[actix_web::test]
    async fn test_draft_same_language_collapses() {
        let provider = StubProvider::with(vec![completion(r#"{"native": "Hei!", "target": ""}"#)]);
        let app = app!(state(&[], provider));

        let req = post(json!({
            "action": "generate_application",
            "about": "Welder",
            "why": "",
            "proof": "",
            "nativeLang": "fi",
            "targetLang": "fi"
        }))
        .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(
            body,
            json!({"ok": true, "draftNative": "Hei!", "draftTarget": "Hei!"})
        );
    }

    #[actix_web::test]
    async fn test_draft_empty_output_is_bad_gateway() {
        let provider = StubProvider::with(vec![completion(r#"{"native": "", "target": ""}"#)]);
        let app = app!(state(&[], provider));

        let req = post(json!({"action": "generate_application"})).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 502);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("empty_draft"));
    }

    #[actix_web::test]
    async fn test_user_key_gate() {
        let provider = StubProvider::with(vec![]);
        let app = app!(state(
            &[("REQUIRE_USER_KEY", "true"), ("APP_USER_KEYS", "alpha,beta")],
            provider.clone(),
        ));

        let req = post(json!({"action": "perplexity_scout", "role": "Nurse"})).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 401);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("missing_api_key"));

        let req = post(json!({"action": "generate_application"}))
            .insert_header(("X-App-API-Key", "gamma"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 403);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], json!("forbidden_or_no_quota"));

        assert_eq!(provider.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_oversized_body_is_json_payload_too_large() {
        let app = app!(state(&[("RATE_LIMIT_IP_MAX", "1")], StubProvider::with(vec![])));

        let pad = "x".repeat(MAX_BODY_BYTES + 6 * 1024);
        let res = test::call_service(&app, post(json!({"action": "config", "pad": pad})).to_request()).await;
        assert_eq!(res.status(), 413);
        assert_eq!(res.headers().get("content-type").unwrap(), "application/json");
        assert!(res.headers().get("x-ratelimit-limit").is_none());
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["error"], json!("payload_too_large"));
        assert!(body["requestId"].is_string());

        // rejected before the limiter, so the single allowed request is still available
        let res = test::call_service(&app, post(json!({"action": "config"})).to_request()).await;
        assert_eq!(res.status(), 200);
    }
}
