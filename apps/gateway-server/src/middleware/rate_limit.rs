//! Rate limit response headers.
//!
//! The limiter runs inside the answer handler, after the body has been read,
//! because the per-action tier needs the action name. This module surfaces
//! its decisions on the response so clients can back off before a 429.

use actix_web::HttpResponse;
use actix_web::http::header::{HeaderName, HeaderValue};
use apply_core::domain::RateDecision;
use apply_infra::RateCheck;

const ADDRESS_HEADERS: [&str; 3] = ["x-ratelimit-limit", "x-ratelimit-remaining", "x-ratelimit-reset"];
const ACTION_HEADERS: [&str; 3] = [
    "x-ratelimit-action-limit",
    "x-ratelimit-action-remaining",
    "x-ratelimit-action-reset",
];

/// Attach limit, remaining and reset (unix seconds) for each checked tier.
///
/// Disabled tiers and degraded store outcomes add no headers.
pub fn apply_rate_headers(response: &mut HttpResponse, check: &RateCheck) {
    if let Some(decision) = check.address.decision() {
        insert(response, ADDRESS_HEADERS, decision);
    }
    if let Some(decision) = check.action.decision() {
        insert(response, ACTION_HEADERS, decision);
    }
}

fn insert(response: &mut HttpResponse, names: [&'static str; 3], decision: &RateDecision) {
    let values = [
        decision.limit.to_string(),
        decision.remaining.to_string(),
        decision.reset_at.timestamp().to_string(),
    ];

    let headers = response.headers_mut();
    for (name, value) in names.into_iter().zip(values) {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}
