//! Response evaluation: status, then content, then JSON check.

use serde_json::Value;

use crate::json_path::{value_as_text, JsonPath};
use crate::model::{EndpointConfig, FailureReason, JsonCheck, ProbeOutcome};
use crate::probe::ProbeResponse;

/// Longest excerpt of a located value quoted in a failure detail
const DETAIL_EXCERPT: usize = 120;

/// Evaluate a response against the endpoint's assertions. The first failing
/// stage determines the reason.
pub fn evaluate(config: &EndpointConfig, response: &ProbeResponse) -> ProbeOutcome {
    match check(config, response) {
        Ok(()) => ProbeOutcome::ok(response.status, response.latency_ms),
        Err((reason, detail)) => {
            ProbeOutcome::failed(reason, detail).with_response(response.status, response.latency_ms)
        }
    }
}

fn check(config: &EndpointConfig, response: &ProbeResponse) -> Result<(), (FailureReason, String)> {
    if response.status != config.expected_status {
        return Err((
            FailureReason::StatusMismatch,
            format!("expected HTTP {}, got {}", config.expected_status, response.status),
        ));
    }

    if let Some(expected) = &config.expected_content {
        if !response.body.contains(expected.as_str()) {
            return Err((
                FailureReason::ContentMismatch,
                format!("response does not contain {expected:?}"),
            ));
        }
    }

    if let Some(json_check) = &config.json_check {
        check_json(json_check, &response.body)?;
    }

    Ok(())
}

fn check_json(json_check: &JsonCheck, body: &str) -> Result<(), (FailureReason, String)> {
    let document: Value = serde_json::from_str(body)
        .map_err(|e| (FailureReason::JsonInvalid, format!("response is not valid JSON: {e}")))?;

    let not_found = || (FailureReason::JsonPathNotFound, format!("path {} not found", json_check.path));
    let path = JsonPath::parse(&json_check.path).map_err(|_| not_found())?;
    let located = path.locate(&document).ok_or_else(not_found)?;

    let actual = value_as_text(located);
    if actual != json_check.expected_value {
        return Err((
            FailureReason::JsonValueMismatch,
            format!(
                "path {}: expected {:?}, got {:?}",
                json_check.path,
                json_check.expected_value,
                excerpt(&actual)
            ),
        ));
    }

    Ok(())
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(DETAIL_EXCERPT) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
