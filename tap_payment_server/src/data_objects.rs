use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tap_payment_engine::PaymentNotice;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub ok: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { ok: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { ok: false, message: message.to_string() }
    }
}

//--------------------------------------     Query params      -------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthStartParams {
    #[serde(rename = "vendorId")]
    pub vendor_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// The provider also repeats some identifiers on the query string of webhook calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookParams {
    pub id: Option<String>,
    pub topic: Option<String>,
}

//--------------------------------------  Notification parsing -------------------------------------------------------
/// The notification body is unversioned and its shape differs per notification type, so each logical
/// identifier is hunted down an ordered list of known JSON paths; the first hit wins. Both string and
/// numeric JSON values are accepted, because the provider is not consistent about that either.
const PAYMENT_ID_PATHS: [&[&str]; 4] = [&["id"], &["data", "id"], &["collection_id"], &["collection", "id"]];

const EXTERNAL_REFERENCE_PATHS: [&[&str]; 5] = [
    &["external_reference"],
    &["collection", "external_reference"],
    &["data", "external_reference"],
    &["preference_id"],
    &["preference", "external_reference"],
];

fn value_at<'a>(body: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(body, |v, key| v.get(key))
}

fn as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_identifier(body: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| value_at(body, path).and_then(as_identifier))
}

/// Boil a webhook delivery down to the two identifiers reconciliation can act on.
pub fn extract_payment_notice(body: &Value, params: &WebhookParams) -> PaymentNotice {
    let payment_id = first_identifier(body, &PAYMENT_ID_PATHS).or_else(|| params.id.clone());
    let external_reference = first_identifier(body, &EXTERNAL_REFERENCE_PATHS);
    PaymentNotice { payment_id, external_reference }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn extracts_top_level_ids() {
        let body = json!({"id": "P1", "external_reference": "77"});
        let notice = extract_payment_notice(&body, &WebhookParams::default());
        assert_eq!(notice.payment_id.as_deref(), Some("P1"));
        assert_eq!(notice.external_reference.as_deref(), Some("77"));
    }

    #[test]
    fn extracts_nested_and_numeric_ids() {
        let body = json!({"data": {"id": 12345}, "preference": {"external_reference": 77}});
        let notice = extract_payment_notice(&body, &WebhookParams::default());
        assert_eq!(notice.payment_id.as_deref(), Some("12345"));
        assert_eq!(notice.external_reference.as_deref(), Some("77"));
    }

    #[test]
    fn collection_shapes_are_understood() {
        let body = json!({"collection_id": "99", "collection": {"external_reference": "42"}});
        let notice = extract_payment_notice(&body, &WebhookParams::default());
        assert_eq!(notice.payment_id.as_deref(), Some("99"));
        assert_eq!(notice.external_reference.as_deref(), Some("42"));

        let body = json!({"collection": {"id": "100"}});
        let notice = extract_payment_notice(&body, &WebhookParams::default());
        assert_eq!(notice.payment_id.as_deref(), Some("100"));
    }

    #[test]
    fn earlier_paths_take_priority() {
        let body = json!({"id": "first", "data": {"id": "second"}});
        let notice = extract_payment_notice(&body, &WebhookParams::default());
        assert_eq!(notice.payment_id.as_deref(), Some("first"));

        let body = json!({"external_reference": "real", "preference_id": "pref-1"});
        let notice = extract_payment_notice(&body, &WebhookParams::default());
        assert_eq!(notice.external_reference.as_deref(), Some("real"));
    }

    #[test]
    fn preference_id_serves_as_a_reference_of_last_resort() {
        let body = json!({"id": "P1", "preference_id": "pref-1"});
        let notice = extract_payment_notice(&body, &WebhookParams::default());
        assert_eq!(notice.external_reference.as_deref(), Some("pref-1"));
    }

    #[test]
    fn query_id_fills_in_for_a_bodyless_delivery() {
        let body = json!({});
        let params = WebhookParams { id: Some("P9".to_string()), topic: Some("payment".to_string()) };
        let notice = extract_payment_notice(&body, &params);
        assert_eq!(notice.payment_id.as_deref(), Some("P9"));
        assert!(notice.external_reference.is_none());
    }

    #[test]
    fn junk_yields_an_empty_notice() {
        let body = json!({"action": "payment.updated", "id": "", "data": {"id": null}});
        let notice = extract_payment_notice(&body, &WebhookParams::default());
        assert!(notice.payment_id.is_none());
        assert!(notice.external_reference.is_none());
    }
}
