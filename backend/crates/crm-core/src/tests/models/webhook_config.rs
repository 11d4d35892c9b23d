use crate::{CoreError, WebhookEvent, WebhookTarget};

use std::str::FromStr;

#[test]
fn test_webhook_target_round_trip() {
    for s in ["funnel", "stage", "opportunity"] {
        let parsed = WebhookTarget::from_str(s).unwrap();
        assert_eq!(parsed.as_str(), s);
    }
}

#[test]
fn test_webhook_event_round_trip() {
    for s in ["create", "update", "move"] {
        let parsed = WebhookEvent::from_str(s).unwrap();
        assert_eq!(parsed.as_str(), s);
    }
}

#[test]
fn test_webhook_enums_reject_unknown() {
    assert!(matches!(
        WebhookTarget::from_str("board").unwrap_err(),
        CoreError::InvalidWebhookTarget { .. }
    ));
    assert!(matches!(
        WebhookEvent::from_str("delete").unwrap_err(),
        CoreError::InvalidWebhookEvent { .. }
    ));
}
