use crate::Stage;

use uuid::Uuid;

#[test]
fn test_stage_new_defaults() {
    let funnel_id = Uuid::new_v4();
    let stage = Stage::new(funnel_id, "Prospecting".to_string(), "#3498db".to_string(), 1);

    assert_eq!(stage.funnel_id, funnel_id);
    assert_eq!(stage.position, 1);
    assert!(!stage.is_win_stage);
    assert!(!stage.is_loss_stage);
    assert!(!stage.win_reason_required);
    assert!(!stage.loss_reason_required);
    assert!(stage.win_reasons.is_empty());
    assert!(stage.loss_reasons.is_empty());
    assert!(stage.required_fields.is_empty());
    assert!(stage.migrate_target.is_none());
    assert!(stage.alert_after_days.is_none());
    assert!(stage.deleted_at.is_none());
}
