use crate::Opportunity;

use uuid::Uuid;

#[test]
fn test_opportunity_new() {
    let funnel_id = Uuid::new_v4();
    let stage_id = Uuid::new_v4();
    let opp = Opportunity::new(
        funnel_id,
        stage_id,
        "Acme renewal".to_string(),
        "Acme Corp".to_string(),
        12_000.0,
    );

    assert_eq!(opp.funnel_id, funnel_id);
    assert_eq!(opp.stage_id, stage_id);
    assert_eq!(opp.title, "Acme renewal");
    assert_eq!(opp.client, "Acme Corp");
    assert_eq!(opp.value, 12_000.0);
    assert!(opp.custom_fields.is_empty());
    assert!(opp.win_reason.is_none());
    assert!(opp.loss_reason.is_none());
    assert!(opp.last_stage_change_at.is_none());
    assert!(opp.deleted_at.is_none());
}
