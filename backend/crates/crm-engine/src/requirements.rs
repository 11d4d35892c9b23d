use crm_core::{FieldType, Opportunity, RequiredField, Stage};

/// What the destination stage demands before an opportunity may land in it.
///
/// Evaluation is pure: it looks only at the stage definition and the
/// opportunity's current values, and never touches storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageRequirements {
    pub has_required_fields: bool,
    pub needs_win_reason: bool,
    pub needs_loss_reason: bool,
}

impl StageRequirements {
    pub fn evaluate(destination: &Stage) -> Self {
        Self {
            has_required_fields: destination
                .required_fields
                .iter()
                .any(|field| field.is_required),
            needs_win_reason: destination.is_win_stage && destination.win_reason_required,
            needs_loss_reason: destination.is_loss_stage && destination.loss_reason_required,
        }
    }

    pub fn any(&self) -> bool {
        self.has_required_fields || self.needs_win_reason || self.needs_loss_reason
    }
}

/// A field counts as missing when the opportunity has no value for it, the
/// value is empty after trimming, or a checkbox holds anything but "true".
pub fn is_field_missing(field: &RequiredField, opportunity: &Opportunity) -> bool {
    match opportunity.custom_fields.get(&field.name) {
        None => true,
        Some(value) if value.trim().is_empty() => true,
        Some(value) => field.field_type == FieldType::Checkbox && value != "true",
    }
}

/// Required fields of `destination` the opportunity has not yet filled,
/// in stage-definition order. Optional fields never appear here.
pub fn missing_required_fields<'a>(
    destination: &'a Stage,
    opportunity: &Opportunity,
) -> Vec<&'a RequiredField> {
    destination
        .required_fields
        .iter()
        .filter(|field| field.is_required && is_field_missing(field, opportunity))
        .collect()
}
