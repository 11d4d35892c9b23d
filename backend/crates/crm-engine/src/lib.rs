pub mod board;
pub mod dialog;
pub mod error;
pub mod notifier;
pub mod requirements;
pub mod sink;
pub mod store;
pub mod transition;

pub use board::{BoardMove, BoardSnapshot, BoardState, StageLane};
pub use dialog::{DialogOutcome, ReasonDialog, ReasonKind, RequiredFieldsDialog};
pub use error::{EngineError, EngineResult};
pub use notifier::{LogNotifier, Notifier};
pub use requirements::{StageRequirements, is_field_missing, missing_required_fields};
pub use sink::{DispatchSummary, WebhookSink};
pub use store::OpportunityStore;
pub use transition::{
    InFlightRegistry, MoveRequest, TransitionOrchestrator, TransitionOutcome, TransitionState,
};

#[cfg(test)]
mod tests;
