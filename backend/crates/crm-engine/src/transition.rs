use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use error_location::ErrorLocation;
use log::{debug, warn};
use uuid::Uuid;

use crm_core::{Opportunity, Stage, WebhookEvent, WebhookTarget};

use crate::board::{BoardMove, BoardState};
use crate::dialog::{DialogOutcome, ReasonDialog, ReasonKind, RequiredFieldsDialog};
use crate::error::{EngineError, EngineResult};
use crate::notifier::Notifier;
use crate::requirements::{StageRequirements, missing_required_fields};
use crate::sink::{DispatchSummary, WebhookSink};
use crate::store::OpportunityStore;

/// Where a transition currently is. The orchestrator walks these in order;
/// every state before `Dispatching` can still roll the board back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Evaluating,
    AwaitingRequiredFields,
    AwaitingReason,
    Persisting,
    Dispatching,
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionState::Idle => "idle",
            TransitionState::Evaluating => "evaluating",
            TransitionState::AwaitingRequiredFields => "awaiting_required_fields",
            TransitionState::AwaitingReason => "awaiting_reason",
            TransitionState::Persisting => "persisting",
            TransitionState::Dispatching => "dispatching",
        };
        write!(f, "{name}")
    }
}

/// A drop of one opportunity onto a destination stage at a board index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub opportunity_id: Uuid,
    pub from_stage_id: Uuid,
    pub to_stage_id: Uuid,
    pub to_index: usize,
}

/// What a finished transition produced. `committed` is false when the user
/// cancelled a dialog and the board was rolled back without error.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub committed: bool,
    pub opportunity: Opportunity,
    pub webhooks: DispatchSummary,
    pub migrated: Option<Opportunity>,
}

impl TransitionOutcome {
    fn rolled_back(opportunity: Opportunity) -> Self {
        Self {
            committed: false,
            opportunity,
            webhooks: DispatchSummary::default(),
            migrated: None,
        }
    }
}

/// Tracks which opportunities have a transition running right now. Clones
/// share the underlying set, so short-lived orchestrators (one per request)
/// can still serialize moves of the same opportunity.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    claimed: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&self, opportunity_id: Uuid) -> EngineResult<InFlightClaim> {
        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| EngineError::persistence("in-flight registry poisoned"))?;
        if !claimed.insert(opportunity_id) {
            return Err(EngineError::TransitionInFlight {
                opportunity_id,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(InFlightClaim {
            registry: self.clone(),
            opportunity_id,
        })
    }
}

/// Releases the per-opportunity claim when the transition ends, on any path.
struct InFlightClaim {
    registry: InFlightRegistry,
    opportunity_id: Uuid,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        if let Ok(mut claimed) = self.registry.claimed.lock() {
            claimed.remove(&self.opportunity_id);
        }
    }
}

/// Drives a stage transition end to end: optimistic board reorder,
/// requirement gating, persistence with a deadline, then webhook fan-out.
///
/// Gates run strictly in order. Required fields are collected before any
/// reason is asked for, nothing is persisted until every gate has passed,
/// and no webhook fires until persistence has succeeded.
pub struct TransitionOrchestrator {
    store: Arc<dyn OpportunityStore>,
    fields_dialog: Arc<dyn RequiredFieldsDialog>,
    reason_dialog: Arc<dyn ReasonDialog>,
    sink: Arc<dyn WebhookSink>,
    notifier: Arc<dyn Notifier>,
    persist_timeout: Duration,
    in_flight: InFlightRegistry,
}

impl TransitionOrchestrator {
    pub fn new(
        store: Arc<dyn OpportunityStore>,
        fields_dialog: Arc<dyn RequiredFieldsDialog>,
        reason_dialog: Arc<dyn ReasonDialog>,
        sink: Arc<dyn WebhookSink>,
        notifier: Arc<dyn Notifier>,
        persist_timeout: Duration,
        in_flight: InFlightRegistry,
    ) -> Self {
        Self {
            store,
            fields_dialog,
            reason_dialog,
            sink,
            notifier,
            persist_timeout,
            in_flight,
        }
    }

    /// Runs one transition. Concurrent moves of the same opportunity are
    /// rejected with `TransitionInFlight`; moves of different opportunities
    /// proceed independently.
    pub async fn run(
        &self,
        board: &mut BoardState,
        destination: &Stage,
        opportunity: Opportunity,
        request: MoveRequest,
    ) -> EngineResult<TransitionOutcome> {
        if request.to_stage_id != destination.id {
            return Err(EngineError::invalid_move(format!(
                "destination stage mismatch: request targets {}, stage is {}",
                request.to_stage_id, destination.id
            )));
        }
        if request.opportunity_id != opportunity.id {
            return Err(EngineError::invalid_move(format!(
                "opportunity mismatch: request names {}, loaded {}",
                request.opportunity_id, opportunity.id
            )));
        }

        let _claim = self.in_flight.claim(request.opportunity_id)?;
        let mut state = TransitionState::Idle;
        self.advance(&mut state, TransitionState::Evaluating, &request);

        let checkpoint = board.current();
        let speculative = checkpoint.apply_move(&BoardMove {
            opportunity_id: request.opportunity_id,
            from_stage_id: request.from_stage_id,
            to_stage_id: request.to_stage_id,
            to_index: request.to_index,
        })?;
        let unchanged = speculative == *checkpoint;
        // Lane insertion clamps an oversized index, so the persisted position
        // comes from where the opportunity actually landed.
        let landed_position = speculative
            .lane(request.to_stage_id)
            .and_then(|lane| {
                lane.opportunities
                    .iter()
                    .position(|id| *id == request.opportunity_id)
            })
            .and_then(|index| i32::try_from(index).ok())
            .ok_or_else(|| {
                EngineError::invalid_move(format!(
                    "opportunity {} missing from destination lane",
                    request.opportunity_id
                ))
            })?;
        board.commit(speculative);
        if unchanged && request.from_stage_id == request.to_stage_id {
            debug!(
                "transition {}: dropped in place, nothing to do",
                request.opportunity_id
            );
            return Ok(TransitionOutcome::rolled_back(opportunity));
        }

        let mut opportunity = opportunity;
        let requirements = StageRequirements::evaluate(destination);
        let mut fields_patch: Option<HashMap<String, String>> = None;
        let mut reason_patch: Option<(ReasonKind, String)> = None;

        // Field gate. The dialog is re-presented until everything required
        // is filled or the user gives up.
        loop {
            let missing: Vec<_> = missing_required_fields(destination, &opportunity)
                .into_iter()
                .cloned()
                .collect();
            if missing.is_empty() {
                break;
            }
            self.advance(&mut state, TransitionState::AwaitingRequiredFields, &request);
            match self.fields_dialog.present(&opportunity, &missing).await {
                Ok(DialogOutcome::Completed(values)) => {
                    for (name, value) in &values {
                        opportunity
                            .custom_fields
                            .insert(name.clone(), value.clone());
                    }
                    match fields_patch.as_mut() {
                        Some(patch) => patch.extend(values),
                        None => fields_patch = Some(values),
                    }
                }
                Ok(DialogOutcome::Cancelled) => {
                    board.restore(checkpoint);
                    self.notifier.info(&format!(
                        "Move of \"{}\" cancelled, required fields not provided",
                        opportunity.title
                    ));
                    return Ok(TransitionOutcome::rolled_back(opportunity));
                }
                Err(error) => {
                    board.restore(checkpoint);
                    self.notifier
                        .error(&format!("Move of \"{}\" failed: {error}", opportunity.title));
                    return Err(error);
                }
            }
        }

        // Reason gate, only after every required field is in place.
        if requirements.needs_win_reason || requirements.needs_loss_reason {
            let kind = if requirements.needs_win_reason {
                ReasonKind::Win
            } else {
                ReasonKind::Loss
            };
            let choices = match kind {
                ReasonKind::Win => &destination.win_reasons,
                ReasonKind::Loss => &destination.loss_reasons,
            };
            self.advance(&mut state, TransitionState::AwaitingReason, &request);
            match self.reason_dialog.present(&opportunity, kind, choices).await {
                Ok(DialogOutcome::Completed(reason)) => {
                    match kind {
                        ReasonKind::Win => opportunity.win_reason = Some(reason.clone()),
                        ReasonKind::Loss => opportunity.loss_reason = Some(reason.clone()),
                    }
                    reason_patch = Some((kind, reason));
                }
                Ok(DialogOutcome::Cancelled) => {
                    board.restore(checkpoint);
                    self.notifier.info(&format!(
                        "Move of \"{}\" cancelled, no {} reason given",
                        opportunity.title,
                        kind.as_str()
                    ));
                    return Ok(TransitionOutcome::rolled_back(opportunity));
                }
                Err(error) => {
                    board.restore(checkpoint);
                    self.notifier
                        .error(&format!("Move of \"{}\" failed: {error}", opportunity.title));
                    return Err(error);
                }
            }
        }

        self.advance(&mut state, TransitionState::Persisting, &request);
        let persist = self.persist(
            &request,
            landed_position,
            fields_patch.as_ref(),
            reason_patch.as_ref(),
        );
        let persisted = match tokio::time::timeout(self.persist_timeout, persist).await {
            Ok(Ok(persisted)) => persisted,
            Ok(Err(error)) => {
                board.restore(checkpoint);
                self.notifier.error(&format!(
                    "Move of \"{}\" failed to save: {error}",
                    opportunity.title
                ));
                return Err(error);
            }
            Err(_) => {
                board.restore(checkpoint);
                self.notifier.error(&format!(
                    "Move of \"{}\" timed out while saving",
                    opportunity.title
                ));
                return Err(EngineError::PersistenceTimeout {
                    timeout_secs: self.persist_timeout.as_secs(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        // Past this point the move is committed. Webhooks and migration are
        // best effort and can no longer fail the transition.
        self.advance(&mut state, TransitionState::Dispatching, &request);
        let payload = serde_json::to_value(&persisted).unwrap_or(serde_json::Value::Null);
        let mut summary = self
            .sink
            .dispatch(
                WebhookTarget::Opportunity,
                persisted.id,
                WebhookEvent::Move,
                payload.clone(),
            )
            .await;
        if fields_patch.is_some() || reason_patch.is_some() {
            summary = summary.merge(
                self.sink
                    .dispatch(
                        WebhookTarget::Opportunity,
                        persisted.id,
                        WebhookEvent::Update,
                        payload,
                    )
                    .await,
            );
        }

        let migrated = self.migrate_if_configured(destination, &persisted).await;

        self.advance(&mut state, TransitionState::Idle, &request);
        if summary.is_empty() {
            self.notifier.success(&format!(
                "Moved \"{}\" to {}",
                persisted.title, destination.name
            ));
        } else {
            self.notifier.success(&format!(
                "Moved \"{}\" to {} ({}/{} webhooks delivered)",
                persisted.title, destination.name, summary.succeeded, summary.dispatched
            ));
        }

        Ok(TransitionOutcome {
            committed: true,
            opportunity: persisted,
            webhooks: summary,
            migrated,
        })
    }

    async fn persist(
        &self,
        request: &MoveRequest,
        position: i32,
        fields_patch: Option<&HashMap<String, String>>,
        reason_patch: Option<&(ReasonKind, String)>,
    ) -> EngineResult<Opportunity> {
        if let Some(values) = fields_patch {
            self.store
                .update_custom_fields(request.opportunity_id, values)
                .await?;
        }
        if let Some((kind, reason)) = reason_patch {
            let (win, loss) = match kind {
                ReasonKind::Win => (Some(reason.as_str()), None),
                ReasonKind::Loss => (None, Some(reason.as_str())),
            };
            self.store
                .update_reasons(request.opportunity_id, win, loss)
                .await?;
        }
        self.store
            .update_stage(request.opportunity_id, request.to_stage_id, position)
            .await
    }

    async fn migrate_if_configured(
        &self,
        destination: &Stage,
        persisted: &Opportunity,
    ) -> Option<Opportunity> {
        let target = destination.migrate_target.as_ref()?;
        match self
            .store
            .clone_into_stage(persisted, target.funnel_id, target.stage_id)
            .await
        {
            Ok(clone) => {
                let payload = serde_json::to_value(&clone).unwrap_or(serde_json::Value::Null);
                self.sink
                    .dispatch(
                        WebhookTarget::Opportunity,
                        clone.id,
                        WebhookEvent::Create,
                        payload,
                    )
                    .await;
                Some(clone)
            }
            Err(error) => {
                warn!(
                    "migration of {} to funnel {} failed: {error}",
                    persisted.id, target.funnel_id
                );
                None
            }
        }
    }

    fn advance(&self, state: &mut TransitionState, next: TransitionState, request: &MoveRequest) {
        debug!(
            "transition {}: {state} -> {next}",
            request.opportunity_id
        );
        *state = next;
    }
}
