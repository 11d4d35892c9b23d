use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crm_core::{
    FieldType, Opportunity, RequiredField, Stage, WebhookEvent, WebhookTarget,
};

use crate::board::{BoardSnapshot, BoardState, StageLane};
use crate::dialog::{DialogOutcome, ReasonDialog, ReasonKind, RequiredFieldsDialog};
use crate::error::{EngineError, EngineResult};
use crate::notifier::Notifier;
use crate::sink::{DispatchSummary, WebhookSink};
use crate::store::OpportunityStore;

pub fn stage(name: &str, funnel_id: Uuid) -> Stage {
    Stage::new(funnel_id, name.to_string(), "#2563eb".to_string(), 0)
}

pub fn required_field(stage_id: Uuid, name: &str, field_type: FieldType) -> RequiredField {
    RequiredField::new(stage_id, name.to_string(), field_type, true)
}

pub fn optional_field(stage_id: Uuid, name: &str, field_type: FieldType) -> RequiredField {
    RequiredField::new(stage_id, name.to_string(), field_type, false)
}

pub fn opportunity(title: &str, funnel_id: Uuid, stage_id: Uuid) -> Opportunity {
    Opportunity::new(
        funnel_id,
        stage_id,
        title.to_string(),
        "Acme Ltd".to_string(),
        2_500.0,
    )
}

pub fn board_with(lanes: &[(Uuid, &[Uuid])]) -> BoardState {
    let lanes = lanes
        .iter()
        .map(|(stage_id, ids)| StageLane::new(*stage_id, ids.to_vec()))
        .collect();
    BoardState::new(BoardSnapshot::new(lanes))
}

/// In-memory store that records every call and can be told to fail or stall.
#[derive(Default)]
pub struct MemoryStore {
    pub opportunities: Mutex<HashMap<Uuid, Opportunity>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_update_stage: bool,
    pub stage_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn with(opportunity: Opportunity) -> Self {
        let store = Self::default();
        store
            .opportunities
            .lock()
            .unwrap()
            .insert(opportunity.id, opportunity);
        store
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn get(&self, id: Uuid) -> EngineResult<Opportunity> {
        self.opportunities
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::persistence(format!("opportunity {id} not found")))
    }
}

#[async_trait]
impl OpportunityStore for MemoryStore {
    async fn update_stage(
        &self,
        opportunity_id: Uuid,
        stage_id: Uuid,
        position: i32,
    ) -> EngineResult<Opportunity> {
        self.record("update_stage");
        if let Some(delay) = self.stage_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_update_stage {
            return Err(EngineError::persistence("update_stage failed"));
        }
        let mut opportunities = self.opportunities.lock().unwrap();
        let opportunity = opportunities
            .get_mut(&opportunity_id)
            .ok_or_else(|| EngineError::persistence("opportunity not found"))?;
        opportunity.stage_id = stage_id;
        opportunity.position = position;
        opportunity.last_stage_change_at = Some(chrono::Utc::now());
        Ok(opportunity.clone())
    }

    async fn update_custom_fields(
        &self,
        opportunity_id: Uuid,
        values: &HashMap<String, String>,
    ) -> EngineResult<Opportunity> {
        self.record("update_custom_fields");
        let mut opportunities = self.opportunities.lock().unwrap();
        let opportunity = opportunities
            .get_mut(&opportunity_id)
            .ok_or_else(|| EngineError::persistence("opportunity not found"))?;
        for (name, value) in values {
            opportunity.custom_fields.insert(name.clone(), value.clone());
        }
        Ok(opportunity.clone())
    }

    async fn update_reasons(
        &self,
        opportunity_id: Uuid,
        win_reason: Option<&str>,
        loss_reason: Option<&str>,
    ) -> EngineResult<Opportunity> {
        self.record("update_reasons");
        let mut opportunities = self.opportunities.lock().unwrap();
        let opportunity = opportunities
            .get_mut(&opportunity_id)
            .ok_or_else(|| EngineError::persistence("opportunity not found"))?;
        if let Some(reason) = win_reason {
            opportunity.win_reason = Some(reason.to_string());
        }
        if let Some(reason) = loss_reason {
            opportunity.loss_reason = Some(reason.to_string());
        }
        Ok(opportunity.clone())
    }

    async fn clone_into_stage(
        &self,
        source: &Opportunity,
        funnel_id: Uuid,
        stage_id: Uuid,
    ) -> EngineResult<Opportunity> {
        self.record("clone_into_stage");
        let mut clone = self.get(source.id)?;
        clone.id = Uuid::new_v4();
        clone.funnel_id = funnel_id;
        clone.stage_id = stage_id;
        self.opportunities
            .lock()
            .unwrap()
            .insert(clone.id, clone.clone());
        Ok(clone)
    }
}

/// Dialog that plays back queued outcomes, one per presentation.
#[derive(Default)]
pub struct ScriptedFieldsDialog {
    outcomes: Mutex<VecDeque<DialogOutcome<HashMap<String, String>>>>,
    pub presented: Mutex<Vec<Vec<String>>>,
}

impl ScriptedFieldsDialog {
    pub fn with(outcomes: Vec<DialogOutcome<HashMap<String, String>>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            presented: Mutex::new(Vec::new()),
        }
    }

    pub fn presentations(&self) -> usize {
        self.presented.lock().unwrap().len()
    }
}

#[async_trait]
impl RequiredFieldsDialog for ScriptedFieldsDialog {
    async fn present(
        &self,
        _opportunity: &Opportunity,
        missing: &[RequiredField],
    ) -> EngineResult<DialogOutcome<HashMap<String, String>>> {
        self.presented
            .lock()
            .unwrap()
            .push(missing.iter().map(|f| f.name.clone()).collect());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EngineError::persistence("fields dialog script exhausted"))
    }
}

#[derive(Default)]
pub struct ScriptedReasonDialog {
    outcomes: Mutex<VecDeque<DialogOutcome<String>>>,
    pub presented: Mutex<Vec<(ReasonKind, Vec<String>)>>,
}

impl ScriptedReasonDialog {
    pub fn with(outcomes: Vec<DialogOutcome<String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            presented: Mutex::new(Vec::new()),
        }
    }

    pub fn presentations(&self) -> usize {
        self.presented.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasonDialog for ScriptedReasonDialog {
    async fn present(
        &self,
        _opportunity: &Opportunity,
        kind: ReasonKind,
        choices: &[String],
    ) -> EngineResult<DialogOutcome<String>> {
        self.presented
            .lock()
            .unwrap()
            .push((kind, choices.to_vec()));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EngineError::persistence("reason dialog script exhausted"))
    }
}

/// Fields dialog that parks until released, for exercising the in-flight
/// guard from a second task.
pub struct BlockingFieldsDialog {
    pub release: Arc<Notify>,
}

#[async_trait]
impl RequiredFieldsDialog for BlockingFieldsDialog {
    async fn present(
        &self,
        _opportunity: &Opportunity,
        _missing: &[RequiredField],
    ) -> EngineResult<DialogOutcome<HashMap<String, String>>> {
        self.release.notified().await;
        Ok(DialogOutcome::Cancelled)
    }
}

/// Sink that records every dispatch and reports a configurable failure count.
#[derive(Default)]
pub struct RecordingSink {
    pub dispatched: Mutex<Vec<(WebhookTarget, Uuid, WebhookEvent)>>,
    pub failures_per_dispatch: usize,
    pub endpoints_per_dispatch: usize,
}

impl RecordingSink {
    pub fn with_endpoints(endpoints: usize) -> Self {
        Self {
            endpoints_per_dispatch: endpoints,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<(WebhookTarget, Uuid, WebhookEvent)> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSink for RecordingSink {
    async fn dispatch(
        &self,
        target: WebhookTarget,
        target_id: Uuid,
        event: WebhookEvent,
        _payload: serde_json::Value,
    ) -> DispatchSummary {
        self.dispatched.lock().unwrap().push((target, target_id, event));
        DispatchSummary {
            dispatched: self.endpoints_per_dispatch,
            succeeded: self
                .endpoints_per_dispatch
                .saturating_sub(self.failures_per_dispatch),
        }
    }
}

/// Notifier that captures messages instead of logging them.
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(("success".to_string(), message.to_string()));
    }

    fn info(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(("info".to_string(), message.to_string()));
    }

    fn error(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(("error".to_string(), message.to_string()));
    }
}
