use std::collections::HashMap;

use async_trait::async_trait;

use crm_core::{Opportunity, RequiredField};

use crate::error::EngineResult;

/// How a modal interaction ended. Cancellation is a normal outcome, not an
/// error; the transition rolls back quietly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome<T> {
    Completed(T),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonKind {
    Win,
    Loss,
}

impl ReasonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonKind::Win => "win",
            ReasonKind::Loss => "loss",
        }
    }
}

/// Collects values for the destination stage's unfilled required fields.
/// `Completed` carries the values keyed by field name.
#[async_trait]
pub trait RequiredFieldsDialog: Send + Sync {
    async fn present(
        &self,
        opportunity: &Opportunity,
        missing: &[RequiredField],
    ) -> EngineResult<DialogOutcome<HashMap<String, String>>>;
}

/// Collects a win or loss reason, optionally constrained to the stage's
/// configured choices.
#[async_trait]
pub trait ReasonDialog: Send + Sync {
    async fn present(
        &self,
        opportunity: &Opportunity,
        kind: ReasonKind,
        choices: &[String],
    ) -> EngineResult<DialogOutcome<String>>;
}
