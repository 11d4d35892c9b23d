use std::sync::Arc;

use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Ordered opportunity ids for a single stage column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLane {
    pub stage_id: Uuid,
    pub opportunities: Vec<Uuid>,
}

impl StageLane {
    pub fn new(stage_id: Uuid, opportunities: Vec<Uuid>) -> Self {
        Self {
            stage_id,
            opportunities,
        }
    }
}

/// A reorder of one opportunity between (or within) stage lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardMove {
    pub opportunity_id: Uuid,
    pub from_stage_id: Uuid,
    pub to_stage_id: Uuid,
    pub to_index: usize,
}

/// Immutable view of every lane on the board. Moves produce a new snapshot;
/// the original is untouched, so rollback is just re-installing the old one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardSnapshot {
    lanes: Vec<StageLane>,
}

impl BoardSnapshot {
    pub fn new(lanes: Vec<StageLane>) -> Self {
        Self { lanes }
    }

    pub fn lanes(&self) -> &[StageLane] {
        &self.lanes
    }

    pub fn lane(&self, stage_id: Uuid) -> Option<&StageLane> {
        self.lanes.iter().find(|lane| lane.stage_id == stage_id)
    }

    /// Applies `mv` and returns the resulting snapshot. Dropping an
    /// opportunity back where it already sits returns an identical snapshot.
    pub fn apply_move(&self, mv: &BoardMove) -> EngineResult<BoardSnapshot> {
        let source = self
            .lane(mv.from_stage_id)
            .ok_or_else(|| EngineError::invalid_move(format!("unknown stage {}", mv.from_stage_id)))?;
        let current_index = source
            .opportunities
            .iter()
            .position(|id| *id == mv.opportunity_id)
            .ok_or_else(|| {
                EngineError::invalid_move(format!(
                    "opportunity {} is not in stage {}",
                    mv.opportunity_id, mv.from_stage_id
                ))
            })?;
        if self.lane(mv.to_stage_id).is_none() {
            return Err(EngineError::invalid_move(format!(
                "unknown stage {}",
                mv.to_stage_id
            )));
        }

        if mv.from_stage_id == mv.to_stage_id && current_index == mv.to_index {
            return Ok(self.clone());
        }

        let mut lanes = self.lanes.clone();
        for lane in &mut lanes {
            if lane.stage_id == mv.from_stage_id {
                lane.opportunities.remove(current_index);
            }
        }
        for lane in &mut lanes {
            if lane.stage_id == mv.to_stage_id {
                let index = mv.to_index.min(lane.opportunities.len());
                lane.opportunities.insert(index, mv.opportunity_id);
            }
        }

        Ok(BoardSnapshot::new(lanes))
    }
}

/// Holds the one authoritative snapshot. A transition takes a checkpoint
/// before committing its speculative snapshot; `restore` rewinds to it if
/// anything downstream fails.
#[derive(Debug, Clone)]
pub struct BoardState {
    current: Arc<BoardSnapshot>,
}

impl BoardState {
    pub fn new(snapshot: BoardSnapshot) -> Self {
        Self {
            current: Arc::new(snapshot),
        }
    }

    pub fn current(&self) -> Arc<BoardSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn commit(&mut self, snapshot: BoardSnapshot) -> Arc<BoardSnapshot> {
        self.current = Arc::new(snapshot);
        Arc::clone(&self.current)
    }

    pub fn restore(&mut self, checkpoint: Arc<BoardSnapshot>) {
        self.current = checkpoint;
    }
}
