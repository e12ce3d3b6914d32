//! Processing stages and the per-method stage catalog.
//!
//! A processing method (washed, natural, honey, ...) owns an ordered list of
//! stages. Order indices are 1-based and gap-free; every advancement decision
//! downstream treats the catalog order as canonical.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// One ordered step of a processing method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: DbId,
    pub method_id: DbId,
    pub order_index: i32,
    pub name: String,
    pub is_required: bool,
}

/// A stage reference captured from a possibly stale client-side catalog.
///
/// Any combination of fields may be present. Resolution tries them in the
/// fixed order id, name, position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRef {
    pub stage_id: Option<DbId>,
    pub name: Option<String>,
    pub order_index: Option<i32>,
}

impl StageRef {
    pub fn by_id(stage_id: DbId) -> Self {
        Self {
            stage_id: Some(stage_id),
            ..Self::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn by_order_index(order_index: i32) -> Self {
        Self {
            order_index: Some(order_index),
            ..Self::default()
        }
    }

    /// Whether no field is set at all.
    pub fn is_empty(&self) -> bool {
        self.stage_id.is_none()
            && self.name.as_deref().map_or(true, |n| n.trim().is_empty())
            && self.order_index.is_none()
    }
}

impl From<&Stage> for StageRef {
    fn from(stage: &Stage) -> Self {
        Self {
            stage_id: Some(stage.id),
            name: Some(stage.name.clone()),
            order_index: Some(stage.order_index),
        }
    }
}

/// Which matching strategy located a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Id,
    Name,
    Position,
}

/// The ordered, validated stage list of one processing method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCatalog {
    method_id: DbId,
    stages: Vec<Stage>,
}

impl StageCatalog {
    /// Build a catalog from the stages stored for `method_id`.
    ///
    /// Stages are sorted by order index. An empty list means the method is
    /// unknown. Order indices that are not exactly `1..=n` break the
    /// advancement invariant and are reported as an internal error.
    pub fn new(method_id: DbId, mut stages: Vec<Stage>) -> Result<Self, CoreError> {
        if stages.is_empty() {
            return Err(CoreError::NotFound {
                entity: "ProcessingMethod",
                id: method_id,
            });
        }

        if let Some(foreign) = stages.iter().find(|s| s.method_id != method_id) {
            return Err(CoreError::Internal(format!(
                "Stage {} belongs to method {}, not {method_id}",
                foreign.id, foreign.method_id
            )));
        }

        stages.sort_by_key(|s| s.order_index);
        validate_order_indices(&stages)?;

        Ok(Self { method_id, stages })
    }

    pub fn method_id(&self) -> DbId {
        self.method_id
    }

    /// Stages ascending by order index.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn first(&self) -> &Stage {
        &self.stages[0]
    }

    pub fn last(&self) -> &Stage {
        &self.stages[self.stages.len() - 1]
    }

    pub fn is_last(&self, stage: &Stage) -> bool {
        self.last().id == stage.id
    }

    pub fn by_id(&self, stage_id: DbId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Exact match on the trimmed stage name.
    pub fn by_name(&self, name: &str) -> Option<&Stage> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.stages.iter().find(|s| s.name.trim() == name)
    }

    pub fn by_order_index(&self, order_index: i32) -> Option<&Stage> {
        self.stages.iter().find(|s| s.order_index == order_index)
    }

    /// The stage following `stage_id`, `None` for the last stage or an
    /// unknown id.
    pub fn successor_of(&self, stage_id: DbId) -> Option<&Stage> {
        let idx = self.stages.iter().position(|s| s.id == stage_id)?;
        self.stages.get(idx + 1)
    }

    /// Resolve a client stage reference: id first, then name, then position.
    /// The first strategy that matches wins.
    pub fn resolve(&self, stage_ref: &StageRef) -> Option<(&Stage, MatchStrategy)> {
        if let Some(stage) = stage_ref.stage_id.and_then(|id| self.by_id(id)) {
            return Some((stage, MatchStrategy::Id));
        }
        if let Some(stage) = stage_ref.name.as_deref().and_then(|n| self.by_name(n)) {
            return Some((stage, MatchStrategy::Name));
        }
        stage_ref
            .order_index
            .and_then(|idx| self.by_order_index(idx))
            .map(|stage| (stage, MatchStrategy::Position))
    }
}

/// Check a stage name before it enters a catalog.
///
/// Names are written into encoded failure comments, where `|` separates
/// segments, so a name containing it could never be decoded again.
pub fn validate_stage_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Stage names must not be blank".to_string(),
        ));
    }
    if name.contains('|') {
        return Err(CoreError::Validation(format!(
            "Stage name '{name}' must not contain the '|' character"
        )));
    }
    Ok(())
}

/// Check that sorted stages carry order indices exactly `1..=n`.
pub fn validate_order_indices(stages: &[Stage]) -> Result<(), CoreError> {
    for (pos, stage) in stages.iter().enumerate() {
        let expected = pos as i32 + 1;
        if stage.order_index != expected {
            return Err(CoreError::Internal(format!(
                "Stage catalog order is not contiguous: stage '{}' has order index {}, expected {expected}",
                stage.name, stage.order_index
            )));
        }
    }
    Ok(())
}
