//! Next-stage computation.
//!
//! Given a method's ordered stages, a batch's progress records and an
//! optional active rework verdict, decide which stage the farmer must record
//! next. An active rework (retry override) always wins over the natural
//! successor.
//!
//! The latest record is matched back to the catalog by stage id, then by
//! stage name, then by `order_index == step_index`, in that fixed order.
//! Records and failures may have been produced from a stale client-side
//! catalog, so the later strategies are required behaviour.

use serde::Serialize;

use crate::error::CoreError;
use crate::evaluation::EvaluationOutcome;
use crate::failure_codec::EncodedFailure;
use crate::progress::{self, ProgressRecord};
use crate::stage_catalog::{MatchStrategy, Stage};

/// Result of the advancement computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "stage", rename_all = "snake_case")]
pub enum NextStage {
    /// Progress must be recorded against this stage next.
    Stage(Stage),
    /// Every stage has been recorded; nothing left to advance to.
    Complete,
}

impl NextStage {
    pub fn stage(&self) -> Option<&Stage> {
        match self {
            Self::Stage(stage) => Some(stage),
            Self::Complete => None,
        }
    }
}

/// A `Fail` or `NeedsImprovement` verdict that still governs advancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveRework {
    /// The verdict's comment carries the stage to redo.
    Encoded(EncodedFailure),
    /// Free-text comment with no machine-readable stage.
    Unspecified,
}

/// Compute the next legal stage.
///
/// `stages` must be ordered by order index. Fails only when `stages` is
/// empty; having no progress at all is the normal start of a batch.
pub fn next_stage(
    stages: &[Stage],
    records: &[ProgressRecord],
    rework: Option<&ActiveRework>,
) -> Result<NextStage, CoreError> {
    let Some(first) = stages.first() else {
        return Err(CoreError::NotFound {
            entity: "Stage",
            id: records.first().map_or(0, |r| r.batch_id),
        });
    };

    if let Some(rework) = rework {
        return Ok(NextStage::Stage(rework_target(stages, rework).clone()));
    }

    let Some(current) = progress::latest(records) else {
        return Ok(NextStage::Stage(first.clone()));
    };

    match locate_current(stages, current) {
        Some((idx, strategy)) => {
            if strategy != MatchStrategy::Id {
                tracing::warn!(
                    batch_id = current.batch_id,
                    stage_id = current.stage_id,
                    ?strategy,
                    "Current stage located by fallback match"
                );
            }
            Ok(stages
                .get(idx + 1)
                .map_or(NextStage::Complete, |s| NextStage::Stage(s.clone())))
        }
        None => {
            tracing::warn!(
                batch_id = current.batch_id,
                stage_id = current.stage_id,
                stage_name = %current.stage_name,
                "Current stage not found in catalog, resuming at first unrecorded stage"
            );
            Ok(stages
                .iter()
                .find(|s| !records.iter().any(|r| r.stage_id == s.id))
                .map_or(NextStage::Complete, |s| NextStage::Stage(s.clone())))
        }
    }
}

/// The stage a rework verdict sends the batch back to.
///
/// An encoded failure resolves by order index, then by name. When nothing
/// resolves the last stage is redone, the same target a `NeedsImprovement`
/// verdict without stages gets. `stages` must not be empty.
pub fn rework_target<'a>(stages: &'a [Stage], rework: &ActiveRework) -> &'a Stage {
    let resolved = match rework {
        ActiveRework::Encoded(failure) => {
            let stage = resolve_failed_stage(stages, failure);
            if stage.is_none() {
                tracing::warn!(
                    failed_order_index = failure.failed_order_index,
                    failed_stage_name = %failure.failed_stage_name,
                    "Failed stage not found in catalog, redoing the last stage"
                );
            }
            stage
        }
        ActiveRework::Unspecified => {
            tracing::warn!("Rework verdict names no stage, redoing the last stage");
            None
        }
    };
    resolved.unwrap_or(&stages[stages.len() - 1])
}

/// Find the catalog position of a progress record's stage.
pub fn locate_current(
    stages: &[Stage],
    record: &ProgressRecord,
) -> Option<(usize, MatchStrategy)> {
    if let Some(idx) = stages.iter().position(|s| s.id == record.stage_id) {
        return Some((idx, MatchStrategy::Id));
    }

    let name = record.stage_name.trim();
    if !name.is_empty() {
        if let Some(idx) = stages.iter().position(|s| s.name.trim() == name) {
            return Some((idx, MatchStrategy::Name));
        }
    }

    stages
        .iter()
        .position(|s| s.order_index == record.step_index)
        .map(|idx| (idx, MatchStrategy::Position))
}

/// Map an encoded failure to a stage: order index first, then name.
pub fn resolve_failed_stage<'a>(
    stages: &'a [Stage],
    failure: &EncodedFailure,
) -> Option<&'a Stage> {
    stages
        .iter()
        .find(|s| s.order_index == failure.failed_order_index)
        .or_else(|| {
            let name = failure.failed_stage_name.trim();
            stages.iter().find(|s| !name.is_empty() && s.name.trim() == name)
        })
}

/// The rework verdict that currently overrides advancement, if any.
///
/// `evaluations` are finalized outcomes newest first, as the evaluation
/// store lists them. The newest must be a rework verdict and the batch must
/// not have recorded anything since the checkpoint it judged. Once the
/// retry record exists the override is consumed and natural advancement
/// resumes.
pub fn active_rework(
    evaluations: &[EvaluationOutcome],
    records: &[ProgressRecord],
) -> Option<ActiveRework> {
    let latest_eval = evaluations.iter().find(|e| !e.is_pending())?;

    if !latest_eval.result?.requires_rework() {
        return None;
    }

    let latest_step = progress::latest(records)?.step_index;
    if latest_step != latest_eval.checkpoint_step_index {
        return None;
    }

    Some(
        latest_eval
            .encoded_failure()
            .map_or(ActiveRework::Unspecified, ActiveRework::Encoded),
    )
}
