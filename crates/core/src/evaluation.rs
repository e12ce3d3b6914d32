//! Expert evaluations of a batch at its checkpoint.
//!
//! A pending outcome (no `evaluated_at`) is opened by the progression engine
//! when a batch records its last stage. Submitting a verdict finalizes that
//! row in place; finalized rows are history and never change again.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::failure_codec::{self, EncodedFailure, DEFAULT_DETAILS};
use crate::stage_catalog::{Stage, StageCatalog, StageRef};
use crate::types::{DbId, Timestamp};

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Maximum length for comments, detailed feedback and recommendations.
pub const MAX_FEEDBACK_LENGTH: usize = 10_000;

/// Message returned when a failing verdict names no stage.
pub const PROBLEMATIC_STAGE_REQUIRED: &str = "problematic stage required";

/* --------------------------------------------------------------------------
Types
-------------------------------------------------------------------------- */

/// An expert verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationResult {
    Pass,
    Fail,
    NeedsImprovement,
    /// Undecided; the batch stays at the checkpoint.
    Temporary,
}

impl EvaluationResult {
    /// String representation for database storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::NeedsImprovement => "needs_improvement",
            Self::Temporary => "temporary",
        }
    }

    /// Verdicts that send the farmer back to redo a stage.
    pub fn requires_rework(self) -> bool {
        matches!(self, Self::Fail | Self::NeedsImprovement)
    }
}

impl FromStr for EvaluationResult {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "needs_improvement" => Ok(Self::NeedsImprovement),
            "temporary" => Ok(Self::Temporary),
            other => Err(CoreError::Validation(format!(
                "Invalid evaluation result '{other}'. Must be one of: pass, fail, needs_improvement, temporary"
            ))),
        }
    }
}

/// One expert judgment of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub id: DbId,
    pub batch_id: DbId,
    /// `None` while pending.
    pub result: Option<EvaluationResult>,
    /// Free text; holds an encoded failure for negative verdicts.
    pub comments: String,
    pub detailed_feedback: String,
    pub recommendations: String,
    /// Step index of the progress record that opened this checkpoint.
    pub checkpoint_step_index: i32,
    pub evaluated_at: Option<Timestamp>,
    pub evaluated_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EvaluationOutcome {
    pub fn is_pending(&self) -> bool {
        self.evaluated_at.is_none()
    }

    /// The structured failure carried in `comments`, if any.
    pub fn encoded_failure(&self) -> Option<EncodedFailure> {
        failure_codec::decode(&self.comments)
    }
}

/// Insert payload for the pending outcome opened at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPendingEvaluation {
    pub batch_id: DbId,
    pub checkpoint_step_index: i32,
}

/// What an expert submits to finalize the pending evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSubmission {
    pub result: EvaluationResult,
    /// Stages the expert identified as the cause of a negative verdict.
    #[serde(default)]
    pub problematic_stages: Vec<StageRef>,
    pub failure_details: Option<String>,
    /// Free-text comment kept verbatim for non-failing verdicts.
    pub comments: Option<String>,
    pub detailed_feedback: Option<String>,
    pub recommendations: Option<String>,
    pub evaluated_by: DbId,
}

/// Column values written when a pending outcome is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationPatch {
    pub result: EvaluationResult,
    pub comments: String,
    pub detailed_feedback: String,
    pub recommendations: String,
    pub evaluated_by: DbId,
    pub evaluated_at: Timestamp,
}

/* --------------------------------------------------------------------------
Validation and finalization
-------------------------------------------------------------------------- */

/// Validate a submission before any catalog lookup.
pub fn validate_submission(submission: &EvaluationSubmission) -> Result<(), CoreError> {
    let fields = [
        ("Comments", &submission.comments),
        ("Failure details", &submission.failure_details),
        ("Detailed feedback", &submission.detailed_feedback),
        ("Recommendations", &submission.recommendations),
    ];
    for (label, value) in fields {
        if value.as_ref().is_some_and(|v| v.len() > MAX_FEEDBACK_LENGTH) {
            return Err(CoreError::Validation(format!(
                "{label} exceed maximum length of {MAX_FEEDBACK_LENGTH} characters"
            )));
        }
    }

    let has_stage = submission.problematic_stages.iter().any(|s| !s.is_empty());
    if submission.result == EvaluationResult::Fail && !has_stage {
        return Err(CoreError::Validation(PROBLEMATIC_STAGE_REQUIRED.to_string()));
    }

    if submission.result.requires_rework() {
        // `|` separates segments in the encoded comment.
        for (label, value) in [
            ("Failure details", &submission.failure_details),
            ("Recommendations", &submission.recommendations),
        ] {
            if value.as_ref().is_some_and(|v| v.contains('|')) {
                return Err(CoreError::Validation(format!(
                    "{label} must not contain the '|' character"
                )));
            }
        }
    }

    Ok(())
}

/// Build the finalization patch for a submission.
///
/// For rework verdicts the problematic stages are resolved against the
/// catalog and the earliest one is encoded into `comments`. A
/// `NeedsImprovement` verdict without stages targets the last stage.
pub fn build_finalization(
    catalog: &StageCatalog,
    submission: &EvaluationSubmission,
    evaluated_at: Timestamp,
) -> Result<EvaluationPatch, CoreError> {
    validate_submission(submission)?;

    let detailed_feedback = trimmed(&submission.detailed_feedback);
    let recommendations = trimmed(&submission.recommendations);

    let comments = if submission.result.requires_rework() {
        let mut stages = resolve_problematic_stages(catalog, &submission.problematic_stages)?;
        if stages.is_empty() {
            stages.push(catalog.last());
        }
        let failure = failure_for(&stages, submission, &detailed_feedback, &recommendations);
        let comments = failure_codec::encode(&failure);
        // A rework verdict is only actionable if its comment decodes.
        if failure_codec::decode(&comments).is_none() {
            return Err(CoreError::Validation(format!(
                "Failed stage '{}' cannot be encoded into evaluation comments",
                failure.failed_stage_name
            )));
        }
        comments
    } else {
        trimmed(&submission.comments)
    };

    Ok(EvaluationPatch {
        result: submission.result,
        comments,
        detailed_feedback,
        recommendations,
        evaluated_by: submission.evaluated_by,
        evaluated_at,
    })
}

/// Resolve stage references, deduplicated and sorted by order index.
fn resolve_problematic_stages<'a>(
    catalog: &'a StageCatalog,
    refs: &[StageRef],
) -> Result<Vec<&'a Stage>, CoreError> {
    let mut stages: Vec<&Stage> = Vec::with_capacity(refs.len());
    for stage_ref in refs.iter().filter(|r| !r.is_empty()) {
        let (stage, _) = catalog.resolve(stage_ref).ok_or_else(|| {
            CoreError::Validation(format!(
                "Problematic stage {stage_ref:?} is not part of this processing method"
            ))
        })?;
        if !stages.iter().any(|s| s.id == stage.id) {
            stages.push(stage);
        }
    }
    stages.sort_by_key(|s| s.order_index);
    Ok(stages)
}

fn failure_for(
    stages: &[&Stage],
    submission: &EvaluationSubmission,
    detailed_feedback: &str,
    recommendations: &str,
) -> EncodedFailure {
    let mut details = trimmed(&submission.failure_details);
    if details.is_empty() {
        details = detailed_feedback.replace('|', "/");
    }

    if stages.len() > 1 {
        let others: Vec<&str> = stages[1..].iter().map(|s| s.name.as_str()).collect();
        let base = if details.is_empty() {
            DEFAULT_DETAILS
        } else {
            details.as_str()
        };
        details = format!("{base} (also affected stages {})", others.join(", "));
    }

    EncodedFailure::for_stage(stages[0], details, recommendations)
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
