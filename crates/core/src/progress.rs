//! Progress records: evidence that a batch completed work at a stage.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum length for a progress note.
pub const MAX_NOTES_LENGTH: usize = 10_000;

/// Maximum length for an output unit label (`kg`, `bags`, ...).
pub const MAX_OUTPUT_UNIT_LENGTH: usize = 32;

/// Maximum number of media references attached to one record.
pub const MAX_MEDIA_REFS: usize = 20;

/// An append-only progress row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: DbId,
    pub batch_id: DbId,
    pub stage_id: DbId,
    /// Stage name at the time the record was made.
    pub stage_name: String,
    /// 1-based position among this batch's records.
    pub step_index: i32,
    pub progress_date: Timestamp,
    pub output_quantity: f64,
    pub output_unit: String,
    pub notes: Option<String>,
    pub media_refs: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Farmer-supplied data for a new progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    pub progress_date: Timestamp,
    pub output_quantity: f64,
    pub output_unit: String,
    pub notes: Option<String>,
    /// References to already-uploaded media.
    #[serde(default)]
    pub media_refs: Vec<String>,
}

/// A fully resolved progress row ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProgressRecord {
    pub batch_id: DbId,
    pub stage_id: DbId,
    pub stage_name: String,
    pub step_index: i32,
    pub progress_date: Timestamp,
    pub output_quantity: f64,
    pub output_unit: String,
    pub notes: Option<String>,
    pub media_refs: Vec<String>,
}

/// Patch for the only mutable parts of a progress record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProgressNotes {
    pub notes: Option<String>,
    pub media_refs: Option<Vec<String>>,
}

/// The most recent record (highest step index).
pub fn latest(records: &[ProgressRecord]) -> Option<&ProgressRecord> {
    records.iter().max_by_key(|r| r.step_index)
}

/// Step index the next record for this batch will receive.
pub fn next_step_index(records: &[ProgressRecord]) -> i32 {
    latest(records).map_or(1, |r| r.step_index + 1)
}

/// Validate farmer-supplied progress data.
pub fn validate_progress_data(data: &ProgressData) -> Result<(), CoreError> {
    if !data.output_quantity.is_finite() || data.output_quantity < 0.0 {
        return Err(CoreError::Validation(format!(
            "Output quantity must be a non-negative number, got {}",
            data.output_quantity
        )));
    }

    let unit = data.output_unit.trim();
    if unit.is_empty() {
        return Err(CoreError::Validation(
            "Output unit must not be empty".to_string(),
        ));
    }
    if unit.len() > MAX_OUTPUT_UNIT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Output unit exceeds maximum length of {MAX_OUTPUT_UNIT_LENGTH} characters"
        )));
    }

    validate_notes(data.notes.as_deref())?;
    validate_media_refs(&data.media_refs)
}

/// Validate a notes/media patch.
pub fn validate_notes_update(patch: &UpdateProgressNotes) -> Result<(), CoreError> {
    if patch.notes.is_none() && patch.media_refs.is_none() {
        return Err(CoreError::Validation(
            "Nothing to update: provide notes or media references".to_string(),
        ));
    }
    validate_notes(patch.notes.as_deref())?;
    match &patch.media_refs {
        Some(refs) => validate_media_refs(refs),
        None => Ok(()),
    }
}

fn validate_notes(notes: Option<&str>) -> Result<(), CoreError> {
    if notes.is_some_and(|n| n.len() > MAX_NOTES_LENGTH) {
        return Err(CoreError::Validation(format!(
            "Notes exceed maximum length of {MAX_NOTES_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_media_refs(refs: &[String]) -> Result<(), CoreError> {
    if refs.len() > MAX_MEDIA_REFS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_MEDIA_REFS} media references may be attached"
        )));
    }
    if refs.iter().any(|r| r.trim().is_empty()) {
        return Err(CoreError::Validation(
            "Media references must not be empty".to_string(),
        ));
    }
    Ok(())
}
