//! Stage-failure metadata carried inside an evaluation's `comments` text.
//!
//! A failed evaluation has no dedicated column for the failing stage, so the
//! failure is serialized into the free-text comment as one line of
//! pipe-separated `KEY:value` segments:
//!
//! ```text
//! FAILED_STAGE_ID:<order index>|FAILED_STAGE_NAME:<name>|DETAILS:<text>|RECOMMENDATIONS:<text>
//! ```
//!
//! The same field also holds ordinary human comments, so [`decode`] returns
//! `None` for anything that is not an exact match of the grammar. The grammar
//! has no escaping: values may contain `:` but never `|`.

use serde::{Deserialize, Serialize};

use crate::stage_catalog::Stage;

pub const KEY_STAGE_ID: &str = "FAILED_STAGE_ID";
pub const KEY_STAGE_NAME: &str = "FAILED_STAGE_NAME";
pub const KEY_DETAILS: &str = "DETAILS";
pub const KEY_RECOMMENDATIONS: &str = "RECOMMENDATIONS";

/// Substituted for blank failure details so no segment is ever empty.
pub const DEFAULT_DETAILS: &str = "No details provided";

/// Substituted for blank recommendations so no segment is ever empty.
pub const DEFAULT_RECOMMENDATIONS: &str = "No recommendations provided";

const SEGMENT_SEPARATOR: char = '|';
const KEY_VALUE_SEPARATOR: char = ':';

/// Structured failure data embedded in an evaluation comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedFailure {
    /// Order index of the failed stage (serialized as `FAILED_STAGE_ID`).
    pub failed_order_index: i32,
    pub failed_stage_name: String,
    pub failure_details: String,
    pub recommendations: String,
}

impl EncodedFailure {
    /// Failure pointing at `stage`.
    pub fn for_stage(
        stage: &Stage,
        failure_details: impl Into<String>,
        recommendations: impl Into<String>,
    ) -> Self {
        Self {
            failed_order_index: stage.order_index,
            failed_stage_name: stage.name.clone(),
            failure_details: failure_details.into(),
            recommendations: recommendations.into(),
        }
    }
}

/// Serialize a failure into the comment grammar.
///
/// Values are trimmed; blank details and recommendations are replaced with
/// [`DEFAULT_DETAILS`] and [`DEFAULT_RECOMMENDATIONS`].
pub fn encode(failure: &EncodedFailure) -> String {
    format!(
        "{KEY_STAGE_ID}{KEY_VALUE_SEPARATOR}{}{SEGMENT_SEPARATOR}\
         {KEY_STAGE_NAME}{KEY_VALUE_SEPARATOR}{}{SEGMENT_SEPARATOR}\
         {KEY_DETAILS}{KEY_VALUE_SEPARATOR}{}{SEGMENT_SEPARATOR}\
         {KEY_RECOMMENDATIONS}{KEY_VALUE_SEPARATOR}{}",
        failure.failed_order_index,
        failure.failed_stage_name.trim(),
        or_placeholder(&failure.failure_details, DEFAULT_DETAILS),
        or_placeholder(&failure.recommendations, DEFAULT_RECOMMENDATIONS),
    )
}

/// Parse a comment back into a failure.
///
/// Segment order and surrounding whitespace are ignored. Returns `None` for
/// free-form text, a missing, repeated or unknown key, or a stage id that is
/// not a positive integer. `None` is a normal outcome, not an error.
pub fn decode(text: &str) -> Option<EncodedFailure> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut stage_id: Option<&str> = None;
    let mut stage_name: Option<&str> = None;
    let mut details: Option<&str> = None;
    let mut recommendations: Option<&str> = None;

    for segment in text.split(SEGMENT_SEPARATOR) {
        let (key, value) = segment.split_once(KEY_VALUE_SEPARATOR)?;
        let slot = match key.trim() {
            KEY_STAGE_ID => &mut stage_id,
            KEY_STAGE_NAME => &mut stage_name,
            KEY_DETAILS => &mut details,
            KEY_RECOMMENDATIONS => &mut recommendations,
            _ => return None,
        };
        if slot.is_some() {
            return None;
        }
        *slot = Some(value.trim());
    }

    let failed_order_index = stage_id?.parse::<i32>().ok().filter(|idx| *idx > 0)?;

    Some(EncodedFailure {
        failed_order_index,
        failed_stage_name: stage_name?.to_string(),
        failure_details: details?.to_string(),
        recommendations: recommendations?.to_string(),
    })
}

/// Human-readable rendering of a comment for reports.
///
/// Encoded failures become a sentence naming the stage; any other text is
/// returned as-is (trimmed).
pub fn describe(text: &str) -> String {
    match decode(text) {
        Some(failure) => format!(
            "Stage {} ({}) failed: {}. Recommendations: {}",
            failure.failed_order_index,
            failure.failed_stage_name,
            failure.failure_details.trim_end_matches('.'),
            failure.recommendations,
        ),
        None => text.trim().to_string(),
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}
