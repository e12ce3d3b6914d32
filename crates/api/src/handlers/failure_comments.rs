//! Standalone decoder for stage-failure comments.

use axum::response::IntoResponse;
use axum::Json;
use coffeetrace_core::failure_codec::{self, EncodedFailure};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;

#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    pub comments: String,
}

#[derive(Debug, Serialize)]
pub struct DecodedComment {
    /// `null` when the text is a plain human comment.
    pub failure: Option<EncodedFailure>,
    pub summary: String,
}

/// POST /api/v1/failure-comments/decode
///
/// Never fails on undecodable text: that is a normal outcome.
pub async fn decode_comment(Json(input): Json<DecodeRequest>) -> AppResult<impl IntoResponse> {
    let data = DecodedComment {
        failure: failure_codec::decode(&input.comments),
        summary: failure_codec::describe(&input.comments),
    };
    Ok(Json(DataResponse { data }))
}
