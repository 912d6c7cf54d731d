use axum::{
    Json,
    extract::{Path, State},
};
use hunter_core::source::SourceError;
use hunter_sdk::objects::{IngestResponse, Row};
use serde_json::Value;

use super::ApiError;
use crate::state::AppState;

/// `POST /monitoring/{artifact}`: publish rows to the event source.
///
/// The body is a single JSON object or an array of objects. Rows reach only
/// the queries watching the artifact right now. The response waits until
/// every watching query has buffered each row.
pub(super) async fn publish_rows(
    State(state): State<AppState>,
    Path(artifact): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<IngestResponse>, ApiError> {
    if !state.source.artifacts().any(|known| known == artifact) {
        return Err(ApiError::UnknownArtifact(artifact));
    }

    let rows = into_rows(body)?;
    let accepted = rows.len();
    for row in rows {
        state
            .source
            .publish(&artifact, row)
            .await
            .map_err(|e| match e {
                SourceError::UnknownArtifact(artifact) => ApiError::UnknownArtifact(artifact),
            })?;
    }

    tracing::debug!(%artifact, accepted, "Published monitoring rows");
    Ok(Json(IngestResponse { accepted }))
}

fn into_rows(body: Value) -> Result<Vec<Row>, ApiError> {
    match body {
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                _ => Err(ApiError::BadRequest("every row must be a JSON object".into())),
            })
            .collect(),
        _ => Err(ApiError::BadRequest(
            "body must be a JSON object or an array of objects".into(),
        )),
    }
}
