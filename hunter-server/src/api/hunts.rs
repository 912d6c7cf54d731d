use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use hunter_core::registry::registry_key;
use hunter_sdk::objects::HuntRecord;

use super::ApiError;
use crate::state::AppState;

/// `GET /hunts`: every hunt, ordered by id.
pub(super) async fn list_hunts(State(state): State<AppState>) -> Json<Vec<HuntRecord>> {
    Json(state.registry.list_hunts().await)
}

/// `GET /hunts/{hunt_id}`
pub(super) async fn get_hunt(
    State(state): State<AppState>,
    Path(hunt_id): Path<String>,
) -> Result<Json<HuntRecord>, ApiError> {
    state
        .registry
        .get_hunt(&hunt_id)
        .await
        .map(Json)
        .ok_or(ApiError::HuntNotFound(hunt_id))
}

/// `PUT /hunts/{hunt_id}`: create or replace a hunt.
///
/// An empty `hunt_id` in the body takes the one from the path. A replacement
/// keeps the stored scheduled count and stop flag, and the response carries
/// the record as stored.
pub(super) async fn put_hunt(
    State(state): State<AppState>,
    Path(hunt_id): Path<String>,
    Json(mut record): Json<HuntRecord>,
) -> Result<(StatusCode, Json<HuntRecord>), ApiError> {
    if record.hunt_id.is_empty() {
        record.hunt_id = hunt_id.clone();
    }
    if registry_key(&record.hunt_id) != registry_key(&hunt_id) {
        return Err(ApiError::BadRequest(format!(
            "body hunt_id {} does not match path {hunt_id}",
            record.hunt_id
        )));
    }

    let replaced = state.registry.insert_hunt(record.clone()).await.is_some();
    tracing::info!(
        hunt_id = %record.hunt_id,
        state = ?record.state,
        client_limit = record.client_limit,
        replaced,
        "Hunt stored"
    );

    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let stored = state
        .registry
        .get_hunt(&record.hunt_id)
        .await
        .unwrap_or(record);
    Ok((status, Json(stored)))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::spawn_server;
    use hunter_sdk::client::{ClientError, HunterClient};
    use hunter_sdk::objects::{HuntRecord, HuntState, HuntStats};
    use time::OffsetDateTime;

    fn hunt(hunt_id: &str) -> HuntRecord {
        HuntRecord {
            hunt_id: hunt_id.into(),
            state: HuntState::Running,
            client_limit: 3,
            expires: OffsetDateTime::from_unix_timestamp(1_900_000_000).unwrap(),
            stats: HuntStats::default(),
            start_request: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get_and_list() {
        let server = spawn_server(vec![hunt("H.2")]).await;
        let client = HunterClient::new(server.base_url.clone());

        let stored = client.put_hunt(&hunt("H.1")).await.unwrap();
        assert_eq!(stored.hunt_id, "H.1");

        assert_eq!(client.get_hunt("H.1").await.unwrap(), hunt("H.1"));
        let ids: Vec<String> = client
            .list_hunts()
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.hunt_id)
            .collect();
        assert_eq!(ids, vec!["H.1".to_string(), "H.2".to_string()]);
    }

    #[tokio::test]
    async fn test_replace_keeps_stats() {
        let stats = HuntStats {
            total_clients_scheduled: 3,
            stopped: true,
        };
        let mut stopped = hunt("H.1");
        stopped.stats = stats.clone();
        let server = spawn_server(vec![stopped]).await;
        let client = HunterClient::new(server.base_url.clone());

        let returned = client.put_hunt(&hunt("H.1")).await.unwrap();
        assert_eq!(returned.stats, stats);

        let current = server.state.registry.get_hunt("H.1").await.unwrap();
        assert!(!current.is_running());
        assert_eq!(current.stats, stats);
    }

    #[tokio::test]
    async fn test_missing_hunt_is_404() {
        let server = spawn_server(Vec::new()).await;
        let client = HunterClient::new(server.base_url.clone());

        let err = client.get_hunt("H.404").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Api { status, .. } if status == reqwest::StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_mismatched_id_is_rejected() {
        let server = spawn_server(Vec::new()).await;
        let url = server.base_url.join("/hunts/H.1").unwrap();

        let response = reqwest::Client::new()
            .put(url)
            .json(&hunt("H.2"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(server.state.registry.get_hunt("H.2").await.is_none());
    }
}
