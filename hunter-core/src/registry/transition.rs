use hunter_sdk::objects::{FlowRequest, HuntRecord};
use thiserror::Error;
use time::OffsetDateTime;

/// Why a client could not be scheduled on a hunt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EligibilityError {
    #[error("hunt is stopped")]
    Stopped,

    #[error("hunt client limit of {limit} reached")]
    LimitExceeded { limit: u64 },

    #[error("hunt expired at {expires}")]
    Expired { expires: OffsetDateTime },
}

/// Try to schedule `client_id` on the hunt.
///
/// - A stopped or non-running hunt is left untouched.
/// - A hunt whose client limit is reached, or which expired before `now`,
///   is marked stopped; this ends participation for every later client.
/// - Otherwise the scheduled counter is incremented and the hunt's start
///   request is merged with the client.
pub fn schedule_client(
    mut record: HuntRecord,
    client_id: &str,
    now: OffsetDateTime,
) -> (HuntRecord, Result<FlowRequest, EligibilityError>) {
    if !record.is_running() {
        return (record, Err(EligibilityError::Stopped));
    }

    if record.limit_reached() {
        record.stats.stopped = true;
        let limit = record.client_limit;
        return (record, Err(EligibilityError::LimitExceeded { limit }));
    }

    if record.is_expired_at(now) {
        record.stats.stopped = true;
        let expires = record.expires;
        return (record, Err(EligibilityError::Expired { expires }));
    }

    let request = record.start_request.for_client(client_id);
    record.stats.total_clients_scheduled += 1;
    (record, Ok(request))
}
