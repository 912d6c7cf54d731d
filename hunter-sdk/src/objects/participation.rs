//! Participation events and their row decoder.
//!
//! A participation event is a client's decision to join (or not) a hunt. It
//! arrives as an untyped [`Row`]; [`ParticipationEvent::decode`] validates the
//! required columns and produces a typed [`DecodeError`] otherwise.

use super::{FlowId, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const HUNT_ID: &str = "HuntId";
pub const CLIENT_ID: &str = "ClientId";
pub const FQDN: &str = "Fqdn";
pub const FLOW_ID: &str = "FlowId";
pub const PARTICIPATE: &str = "Participate";

/// One client's decision on one hunt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParticipationEvent {
    pub hunt_id: String,
    pub client_id: String,
    #[serde(default)]
    pub fqdn: Option<String>,
    /// Set once the flow has been dispatched to the client.
    #[serde(default)]
    pub flow_id: Option<FlowId>,
    pub participate: bool,
}

/// Errors produced while decoding a row into a [`ParticipationEvent`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{0}` must not be empty")]
    Empty(&'static str),
}

impl ParticipationEvent {
    /// Decode a row, validating required fields.
    ///
    /// `HuntId`, `ClientId` and `Participate` are required. `Fqdn` and
    /// `FlowId` are optional; an explicit `null` counts as absent.
    pub fn decode(row: &Row) -> Result<Self, DecodeError> {
        Ok(Self {
            hunt_id: required_str(row, HUNT_ID)?,
            client_id: required_str(row, CLIENT_ID)?,
            fqdn: optional_str(row, FQDN)?,
            flow_id: optional_str(row, FLOW_ID)?.map(FlowId::new),
            participate: match row.get(PARTICIPATE) {
                None | Some(Value::Null) => return Err(DecodeError::MissingField(PARTICIPATE)),
                Some(Value::Bool(b)) => *b,
                Some(_) => {
                    return Err(DecodeError::InvalidType {
                        field: PARTICIPATE,
                        expected: "a boolean",
                    });
                }
            },
        })
    }

    /// Return a copy annotated with the dispatched flow id.
    pub fn with_flow_id(&self, flow_id: FlowId) -> Self {
        Self {
            flow_id: Some(flow_id),
            ..self.clone()
        }
    }

    /// Encode back into a row with all five columns present.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(HUNT_ID.into(), Value::String(self.hunt_id.clone()));
        row.insert(CLIENT_ID.into(), Value::String(self.client_id.clone()));
        row.insert(
            FQDN.into(),
            self.fqdn.clone().map(Value::String).unwrap_or(Value::Null),
        );
        row.insert(
            FLOW_ID.into(),
            self.flow_id
                .as_ref()
                .map(|id| Value::String(id.to_string()))
                .unwrap_or(Value::Null),
        );
        row.insert(PARTICIPATE.into(), Value::Bool(self.participate));
        row
    }
}

fn required_str(row: &Row, field: &'static str) -> Result<String, DecodeError> {
    match optional_str(row, field)? {
        None => Err(DecodeError::MissingField(field)),
        Some(s) if s.is_empty() => Err(DecodeError::Empty(field)),
        Some(s) => Ok(s),
    }
}

fn optional_str(row: &Row, field: &'static str) -> Result<Option<String>, DecodeError> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DecodeError::InvalidType {
            field,
            expected: "a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn test_decode_full_row() {
        let event = ParticipationEvent::decode(&row(json!({
            "HuntId": "H.1234",
            "ClientId": "C.1",
            "Fqdn": "host.example.com",
            "Participate": true,
        })))
        .unwrap();

        assert_eq!(event.hunt_id, "H.1234");
        assert_eq!(event.client_id, "C.1");
        assert_eq!(event.fqdn.as_deref(), Some("host.example.com"));
        assert_eq!(event.flow_id, None);
        assert!(event.participate);
    }

    #[test]
    fn test_decode_optional_fields_may_be_null() {
        let event = ParticipationEvent::decode(&row(json!({
            "HuntId": "H.1",
            "ClientId": "C.1",
            "Fqdn": null,
            "Participate": false,
        })))
        .unwrap();
        assert_eq!(event.fqdn, None);
        assert!(!event.participate);
    }

    #[test]
    fn test_decode_rejects_missing_required_fields() {
        let err = ParticipationEvent::decode(&row(json!({
            "ClientId": "C.1",
            "Participate": true,
        })))
        .unwrap_err();
        assert_eq!(err, DecodeError::MissingField(HUNT_ID));

        let err = ParticipationEvent::decode(&row(json!({
            "HuntId": "H.1",
            "ClientId": "C.1",
        })))
        .unwrap_err();
        assert_eq!(err, DecodeError::MissingField(PARTICIPATE));
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let err = ParticipationEvent::decode(&row(json!({
            "HuntId": "H.1",
            "ClientId": 42,
            "Participate": true,
        })))
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidType { field: CLIENT_ID, .. }));

        let err = ParticipationEvent::decode(&row(json!({
            "HuntId": "H.1",
            "ClientId": "C.1",
            "Participate": "yes",
        })))
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidType { field: PARTICIPATE, .. }));
    }

    #[test]
    fn test_decode_rejects_empty_ids() {
        let err = ParticipationEvent::decode(&row(json!({
            "HuntId": "",
            "ClientId": "C.1",
            "Participate": true,
        })))
        .unwrap_err();
        assert_eq!(err, DecodeError::Empty(HUNT_ID));
    }

    #[test]
    fn test_with_flow_id_is_written_to_row() {
        let event = ParticipationEvent {
            hunt_id: "H.1".into(),
            client_id: "C.1".into(),
            fqdn: None,
            flow_id: None,
            participate: true,
        };
        let annotated = event.with_flow_id(FlowId::new("F.99"));
        let row = annotated.to_row();

        assert_eq!(row.get(FLOW_ID), Some(&json!("F.99")));
        assert_eq!(row.get(FQDN), Some(&Value::Null));
        assert_eq!(event.flow_id, None);
    }
}
